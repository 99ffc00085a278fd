use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crate::aggregator::{Breakdown, DirectorySizeAggregator};
use crate::error::ScanError;

pub type ScanJob = Box<dyn FnOnce() + Send + 'static>;

/// Runs scan jobs off the control thread.
pub trait ScanExecutor {
    /// An error means the job was dropped and will never report back.
    fn execute(&self, job: ScanJob) -> io::Result<()>;
}

/// One named OS thread per scan. Jobs for abandoned scans run to completion.
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadExecutor;

impl ScanExecutor for ThreadExecutor {
    fn execute(&self, job: ScanJob) -> io::Result<()> {
        thread::Builder::new()
            .name("dirscope-scan".to_string())
            .spawn(job)
            .map(|_| ())
    }
}

/// A finished scan as delivered back to the control thread.
#[derive(Debug)]
pub struct ScanOutcome {
    pub token: u64,
    pub path: PathBuf,
    pub result: Result<Breakdown, ScanError>,
}

/// Launches scans tagged with a monotonically increasing token and hands
/// back only the outcome of the most recent launch.
///
/// The token check happens in [`ScanDispatcher::try_next`] and
/// [`ScanDispatcher::recv_timeout`], the only places outcomes are consumed.
pub struct ScanDispatcher {
    aggregator: DirectorySizeAggregator,
    executor: Arc<dyn ScanExecutor>,
    tx: Sender<ScanOutcome>,
    rx: Receiver<ScanOutcome>,
    active_token: u64,
}

impl ScanDispatcher {
    pub fn new(aggregator: DirectorySizeAggregator, executor: Arc<dyn ScanExecutor>) -> Self {
        let (tx, rx) = mpsc::channel();
        Self {
            aggregator,
            executor,
            tx,
            rx,
            active_token: 0,
        }
    }

    pub fn active_token(&self) -> u64 {
        self.active_token
    }

    /// Start a scan of `path`, superseding any scan still in flight.
    ///
    /// The token is bumped even when the executor refuses the job, so a
    /// failed launch still invalidates older scans.
    pub fn launch(&mut self, path: PathBuf) -> Result<u64, ScanError> {
        let token = self.invalidate();
        let aggregator = self.aggregator.clone();
        let tx = self.tx.clone();

        self.executor.execute(Box::new(move || {
            let result = panic::catch_unwind(AssertUnwindSafe(|| aggregator.breakdown_children(&path)))
                .unwrap_or(Err(ScanError::WorkerPanicked));
            // The receiver is gone once the owning window closed.
            let _ = tx.send(ScanOutcome {
                token,
                path,
                result,
            });
        }))
        .map_err(ScanError::WorkerUnavailable)?;

        Ok(token)
    }

    /// Bump the token without launching; whatever is in flight becomes stale.
    pub fn invalidate(&mut self) -> u64 {
        self.active_token += 1;
        self.active_token
    }

    fn accept(&self, outcome: ScanOutcome) -> Option<ScanOutcome> {
        if outcome.token == self.active_token {
            Some(outcome)
        } else {
            tracing::debug!(
                "Dropping stale scan of {} (token {}, active {})",
                outcome.path.display(),
                outcome.token,
                self.active_token
            );
            None
        }
    }

    /// Drain everything delivered so far, returning the current outcome if it
    /// has arrived.
    pub fn try_next(&mut self) -> Option<ScanOutcome> {
        let mut fresh = None;
        loop {
            match self.rx.try_recv() {
                Ok(outcome) => {
                    if let Some(outcome) = self.accept(outcome) {
                        fresh = Some(outcome);
                    }
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
        fresh
    }

    /// Block until the current outcome arrives or `timeout` elapses.
    pub fn recv_timeout(&mut self, timeout: Duration) -> Option<ScanOutcome> {
        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.rx.recv_timeout(remaining) {
                Ok(outcome) => {
                    if let Some(outcome) = self.accept(outcome) {
                        return Some(outcome);
                    }
                }
                Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => {
                    return None
                }
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::sync::Mutex;

    /// Holds jobs until the test decides which one finishes first.
    #[derive(Default, Clone)]
    pub struct ManualExecutor {
        jobs: Arc<Mutex<Vec<ScanJob>>>,
    }

    impl ManualExecutor {
        pub fn pending(&self) -> usize {
            self.jobs.lock().unwrap().len()
        }

        /// Run the job queued at `index` (0 = oldest still pending).
        pub fn run(&self, index: usize) {
            let job = self.jobs.lock().unwrap().remove(index);
            job();
        }

        pub fn run_all(&self) {
            while self.pending() > 0 {
                self.run(0);
            }
        }
    }

    impl ScanExecutor for ManualExecutor {
        fn execute(&self, job: ScanJob) -> io::Result<()> {
            self.jobs.lock().unwrap().push(job);
            Ok(())
        }
    }

    /// Refuses every job, like a thread spawn hitting the process limit.
    #[derive(Default, Clone, Copy)]
    pub struct RefusingExecutor;

    impl ScanExecutor for RefusingExecutor {
        fn execute(&self, _job: ScanJob) -> io::Result<()> {
            Err(io::Error::new(io::ErrorKind::WouldBlock, "no threads left"))
        }
    }
}
