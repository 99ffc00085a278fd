use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::aggregator::{Breakdown, DirectoryEntry, DirectorySizeAggregator};
use crate::config::Config;
use crate::error::ScanError;
use crate::reveal::{Revealer, SystemRevealer};
use crate::scan::{ScanDispatcher, ScanExecutor, ScanOutcome, ThreadExecutor};
use crate::walker::build_walker;
use crate::watch::DirectoryWatcher;

pub const EMPTY_MESSAGE: &str = "No content, or no permission to read it";

/// Where the navigator is in its scan cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavStatus {
    /// No root chosen yet.
    Idle,
    Scanning,
    Displaying,
    /// The scan succeeded but found nothing to show.
    Empty,
    Error(String),
}

/// External file chooser.
pub trait DirectoryPicker {
    /// `None` when the user cancelled.
    fn prompt_for_directory(&mut self) -> Option<PathBuf>;
}

/// Anything that can draw a [`RenderModel`].
pub trait RenderSurface {
    fn render(&mut self, model: &RenderModel);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Breadcrumb {
    pub label: String,
    pub path: PathBuf,
}

/// Everything a render surface needs for one redraw.
#[derive(Debug, Clone)]
pub struct RenderModel {
    pub current_path: Option<PathBuf>,
    pub breadcrumbs: Vec<Breadcrumb>,
    /// Ranked entries after the name filter.
    pub entries: Vec<DirectoryEntry>,
    pub status: NavStatus,
    pub history_depth: usize,
    pub can_go_back: bool,
    pub total_size: u64,
    pub hidden_count: usize,
    pub duration_ms: Option<u128>,
    pub filter: String,
}

impl RenderModel {
    pub fn status_line(&self) -> String {
        match &self.status {
            NavStatus::Idle => "Choose a folder to scan".to_string(),
            NavStatus::Scanning => match &self.current_path {
                Some(path) => format!("Scanning {} ...", path.display()),
                None => "Scanning...".to_string(),
            },
            NavStatus::Displaying => {
                let mut line = format!("{} items", self.entries.len());
                if let Some(ms) = self.duration_ms {
                    line.push_str(&format!(" in {}ms", ms));
                }
                line
            }
            NavStatus::Empty => EMPTY_MESSAGE.to_string(),
            NavStatus::Error(message) => format!("Scan failed: {}", message),
        }
    }
}

/// Drill-down controller: owns history, the current directory and the scan
/// token. Every method runs on the control thread; scan results come back
/// through [`DrillDownNavigator::poll`].
pub struct DrillDownNavigator {
    scans: ScanDispatcher,
    revealer: Box<dyn Revealer>,
    watcher: Option<DirectoryWatcher>,
    scan_timeout: Option<Duration>,

    status: NavStatus,
    current_path: Option<PathBuf>,
    history: Vec<PathBuf>,
    breakdown: Option<Breakdown>,
    scan_started: Option<Instant>,
    filter: String,
}

impl DrillDownNavigator {
    pub fn new(
        aggregator: DirectorySizeAggregator,
        executor: Arc<dyn ScanExecutor>,
        revealer: Box<dyn Revealer>,
    ) -> Self {
        Self {
            scans: ScanDispatcher::new(aggregator, executor),
            revealer,
            watcher: None,
            scan_timeout: None,
            status: NavStatus::Idle,
            current_path: None,
            history: Vec::new(),
            breakdown: None,
            scan_started: None,
            filter: String::new(),
        }
    }

    /// Wire the default collaborators from a loaded config.
    pub fn from_config(config: &Config) -> Self {
        let aggregator = DirectorySizeAggregator::new(build_walker(config), config);
        let mut navigator = Self::new(aggregator, Arc::new(ThreadExecutor), Box::new(SystemRevealer))
            .with_timeout(config.scan_timeout());

        if config.watch_current_dir {
            match DirectoryWatcher::new() {
                Ok(watcher) => navigator = navigator.with_watcher(watcher),
                Err(err) => tracing::warn!("Directory watching disabled: {}", err),
            }
        }
        navigator
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.scan_timeout = timeout;
        self
    }

    pub fn with_watcher(mut self, watcher: DirectoryWatcher) -> Self {
        self.watcher = Some(watcher);
        self
    }

    pub fn status(&self) -> &NavStatus {
        &self.status
    }

    pub fn current_path(&self) -> Option<&Path> {
        self.current_path.as_deref()
    }

    pub fn history(&self) -> &[PathBuf] {
        &self.history
    }

    pub fn active_scan_token(&self) -> u64 {
        self.scans.active_token()
    }

    pub fn breakdown(&self) -> Option<&Breakdown> {
        self.breakdown.as_ref()
    }

    pub fn filter(&self) -> &str {
        &self.filter
    }

    pub fn can_go_back(&self) -> bool {
        self.history.len() > 1
    }

    // --- navigation actions ---

    /// First-run prompt. Only acts while nothing has been chosen yet.
    pub fn open(&mut self, picker: &mut dyn DirectoryPicker) -> bool {
        if self.status != NavStatus::Idle {
            return false;
        }
        self.browse(picker)
    }

    /// Ask the picker for a root. A cancelled prompt changes nothing.
    pub fn browse(&mut self, picker: &mut dyn DirectoryPicker) -> bool {
        match picker.prompt_for_directory() {
            Some(path) => {
                self.select_root(path);
                true
            }
            None => false,
        }
    }

    /// Start from a newly chosen root. It is pushed like any forward move.
    /// Relative roots are resolved against the working directory.
    pub fn select_root(&mut self, path: PathBuf) {
        let path = match std::path::absolute(&path) {
            Ok(absolute) => absolute,
            Err(err) => {
                tracing::debug!("Cannot make {} absolute: {}", path.display(), err);
                path
            }
        };
        self.push_and_scan(path);
    }

    /// Click on a ranked entry: directories are entered, files revealed.
    /// Returns true when a new scan was launched.
    pub fn open_entry(&mut self, entry: &DirectoryEntry) -> bool {
        if entry.is_dir {
            self.push_and_scan(entry.path.clone());
            true
        } else {
            self.revealer.reveal(&entry.path);
            false
        }
    }

    /// Like [`open_entry`](Self::open_entry) for the `index`-th visible entry.
    pub fn open_entry_at(&mut self, index: usize) -> bool {
        match self.visible_entries().get(index).cloned() {
            Some(entry) => self.open_entry(&entry),
            None => false,
        }
    }

    /// Go back to the previously visited directory. No-op at the root.
    pub fn back(&mut self) -> bool {
        if self.history.len() < 2 {
            return false;
        }
        self.history.pop();
        let Some(previous) = self.history.last().cloned() else {
            return false;
        };
        self.current_path = Some(previous);
        self.launch_scan();
        true
    }

    /// Collapse history to the originally chosen root and rescan it.
    pub fn home(&mut self) -> bool {
        let Some(root) = self.history.first().cloned() else {
            return false;
        };
        self.history.truncate(1);
        self.current_path = Some(root);
        self.launch_scan();
        true
    }

    /// Jump to a breadcrumb segment. History is never popped here; the target
    /// is pushed like a forward move, and clicking the last segment rescans.
    pub fn open_breadcrumb(&mut self, index: usize) -> bool {
        let Some(crumb) = self.breadcrumbs().into_iter().nth(index) else {
            return false;
        };
        if self.current_path.as_ref() == Some(&crumb.path) {
            return self.rescan();
        }
        self.push_and_scan(crumb.path);
        true
    }

    /// Scan the current directory again without touching history.
    pub fn rescan(&mut self) -> bool {
        if self.current_path.is_none() {
            return false;
        }
        self.launch_scan();
        true
    }

    /// Case-insensitive name filter over the current result. No rescan.
    pub fn set_filter(&mut self, query: impl Into<String>) {
        self.filter = query.into();
    }

    fn push_and_scan(&mut self, path: PathBuf) {
        if self.history.last() != Some(&path) {
            self.history.push(path.clone());
        }
        self.current_path = Some(path);
        self.launch_scan();
    }

    fn launch_scan(&mut self) {
        let Some(path) = self.current_path.clone() else {
            return;
        };
        // Clear before the new result arrives so stale rows never show.
        self.breakdown = None;
        self.filter.clear();
        self.status = NavStatus::Scanning;
        self.scan_started = Some(Instant::now());
        if let Some(watcher) = self.watcher.as_mut() {
            watcher.unwatch();
        }

        match self.scans.launch(path.clone()) {
            Ok(token) => tracing::info!("Scanning {} (token {})", path.display(), token),
            Err(err) => {
                tracing::error!("Cannot scan {}: {}", path.display(), err);
                self.scan_started = None;
                self.status = NavStatus::Error(err.to_string());
            }
        }
    }

    // --- result handling ---

    /// Apply whatever finished since the last call, then check the timeout
    /// and the directory watcher. Returns true when the render model changed.
    pub fn poll(&mut self) -> bool {
        let mut changed = false;

        if let Some(outcome) = self.scans.try_next() {
            self.apply(outcome);
            changed = true;
        }

        changed |= self.expire_if_overdue();

        let dir_changed = self
            .watcher
            .as_ref()
            .map(|watcher| watcher.take_changed())
            .unwrap_or(false);
        if dir_changed && matches!(self.status, NavStatus::Displaying | NavStatus::Empty) {
            tracing::debug!("Current directory changed on disk, rescanning");
            changed |= self.rescan();
        }

        changed
    }

    /// Block until the current scan resolves or `timeout` elapses. Meant for
    /// callers without an event loop. The configured scan timeout applies
    /// here as well.
    pub fn wait_for_scan(&mut self, timeout: Duration) -> bool {
        if self.status != NavStatus::Scanning {
            return false;
        }
        if self.expire_if_overdue() {
            return true;
        }
        let wait = match (self.scan_timeout, self.scan_started) {
            (Some(limit), Some(started)) => timeout.min(limit.saturating_sub(started.elapsed())),
            _ => timeout,
        };
        match self.scans.recv_timeout(wait) {
            Some(outcome) => {
                self.apply(outcome);
                true
            }
            None => self.expire_if_overdue(),
        }
    }

    /// Give up on a scan running past the configured timeout.
    fn expire_if_overdue(&mut self) -> bool {
        if self.status != NavStatus::Scanning {
            return false;
        }
        let (Some(timeout), Some(started)) = (self.scan_timeout, self.scan_started) else {
            return false;
        };
        if started.elapsed() < timeout {
            return false;
        }
        self.scans.invalidate();
        self.scan_started = None;
        let err = ScanError::TimedOut(u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX));
        tracing::warn!("{}", err);
        self.status = NavStatus::Error(err.to_string());
        true
    }

    fn apply(&mut self, outcome: ScanOutcome) {
        self.scan_started = None;
        match outcome.result {
            Ok(breakdown) => {
                tracing::info!(
                    "Scanned {}: {} entries, {} bytes in {}ms",
                    outcome.path.display(),
                    breakdown.entries.len(),
                    breakdown.total_size,
                    breakdown.duration_ms
                );
                self.status = if breakdown.is_empty() {
                    NavStatus::Empty
                } else {
                    NavStatus::Displaying
                };
                self.breakdown = Some(breakdown);
                self.watch_current();
            }
            Err(err) => {
                tracing::warn!("Scan of {} failed: {}", outcome.path.display(), err);
                self.breakdown = None;
                self.status = NavStatus::Error(err.to_string());
            }
        }
    }

    fn watch_current(&mut self) {
        let (Some(watcher), Some(path)) = (self.watcher.as_mut(), self.current_path.as_ref()) else {
            return;
        };
        if let Err(err) = watcher.watch(path) {
            tracing::warn!("Cannot watch {}: {}", path.display(), err);
        }
    }

    // --- render model ---

    /// Ranked entries with the name filter applied. The filter searches
    /// every child, so matches ranked below the cut still show up.
    pub fn visible_entries(&self) -> Vec<DirectoryEntry> {
        self.visible().0
    }

    fn visible(&self) -> (Vec<DirectoryEntry>, usize) {
        match self.breakdown.as_ref() {
            Some(breakdown) => breakdown.matching(&self.filter),
            None => (Vec::new(), 0),
        }
    }

    /// Segments from the chosen root down to the current directory.
    ///
    /// The anchor is the earliest history entry containing the current
    /// directory, so a root picked later via browse starts its own trail.
    pub fn breadcrumbs(&self) -> Vec<Breadcrumb> {
        let Some(current) = self.current_path.as_ref() else {
            return Vec::new();
        };
        let anchor = self
            .history
            .iter()
            .find(|candidate| current.starts_with(candidate))
            .unwrap_or(current);

        let mut crumbs = vec![Breadcrumb {
            label: anchor.display().to_string(),
            path: anchor.clone(),
        }];
        let mut path = anchor.clone();
        if let Ok(rest) = current.strip_prefix(anchor) {
            for component in rest.components() {
                path.push(component);
                crumbs.push(Breadcrumb {
                    label: component.as_os_str().to_string_lossy().to_string(),
                    path: path.clone(),
                });
            }
        }
        crumbs
    }

    pub fn render_model(&self) -> RenderModel {
        let (entries, hidden_count) = self.visible();
        RenderModel {
            current_path: self.current_path.clone(),
            breadcrumbs: self.breadcrumbs(),
            entries,
            status: self.status.clone(),
            history_depth: self.history.len(),
            can_go_back: self.can_go_back(),
            total_size: self.breakdown.as_ref().map(|b| b.total_size).unwrap_or(0),
            hidden_count,
            duration_ms: self.breakdown.as_ref().map(|b| b.duration_ms),
            filter: self.filter.clone(),
        }
    }

    pub fn present(&self, surface: &mut dyn RenderSurface) {
        surface.render(&self.render_model());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scan::testing::{ManualExecutor, RefusingExecutor};
    use crate::walker::StdWalker;
    use std::cell::RefCell;
    use std::fs;
    use std::rc::Rc;

    #[derive(Default, Clone)]
    struct RecordingRevealer {
        revealed: Rc<RefCell<Vec<PathBuf>>>,
    }

    impl Revealer for RecordingRevealer {
        fn reveal(&self, path: &Path) {
            self.revealed.borrow_mut().push(path.to_path_buf());
        }
    }

    struct FixedPicker(Option<PathBuf>);

    impl DirectoryPicker for FixedPicker {
        fn prompt_for_directory(&mut self) -> Option<PathBuf> {
            self.0.clone()
        }
    }

    #[derive(Default)]
    struct RecordingSurface {
        frames: Vec<RenderModel>,
    }

    impl RenderSurface for RecordingSurface {
        fn render(&mut self, model: &RenderModel) {
            self.frames.push(model.clone());
        }
    }

    struct Harness {
        nav: DrillDownNavigator,
        executor: ManualExecutor,
        revealer: RecordingRevealer,
        dir: tempfile::TempDir,
    }

    impl Harness {
        fn new() -> Self {
            Self::build(None)
        }

        fn build(timeout: Option<Duration>) -> Self {
            let dir = tempfile::tempdir().unwrap();
            fs::write(dir.path().join("a.txt"), vec![0u8; 100]).unwrap();
            fs::create_dir(dir.path().join("sub")).unwrap();
            fs::write(dir.path().join("sub").join("b.txt"), vec![0u8; 300]).unwrap();
            fs::create_dir(dir.path().join("hollow")).unwrap();

            let executor = ManualExecutor::default();
            let revealer = RecordingRevealer::default();
            let aggregator = DirectorySizeAggregator::new(Arc::new(StdWalker), &Config::default());
            let nav = DrillDownNavigator::new(
                aggregator,
                Arc::new(executor.clone()),
                Box::new(revealer.clone()),
            )
            .with_timeout(timeout);
            Self {
                nav,
                executor,
                revealer,
                dir,
            }
        }

        fn watching(mut self) -> Self {
            self.nav = self.nav.with_watcher(DirectoryWatcher::new().unwrap());
            self
        }

        fn root(&self) -> PathBuf {
            self.dir.path().to_path_buf()
        }

        fn settle(&mut self) {
            self.executor.run_all();
            self.nav.poll();
        }
    }

    #[test]
    fn test_starts_idle() {
        let h = Harness::new();
        assert_eq!(h.nav.status(), &NavStatus::Idle);
        assert!(h.nav.current_path().is_none());
        assert!(h.nav.history().is_empty());
        assert!(h.nav.breadcrumbs().is_empty());
    }

    #[test]
    fn test_idle_actions_are_noops() {
        let mut h = Harness::new();
        assert!(!h.nav.back());
        assert!(!h.nav.home());
        assert!(!h.nav.rescan());
        assert!(!h.nav.open_breadcrumb(0));
        assert_eq!(h.executor.pending(), 0);
        assert_eq!(h.nav.active_scan_token(), 0);
    }

    #[test]
    fn test_browse_cancel_and_select() {
        let mut h = Harness::new();
        assert!(!h.nav.browse(&mut FixedPicker(None)));
        assert_eq!(h.nav.status(), &NavStatus::Idle);

        let root = h.root();
        assert!(h.nav.browse(&mut FixedPicker(Some(root.clone()))));
        assert_eq!(h.nav.status(), &NavStatus::Scanning);
        assert_eq!(h.nav.history(), &[root]);

        h.settle();
        assert_eq!(h.nav.status(), &NavStatus::Displaying);
        let entries = h.nav.visible_entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].name(), "sub");
        assert_eq!(entries[0].percentage, 75.0);
    }

    #[test]
    fn test_open_only_prompts_when_idle() {
        let mut h = Harness::new();
        let root = h.root();
        assert!(!h.nav.open(&mut FixedPicker(None)));
        assert!(h.nav.open(&mut FixedPicker(Some(root.clone()))));
        h.settle();

        assert!(!h.nav.open(&mut FixedPicker(Some(root.join("sub")))));
        assert_eq!(h.nav.history(), &[root]);
    }

    #[test]
    fn test_directory_click_clears_and_drills() {
        let mut h = Harness::new();
        h.nav.select_root(h.root());
        h.settle();

        assert!(h.nav.open_entry_at(0));
        assert_eq!(h.nav.status(), &NavStatus::Scanning);
        assert!(h.nav.visible_entries().is_empty());
        assert_eq!(h.nav.history(), &[h.root(), h.root().join("sub")]);

        h.settle();
        assert_eq!(h.nav.current_path(), Some(h.root().join("sub").as_path()));
        assert_eq!(h.nav.visible_entries()[0].name(), "b.txt");
    }

    #[test]
    fn test_file_click_reveals_without_navigating() {
        let mut h = Harness::new();
        h.nav.select_root(h.root());
        h.settle();
        let token = h.nav.active_scan_token();

        assert!(!h.nav.open_entry_at(1));
        assert_eq!(h.nav.status(), &NavStatus::Displaying);
        assert_eq!(h.nav.active_scan_token(), token);
        assert_eq!(*h.revealer.revealed.borrow(), vec![h.root().join("a.txt")]);
    }

    #[test]
    fn test_back_and_home() {
        let mut h = Harness::new();
        h.nav.select_root(h.root());
        h.settle();
        h.nav.open_entry_at(0);
        h.settle();

        assert!(h.nav.back());
        assert_eq!(h.nav.history(), &[h.root()]);
        assert_eq!(h.nav.current_path(), Some(h.root().as_path()));
        h.settle();
        assert_eq!(h.nav.visible_entries()[0].name(), "sub");

        assert!(!h.nav.back());

        h.nav.open_entry_at(0);
        h.settle();
        assert!(h.nav.home());
        assert_eq!(h.nav.history(), &[h.root()]);
        assert_eq!(h.nav.current_path(), Some(h.root().as_path()));
    }

    #[test]
    fn test_stale_result_never_wins() {
        let mut h = Harness::new();
        h.nav.select_root(h.root());
        h.nav.select_root(h.root().join("sub"));

        // Newer scan finishes first, older one afterwards.
        h.executor.run(1);
        assert!(h.nav.poll());
        h.executor.run(0);
        assert!(!h.nav.poll());

        assert_eq!(h.nav.status(), &NavStatus::Displaying);
        let breakdown = h.nav.breakdown().unwrap();
        assert_eq!(breakdown.path, h.root().join("sub"));
        assert_eq!(breakdown.total_size, 300);
    }

    #[test]
    fn test_stale_result_dropped_while_scanning() {
        let mut h = Harness::new();
        h.nav.select_root(h.root());
        h.nav.rescan();

        h.executor.run(0);
        assert!(!h.nav.poll());
        assert_eq!(h.nav.status(), &NavStatus::Scanning);

        h.executor.run(0);
        assert!(h.nav.poll());
        assert_eq!(h.nav.status(), &NavStatus::Displaying);
    }

    #[test]
    fn test_empty_and_error_states() {
        let mut h = Harness::new();
        h.nav.select_root(h.root().join("hollow"));
        h.settle();
        assert_eq!(h.nav.status(), &NavStatus::Empty);
        assert_eq!(h.nav.render_model().status_line(), EMPTY_MESSAGE);

        h.nav.select_root(h.root().join("vanished"));
        h.settle();
        match h.nav.status() {
            NavStatus::Error(message) => assert!(message.contains("not found")),
            other => panic!("expected error, got {:?}", other),
        }

        // Still usable after an error.
        assert!(h.nav.back());
        h.settle();
        assert_eq!(h.nav.status(), &NavStatus::Empty);
    }

    #[test]
    fn test_breadcrumbs_and_jump() {
        let mut h = Harness::new();
        let deep = h.root().join("sub").join("x").join("y");
        fs::create_dir_all(&deep).unwrap();
        fs::write(deep.join("z"), vec![0u8; 9]).unwrap();

        h.nav.select_root(h.root());
        h.settle();
        for name in ["sub", "x", "y"] {
            let index = h
                .nav
                .visible_entries()
                .iter()
                .position(|e| e.name() == name)
                .unwrap();
            h.nav.open_entry_at(index);
            h.settle();
        }

        let crumbs = h.nav.breadcrumbs();
        let labels: Vec<_> = crumbs.iter().map(|c| c.label.as_str()).skip(1).collect();
        assert_eq!(labels, vec!["sub", "x", "y"]);
        assert_eq!(crumbs[0].path, h.root());
        assert_eq!(crumbs[3].path, deep);

        assert!(h.nav.open_breadcrumb(1));
        assert_eq!(h.nav.current_path(), Some(h.root().join("sub").as_path()));
        assert_eq!(h.nav.history().len(), 5);
        assert_eq!(h.nav.breadcrumbs().len(), 2);

        // Last segment is the current directory: rescan, no push.
        assert!(h.nav.open_breadcrumb(1));
        assert_eq!(h.nav.history().len(), 5);
        assert!(!h.nav.open_breadcrumb(9));
    }

    #[test]
    fn test_rescan_keeps_history_and_result() {
        let mut h = Harness::new();
        h.nav.select_root(h.root());
        h.settle();
        let first = h.nav.visible_entries();
        let token = h.nav.active_scan_token();

        assert!(h.nav.rescan());
        assert_eq!(h.nav.active_scan_token(), token + 1);
        h.settle();
        assert_eq!(h.nav.history(), &[h.root()]);
        assert_eq!(h.nav.visible_entries(), first);
    }

    #[test]
    fn test_filter_is_case_insensitive_and_reset_on_navigation() {
        let mut h = Harness::new();
        h.nav.select_root(h.root());
        h.settle();

        h.nav.set_filter("SU");
        let filtered = h.nav.visible_entries();
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].name(), "sub");

        h.nav.set_filter("nomatch");
        assert!(h.nav.render_model().entries.is_empty());

        h.nav.rescan();
        assert_eq!(h.nav.filter(), "");
    }

    #[test]
    fn test_timeout_invalidates_scan() {
        let mut h = Harness::build(Some(Duration::ZERO));
        h.nav.select_root(h.root());
        assert!(h.nav.poll());
        assert!(matches!(h.nav.status(), NavStatus::Error(m) if m.contains("timed out")));

        // The late result is stale now.
        h.executor.run_all();
        assert!(!h.nav.poll());
        assert!(matches!(h.nav.status(), NavStatus::Error(_)));
    }

    #[test]
    fn test_present_renders_model() {
        let mut h = Harness::new();
        let mut surface = RecordingSurface::default();
        h.nav.present(&mut surface);

        h.nav.select_root(h.root());
        h.nav.present(&mut surface);
        h.settle();
        h.nav.present(&mut surface);

        let statuses: Vec<_> = surface.frames.iter().map(|f| f.status.clone()).collect();
        assert_eq!(
            statuses,
            vec![NavStatus::Idle, NavStatus::Scanning, NavStatus::Displaying]
        );
        let last = surface.frames.last().unwrap();
        assert_eq!(last.total_size, 400);
        assert_eq!(last.history_depth, 1);
        assert!(!last.can_go_back);
        assert_eq!(last.breadcrumbs.len(), 1);
    }

    #[test]
    fn test_filter_finds_children_below_the_cut() {
        let mut h = Harness::new();
        let many = h.root().join("many");
        fs::create_dir(&many).unwrap();
        for i in 0..25 {
            fs::write(many.join(format!("chunk{i:02}.bin")), vec![0u8; 1000]).unwrap();
        }
        fs::write(many.join("report.txt"), vec![0u8; 10]).unwrap();

        h.nav.select_root(many.clone());
        h.settle();
        assert_eq!(h.nav.visible_entries().len(), 20);
        assert_eq!(h.nav.render_model().hidden_count, 6);

        h.nav.set_filter("report");
        let model = h.nav.render_model();
        assert_eq!(model.entries.len(), 1);
        assert_eq!(model.entries[0].path, many.join("report.txt"));
        assert_eq!(model.hidden_count, 0);

        // The filtered list is opened by position too.
        assert!(!h.nav.open_entry_at(0));
        assert_eq!(*h.revealer.revealed.borrow(), vec![many.join("report.txt")]);
    }

    #[test]
    fn test_relative_root_is_made_absolute() {
        let mut h = Harness::new();
        let cwd = std::env::current_dir().unwrap();

        h.nav.select_root(PathBuf::from("."));
        assert_eq!(h.nav.current_path(), Some(cwd.as_path()));
        assert_eq!(h.nav.history(), &[cwd.clone()]);
        assert_eq!(h.nav.breadcrumbs()[0].label, cwd.display().to_string());

        h.nav.select_root(PathBuf::from("nested/dir"));
        let current = h.nav.current_path().unwrap();
        assert!(current.is_absolute());
        assert_eq!(current, cwd.join("nested").join("dir"));
    }

    #[test]
    fn test_refused_worker_enters_error() {
        let dir = tempfile::tempdir().unwrap();
        let aggregator = DirectorySizeAggregator::new(Arc::new(StdWalker), &Config::default());
        let mut nav = DrillDownNavigator::new(
            aggregator,
            Arc::new(RefusingExecutor),
            Box::new(RecordingRevealer::default()),
        );

        nav.select_root(dir.path().to_path_buf());
        assert!(matches!(nav.status(), NavStatus::Error(m) if m.contains("could not start")));
        assert!(!nav.poll());
        assert!(!nav.wait_for_scan(Duration::from_millis(10)));

        // Still usable: a rescan tries again and reports the same failure.
        assert!(nav.rescan());
        assert!(matches!(nav.status(), NavStatus::Error(_)));
        assert_eq!(nav.active_scan_token(), 2);
    }

    #[test]
    fn test_directory_change_triggers_one_rescan() {
        let mut h = Harness::new().watching();
        h.nav.select_root(h.root());
        h.settle();
        assert_eq!(h.nav.status(), &NavStatus::Displaying);
        let token = h.nav.active_scan_token();

        fs::write(h.root().join("fresh.txt"), vec![0u8; 50]).unwrap();
        let deadline = Instant::now() + Duration::from_secs(5);
        while h.nav.active_scan_token() == token && Instant::now() < deadline {
            h.nav.poll();
            std::thread::sleep(Duration::from_millis(20));
        }
        assert_eq!(h.nav.active_scan_token(), token + 1);
        assert_eq!(h.nav.status(), &NavStatus::Scanning);

        // Changes while a scan is pending do not stack more rescans.
        fs::write(h.root().join("later.txt"), vec![0u8; 5]).unwrap();
        std::thread::sleep(Duration::from_millis(200));
        h.nav.poll();
        h.nav.poll();
        assert_eq!(h.nav.active_scan_token(), token + 1);
        assert_eq!(h.executor.pending(), 1);
    }

    #[test]
    fn test_wait_for_scan_honors_scan_timeout() {
        let mut h = Harness::build(Some(Duration::from_millis(50)));
        h.nav.select_root(h.root());

        let started = Instant::now();
        assert!(h.nav.wait_for_scan(Duration::from_secs(10)));
        assert!(started.elapsed() < Duration::from_secs(5));
        assert!(matches!(h.nav.status(), NavStatus::Error(m) if m.contains("timed out after 50 ms")));
    }
}
