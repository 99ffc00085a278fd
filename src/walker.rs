use jwalk::{Parallelism, WalkDir};
use rayon::{ThreadPool, ThreadPoolBuilder};
use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::{Config, WalkerKind};

/// One immediate child of a listed directory, as seen without following
/// symlinks.
#[derive(Debug, Clone)]
pub struct ChildEntry {
    pub name: OsString,
    pub path: PathBuf,
    /// Real directory. Always false for a symlink, even one pointing at a
    /// directory.
    pub is_dir: bool,
    pub is_symlink: bool,
    /// Byte length of the entry itself (the link, for symlinks).
    pub len: u64,
}

/// Filesystem access used by the aggregator.
pub trait FsWalker: Send + Sync {
    /// List the immediate children of `path` in directory-listing order.
    /// Children that cannot be stat'ed are left out.
    fn list_children(&self, path: &Path) -> io::Result<Vec<ChildEntry>>;

    /// Total byte size of the tree rooted at `path`. Never follows symlinks;
    /// unreadable entries count as 0.
    fn tree_size(&self, path: &Path) -> u64 {
        let meta = match fs::symlink_metadata(path) {
            Ok(meta) => meta,
            Err(err) => {
                tracing::debug!("Skipping {}: {}", path.display(), err);
                return 0;
            }
        };
        if !meta.is_dir() {
            return meta.len();
        }

        let children = match self.list_children(path) {
            Ok(children) => children,
            Err(err) => {
                tracing::debug!("Cannot list {}: {}", path.display(), err);
                return 0;
            }
        };

        children
            .iter()
            .map(|child| {
                if child.is_dir {
                    self.tree_size(&child.path)
                } else {
                    child.len
                }
            })
            .sum()
    }
}

/// Single `read_dir` pass shared by both walkers.
fn read_children(path: &Path) -> io::Result<Vec<ChildEntry>> {
    let mut children = Vec::new();
    for entry in fs::read_dir(path)? {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                tracing::debug!("Unreadable entry in {}: {}", path.display(), err);
                continue;
            }
        };
        // DirEntry::metadata does not traverse symlinks.
        let meta = match entry.metadata() {
            Ok(meta) => meta,
            Err(err) => {
                tracing::debug!("Cannot stat {}: {}", entry.path().display(), err);
                continue;
            }
        };
        let file_type = meta.file_type();
        children.push(ChildEntry {
            name: entry.file_name(),
            path: entry.path(),
            is_dir: file_type.is_dir(),
            is_symlink: file_type.is_symlink(),
            len: meta.len(),
        });
    }
    Ok(children)
}

/// Sequential walker on plain `std::fs` recursion.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdWalker;

impl FsWalker for StdWalker {
    fn list_children(&self, path: &Path) -> io::Result<Vec<ChildEntry>> {
        read_children(path)
    }
}

/// Sizes trees with jwalk on a dedicated rayon pool, so callers already
/// running on the global pool never wait on their own workers.
pub struct ParallelWalker {
    pool: Option<Arc<ThreadPool>>,
}

impl ParallelWalker {
    pub fn new(threads: usize) -> Self {
        let pool = ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("dirscope-walk-{i}"))
            .build()
            .map(Arc::new);

        let pool = match pool {
            Ok(pool) => Some(pool),
            Err(err) => {
                tracing::warn!("Falling back to serial walking: {}", err);
                None
            }
        };
        Self { pool }
    }

    fn parallelism(&self) -> Parallelism {
        match &self.pool {
            Some(pool) => Parallelism::RayonExistingPool {
                pool: pool.clone(),
                busy_timeout: None,
            },
            None => Parallelism::Serial,
        }
    }
}

impl FsWalker for ParallelWalker {
    fn list_children(&self, path: &Path) -> io::Result<Vec<ChildEntry>> {
        read_children(path)
    }

    fn tree_size(&self, path: &Path) -> u64 {
        let meta = match fs::symlink_metadata(path) {
            Ok(meta) => meta,
            Err(err) => {
                tracing::debug!("Skipping {}: {}", path.display(), err);
                return 0;
            }
        };
        if !meta.is_dir() {
            return meta.len();
        }

        WalkDir::new(path)
            .skip_hidden(false)
            .follow_links(false)
            .parallelism(self.parallelism())
            .into_iter()
            .filter_map(|entry| entry.ok())
            .filter(|entry| !entry.file_type().is_dir())
            .map(|entry| entry.metadata().map(|meta| meta.len()).unwrap_or(0))
            .sum()
    }
}

/// Pick the walker named by the config.
pub fn build_walker(config: &Config) -> Arc<dyn FsWalker> {
    match config.walker {
        WalkerKind::Parallel => Arc::new(ParallelWalker::new(config.parallelism())),
        WalkerKind::Sequential => Arc::new(StdWalker),
    }
}
