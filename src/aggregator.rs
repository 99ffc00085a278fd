use rayon::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use crate::config::Config;
use crate::error::ScanError;
use crate::walker::FsWalker;

/// One immediate child of the scan root, annotated with its share.
#[derive(Debug, Clone, PartialEq)]
pub struct DirectoryEntry {
    pub path: PathBuf,
    pub size_bytes: u64,
    /// Share of the scanned directory's total, in [0, 100].
    pub percentage: f64,
    pub is_dir: bool,
}

impl DirectoryEntry {
    pub fn name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| self.path.display().to_string())
    }
}

/// Ranked breakdown of one directory.
#[derive(Debug, Clone)]
pub struct Breakdown {
    pub path: PathBuf,
    pub total_size: u64,
    /// Largest children first, at most `max_entries` of them.
    pub entries: Vec<DirectoryEntry>,
    /// Every ranked child, before truncation.
    pub all_entries: Vec<DirectoryEntry>,
    /// Non-empty children cut by truncation.
    pub hidden_count: usize,
    pub max_entries: usize,
    pub duration_ms: u128,
}

impl Breakdown {
    pub fn is_empty(&self) -> bool {
        self.all_entries.is_empty()
    }

    /// Children whose name contains `query` (case-insensitive), searched
    /// over the full ranking and then cut to `max_entries`. Also returns
    /// how many matches were cut.
    pub fn matching(&self, query: &str) -> (Vec<DirectoryEntry>, usize) {
        let query = query.trim().to_lowercase();
        if query.is_empty() {
            return (self.entries.clone(), self.hidden_count);
        }
        let mut matches: Vec<DirectoryEntry> = self
            .all_entries
            .iter()
            .filter(|entry| entry.name().to_lowercase().contains(&query))
            .cloned()
            .collect();
        let hidden = matches.len().saturating_sub(self.max_entries);
        matches.truncate(self.max_entries);
        (matches, hidden)
    }
}

/// Sizes directory trees and ranks immediate children.
#[derive(Clone)]
pub struct DirectorySizeAggregator {
    walker: Arc<dyn FsWalker>,
    max_entries: usize,
    skip_empty: bool,
}

impl DirectorySizeAggregator {
    pub fn new(walker: Arc<dyn FsWalker>, config: &Config) -> Self {
        Self {
            walker,
            max_entries: config.max_entries.max(1),
            skip_empty: config.skip_empty,
        }
    }

    /// Recursive byte size of `path`; per-entry failures count as 0.
    pub fn compute_tree_size(&self, path: &Path) -> u64 {
        self.walker.tree_size(path)
    }

    /// Size every immediate child of `path` and rank them.
    ///
    /// Only a failure to list `path` itself is returned as an error; any
    /// child that cannot be read is skipped. The total is the sum over all
    /// children, which is exactly `compute_tree_size(path)` for a directory.
    pub fn breakdown_children(&self, path: &Path) -> Result<Breakdown, ScanError> {
        let start = Instant::now();
        let children = self
            .walker
            .list_children(path)
            .map_err(|err| ScanError::from_io(path, err))?;

        // Indexed par_iter keeps listing order, so the stable sort below
        // breaks ties by that order.
        let sized: Vec<(PathBuf, u64, bool)> = children
            .into_par_iter()
            .map(|child| {
                let size = if child.is_dir {
                    self.walker.tree_size(&child.path)
                } else {
                    child.len
                };
                (child.path, size, child.is_dir)
            })
            .collect();

        let total_size: u64 = sized.iter().map(|(_, size, _)| *size).sum();

        let mut all_entries: Vec<DirectoryEntry> = if total_size == 0 {
            Vec::new()
        } else {
            sized
                .into_iter()
                .filter(|(_, size, _)| !self.skip_empty || *size > 0)
                .map(|(path, size_bytes, is_dir)| DirectoryEntry {
                    percentage: percentage_of(size_bytes, total_size),
                    path,
                    size_bytes,
                    is_dir,
                })
                .collect()
        };

        all_entries.sort_by(|a, b| b.size_bytes.cmp(&a.size_bytes));
        let hidden_count = all_entries.len().saturating_sub(self.max_entries);
        let entries: Vec<DirectoryEntry> = all_entries.iter().take(self.max_entries).cloned().collect();

        let duration_ms = start.elapsed().as_millis();
        tracing::debug!(
            "Broke down {} into {} entries ({} hidden) in {}ms",
            path.display(),
            entries.len(),
            hidden_count,
            duration_ms
        );

        Ok(Breakdown {
            path: path.to_path_buf(),
            total_size,
            entries,
            all_entries,
            hidden_count,
            max_entries: self.max_entries,
            duration_ms,
        })
    }
}

fn percentage_of(size: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    (size as f64 / total as f64 * 100.0).clamp(0.0, 100.0)
}
