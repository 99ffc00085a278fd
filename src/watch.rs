use notify::{Event, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Flags changes to the immediate contents of one directory.
pub struct DirectoryWatcher {
    watcher: RecommendedWatcher,
    watched: Option<PathBuf>,
    changed: Arc<AtomicBool>,
}

impl DirectoryWatcher {
    pub fn new() -> notify::Result<Self> {
        let changed = Arc::new(AtomicBool::new(false));
        let flag = changed.clone();
        let watcher = notify::recommended_watcher(move |res: notify::Result<Event>| match res {
            Ok(event) => {
                if !event.kind.is_access() {
                    flag.store(true, Ordering::Relaxed);
                }
            }
            Err(err) => tracing::warn!("Watch error: {}", err),
        })?;

        Ok(Self {
            watcher,
            watched: None,
            changed,
        })
    }

    /// Replace the watched directory. Pending change flags are cleared.
    pub fn watch(&mut self, path: &Path) -> notify::Result<()> {
        if self.watched.as_deref() == Some(path) {
            self.changed.store(false, Ordering::Relaxed);
            return Ok(());
        }
        self.unwatch();
        self.watcher.watch(path, RecursiveMode::NonRecursive)?;
        self.watched = Some(path.to_path_buf());
        self.changed.store(false, Ordering::Relaxed);
        Ok(())
    }

    pub fn unwatch(&mut self) {
        if let Some(path) = self.watched.take() {
            if let Err(err) = self.watcher.unwatch(&path) {
                tracing::debug!("Unwatch {} failed: {}", path.display(), err);
            }
        }
    }

    pub fn watched(&self) -> Option<&Path> {
        self.watched.as_deref()
    }

    /// True once per batch of changes since the last call.
    pub fn take_changed(&self) -> bool {
        self.changed.swap(false, Ordering::Relaxed)
    }
}
