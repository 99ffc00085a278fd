use std::io;
use std::path::{Path, PathBuf};

/// Scan-fatal errors. Only failures at the scan root surface here; errors on
/// individual entries below the root are absorbed by the aggregator.
#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    #[error("path not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("permission denied: {}", .0.display())]
    AccessDenied(PathBuf),

    #[error("not a directory: {}", .0.display())]
    NotADirectory(PathBuf),

    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("scan worker panicked")]
    WorkerPanicked,

    #[error("could not start scan worker: {0}")]
    WorkerUnavailable(#[source] io::Error),

    #[error("scan timed out after {0} ms")]
    TimedOut(u64),
}

impl ScanError {
    /// Classify an I/O error raised while listing the scan root.
    pub fn from_io(path: &Path, err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound => ScanError::NotFound(path.to_path_buf()),
            io::ErrorKind::PermissionDenied => ScanError::AccessDenied(path.to_path_buf()),
            _ if path.is_file() => ScanError::NotADirectory(path.to_path_buf()),
            _ => ScanError::Io {
                path: path.to_path_buf(),
                source: err,
            },
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid config {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}
