use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::ConfigError;

/// Environment variable that overrides the config file location.
pub const CONFIG_ENV: &str = "DIRSCOPE_CONFIG";

const DEFAULT_MAX_ENTRIES: usize = 20;

/// Which filesystem walker sizes the directory trees.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WalkerKind {
    /// jwalk on a dedicated rayon pool.
    #[default]
    Parallel,
    /// Plain recursive `std::fs` walk.
    Sequential,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Number of ranked entries carried into the render model.
    pub max_entries: usize,
    /// Drop children whose computed size is zero.
    pub skip_empty: bool,
    pub walker: WalkerKind,
    /// Threads for the parallel walker; 0 picks a value from the core count.
    pub worker_threads: usize,
    /// Wall-clock bound for a single scan. None means unbounded.
    pub scan_timeout_ms: Option<u64>,
    /// Rescan automatically when the displayed directory changes on disk.
    pub watch_current_dir: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_entries: DEFAULT_MAX_ENTRIES,
            skip_empty: true,
            walker: WalkerKind::default(),
            worker_threads: 0,
            scan_timeout_ms: None,
            watch_current_dir: false,
        }
    }
}

impl Config {
    /// Load from `$DIRSCOPE_CONFIG`, falling back to the per-user config dir.
    /// A missing file yields the defaults.
    pub fn load() -> Result<Self, ConfigError> {
        match Self::default_path() {
            Some(path) if path.exists() => Self::from_file(&path),
            _ => Ok(Self::default()),
        }
    }

    pub fn default_path() -> Option<PathBuf> {
        if let Some(path) = std::env::var_os(CONFIG_ENV) {
            return Some(PathBuf::from(path));
        }
        dirs::config_dir().map(|dir| dir.join("dirscope").join("config.json"))
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Config = serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::info!("Loaded config from {}", path.display());
        Ok(config.normalized())
    }

    /// A zero entry bound would make every scan look empty.
    fn normalized(mut self) -> Self {
        if self.max_entries == 0 {
            self.max_entries = DEFAULT_MAX_ENTRIES;
        }
        self
    }

    pub fn scan_timeout(&self) -> Option<Duration> {
        self.scan_timeout_ms.map(Duration::from_millis)
    }

    pub fn parallelism(&self) -> usize {
        if self.worker_threads > 0 {
            return self.worker_threads;
        }
        let cores = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(4);
        (cores * 2).clamp(4, 64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_partial_file_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "max_entries": 50, "walker": "sequential" }}"#).unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.max_entries, 50);
        assert_eq!(config.walker, WalkerKind::Sequential);
        assert!(config.skip_empty);
        assert_eq!(config.scan_timeout(), None);
    }

    #[test]
    fn test_zero_max_entries_falls_back() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "max_entries": 0 }}"#).unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.max_entries, DEFAULT_MAX_ENTRIES);
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "max_entries = 5").unwrap();

        let err = Config::from_file(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_parallelism_bounds() {
        let config = Config::default();
        let threads = config.parallelism();
        assert!((4..=64).contains(&threads));

        let pinned = Config {
            worker_threads: 3,
            ..Config::default()
        };
        assert_eq!(pinned.parallelism(), 3);
    }
}
