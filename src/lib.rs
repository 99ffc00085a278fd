// Public library interface for dirscope
// Both front-ends (eframe and the TUI) drive the navigator through this crate

pub mod aggregator;
pub mod config;
pub mod error;
pub mod navigator;
pub mod reveal;
pub mod scan;
pub mod units;
pub mod walker;
pub mod watch;

pub use aggregator::{Breakdown, DirectoryEntry, DirectorySizeAggregator};
pub use config::Config;
pub use error::ScanError;
pub use navigator::{DrillDownNavigator, NavStatus, RenderModel};
