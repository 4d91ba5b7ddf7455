//! Metrics module for distroserver.

pub mod http;
pub mod rebuild;
pub mod setup;

pub use rebuild::RebuildMetrics;
pub use setup::init_metrics;
