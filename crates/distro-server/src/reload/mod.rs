//! Hot reload: rebuilding, publishing and serving route snapshots.

pub mod scheduler;
pub mod server;
pub mod snapshot;
pub mod state;

pub use scheduler::{RefreshConfig, RefreshHandle, RefreshScheduler};
pub use server::{HotReloadServer, METRICS_PATH, RebuildReport, ServerOptions, WEBHOOK_PATH};
pub use snapshot::{PublishedRoutes, RouteSnapshot};
pub use state::RebuildState;
