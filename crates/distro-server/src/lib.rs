//! # Distro Server
//!
//! Serves every branch and tag of a provisioning repository side by side,
//! under `/branch/<name>/` and `/release/<tag>/`, and swaps in a freshly
//! compiled route snapshot whenever the repository changes.
//!
//! A rebuild mirrors the repository, checks out each reference, compiles
//! each folder's configuration into routes and publishes the result with a
//! single pointer swap. Requests in flight finish on the snapshot they
//! started on; a failed rebuild leaves the published snapshot in place.

pub mod endpoints;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod reload;
pub mod routing;
pub mod server;
pub mod settings;

pub use error::{AppError, RebuildError};
pub use metrics::{RebuildMetrics, init_metrics};
pub use reload::{
    HotReloadServer, RebuildReport, RebuildState, RefreshConfig, RefreshHandle, RefreshScheduler,
    RouteSnapshot, ServerOptions,
};
pub use routing::{RebuildContext, RouteComposer, VersionRouteCompiler};
pub use server::{create_app, load_tls, run, run_tls, serve_tls};
pub use settings::{Settings, SslSettings};
