//! The hot-reloading server core.

use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use axum::{extract::Request, response::Response};
use distro_git::VersionSource;
use metrics_exporter_prometheus::PrometheusHandle;
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{info, instrument, warn};

use super::snapshot::{PublishedRoutes, RouteSnapshot};
use super::state::RebuildState;
use crate::error::RebuildError;
use crate::handlers::{metrics::metrics_route, webhook::webhook_route};
use crate::metrics::RebuildMetrics;
use crate::routing::{RebuildContext, RouteComposer};

pub const WEBHOOK_PATH: &str = "/updatehook";
pub const METRICS_PATH: &str = "/metrics";

/// Optional server-level features.
#[derive(Clone, Default)]
pub struct ServerOptions {
    /// Shared secret for webhook signatures. Unsigned deliveries are
    /// accepted when unset.
    pub webhook_secret: Option<String>,
    /// Mounts `/metrics` when set.
    pub prometheus: Option<PrometheusHandle>,
}

/// Summary of a published rebuild.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RebuildReport {
    pub generation: u64,
    pub versions: Vec<String>,
    pub routes: usize,
    pub duration_ms: u64,
}

/// Owns the published snapshot and everything needed to replace it.
pub struct HotReloadServer {
    source: Arc<dyn VersionSource>,
    composer: RouteComposer,
    context: Arc<RebuildContext>,
    published: PublishedRoutes,
    rebuild_lock: Mutex<()>,
    metrics: RebuildMetrics,
}

impl HotReloadServer {
    /// Creates a server publishing an empty snapshot.
    ///
    /// Call [`rebuild`](Self::rebuild) to mount the version folders.
    pub fn new(source: Arc<dyn VersionSource>, options: ServerOptions) -> Arc<Self> {
        Arc::new_cyclic(|weak| {
            let state = Arc::new(RebuildState::new());
            let mut context = RebuildContext::new(source.tree_root(), state)
                .with_route(WEBHOOK_PATH, webhook_route(weak.clone(), options.webhook_secret));
            if let Some(handle) = options.prometheus {
                context = context.with_route(METRICS_PATH, metrics_route(handle));
            }

            let composer = RouteComposer::default();
            let published = PublishedRoutes::new(composer.empty(&context));

            Self {
                source,
                composer,
                context: Arc::new(context),
                published,
                rebuild_lock: Mutex::new(()),
                metrics: RebuildMetrics::new(),
            }
        })
    }

    /// Materializes, compiles and publishes a new snapshot.
    ///
    /// Rebuilds run one at a time; a caller arriving during a rebuild waits
    /// for it and then runs its own. The rebuild runs on its own task, so
    /// dropping the returned future does not stop it or release the rebuild
    /// lock early. On error the published snapshot is left untouched.
    pub async fn rebuild(self: &Arc<Self>) -> Result<RebuildReport, RebuildError> {
        let server = Arc::clone(self);
        tokio::spawn(async move { server.run_rebuild().await })
            .await
            .map_err(|e| RebuildError::Task(e.to_string()))?
    }

    #[instrument(skip(self), fields(source = self.source.name()))]
    async fn run_rebuild(&self) -> Result<RebuildReport, RebuildError> {
        let _guard = self.rebuild_lock.lock().await;
        let started = Instant::now();

        match self.build_snapshot().await {
            Ok(snapshot) => {
                let elapsed = started.elapsed();
                let report = RebuildReport {
                    generation: snapshot.generation(),
                    versions: snapshot.versions().to_vec(),
                    routes: snapshot.len(),
                    duration_ms: elapsed.as_millis() as u64,
                };

                let built_at = snapshot.built_at();
                self.published.publish(Arc::new(snapshot));
                self.context.state.record_success(report.generation, built_at);
                self.metrics
                    .record_success(report.generation, report.versions.len(), elapsed);
                self.settle_source(|source| source.commit()).await;

                info!(
                    generation = report.generation,
                    versions = report.versions.len(),
                    routes = report.routes,
                    duration_ms = report.duration_ms,
                    "Published route snapshot"
                );
                Ok(report)
            },
            Err(e) => {
                self.settle_source(|source| source.abandon()).await;
                self.context.state.record_failure(e.to_string());
                self.metrics.record_failure(e.stage(), started.elapsed());
                warn!(
                    stage = e.stage(),
                    transient = e.is_transient(),
                    "Rebuild failed, keeping generation {}: {}",
                    self.context.state.generation(),
                    e
                );
                Err(e)
            },
        }
    }

    /// Tells the source whether its last folders are served. Both outcomes
    /// may delete directories, so this runs off the async workers.
    async fn settle_source(&self, outcome: fn(&dyn VersionSource)) {
        let source = Arc::clone(&self.source);
        if let Err(e) = tokio::task::spawn_blocking(move || outcome(source.as_ref())).await {
            warn!("Failed to settle version folders: {}", e);
        }
    }

    async fn build_snapshot(&self) -> Result<RouteSnapshot, RebuildError> {
        let folders = self.source.materialize().await?;
        let generation = self.context.state.generation() + 1;

        let composer = self.composer;
        let context = Arc::clone(&self.context);
        tokio::task::spawn_blocking(move || composer.compose(&context, &folders, generation))
            .await
            .map_err(|e| RebuildError::Task(e.to_string()))?
    }

    /// Serves a request from the snapshot published when it arrived.
    pub async fn serve(&self, request: Request) -> Response {
        let snapshot = self.published.load();
        snapshot.dispatch(request).await
    }

    /// The currently published snapshot.
    pub fn snapshot(&self) -> Arc<RouteSnapshot> {
        self.published.load()
    }

    pub fn state(&self) -> &Arc<RebuildState> {
        &self.context.state
    }

    pub fn metrics(&self) -> &RebuildMetrics {
        &self.metrics
    }

    pub fn source_name(&self) -> &str {
        self.source.name()
    }

    /// Directory holding the materialized generations.
    pub fn tree_root(&self) -> &Path {
        &self.context.tree_root
    }
}

impl fmt::Debug for HotReloadServer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HotReloadServer")
            .field("source", &self.source.name())
            .field("published", &self.published)
            .finish()
    }
}
