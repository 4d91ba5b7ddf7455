//! Composes compiled version folders into one snapshot.

use std::collections::BTreeMap;
use std::collections::btree_map::Entry;
use std::path::PathBuf;
use std::sync::Arc;

use axum::routing::MethodRouter;
use chrono::Utc;
use distro_core::ConfigError;
use distro_git::VersionFolder;
use tracing::debug;

use super::compiler::VersionRouteCompiler;
use super::table::{RouteKind, TableRoute};
use crate::error::RebuildError;
use crate::handlers::status::{SnapshotInfo, status_route};
use crate::reload::{RebuildState, RouteSnapshot};

/// Path of the status page.
pub const STATUS_PATH: &str = "/status";

/// Everything a rebuild needs besides the folders themselves.
pub struct RebuildContext {
    /// Root of the version tree.
    pub tree_root: PathBuf,
    /// Server-level routes added to every snapshot, e.g. `/updatehook`.
    pub auxiliary: Vec<(String, MethodRouter)>,
    /// Rebuild outcomes, read by `/status`.
    pub state: Arc<RebuildState>,
}

impl RebuildContext {
    pub fn new(tree_root: impl Into<PathBuf>, state: Arc<RebuildState>) -> Self {
        Self {
            tree_root: tree_root.into(),
            auxiliary: Vec::new(),
            state,
        }
    }

    /// Adds a server-level route.
    pub fn with_route(mut self, path: impl Into<String>, handler: MethodRouter) -> Self {
        self.auxiliary.push((path.into(), handler));
        self
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RouteComposer {
    compiler: VersionRouteCompiler,
}

impl RouteComposer {
    pub fn new(compiler: VersionRouteCompiler) -> Self {
        Self { compiler }
    }

    /// Compiles every folder and mounts it under its URL prefix.
    ///
    /// Stops at the first folder that fails; nothing is partially kept.
    pub fn compose(
        &self,
        ctx: &RebuildContext,
        folders: &[VersionFolder],
        generation: u64,
    ) -> Result<RouteSnapshot, RebuildError> {
        let mut prefixes: BTreeMap<String, PathBuf> = BTreeMap::new();
        let mut routes = BTreeMap::new();
        let mut versions = Vec::with_capacity(folders.len());

        for folder in folders {
            let prefix = folder.url_prefix();
            match prefixes.entry(prefix.clone()) {
                Entry::Occupied(first) => {
                    return Err(RebuildError::DuplicateVersion {
                        prefix,
                        first: first.get().clone(),
                        second: folder.path().to_path_buf(),
                    });
                },
                Entry::Vacant(slot) => {
                    slot.insert(folder.path().to_path_buf());
                },
            }

            let compile_error = |source: ConfigError| RebuildError::Compile {
                folder: folder.relative_path().to_string(),
                source,
            };
            let table = self
                .compiler
                .compile(folder.path(), &prefix)
                .map_err(compile_error)?;

            let base = prefix.trim_end_matches('/');
            for (path, route) in table.into_routes() {
                let full = format!("{}{}", base, path);
                match routes.entry(full) {
                    Entry::Vacant(slot) => {
                        slot.insert(route);
                    },
                    Entry::Occupied(taken) => {
                        return Err(compile_error(ConfigError::duplicate_mount(taken.key())));
                    },
                }
            }

            debug!(version = folder.relative_path(), "Mounted version folder");
            versions.push(folder.relative_path().to_string());
        }

        Ok(self.assemble(ctx, generation, versions, routes))
    }

    /// Snapshot with only the server-level routes.
    pub fn empty(&self, ctx: &RebuildContext) -> RouteSnapshot {
        self.assemble(ctx, 0, Vec::new(), BTreeMap::new())
    }

    fn assemble(
        &self,
        ctx: &RebuildContext,
        generation: u64,
        versions: Vec<String>,
        mut routes: BTreeMap<String, TableRoute>,
    ) -> RouteSnapshot {
        let built_at = Utc::now();
        let info = SnapshotInfo {
            generation,
            built_at,
            versions: versions.clone(),
        };

        routes.insert(
            STATUS_PATH.to_string(),
            TableRoute::exact(RouteKind::Auxiliary, status_route(info, Arc::clone(&ctx.state))),
        );
        for (path, handler) in &ctx.auxiliary {
            routes.insert(path.clone(), TableRoute::exact(RouteKind::Auxiliary, handler.clone()));
        }

        RouteSnapshot::new(generation, built_at, versions, routes)
    }
}
