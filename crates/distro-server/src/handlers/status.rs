//! The `/status` page.

use std::sync::Arc;

use axum::{
    Json,
    extract::State,
    routing::{MethodRouter, get},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::reload::RebuildState;

/// What a snapshot knows about itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SnapshotInfo {
    pub generation: u64,
    pub built_at: DateTime<Utc>,
    pub versions: Vec<String>,
}

/// Body of `/status`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    /// `ok`, `degraded` after failed rebuilds, or `starting` before the
    /// first successful one.
    pub status: String,
    pub generation: u64,
    pub built_at: DateTime<Utc>,
    pub last_success: Option<DateTime<Utc>>,
    pub versions: Vec<String>,
    pub last_error: Option<String>,
    pub consecutive_failures: u32,
}

#[derive(Clone)]
struct StatusState {
    info: Arc<SnapshotInfo>,
    rebuilds: Arc<RebuildState>,
}

/// Builds the status route of one snapshot.
///
/// Snapshot fields are fixed; rebuild outcomes are read live, so a failed
/// rebuild shows up while the old snapshot keeps serving.
pub fn status_route(info: SnapshotInfo, rebuilds: Arc<RebuildState>) -> MethodRouter {
    get(status_handler).with_state(StatusState {
        info: Arc::new(info),
        rebuilds,
    })
}

async fn status_handler(State(state): State<StatusState>) -> Json<StatusResponse> {
    let failures = state.rebuilds.failure_count();
    let status = if failures > 0 {
        "degraded"
    } else if state.rebuilds.is_initialized() {
        "ok"
    } else {
        "starting"
    };

    Json(StatusResponse {
        status: status.to_string(),
        generation: state.info.generation,
        built_at: state.info.built_at,
        last_success: state.rebuilds.last_success(),
        versions: state.info.versions.clone(),
        last_error: state.rebuilds.last_error(),
        consecutive_failures: failures,
    })
}
