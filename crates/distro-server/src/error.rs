//! Error types for the server.

use std::path::PathBuf;

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use distro_core::ConfigError;
use distro_git::MirrorError;
use serde::Serialize;

/// Request-time errors rendered as JSON.
#[derive(Debug)]
pub enum AppError {
    /// Peticion invalida
    BadRequest(String),

    /// Firma del webhook ausente o incorrecta
    Unauthorized(String),

    /// Error interno
    Internal(String),

    /// El servidor se esta cerrando
    Unavailable(String),

    /// Error de un servicio externo
    BadGateway(String),
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error, message) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "Bad Request", msg),
            AppError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "Unauthorized", msg),
            AppError::Internal(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal Server Error",
                msg,
            ),
            AppError::Unavailable(msg) => {
                (StatusCode::SERVICE_UNAVAILABLE, "Service Unavailable", msg)
            },
            AppError::BadGateway(msg) => (StatusCode::BAD_GATEWAY, "Bad Gateway", msg),
        };

        let body = Json(ErrorResponse {
            error: error.to_string(),
            message,
        });

        (status, body).into_response()
    }
}

/// Errors that abort a rebuild.
///
/// A failed rebuild never changes the published snapshot.
#[derive(Debug, thiserror::Error)]
pub enum RebuildError {
    /// Mirroring or checking out the version folders failed.
    #[error("materialization failed: {0}")]
    Materialize(#[from] MirrorError),

    /// One version folder failed to compile.
    #[error("failed to compile {folder}: {source}")]
    Compile {
        folder: String,
        #[source]
        source: ConfigError,
    },

    /// Two version folders map to the same URL prefix.
    #[error("version folders {first:?} and {second:?} share the URL prefix {prefix}")]
    DuplicateVersion {
        prefix: String,
        first: PathBuf,
        second: PathBuf,
    },

    /// The blocking build task panicked or was cancelled.
    #[error("rebuild task failed: {0}")]
    Task(String),
}

impl RebuildError {
    /// Stage label used in logs and metrics.
    pub fn stage(&self) -> &'static str {
        match self {
            Self::Materialize(_) => "materialize",
            Self::Compile { .. } | Self::DuplicateVersion { .. } => "compile",
            Self::Task(_) => "task",
        }
    }

    /// Returns true if retrying later may succeed without a new commit.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Materialize(e) => e.is_transient(),
            _ => false,
        }
    }
}
