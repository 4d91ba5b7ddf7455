//! Error types for mirroring and materialization.

use std::path::PathBuf;

/// Errors that can occur while mirroring a repository or materializing
/// version folders.
#[derive(Debug, thiserror::Error)]
pub enum MirrorError {
    /// The remote could not be reached or refused the connection.
    #[error("remote unavailable: {reason}")]
    RemoteUnavailable { reason: String },

    /// A reference name cannot be turned into a version folder.
    #[error("invalid reference '{name}': {reason}")]
    InvalidReference { name: String, reason: String },

    /// A tag does not resolve to a commit.
    #[error("tag '{name}' does not point at a commit (found {kind})")]
    NotACommit { name: String, kind: String },

    /// Writing a version folder failed.
    #[error("failed to materialize {}: {reason}", path.display())]
    Materialize { path: PathBuf, reason: String },

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A Git operation failed.
    #[error("git error: {0}")]
    Git(String),

    /// An operation exceeded its deadline and was interrupted.
    #[error("{operation} timed out after {seconds}s")]
    Timeout {
        operation: &'static str,
        seconds: u64,
    },

    /// The work was interrupted before it completed.
    #[error("operation interrupted")]
    Interrupted,

    /// A clone or fetch is already running on this mirror.
    #[error("mirror is busy, try again later")]
    Busy,

    /// Invalid configuration.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl MirrorError {
    /// Creates a new Git error.
    pub fn git(msg: impl Into<String>) -> Self {
        Self::Git(msg.into())
    }

    /// Creates a new remote unavailable error.
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self::RemoteUnavailable {
            reason: reason.into(),
        }
    }

    /// Creates a new invalid reference error.
    pub fn invalid_reference(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidReference {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Creates a new materialization error.
    pub fn materialize(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::Materialize {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Returns true if this is a transient error that might succeed on retry.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::RemoteUnavailable { .. } | Self::Timeout { .. } | Self::Busy
        )
    }
}
