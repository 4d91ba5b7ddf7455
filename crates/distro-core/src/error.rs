//! Error types for folder configuration.
//!
//! Every failure that can happen while turning a version folder's
//! configuration document into endpoint definitions is reported as a
//! [`ConfigError`]. A folder with any of these errors does not produce a
//! route table.
//!
//! # Example
//!
//! ```
//! use distro_core::{ConfigError, Result};
//!
//! fn check_name(name: &str) -> Result<()> {
//!     if name.is_empty() {
//!         return Err(ConfigError::invalid_mount(name, "endpoint path cannot be empty"));
//!     }
//!     Ok(())
//! }
//!
//! assert!(check_name("").is_err());
//! ```

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while loading or validating a folder configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// No `config.{yaml,yml,json,toml}` exists in the folder or its `config/` directory.
    #[error("No configuration document found in '{}'", folder.display())]
    NotFound {
        /// Version folder that was searched
        folder: PathBuf,
    },

    /// The document exists but could not be parsed.
    #[error("Failed to parse configuration '{}': {message}", path.display())]
    Parse {
        /// Document that failed to parse
        path: PathBuf,
        /// Parser message
        message: String,
    },

    /// The file extension does not map to a known format.
    #[error("Unsupported configuration format '{0}'")]
    UnsupportedFormat(String),

    /// An endpoint path is malformed or reserved.
    #[error("Invalid endpoint path '{path}': {reason}")]
    InvalidMount {
        /// Path as written in the document
        path: String,
        /// Why it was rejected
        reason: String,
    },

    /// Two endpoints normalize to the same mount path.
    #[error("Duplicate endpoint path '{path}'")]
    DuplicateMount {
        /// Normalized path
        path: String,
    },

    /// `endpoints` names a kind other than template, static or proxy.
    #[error("Unknown endpoint kind '{kind}'")]
    UnknownEndpointKind {
        /// Key found under `endpoints`
        kind: String,
    },

    /// An endpoint is well formed but its handler cannot be built.
    #[error("Endpoint '{path}' cannot be created: {message}")]
    Endpoint {
        /// Mount path of the endpoint
        path: String,
        /// Description of the failure
        message: String,
    },

    /// A data source declaration is invalid.
    #[error("Data source '{name}' is invalid: {message}")]
    DataSource {
        /// Data source name
        name: String,
        /// Description of the failure
        message: String,
    },

    /// I/O error while reading the folder.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl ConfigError {
    /// Creates a NotFound error.
    pub fn not_found(folder: impl Into<PathBuf>) -> Self {
        Self::NotFound {
            folder: folder.into(),
        }
    }

    /// Creates a Parse error.
    pub fn parse(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Parse {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Creates an InvalidMount error.
    pub fn invalid_mount(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidMount {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Creates a DuplicateMount error.
    pub fn duplicate_mount(path: impl Into<String>) -> Self {
        Self::DuplicateMount { path: path.into() }
    }

    /// Creates an Endpoint error.
    pub fn endpoint(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Endpoint {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Creates a DataSource error.
    pub fn data_source(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::DataSource {
            name: name.into(),
            message: message.into(),
        }
    }

    /// Returns true if no configuration document was found.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Returns true if this error comes from the document syntax.
    pub fn is_parse_error(&self) -> bool {
        matches!(self, Self::Parse { .. } | Self::UnsupportedFormat(_))
    }
}

/// Type alias for Results with ConfigError.
pub type Result<T> = std::result::Result<T, ConfigError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_display() {
        let error = ConfigError::not_found("/srv/tree/branch/master");
        let msg = error.to_string();

        assert!(msg.contains("/srv/tree/branch/master"));
        assert!(error.is_not_found());
    }

    #[test]
    fn test_duplicate_mount_display() {
        let error = ConfigError::duplicate_mount("/foo");
        assert_eq!(error.to_string(), "Duplicate endpoint path '/foo'");
    }

    #[test]
    fn test_io_error_conversion() {
        let io_error = io::Error::new(io::ErrorKind::PermissionDenied, "denied");
        let error: ConfigError = io_error.into();

        assert!(matches!(error, ConfigError::Io(_)));
        assert!(!error.is_parse_error());
    }

    #[test]
    fn test_is_parse_error() {
        assert!(ConfigError::parse("config.yaml", "bad indent").is_parse_error());
        assert!(ConfigError::UnsupportedFormat("ini".into()).is_parse_error());
        assert!(!ConfigError::endpoint("/foo", "missing dir").is_parse_error());
    }
}
