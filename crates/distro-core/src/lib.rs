//! Distro Core - folder configuration model
//!
//! Every version folder of a distroserver tree carries a configuration
//! document describing the endpoints it serves, the data sources its
//! templates may call and free-form template variables. This crate parses
//! and validates that document; it knows nothing about HTTP or git.
//!
//! # Example
//!
//! ```
//! use distro_core::{ConfigDocument, DistroConfig};
//!
//! let document: ConfigDocument = serde_json::from_str(
//!     r#"{"endpoints": {"static": {"foo": {"source": "files"}}}}"#,
//! ).unwrap();
//! let config = DistroConfig::from_document(document).unwrap();
//!
//! assert_eq!(config.endpoints()[0].route_path(), "/foo/");
//! ```

pub mod config;
pub mod error;
pub mod format;

pub use config::{
    AuthMode, ConfigDocument, DataSourceSpec, DistroConfig, Endpoint, EndpointKind, EndpointSpec,
    MountPath, MountStyle, ProxySpec, StaticSpec, TemplateSpec, find_config_document,
};
pub use error::{ConfigError, Result};
pub use format::ConfigFormat;

/// Returns the crate version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_is_semver() {
        let v = version();
        assert_eq!(v.split('.').count(), 3, "Version should be semver");
    }
}
