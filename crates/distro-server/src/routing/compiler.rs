//! Compiles one version folder into a route table.

use std::path::Path;
use std::sync::Arc;

use axum::routing::{MethodRouter, get};
use distro_core::{ConfigError, DistroConfig, EndpointKind};
use distro_sources::DataSources;
use tracing::{debug, instrument, warn};

use super::table::{RouteKind, RouteTable, TableRoute};
use crate::endpoints::{EndpointContext, EndpointProducer};
use crate::handlers::health::health_check;

/// Path of the liveness route every folder gets.
pub const HEALTH_PATH: &str = "/health";

/// Turns a version folder's configuration into its component route table.
#[derive(Debug, Clone, Copy, Default)]
pub struct VersionRouteCompiler;

impl VersionRouteCompiler {
    pub fn new() -> Self {
        Self
    }

    /// Compiles the folder at `folder`, to be mounted at `mount_prefix`
    /// (e.g. `/branch/master/`).
    ///
    /// The table's paths are relative to the prefix. Handlers are bound to
    /// full mount templates such as `/branch/master/foo/`.
    #[instrument(skip(self, folder), fields(folder = %folder.display()))]
    pub fn compile(&self, folder: &Path, mount_prefix: &str) -> Result<RouteTable, ConfigError> {
        let config = DistroConfig::load(folder)?;
        if !config.ignored_keys().is_empty() {
            warn!(keys = ?config.ignored_keys(), "Ignoring unknown configuration keys");
        }

        let data_sources = DataSources::new(config.datasources()).map_err(|e| {
            ConfigError::data_source(e.source_name().unwrap_or("datasources"), e.to_string())
        })?;
        let vars = Arc::new(serde_json::Value::Object(
            config
                .vars()
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        ));

        let mut table = RouteTable::new();
        table.insert(HEALTH_PATH, TableRoute::exact(RouteKind::Health, health_route()))?;

        let prefix = mount_prefix.trim_end_matches('/');
        for endpoint in config.endpoints() {
            let path = endpoint.route_path();
            let context = EndpointContext {
                base_path: folder.to_path_buf(),
                mount_template: format!("{}{}", prefix, path),
                vars: Arc::clone(&vars),
                data_sources: data_sources.clone(),
            };

            let handler = endpoint.spec.create_handler(&context)?;
            let kind = match endpoint.spec.kind() {
                EndpointKind::Template => RouteKind::Template,
                EndpointKind::Static => RouteKind::Static,
                EndpointKind::Proxy => RouteKind::Proxy,
            };
            debug!(mount = %context.mount_template, kind = kind.as_str(), "Compiled endpoint");
            table.insert(path, TableRoute::prefix(kind, handler))?;
        }

        Ok(table)
    }
}

fn health_route() -> MethodRouter {
    get(health_check)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn folder(config: &str) -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("config.yaml"), config).unwrap();
        dir
    }

    #[test]
    fn test_health_always_present() {
        let dir = folder("vars: {}\n");

        let table = VersionRouteCompiler::new()
            .compile(dir.path(), "/branch/master/")
            .unwrap();

        assert_eq!(table.paths().collect::<Vec<_>>(), vec!["/health"]);
    }

    #[test]
    fn test_mount_styles() {
        let dir = folder(
            "endpoints:\n  static:\n    foo:\n      source: files\n  template:\n    bar:\n      template_path: templates\n      default_template: default.txt\n",
        );
        fs::create_dir_all(dir.path().join("files")).unwrap();
        fs::create_dir_all(dir.path().join("templates")).unwrap();
        fs::write(dir.path().join("templates/default.txt"), "hi").unwrap();

        let table = VersionRouteCompiler::new()
            .compile(dir.path(), "/branch/master/")
            .unwrap();

        assert_eq!(table.paths().collect::<Vec<_>>(), vec!["/bar", "/foo/", "/health"]);
        assert_eq!(table.get("/foo/").unwrap().kind, RouteKind::Static);
        assert_eq!(table.get("/bar").unwrap().kind, RouteKind::Template);
    }

    #[test]
    fn test_missing_config() {
        let dir = tempfile::tempdir().unwrap();

        let err = VersionRouteCompiler::new()
            .compile(dir.path(), "/branch/master/")
            .unwrap_err();

        assert!(err.is_not_found());
    }

    #[test]
    fn test_iam_data_source_accepted() {
        let dir = folder("datasources:\n  cmdb:\n    url: http://cmdb/api\n    auth: iam\n");

        let table = VersionRouteCompiler::new()
            .compile(dir.path(), "/branch/master/")
            .unwrap();

        assert_eq!(table.paths().collect::<Vec<_>>(), vec!["/health"]);
    }

    #[test]
    fn test_unknown_keys_do_not_fail_folder() {
        let dir = folder("owner: netops\nendpoints:\n  static:\n    foo: {source: files, cache: 60}\n");
        fs::create_dir_all(dir.path().join("files")).unwrap();

        let table = VersionRouteCompiler::new()
            .compile(dir.path(), "/branch/master/")
            .unwrap();

        assert_eq!(table.paths().collect::<Vec<_>>(), vec!["/foo/", "/health"]);
    }

    #[test]
    fn test_broken_endpoint_fails_folder() {
        let dir = folder("endpoints:\n  static:\n    foo:\n      source: missing\n");

        let err = VersionRouteCompiler::new()
            .compile(dir.path(), "/branch/master/")
            .unwrap_err();

        assert!(matches!(err, ConfigError::Endpoint { .. }));
    }
}
