//! The per-folder configuration document.
//!
//! [`ConfigDocument`] is the raw deserialized form. [`DistroConfig`] is the
//! validated form the route compiler consumes: mount paths normalized,
//! duplicates rejected, endpoints in a deterministic order.

use std::collections::BTreeMap;
use std::path::Path;

use indexmap::IndexMap;
use serde::Deserialize;
use serde::de::IgnoredAny;

use super::datasource::DataSourceSpec;
use super::endpoint::{EndpointSpec, ProxySpec, StaticSpec, TemplateSpec};
use super::loader;
use super::mount::{MountPath, MountStyle};
use crate::error::{ConfigError, Result};

/// Endpoints grouped by kind, keyed by endpoint path.
///
/// Unknown kinds are kept by name only, so they can be rejected.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EndpointGroups {
    #[serde(default)]
    pub template: BTreeMap<String, TemplateSpec>,
    #[serde(default, rename = "static")]
    pub static_files: BTreeMap<String, StaticSpec>,
    #[serde(default)]
    pub proxy: BTreeMap<String, ProxySpec>,
    #[serde(flatten)]
    pub unknown: BTreeMap<String, IgnoredAny>,
}

/// Raw configuration document of one version folder.
///
/// Unknown top-level keys are accepted and ignored, as are unknown options
/// of endpoints and data sources. Unknown endpoint kinds are rejected.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigDocument {
    #[serde(default)]
    pub endpoints: EndpointGroups,
    #[serde(default)]
    pub datasources: BTreeMap<String, DataSourceSpec>,
    #[serde(default)]
    pub vars: IndexMap<String, serde_json::Value>,
    /// Accepted and ignored.
    #[serde(default)]
    pub test: Option<IgnoredAny>,
    #[serde(flatten)]
    pub unknown: BTreeMap<String, IgnoredAny>,
}

/// An endpoint with its normalized mount path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub mount: MountPath,
    pub spec: EndpointSpec,
}

impl Endpoint {
    /// Path relative to the version prefix: `/foo/` or `/bar`.
    pub fn route_path(&self) -> String {
        self.mount.route_path(self.spec.mount_style())
    }

    pub fn style(&self) -> MountStyle {
        self.spec.mount_style()
    }
}

/// Validated configuration of one version folder.
#[derive(Debug, Clone, Default)]
pub struct DistroConfig {
    endpoints: Vec<Endpoint>,
    datasources: BTreeMap<String, DataSourceSpec>,
    vars: IndexMap<String, serde_json::Value>,
    ignored: Vec<String>,
}

impl DistroConfig {
    /// Loads the configuration document of a version folder.
    ///
    /// Looks for `config.{yaml,yml,json,toml}` in the folder, then in its
    /// `config/` directory.
    pub fn load(folder: &Path) -> Result<Self> {
        let path =
            loader::find_config_document(folder).ok_or_else(|| ConfigError::not_found(folder))?;
        Self::from_file(&path)
    }

    /// Loads a configuration document from an explicit file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let document = loader::read_document(path)?;
        Self::from_document(document)
    }

    /// Validates a raw document.
    pub fn from_document(document: ConfigDocument) -> Result<Self> {
        if let Some(kind) = document.endpoints.unknown.keys().next() {
            return Err(ConfigError::UnknownEndpointKind { kind: kind.clone() });
        }
        let ignored = document.unknown.keys().cloned().collect();

        let EndpointGroups {
            template,
            static_files,
            proxy,
            ..
        } = document.endpoints;

        let declared = template
            .into_iter()
            .map(|(name, spec)| (name, EndpointSpec::Template(spec)))
            .chain(
                static_files
                    .into_iter()
                    .map(|(name, spec)| (name, EndpointSpec::Static(spec))),
            )
            .chain(
                proxy
                    .into_iter()
                    .map(|(name, spec)| (name, EndpointSpec::Proxy(spec))),
            );

        let mut endpoints: BTreeMap<MountPath, EndpointSpec> = BTreeMap::new();
        for (name, spec) in declared {
            let mount = MountPath::parse(&name)?;
            validate_endpoint(&mount, &spec)?;
            if endpoints.contains_key(&mount) {
                return Err(ConfigError::duplicate_mount(mount.as_str()));
            }
            endpoints.insert(mount, spec);
        }

        for (name, source) in &document.datasources {
            if name.trim().is_empty() {
                return Err(ConfigError::data_source(name, "name cannot be empty"));
            }
            if source.url.trim().is_empty() {
                return Err(ConfigError::data_source(name, "url cannot be empty"));
            }
        }

        Ok(Self {
            endpoints: endpoints
                .into_iter()
                .map(|(mount, spec)| Endpoint { mount, spec })
                .collect(),
            datasources: document.datasources,
            vars: document.vars,
            ignored,
        })
    }

    /// Endpoints ordered by mount path.
    pub fn endpoints(&self) -> &[Endpoint] {
        &self.endpoints
    }

    pub fn datasources(&self) -> &BTreeMap<String, DataSourceSpec> {
        &self.datasources
    }

    pub fn vars(&self) -> &IndexMap<String, serde_json::Value> {
        &self.vars
    }

    /// Top-level keys of the document that were not understood.
    pub fn ignored_keys(&self) -> &[String] {
        &self.ignored
    }
}

fn validate_endpoint(mount: &MountPath, spec: &EndpointSpec) -> Result<()> {
    match spec {
        EndpointSpec::Template(t) if t.default_template.trim().is_empty() => Err(
            ConfigError::endpoint(mount.as_str(), "default_template cannot be empty"),
        ),
        EndpointSpec::Proxy(p) if p.target_url.trim().is_empty() => Err(ConfigError::endpoint(
            mount.as_str(),
            "target_url cannot be empty",
        )),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EndpointKind;

    fn yaml(input: &str) -> Result<DistroConfig> {
        let document: ConfigDocument = serde_yaml::from_str(input).unwrap();
        DistroConfig::from_document(document)
    }

    #[test]
    fn test_endpoints_sorted_and_normalized() {
        let config = yaml(
            r#"
endpoints:
  static:
    /foo/:
      source: files
  template:
    bar:
      template_path: tpl
      default_template: index.txt
"#,
        )
        .unwrap();

        let paths: Vec<_> = config.endpoints().iter().map(|e| e.route_path()).collect();
        assert_eq!(paths, vec!["/bar", "/foo/"]);
        assert_eq!(config.endpoints()[0].spec.kind(), EndpointKind::Template);
    }

    #[test]
    fn test_duplicate_across_kinds() {
        let err = yaml(
            r#"
endpoints:
  static:
    foo: {source: files}
  proxy:
    /foo/: {target_url: "http://upstream"}
"#,
        )
        .unwrap_err();

        assert!(matches!(err, ConfigError::DuplicateMount { path } if path == "/foo"));
    }

    #[test]
    fn test_unknown_keys_are_ignored() {
        let config = yaml(
            r#"
owner: netops
endpoints:
  static:
    files: {source: files, cache: 60}
datasources:
  inventory: {url: "http://inventory", retries: 3}
"#,
        )
        .unwrap();

        assert_eq!(config.endpoints().len(), 1);
        assert_eq!(config.datasources()["inventory"].url, "http://inventory");
        assert_eq!(config.ignored_keys(), ["owner"]);
    }

    #[test]
    fn test_unknown_endpoint_kind_rejected() {
        let err = yaml("endpoints:\n  redirect:\n    foo: {to: \"/bar\"}\n").unwrap_err();
        assert!(matches!(err, ConfigError::UnknownEndpointKind { kind } if kind == "redirect"));
    }

    #[test]
    fn test_test_section_ignored() {
        let config = yaml(
            r#"
test:
  cases:
    - path: /bar
      expect: 200
vars:
  region: eu-west
"#,
        )
        .unwrap();

        assert!(config.endpoints().is_empty());
        assert_eq!(config.vars()["region"], serde_json::json!("eu-west"));
    }

    #[test]
    fn test_empty_proxy_target_rejected() {
        let err = yaml("endpoints:\n  proxy:\n    up: {target_url: \"\"}\n").unwrap_err();
        assert!(matches!(err, ConfigError::Endpoint { .. }));
    }

    #[test]
    fn test_datasource_requires_url() {
        let err = yaml("datasources:\n  inventory: {url: \" \"}\n").unwrap_err();
        assert!(matches!(err, ConfigError::DataSource { name, .. } if name == "inventory"));
    }
}
