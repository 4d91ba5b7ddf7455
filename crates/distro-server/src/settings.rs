//! Server settings.
//!
//! Loaded from an optional `distroserver.{yaml,toml,json}` in
//! `/etc/distroserver` and the working directory, then overridden by
//! `DISTRO__SECTION__KEY` environment variables.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use config::{Config, ConfigError, Environment, File};
use distro_git::MirrorConfig;
use serde::Deserialize;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub server: ServerSettings,
    pub ssl: SslSettings,
    pub tree: TreeSettings,
    /// Mirror settings; without them copies of the tree on disk are served.
    pub git: Option<GitSettings>,
    pub webhook: WebhookSettings,
    pub refresh: RefreshSettings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    /// Deadline for in-flight requests after a shutdown signal.
    pub shutdown_timeout_secs: u64,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            shutdown_timeout_secs: 30,
        }
    }
}

/// PEM files for the HTTPS listener. Plain HTTP is served when both are
/// unset.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SslSettings {
    pub cert: Option<PathBuf>,
    pub key: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TreeSettings {
    /// Root of the version tree. A temporary directory is used when unset.
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GitSettings {
    pub uri: String,
    /// Where the bare mirror lives. A temporary directory is used when unset.
    #[serde(default)]
    pub mirror_path: Option<PathBuf>,
    #[serde(default)]
    pub deploy_key: Option<PathBuf>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub clone_timeout_secs: Option<u64>,
    #[serde(default)]
    pub fetch_timeout_secs: Option<u64>,
    #[serde(default)]
    pub checkout_timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct WebhookSettings {
    pub secret: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RefreshSettings {
    /// Periodic rebuild interval; 0 disables it.
    pub interval_secs: u64,
}

impl Settings {
    /// Loads settings from the default files and the environment.
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_builder(
            Config::builder()
                .add_source(File::with_name("/etc/distroserver/distroserver").required(false))
                .add_source(File::with_name("distroserver").required(false)),
        )
    }

    /// Loads settings from one file plus the environment.
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        Self::from_builder(Config::builder().add_source(File::with_name(path)))
    }

    fn from_builder(
        builder: config::ConfigBuilder<config::builder::DefaultState>,
    ) -> Result<Self, ConfigError> {
        builder
            .add_source(
                Environment::with_prefix("DISTRO")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }

    pub fn listen_addr(&self) -> Result<SocketAddr, std::net::AddrParseError> {
        format!("{}:{}", self.server.host, self.server.port).parse()
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.server.shutdown_timeout_secs)
    }

    /// Certificate and key paths when HTTPS is configured.
    ///
    /// Empty values count as unset; setting only one of them is an error.
    pub fn tls_files(&self) -> Result<Option<(&Path, &Path)>, ConfigError> {
        fn set(path: &Option<PathBuf>) -> Option<&Path> {
            path.as_deref().filter(|p| !p.as_os_str().is_empty())
        }
        match (set(&self.ssl.cert), set(&self.ssl.key)) {
            (Some(cert), Some(key)) => Ok(Some((cert, key))),
            (None, None) => Ok(None),
            _ => Err(ConfigError::Message(
                "ssl.cert and ssl.key must be set together".to_string(),
            )),
        }
    }

    /// The webhook secret, treating an empty value as unset.
    pub fn webhook_secret(&self) -> Option<String> {
        self.webhook.secret.clone().filter(|s| !s.is_empty())
    }

    pub fn refresh_interval(&self) -> Option<Duration> {
        (self.refresh.interval_secs > 0).then(|| Duration::from_secs(self.refresh.interval_secs))
    }
}

impl GitSettings {
    /// Builds the mirror configuration, placing the mirror at
    /// `default_mirror_path` unless one is configured.
    pub fn mirror_config(&self, default_mirror_path: PathBuf) -> Result<MirrorConfig, &'static str> {
        let mut builder = MirrorConfig::builder()
            .uri(&self.uri)
            .mirror_path(self.mirror_path.clone().unwrap_or(default_mirror_path));

        if let (Some(username), Some(password)) = (&self.username, &self.password) {
            builder = builder.basic_auth(username, password);
        }
        if let Some(key) = &self.deploy_key {
            builder = builder.deploy_key(key);
        }
        if let Some(secs) = self.clone_timeout_secs {
            builder = builder.clone_timeout(Duration::from_secs(secs));
        }
        if let Some(secs) = self.fetch_timeout_secs {
            builder = builder.fetch_timeout(Duration::from_secs(secs));
        }
        if let Some(secs) = self.checkout_timeout_secs {
            builder = builder.checkout_timeout(Duration::from_secs(secs));
        }

        builder.build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn from_yaml(yaml: &str) -> Settings {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("distroserver.yaml");
        fs::write(&path, yaml).unwrap();
        Settings::from_file(path.to_str().unwrap()).unwrap()
    }

    #[test]
    fn test_defaults() {
        let settings = from_yaml("{}\n");

        assert_eq!(settings.listen_addr().unwrap().port(), 8080);
        assert_eq!(settings.shutdown_timeout(), Duration::from_secs(30));
        assert!(settings.git.is_none());
        assert!(settings.tree.path.is_none());
        assert!(settings.refresh_interval().is_none());
        assert!(settings.tls_files().unwrap().is_none());
    }

    #[test]
    fn test_ssl_pair() {
        let settings = from_yaml("ssl:\n  cert: /etc/distroserver/tls.crt\n  key: /etc/distroserver/tls.key\n");

        let (cert, key) = settings.tls_files().unwrap().unwrap();
        assert_eq!(cert, Path::new("/etc/distroserver/tls.crt"));
        assert_eq!(key, Path::new("/etc/distroserver/tls.key"));
    }

    #[test]
    fn test_ssl_cert_without_key() {
        let settings = from_yaml("ssl:\n  cert: /etc/distroserver/tls.crt\n  key: \"\"\n");

        assert!(settings.tls_files().is_err());
    }

    #[test]
    fn test_git_section_builds_mirror_config() {
        let settings = from_yaml(
            "git:\n  uri: https://example.com/distro.git\n  username: bot\n  password: token\n  fetch_timeout_secs: 5\n",
        );

        let git = settings.git.unwrap();
        let mirror = git.mirror_config(PathBuf::from("/tmp/mirror")).unwrap();

        assert_eq!(mirror.uri(), "https://example.com/distro.git");
        assert_eq!(mirror.mirror_path(), std::path::Path::new("/tmp/mirror"));
        assert_eq!(mirror.username(), Some("bot"));
        assert_eq!(mirror.fetch_timeout(), Duration::from_secs(5));
    }

    #[test]
    fn test_empty_secret_is_unset() {
        let settings = from_yaml("webhook:\n  secret: \"\"\nrefresh:\n  interval_secs: 15\n");

        assert!(settings.webhook_secret().is_none());
        assert_eq!(settings.refresh_interval(), Some(Duration::from_secs(15)));
    }
}
