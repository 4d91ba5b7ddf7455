use serde::{Deserialize, Serialize};

/// Authentication applied to outbound data source calls.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthMode {
    /// Plain requests.
    #[default]
    #[serde(alias = "")]
    None,
    /// AWS Signature Version 4 signing with credentials from the environment.
    Iam,
}

/// A named upstream API declared under `datasources`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct DataSourceSpec {
    /// Base URL; rendered as a template with an `env(name)` function.
    pub url: String,
    /// HTTP method used for every call.
    #[serde(default = "default_method")]
    pub method: String,
    /// Authentication mode.
    #[serde(default)]
    pub auth: AuthMode,
}

fn default_method() -> String {
    "GET".to_string()
}
