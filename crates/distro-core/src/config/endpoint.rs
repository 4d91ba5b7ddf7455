//! Endpoint declarations.
//!
//! Each variant of [`EndpointSpec`] carries the options of one endpoint
//! kind. Handlers are produced elsewhere by matching on the variant.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::mount::MountStyle;

/// Renders responses from a directory of templates.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct TemplateSpec {
    /// Template directory, relative to the version folder.
    #[serde(default)]
    pub template_path: String,
    /// Content-Type of rendered responses.
    #[serde(default = "default_content_type")]
    pub content_type: String,
    /// Template used when no other template is selected.
    pub default_template: String,
    /// Template whose output names the template to render, if set.
    #[serde(default)]
    pub filename_template: String,
    /// Commands the rendered body is piped through, in order.
    #[serde(default)]
    pub post_render: Vec<String>,
}

fn default_content_type() -> String {
    "text/plain; charset=utf-8".to_string()
}

/// Serves files from a directory of the version folder.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct StaticSpec {
    /// Directory relative to the version folder; empty means the folder itself.
    #[serde(default)]
    pub source: String,
}

/// Forwards requests to an upstream URL.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ProxySpec {
    /// Upstream base URL.
    #[serde(alias = "targeturl")]
    pub target_url: String,
    /// Answer plain-HTTP requests with a permanent redirect to HTTPS.
    #[serde(default)]
    pub redirect_insecure: bool,
}

/// Kind of an endpoint, as named in the document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EndpointKind {
    Template,
    Static,
    Proxy,
}

impl EndpointKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EndpointKind::Template => "template",
            EndpointKind::Static => "static",
            EndpointKind::Proxy => "proxy",
        }
    }
}

impl fmt::Display for EndpointKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One endpoint of a folder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EndpointSpec {
    Template(TemplateSpec),
    Static(StaticSpec),
    Proxy(ProxySpec),
}

impl EndpointSpec {
    pub fn kind(&self) -> EndpointKind {
        match self {
            EndpointSpec::Template(_) => EndpointKind::Template,
            EndpointSpec::Static(_) => EndpointKind::Static,
            EndpointSpec::Proxy(_) => EndpointKind::Proxy,
        }
    }

    /// Static and proxy endpoints own a directory; templates own a resource.
    pub fn mount_style(&self) -> MountStyle {
        match self {
            EndpointSpec::Template(_) => MountStyle::Resource,
            EndpointSpec::Static(_) | EndpointSpec::Proxy(_) => MountStyle::Directory,
        }
    }
}
