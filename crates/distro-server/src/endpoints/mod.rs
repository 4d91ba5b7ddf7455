//! Endpoint producers.
//!
//! Each endpoint kind of a folder configuration turns into a request
//! handler through [`EndpointProducer`]. The route compiler only sees this
//! trait; what a handler does with a request is up to the producer.

mod pipe;
mod proxy;
mod redirect;
mod static_files;
mod template;

use std::path::PathBuf;
use std::sync::Arc;

use axum::routing::MethodRouter;
use distro_core::{ConfigError, EndpointSpec};
use distro_sources::DataSources;

pub use pipe::{PipeCommand, PipeError, run_pipeline};
pub use proxy::ProxyEndpoint;
pub use redirect::redirect_insecure;
pub use static_files::StaticFiles;
pub use template::TemplateEndpoint;

/// Everything a producer may bind a handler to.
#[derive(Debug, Clone)]
pub struct EndpointContext {
    /// Version folder on disk; relative resources resolve against it.
    pub base_path: PathBuf,
    /// Full URL path the handler is mounted at, e.g. `/branch/master/foo/`.
    pub mount_template: String,
    /// The folder's template variables.
    pub vars: Arc<serde_json::Value>,
    /// The folder's data sources.
    pub data_sources: DataSources,
}

/// Builds the handler of one endpoint.
pub trait EndpointProducer {
    /// Builds a handler, or reports why the endpoint cannot be served.
    fn create_handler(&self, context: &EndpointContext) -> Result<MethodRouter, ConfigError>;
}

impl EndpointProducer for EndpointSpec {
    fn create_handler(&self, context: &EndpointContext) -> Result<MethodRouter, ConfigError> {
        match self {
            EndpointSpec::Template(spec) => spec.create_handler(context),
            EndpointSpec::Static(spec) => spec.create_handler(context),
            EndpointSpec::Proxy(spec) => spec.create_handler(context),
        }
    }
}
