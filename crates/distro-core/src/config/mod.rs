pub mod datasource;
pub mod document;
pub mod endpoint;
pub mod loader;
pub mod mount;

pub use datasource::{AuthMode, DataSourceSpec};
pub use document::{ConfigDocument, DistroConfig, Endpoint, EndpointGroups};
pub use endpoint::{EndpointKind, EndpointSpec, ProxySpec, StaticSpec, TemplateSpec};
pub use loader::find_config_document;
pub use mount::{MountPath, MountStyle};
