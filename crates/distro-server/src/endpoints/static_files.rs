//! Static file endpoints.

use std::path::{Component, Path};
use std::sync::Arc;

use axum::{
    extract::{Request, State},
    response::{IntoResponse, Response},
    routing::{MethodRouter, get},
};
use distro_core::{ConfigError, StaticSpec};
use tower::ServiceExt;
use tower_http::services::ServeDir;
use tracing::debug;

use super::{EndpointContext, EndpointProducer};
use crate::error::AppError;
use crate::routing::prefix::{strip_mount, with_path};

/// Serves a directory of a version folder below a mount template.
#[derive(Debug, Clone)]
pub struct StaticFiles {
    mount: String,
    files: ServeDir,
}

impl EndpointProducer for StaticSpec {
    fn create_handler(&self, context: &EndpointContext) -> Result<MethodRouter, ConfigError> {
        let mount = context.mount_template.as_str();
        let source = Path::new(&self.source);
        if source
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir))
        {
            return Err(ConfigError::endpoint(
                mount,
                "source must be a relative path inside the version folder",
            ));
        }

        let root = context.base_path.join(source);
        if !root.is_dir() {
            return Err(ConfigError::endpoint(
                mount,
                format!("source directory {} does not exist", root.display()),
            ));
        }

        debug!(mount, root = %root.display(), "Creating static endpoint");
        let files = StaticFiles {
            mount: context.mount_template.clone(),
            files: ServeDir::new(root),
        };
        Ok(get(serve_file).with_state(Arc::new(files)))
    }
}

async fn serve_file(State(files): State<Arc<StaticFiles>>, mut request: Request) -> Response {
    let rest = strip_mount(request.uri().path(), &files.mount).unwrap_or_default();
    let uri = match with_path(request.uri(), &format!("/{}", rest)) {
        Ok(uri) => uri,
        Err(e) => return AppError::BadRequest(e).into_response(),
    };
    *request.uri_mut() = uri;

    match files.files.clone().oneshot(request).await {
        Ok(response) => response.into_response(),
        Err(never) => match never {},
    }
}
