//! Reverse proxy endpoints.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    extract::{Request, State},
    http::{HeaderMap, HeaderName, header},
    middleware::from_fn,
    response::{IntoResponse, Response},
    routing::{MethodRouter, any},
};
use distro_core::{ConfigError, ProxySpec};
use reqwest::Url;
use tracing::{debug, warn};

use super::redirect::redirect_insecure;
use super::{EndpointContext, EndpointProducer};
use crate::error::AppError;
use crate::routing::prefix::strip_mount;

/// Upper bound for connecting to an upstream.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Largest request body forwarded upstream.
const MAX_REQUEST_BODY: usize = 16 * 1024 * 1024;

/// Headers that describe one connection and are never forwarded.
static HOP_BY_HOP: [HeaderName; 7] = [
    header::CONNECTION,
    header::PROXY_AUTHENTICATE,
    header::PROXY_AUTHORIZATION,
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
];

/// Forwards requests below a mount template to an upstream base URL.
#[derive(Debug)]
pub struct ProxyEndpoint {
    mount: String,
    target: Url,
    client: reqwest::Client,
}

impl EndpointProducer for ProxySpec {
    fn create_handler(&self, context: &EndpointContext) -> Result<MethodRouter, ConfigError> {
        let endpoint = ProxyEndpoint::new(self, &context.mount_template)?;
        let router = any(forward).with_state(Arc::new(endpoint));
        if self.redirect_insecure {
            Ok(router.layer(from_fn(redirect_insecure)))
        } else {
            Ok(router)
        }
    }
}

impl ProxyEndpoint {
    pub fn new(spec: &ProxySpec, mount: &str) -> Result<Self, ConfigError> {
        let target = Url::parse(spec.target_url.trim())
            .map_err(|e| ConfigError::endpoint(mount, format!("invalid target_url: {}", e)))?;
        if !matches!(target.scheme(), "http" | "https") || target.host_str().is_none() {
            return Err(ConfigError::endpoint(
                mount,
                "target_url must be an absolute http or https URL",
            ));
        }

        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| ConfigError::endpoint(mount, format!("http client: {}", e)))?;

        Ok(Self {
            mount: mount.to_string(),
            target,
            client,
        })
    }

    /// Upstream URL for a request path and query.
    pub fn upstream_url(&self, path: &str, query: Option<&str>) -> Url {
        let rest = strip_mount(path, &self.mount).unwrap_or_default();
        let mut url = self.target.clone();
        url.set_path(&format!(
            "{}/{}",
            self.target.path().trim_end_matches('/'),
            rest.trim_start_matches('/')
        ));
        url.set_query(query);
        url
    }
}

fn forwarded_headers(headers: &HeaderMap) -> HeaderMap {
    let mut forwarded = headers.clone();
    for name in HOP_BY_HOP.iter() {
        forwarded.remove(name);
    }
    forwarded.remove(header::HOST);
    forwarded
}

async fn forward(State(proxy): State<Arc<ProxyEndpoint>>, request: Request) -> Response {
    let (parts, body) = request.into_parts();
    let url = proxy.upstream_url(parts.uri.path(), parts.uri.query());
    debug!(method = %parts.method, %url, "Proxying request");

    let body = match axum::body::to_bytes(body, MAX_REQUEST_BODY).await {
        Ok(body) => body,
        Err(e) => return AppError::BadRequest(format!("failed to read request body: {}", e)).into_response(),
    };

    let upstream = proxy
        .client
        .request(parts.method, url.clone())
        .headers(forwarded_headers(&parts.headers))
        .body(body)
        .send()
        .await;

    let upstream = match upstream {
        Ok(response) => response,
        Err(e) => {
            warn!(%url, "Upstream request failed: {}", e);
            return AppError::BadGateway(format!("upstream request failed: {}", e)).into_response();
        },
    };

    let mut response = Response::builder().status(upstream.status());
    if let Some(headers) = response.headers_mut() {
        *headers = forwarded_headers(upstream.headers());
    }
    match response.body(Body::from_stream(upstream.bytes_stream())) {
        Ok(response) => response,
        Err(e) => AppError::Internal(e.to_string()).into_response(),
    }
}
