//! The set of data sources available to one version folder.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use distro_core::{AuthMode, DataSourceSpec};
use reqwest::Method;
use serde::Serialize;
use tracing::{debug, instrument};

use crate::error::SourceError;
use crate::signing::IamSigner;
use crate::source::DataSource;

/// Default timeout for one outbound call.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Result of a data source call, as seen by templates.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApiResponse {
    /// HTTP status code of the upstream response.
    pub status: u16,
    /// Decoded JSON body; `null` when the body is empty.
    pub data: serde_json::Value,
}

/// Named data sources sharing one HTTP client.
///
/// Cheap to clone; every endpoint of a folder holds its own copy.
#[derive(Debug, Clone)]
pub struct DataSources {
    sources: Arc<BTreeMap<String, DataSource>>,
    client: reqwest::Client,
    signer: Option<IamSigner>,
}

impl DataSources {
    /// Validates every declaration of a folder.
    pub fn new(specs: &BTreeMap<String, DataSourceSpec>) -> Result<Self, SourceError> {
        let sources = specs
            .iter()
            .map(|(name, spec)| DataSource::from_spec(name, spec).map(|s| (name.clone(), s)))
            .collect::<Result<BTreeMap<_, _>, _>>()?;

        let client = reqwest::Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .map_err(|e| SourceError::Client(e.to_string()))?;

        Ok(Self {
            sources: Arc::new(sources),
            client,
            signer: None,
        })
    }

    /// A set without any data source.
    pub fn empty() -> Self {
        Self {
            sources: Arc::new(BTreeMap::new()),
            client: reqwest::Client::new(),
            signer: None,
        }
    }

    /// Signs `auth: iam` calls with `signer` instead of credentials read
    /// from the environment at call time.
    pub fn with_signer(mut self, signer: IamSigner) -> Self {
        self.signer = Some(signer);
        self
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// Names of the declared sources, sorted.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.sources.keys().map(String::as_str)
    }

    /// Calls the source `name`.
    ///
    /// `sub_path` is appended to the source URL path and a non-empty `query`
    /// replaces its query string. `body` is sent for every method but GET.
    /// Non-2xx statuses are not errors; they are reported in
    /// [`ApiResponse::status`]. `auth: iam` sources are signed with AWS
    /// Signature Version 4; missing credentials fail only this call.
    #[instrument(skip(self, body))]
    pub async fn call(
        &self,
        name: &str,
        sub_path: &str,
        query: &str,
        body: &str,
    ) -> Result<ApiResponse, SourceError> {
        let source = self
            .sources
            .get(name)
            .ok_or_else(|| SourceError::UnknownSource(name.to_string()))?;
        let url = source.resolve_url(sub_path, query)?;

        let mut request = self.client.request(source.method().clone(), url.clone());
        if *source.method() != Method::GET {
            request = request
                .header(reqwest::header::CONTENT_TYPE, "application/json")
                .body(body.to_string());
        }

        let mut request = request
            .build()
            .map_err(|e| SourceError::request(name, e.to_string()))?;
        if source.auth() == AuthMode::Iam {
            let signer = match &self.signer {
                Some(signer) => signer.clone(),
                None => IamSigner::from_env()?,
            };
            signer.sign(name, &mut request, SystemTime::now())?;
        }

        let response = self
            .client
            .execute(request)
            .await
            .map_err(|e| SourceError::request(name, e.to_string()))?;
        let status = response.status().as_u16();
        let bytes = response
            .bytes()
            .await
            .map_err(|e| SourceError::request(name, e.to_string()))?;

        debug!(%url, status, len = bytes.len(), "Data source responded");

        let data = if bytes.iter().all(u8::is_ascii_whitespace) {
            serde_json::Value::Null
        } else {
            serde_json::from_slice(&bytes).map_err(|e| SourceError::Decode {
                name: name.to_string(),
                status,
                message: e.to_string(),
            })?
        };

        Ok(ApiResponse { status, data })
    }
}

impl Default for DataSources {
    fn default() -> Self {
        Self::empty()
    }
}
