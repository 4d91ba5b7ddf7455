//! AWS Signature Version 4 for `auth: iam` data sources.

use std::fmt;
use std::time::SystemTime;

use aws_credential_types::Credentials;
use aws_sigv4::http_request::{SignableBody, SignableRequest, SigningSettings, sign};
use aws_sigv4::sign::v4;
use reqwest::header::{HeaderName, HeaderValue};

use crate::error::SourceError;

/// Service name requests are signed for.
pub const SIGNING_SERVICE: &str = "execute-api";

/// Signs outbound requests with static credentials.
#[derive(Clone)]
pub struct IamSigner {
    credentials: Credentials,
    region: String,
}

impl IamSigner {
    pub fn new(credentials: Credentials, region: impl Into<String>) -> Self {
        Self {
            credentials,
            region: region.into(),
        }
    }

    /// Reads `AWS_ACCESS_KEY_ID`, `AWS_SECRET_ACCESS_KEY`, the optional
    /// `AWS_SESSION_TOKEN` and the region from `AWS_REGION` or
    /// `AWS_DEFAULT_REGION`.
    pub fn from_env() -> Result<Self, SourceError> {
        let access_key = non_empty_env("AWS_ACCESS_KEY_ID")
            .ok_or_else(|| SourceError::Credentials("AWS_ACCESS_KEY_ID is not set".to_string()))?;
        let secret_key = non_empty_env("AWS_SECRET_ACCESS_KEY").ok_or_else(|| {
            SourceError::Credentials("AWS_SECRET_ACCESS_KEY is not set".to_string())
        })?;
        let region = non_empty_env("AWS_REGION")
            .or_else(|| non_empty_env("AWS_DEFAULT_REGION"))
            .ok_or_else(|| SourceError::Credentials("AWS_REGION is not set".to_string()))?;

        let credentials = Credentials::new(
            access_key,
            secret_key,
            non_empty_env("AWS_SESSION_TOKEN"),
            None,
            "environment",
        );
        Ok(Self::new(credentials, region))
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    /// Adds the signature headers to `request`, signed at `time`.
    pub fn sign(
        &self,
        name: &str,
        request: &mut reqwest::Request,
        time: SystemTime,
    ) -> Result<(), SourceError> {
        let signing_error = |e: &dyn fmt::Display| SourceError::signing(name, e.to_string());

        let instructions = {
            let identity = self.credentials.clone().into();
            let params = v4::SigningParams::builder()
                .identity(&identity)
                .region(&self.region)
                .name(SIGNING_SERVICE)
                .time(time)
                .settings(SigningSettings::default())
                .build()
                .map_err(|e| signing_error(&e))?
                .into();

            let headers: Vec<(&str, &str)> = request
                .headers()
                .iter()
                .filter_map(|(k, v)| v.to_str().ok().map(|v| (k.as_str(), v)))
                .collect();
            let body = request
                .body()
                .and_then(reqwest::Body::as_bytes)
                .unwrap_or_default();
            let signable = SignableRequest::new(
                request.method().as_str(),
                request.url().as_str(),
                headers.into_iter(),
                SignableBody::Bytes(body),
            )
            .map_err(|e| signing_error(&e))?;

            let (instructions, _signature) = sign(signable, &params)
                .map_err(|e| signing_error(&e))?
                .into_parts();
            instructions
        };

        for (header, value) in instructions.headers() {
            let header = HeaderName::from_bytes(header.as_bytes()).map_err(|e| signing_error(&e))?;
            let value = HeaderValue::from_str(value).map_err(|e| signing_error(&e))?;
            request.headers_mut().insert(header, value);
        }
        Ok(())
    }
}

impl fmt::Debug for IamSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IamSigner")
            .field("access_key_id", &self.credentials.access_key_id())
            .field("region", &self.region)
            .finish_non_exhaustive()
    }
}

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}
