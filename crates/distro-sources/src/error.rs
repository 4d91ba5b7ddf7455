//! Error types for data source calls.

/// Errors raised while declaring or calling a data source.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// No data source with this name is declared in the folder.
    #[error("unknown data source '{0}'")]
    UnknownSource(String),

    /// The URL template failed to parse or render.
    #[error("data source '{name}': url template error: {message}")]
    UrlTemplate { name: String, message: String },

    /// The rendered URL is not a valid absolute URL.
    #[error("data source '{name}': invalid url '{url}': {message}")]
    InvalidUrl {
        name: String,
        url: String,
        message: String,
    },

    /// The HTTP method is not valid.
    #[error("data source '{name}': invalid method '{method}'")]
    InvalidMethod { name: String, method: String },

    /// No credentials are available for request signing.
    #[error("iam credentials unavailable: {0}")]
    Credentials(String),

    /// The request could not be signed.
    #[error("data source '{name}': signing failed: {message}")]
    Signing { name: String, message: String },

    /// The HTTP client could not be built.
    #[error("http client error: {0}")]
    Client(String),

    /// The request failed in transport.
    #[error("data source '{name}': request failed: {message}")]
    Request { name: String, message: String },

    /// The response body is not JSON.
    #[error("data source '{name}': response with status {status} is not JSON: {message}")]
    Decode {
        name: String,
        status: u16,
        message: String,
    },
}

impl SourceError {
    /// Creates a new request error.
    pub fn request(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Request {
            name: name.into(),
            message: message.into(),
        }
    }

    /// Creates a new signing error.
    pub fn signing(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Signing {
            name: name.into(),
            message: message.into(),
        }
    }

    /// Creates a new url template error.
    pub fn url_template(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::UrlTemplate {
            name: name.into(),
            message: message.into(),
        }
    }

    /// Name of the data source the error concerns, if any.
    pub fn source_name(&self) -> Option<&str> {
        match self {
            Self::UnknownSource(name)
            | Self::UrlTemplate { name, .. }
            | Self::InvalidUrl { name, .. }
            | Self::InvalidMethod { name, .. }
            | Self::Signing { name, .. }
            | Self::Request { name, .. }
            | Self::Decode { name, .. } => Some(name),
            Self::Client(_) | Self::Credentials(_) => None,
        }
    }

    /// Returns true if the error comes from the declaration rather than the call.
    pub fn is_declaration_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidMethod { .. } | Self::UrlTemplate { .. }
        )
    }
}
