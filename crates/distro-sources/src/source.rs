//! A single declared data source.

use distro_core::config::mount;
use distro_core::{AuthMode, DataSourceSpec};
use minijinja::Environment;
use reqwest::{Method, Url};

use crate::error::SourceError;

/// A validated data source declaration.
#[derive(Debug, Clone)]
pub struct DataSource {
    name: String,
    url_template: String,
    method: Method,
    auth: AuthMode,
}

impl DataSource {
    /// Validates a declaration.
    ///
    /// Checks the method and the syntax of the URL template. The template
    /// itself is rendered on every call.
    pub fn from_spec(name: &str, spec: &DataSourceSpec) -> Result<Self, SourceError> {
        let method = Method::from_bytes(spec.method.trim().to_uppercase().as_bytes()).map_err(|_| {
            SourceError::InvalidMethod {
                name: name.to_string(),
                method: spec.method.clone(),
            }
        })?;

        let env = url_environment();
        env.template_from_str(&spec.url)
            .map_err(|e| SourceError::url_template(name, e.to_string()))?;

        Ok(Self {
            name: name.to_string(),
            url_template: spec.url.clone(),
            method,
            auth: spec.auth,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn auth(&self) -> AuthMode {
        self.auth
    }

    /// Renders the URL template and applies `sub_path` and `query`.
    ///
    /// `sub_path` is joined onto the URL path; a non-empty `query` replaces
    /// the URL's query string.
    pub fn resolve_url(&self, sub_path: &str, query: &str) -> Result<Url, SourceError> {
        let rendered = url_environment()
            .render_str(&self.url_template, minijinja::context! {})
            .map_err(|e| SourceError::url_template(&self.name, e.to_string()))?;

        let mut url = Url::parse(rendered.trim()).map_err(|e| SourceError::InvalidUrl {
            name: self.name.clone(),
            url: rendered.clone(),
            message: e.to_string(),
        })?;

        if !sub_path.is_empty() {
            let joined = mount::clean(&format!("{}/{}", url.path(), sub_path));
            url.set_path(&joined);
        }
        if !query.is_empty() {
            url.set_query(Some(query));
        }

        Ok(url)
    }
}

fn url_environment() -> Environment<'static> {
    let mut env = Environment::new();
    env.add_function("env", env_var);
    env
}

fn env_var(name: String) -> String {
    std::env::var(name).unwrap_or_default()
}
