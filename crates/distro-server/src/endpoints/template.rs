//! Template endpoints.
//!
//! Every file under the endpoint's template directory is loaded at build
//! time and registered under its file name. A request renders either the
//! template chosen by `filename_template` or `default_template`.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::{HeaderMap, HeaderValue, StatusCode, Uri, header},
    response::{IntoResponse, Response},
    routing::{MethodRouter, any},
};
use distro_core::{ConfigError, TemplateSpec};
use distro_sources::DataSources;
use minijinja::{AutoEscape, Environment, ErrorKind, Value, context};
use serde_json::Map;
use tracing::{debug, error, warn};
use walkdir::WalkDir;

use super::pipe::{PipeCommand, run_pipeline};
use super::{EndpointContext, EndpointProducer};

/// Body of a failed render; details only go to the logs.
const RENDER_ERROR_MESSAGE: &str = "Internal server error. Please consult the server logs.";

/// Query parameter that skips the post-render pipeline.
const RAW_PARAM: &str = "raw";

/// A compiled template endpoint.
pub struct TemplateEndpoint {
    env: Environment<'static>,
    /// File stem (name up to the first `.`) to template name.
    stems: BTreeMap<String, String>,
    default_template: String,
    filename_template: Option<String>,
    content_type: HeaderValue,
    pipeline: Vec<PipeCommand>,
    vars: Arc<serde_json::Value>,
}

impl std::fmt::Debug for TemplateEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TemplateEndpoint")
            .field("templates", &self.stems.values().collect::<Vec<_>>())
            .field("default_template", &self.default_template)
            .field("pipeline", &self.pipeline)
            .finish_non_exhaustive()
    }
}

impl EndpointProducer for TemplateSpec {
    fn create_handler(&self, context: &EndpointContext) -> Result<MethodRouter, ConfigError> {
        let endpoint = TemplateEndpoint::load(self, context)?;
        Ok(any(render_template).with_state(Arc::new(endpoint)))
    }
}

impl TemplateEndpoint {
    /// Loads the templates of an endpoint.
    pub fn load(spec: &TemplateSpec, context: &EndpointContext) -> Result<Self, ConfigError> {
        let mount = context.mount_template.as_str();
        let directory = context.base_path.join(&spec.template_path);

        let mut env = Environment::new();
        env.set_auto_escape_callback(|_| AutoEscape::None);
        env.set_keep_trailing_newline(true);
        register_api(&mut env, context.data_sources.clone());

        let stems = load_templates(&mut env, &directory, mount)?;

        if env.get_template(&spec.default_template).is_err() {
            return Err(ConfigError::endpoint(
                mount,
                format!(
                    "default template '{}' not found in {}",
                    spec.default_template,
                    directory.display()
                ),
            ));
        }

        let filename_template = if spec.filename_template.trim().is_empty() {
            None
        } else {
            env.template_from_str(&spec.filename_template)
                .map_err(|e| ConfigError::endpoint(mount, format!("filename_template: {}", e)))?;
            Some(spec.filename_template.clone())
        };

        let content_type = HeaderValue::from_str(&spec.content_type)
            .map_err(|_| ConfigError::endpoint(mount, "content_type is not a valid header value"))?;

        let pipeline = spec
            .post_render
            .iter()
            .map(|line| {
                PipeCommand::parse(line)
                    .ok_or_else(|| ConfigError::endpoint(mount, "post_render command cannot be empty"))
            })
            .collect::<Result<Vec<_>, _>>()?;

        debug!(
            mount,
            templates = stems.len(),
            default = %spec.default_template,
            "Loaded template endpoint"
        );

        Ok(Self {
            env,
            stems,
            default_template: spec.default_template.clone(),
            filename_template,
            content_type,
            pipeline,
            vars: Arc::clone(&context.vars),
        })
    }

    /// Names of the loaded templates.
    pub fn template_names(&self) -> impl Iterator<Item = &str> {
        self.env.templates().map(|(name, _)| name)
    }

    /// Picks the template for a render context.
    fn select_template(&self, ctx: &Value) -> Result<&str, minijinja::Error> {
        if let Some(selector) = &self.filename_template {
            let name = self.env.render_str(selector, ctx)?;
            if let Some(template) = self.stems.get(&name) {
                return Ok(template.as_str());
            }
        }
        Ok(self.default_template.as_str())
    }

    /// Renders the selected template. Blocks while `api()` calls run.
    pub fn render(&self, ctx: Value) -> Result<String, minijinja::Error> {
        let name = self.select_template(&ctx)?;
        debug!(template = name, "Rendering template");
        self.env.get_template(name)?.render(ctx)
    }
}

fn load_templates(
    env: &mut Environment<'static>,
    directory: &Path,
    mount: &str,
) -> Result<BTreeMap<String, String>, ConfigError> {
    if !directory.is_dir() {
        return Err(ConfigError::endpoint(
            mount,
            format!("template directory {} does not exist", directory.display()),
        ));
    }

    let mut stems = BTreeMap::new();
    for entry in WalkDir::new(directory).sort_by_file_name() {
        let entry = entry.map_err(|e| ConfigError::endpoint(mount, e.to_string()))?;
        if !entry.file_type().is_file() {
            continue;
        }

        let name = entry.file_name().to_string_lossy().into_owned();
        let source = std::fs::read_to_string(entry.path())?;
        env.add_template_owned(name.clone(), source).map_err(|e| {
            ConfigError::endpoint(mount, format!("{}: {}", entry.path().display(), e))
        })?;

        let stem = name.split('.').next().unwrap_or_default().to_string();
        stems.insert(stem, name);
    }

    Ok(stems)
}

/// Registers `api(name, sub_path="", query="", body="")`.
///
/// Rendering runs on the blocking pool, so the call parks that thread on
/// the runtime until the data source answers.
fn register_api(env: &mut Environment<'static>, sources: DataSources) {
    env.add_function(
        "api",
        move |name: String,
              sub_path: Option<String>,
              query: Option<String>,
              body: Option<String>|
              -> Result<Value, minijinja::Error> {
            let handle = tokio::runtime::Handle::try_current().map_err(|e| {
                minijinja::Error::new(ErrorKind::InvalidOperation, format!("api(): {}", e))
            })?;
            let response = handle
                .block_on(sources.call(
                    &name,
                    sub_path.as_deref().unwrap_or_default(),
                    query.as_deref().unwrap_or_default(),
                    body.as_deref().unwrap_or_default(),
                ))
                .map_err(|e| minijinja::Error::new(ErrorKind::InvalidOperation, e.to_string()))?;
            Ok(Value::from_serialize(&response))
        },
    );
}

/// `scheme://host/` plus the request path without its last segment.
fn base_url(headers: &HeaderMap, uri: &Uri) -> String {
    let scheme = match headers.get("x-forwarded-proto").and_then(|v| v.to_str().ok()) {
        Some(proto) if proto.eq_ignore_ascii_case("https") => "https",
        _ => "http",
    };
    let host = headers
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .or_else(|| uri.authority().map(|a| a.as_str()))
        .unwrap_or_default();

    let path = uri.path().trim_start_matches('/');
    match path.rfind('/') {
        Some(idx) => format!("{}://{}/{}", scheme, host, &path[..idx]),
        None => format!("{}://{}", scheme, host),
    }
}

/// Single values become strings, repeated keys become lists.
fn request_params(pairs: Vec<(String, String)>) -> serde_json::Value {
    let mut params = Map::new();
    for (key, value) in pairs {
        match params.get_mut(&key) {
            Some(serde_json::Value::Array(values)) => values.push(value.into()),
            Some(existing) => {
                let first = existing.take();
                *existing = serde_json::Value::Array(vec![first, value.into()]);
            },
            None => {
                params.insert(key, value.into());
            },
        }
    }
    serde_json::Value::Object(params)
}

fn render_failed() -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        axum::Json(serde_json::json!({ "msg": RENDER_ERROR_MESSAGE })),
    )
        .into_response()
}

async fn render_template(
    State(endpoint): State<Arc<TemplateEndpoint>>,
    Query(pairs): Query<Vec<(String, String)>>,
    headers: HeaderMap,
    uri: Uri,
) -> Response {
    let raw = pairs.iter().any(|(key, _)| key == RAW_PARAM);
    let ctx = context! {
        base_url => base_url(&headers, &uri),
        vars => Value::from_serialize(&*endpoint.vars),
        params => Value::from_serialize(request_params(pairs)),
        raw_query => uri.query().unwrap_or_default(),
    };

    let renderer = Arc::clone(&endpoint);
    let rendered = match tokio::task::spawn_blocking(move || renderer.render(ctx)).await {
        Ok(Ok(body)) => body,
        Ok(Err(e)) => {
            error!(path = %uri.path(), "Template render failed: {:#}", e);
            return render_failed();
        },
        Err(e) => {
            error!(path = %uri.path(), "Render task failed: {}", e);
            return render_failed();
        },
    };

    let body = if raw || endpoint.pipeline.is_empty() {
        rendered.into_bytes()
    } else {
        match run_pipeline(&endpoint.pipeline, rendered.into_bytes()).await {
            Ok(body) => body,
            Err(e) => {
                warn!(path = %uri.path(), "Post-render pipeline failed: {}", e);
                return StatusCode::INTERNAL_SERVER_ERROR.into_response();
            },
        }
    };

    ([(header::CONTENT_TYPE, endpoint.content_type.clone())], body).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn spec(default_template: &str) -> TemplateSpec {
        serde_json::from_value(serde_json::json!({
            "template_path": "templates",
            "default_template": default_template,
            "filename_template": "{{ params.role }}",
        }))
        .unwrap()
    }

    fn context(base: &Path) -> EndpointContext {
        EndpointContext {
            base_path: base.to_path_buf(),
            mount_template: "/branch/master/boot".to_string(),
            vars: Arc::new(serde_json::json!({"site": "lab"})),
            data_sources: DataSources::empty(),
        }
    }

    fn folder() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        let templates = dir.path().join("templates");
        fs::create_dir_all(templates.join("nested")).unwrap();
        fs::write(templates.join("default.ipxe"), "default {{ vars.site }}\n").unwrap();
        fs::write(templates.join("nested/compute.ipxe"), "compute {{ params.id }}").unwrap();
        dir
    }

    #[test]
    fn test_load_names_templates_by_file_name() {
        let dir = folder();
        let endpoint = TemplateEndpoint::load(&spec("default.ipxe"), &context(dir.path())).unwrap();

        let mut names: Vec<_> = endpoint.template_names().collect();
        names.sort();
        assert_eq!(names, vec!["compute.ipxe", "default.ipxe"]);
    }

    #[test]
    fn test_missing_default_template() {
        let dir = folder();
        let err = TemplateEndpoint::load(&spec("missing.ipxe"), &context(dir.path())).unwrap_err();
        assert!(matches!(err, ConfigError::Endpoint { .. }));
    }

    #[test]
    fn test_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let err = TemplateEndpoint::load(&spec("default.ipxe"), &context(dir.path())).unwrap_err();
        assert!(matches!(err, ConfigError::Endpoint { .. }));
    }

    #[test]
    fn test_syntax_error_is_config_error() {
        let dir = folder();
        fs::write(dir.path().join("templates/broken.ipxe"), "{% if %}").unwrap();

        let err = TemplateEndpoint::load(&spec("default.ipxe"), &context(dir.path())).unwrap_err();
        assert!(matches!(err, ConfigError::Endpoint { .. }));
    }

    #[test]
    fn test_render_selects_by_stem() {
        let dir = folder();
        let endpoint = TemplateEndpoint::load(&spec("default.ipxe"), &context(dir.path())).unwrap();

        let selected = endpoint
            .render(context! { vars => Value::from_serialize(&*endpoint.vars), params => context! { role => "compute", id => "7" } })
            .unwrap();
        let fallback = endpoint
            .render(context! { vars => Value::from_serialize(&*endpoint.vars), params => context! { role => "storage" } })
            .unwrap();

        assert_eq!(selected, "compute 7");
        assert_eq!(fallback, "default lab\n");
    }

    #[test]
    fn test_request_params() {
        let params = request_params(vec![
            ("mac".to_string(), "aa".to_string()),
            ("tag".to_string(), "a".to_string()),
            ("tag".to_string(), "b".to_string()),
            ("tag".to_string(), "c".to_string()),
        ]);

        assert_eq!(params, serde_json::json!({"mac": "aa", "tag": ["a", "b", "c"]}));
    }

    #[test]
    fn test_base_url() {
        let mut headers = HeaderMap::new();
        headers.insert(header::HOST, HeaderValue::from_static("boot.example.org"));

        let uri: Uri = "/branch/master/boot/node?x=1".parse().unwrap();
        assert_eq!(base_url(&headers, &uri), "http://boot.example.org/branch/master/boot");

        let uri: Uri = "/boot".parse().unwrap();
        assert_eq!(base_url(&headers, &uri), "http://boot.example.org");

        headers.insert("x-forwarded-proto", HeaderValue::from_static("https"));
        let uri: Uri = "/branch/dev/x".parse().unwrap();
        assert_eq!(base_url(&headers, &uri), "https://boot.example.org/branch/dev");
    }
}
