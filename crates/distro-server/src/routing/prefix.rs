//! Path prefix routes.
//!
//! Routes are keyed by their full path. A key ending in `/` is a directory
//! mount and matches itself and everything below it. A prefix key without a
//! trailing slash matches itself and everything below `key/`. Exact keys
//! only match themselves. Matching itself is done by the axum router each
//! snapshot builds; this module maps keys to router paths.

use axum::http::Uri;
use axum::http::uri::PathAndQuery;

/// How a route key matches request paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoutePattern {
    /// Only the key itself.
    Exact,
    /// The key and everything beneath it.
    Prefix,
}

/// The route key a request was dispatched to.
///
/// Attached to responses so outer layers can label requests by route
/// rather than by raw path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchedRoute(String);

impl MatchedRoute {
    pub fn new(pattern: impl Into<String>) -> Self {
        Self(pattern.into())
    }

    pub fn pattern(&self) -> &str {
        &self.0
    }
}

/// Router paths that together serve `key`.
///
/// A catch-all never matches an empty remainder, so prefix keys register
/// their bare form next to the catch-all.
pub fn router_paths(key: &str, pattern: RoutePattern) -> Vec<String> {
    let key = literal(key);
    match pattern {
        RoutePattern::Exact => vec![key],
        RoutePattern::Prefix if key.ends_with('/') => vec![format!("{key}{{*rest}}"), key],
        RoutePattern::Prefix => vec![format!("{key}/{{*rest}}"), format!("{key}/"), key],
    }
}

/// Router path answering with a redirect to a directory key, `/foo` for
/// `/foo/`.
pub fn redirect_path(key: &str, pattern: RoutePattern) -> Option<String> {
    match pattern {
        RoutePattern::Prefix if key.len() > 1 && key.ends_with('/') => {
            Some(literal(key.trim_end_matches('/')))
        },
        _ => None,
    }
}

/// Escapes router syntax in a literal path.
fn literal(path: &str) -> String {
    path.replace('{', "{{").replace('}', "}}")
}

/// Removes a mount template from a request path.
///
/// `/branch/master/foo/a/b.txt` under `/branch/master/foo/` yields
/// `a/b.txt`.
pub fn strip_mount<'a>(path: &'a str, mount: &str) -> Option<&'a str> {
    path.strip_prefix(mount)
}

/// Replaces the path of `uri`, keeping its query.
pub fn with_path(uri: &Uri, path: &str) -> Result<Uri, String> {
    let path_and_query = match uri.query() {
        Some(query) => format!("{}?{}", path, query),
        None => path.to_string(),
    };
    let mut parts = uri.clone().into_parts();
    parts.path_and_query =
        Some(PathAndQuery::try_from(path_and_query).map_err(|e| e.to_string())?);
    Uri::from_parts(parts).map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_key() {
        assert_eq!(router_paths("/status", RoutePattern::Exact), vec!["/status"]);
        assert_eq!(redirect_path("/status", RoutePattern::Exact), None);
    }

    #[test]
    fn test_directory_key() {
        assert_eq!(
            router_paths("/branch/master/foo/", RoutePattern::Prefix),
            vec!["/branch/master/foo/{*rest}", "/branch/master/foo/"]
        );
        assert_eq!(
            redirect_path("/branch/master/foo/", RoutePattern::Prefix).as_deref(),
            Some("/branch/master/foo")
        );
    }

    #[test]
    fn test_resource_key() {
        assert_eq!(
            router_paths("/branch/master/bar", RoutePattern::Prefix),
            vec!["/branch/master/bar/{*rest}", "/branch/master/bar/", "/branch/master/bar"]
        );
        assert_eq!(redirect_path("/branch/master/bar", RoutePattern::Prefix), None);
    }

    #[test]
    fn test_braces_are_literal() {
        assert_eq!(
            router_paths("/branch/x/{id}", RoutePattern::Exact),
            vec!["/branch/x/{{id}}"]
        );
        assert_eq!(redirect_path("/", RoutePattern::Prefix), None);
    }

    #[test]
    fn test_strip_mount() {
        assert_eq!(
            strip_mount("/branch/master/foo/a/b.txt", "/branch/master/foo/"),
            Some("a/b.txt")
        );
        assert_eq!(strip_mount("/branch/master/bar", "/branch/master/bar"), Some(""));
        assert_eq!(strip_mount("/other", "/branch/master/foo/"), None);
    }

    #[test]
    fn test_with_path_keeps_query() {
        let uri: Uri = "/branch/master/foo/a.txt?raw&x=1".parse().unwrap();
        let rewritten = with_path(&uri, "/a.txt").unwrap();

        assert_eq!(rewritten.path(), "/a.txt");
        assert_eq!(rewritten.query(), Some("raw&x=1"));
    }
}
