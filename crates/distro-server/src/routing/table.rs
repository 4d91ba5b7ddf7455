//! Component route tables.

use std::collections::BTreeMap;
use std::fmt;

use axum::routing::MethodRouter;
use distro_core::ConfigError;

use super::prefix::RoutePattern;

/// What serves a route, for logs and the status page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteKind {
    Health,
    Template,
    Static,
    Proxy,
    Auxiliary,
}

impl RouteKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Health => "health",
            Self::Template => "template",
            Self::Static => "static",
            Self::Proxy => "proxy",
            Self::Auxiliary => "auxiliary",
        }
    }
}

/// One route of a table.
#[derive(Clone)]
pub struct TableRoute {
    pub pattern: RoutePattern,
    pub kind: RouteKind,
    pub handler: MethodRouter,
}

impl TableRoute {
    pub fn exact(kind: RouteKind, handler: MethodRouter) -> Self {
        Self {
            pattern: RoutePattern::Exact,
            kind,
            handler,
        }
    }

    pub fn prefix(kind: RouteKind, handler: MethodRouter) -> Self {
        Self {
            pattern: RoutePattern::Prefix,
            kind,
            handler,
        }
    }
}

impl fmt::Debug for TableRoute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TableRoute")
            .field("pattern", &self.pattern)
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}

/// Routes of one version folder, keyed by path relative to the folder's
/// URL prefix.
///
/// Built once by the compiler and never modified after it is handed to the
/// composer.
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    routes: BTreeMap<String, TableRoute>,
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a route. Two routes on one path are a configuration error.
    pub fn insert(&mut self, path: impl Into<String>, route: TableRoute) -> Result<(), ConfigError> {
        let path = path.into();
        if self.routes.contains_key(&path) {
            return Err(ConfigError::duplicate_mount(path));
        }
        self.routes.insert(path, route);
        Ok(())
    }

    pub fn get(&self, path: &str) -> Option<&TableRoute> {
        self.routes.get(path)
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Relative paths in sorted order.
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.routes.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &TableRoute)> {
        self.routes.iter().map(|(path, route)| (path.as_str(), route))
    }

    /// Consumes the table, yielding `(relative path, route)` in path order.
    pub fn into_routes(self) -> impl Iterator<Item = (String, TableRoute)> {
        self.routes.into_iter()
    }
}
