//! Route snapshots and their publication.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

use axum::{
    Router,
    extract::{Request, State},
    http::{StatusCode, Uri, header},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::any,
};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tower::ServiceExt;
use tracing::warn;

use crate::routing::prefix::{self, MatchedRoute};
use crate::routing::table::{RouteKind, TableRoute};

/// Body of the not-found response.
const NOT_FOUND_BODY: &str = "404 page not found\n";

/// The complete routing state of the server at one point in time.
///
/// Never modified after construction; a rebuild produces a new snapshot
/// with its own router.
pub struct RouteSnapshot {
    generation: u64,
    built_at: DateTime<Utc>,
    versions: Vec<String>,
    kinds: BTreeMap<String, RouteKind>,
    router: Router,
}

impl RouteSnapshot {
    pub fn new(
        generation: u64,
        built_at: DateTime<Utc>,
        versions: Vec<String>,
        routes: BTreeMap<String, TableRoute>,
    ) -> Self {
        let router = build_router(&routes);
        Self {
            generation,
            built_at,
            versions,
            kinds: routes
                .into_iter()
                .map(|(key, route)| (key, route.kind))
                .collect(),
            router,
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn built_at(&self) -> DateTime<Utc> {
        self.built_at
    }

    /// Relative paths of the mounted version folders, e.g. `branch/master`.
    pub fn versions(&self) -> &[String] {
        &self.versions
    }

    pub fn len(&self) -> usize {
        self.kinds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }

    /// Route keys in sorted order.
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.kinds.keys().map(String::as_str)
    }

    /// What serves the route registered under `key`.
    pub fn kind(&self, key: &str) -> Option<RouteKind> {
        self.kinds.get(key).copied()
    }

    /// Serves a request entirely from this snapshot.
    pub async fn dispatch(&self, request: Request) -> Response {
        match self.router.clone().oneshot(request).await {
            Ok(response) => response,
            Err(never) => match never {},
        }
    }
}

/// Registers every route key with the router paths that serve it.
///
/// Keys are unique, but a directory redirect may coincide with another key;
/// the key wins.
fn build_router(routes: &BTreeMap<String, TableRoute>) -> Router {
    let mut router = Router::new();
    let mut registered = BTreeSet::new();

    for (key, route) in routes {
        let handler = route
            .handler
            .clone()
            .layer(middleware::from_fn_with_state(Arc::<str>::from(key.as_str()), mark_route));
        for path in prefix::router_paths(key, route.pattern) {
            if registered.insert(path.clone()) {
                router = router.route(&path, handler.clone());
            } else {
                warn!(path = %path, "Skipping route registered twice");
            }
        }
    }

    for (key, route) in routes {
        let Some(path) = prefix::redirect_path(key, route.pattern) else {
            continue;
        };
        if registered.insert(path.clone()) {
            router = router.route(&path, any(add_trailing_slash));
        }
    }

    router.fallback(not_found)
}

async fn mark_route(State(key): State<Arc<str>>, request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    response.extensions_mut().insert(MatchedRoute::new(key.as_ref()));
    response
}

async fn add_trailing_slash(uri: Uri) -> Response {
    let location = match uri.query() {
        Some(query) => format!("{}/?{}", uri.path(), query),
        None => format!("{}/", uri.path()),
    };
    (StatusCode::MOVED_PERMANENTLY, [(header::LOCATION, location)]).into_response()
}

async fn not_found() -> Response {
    (StatusCode::NOT_FOUND, NOT_FOUND_BODY).into_response()
}

impl fmt::Debug for RouteSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteSnapshot")
            .field("generation", &self.generation)
            .field("built_at", &self.built_at)
            .field("versions", &self.versions)
            .field("routes", &self.kinds.len())
            .finish()
    }
}

/// The published snapshot.
///
/// Readers clone the `Arc` under the lock; a writer swaps the pointer under
/// the same lock. Neither builds nor serves while holding it.
pub struct PublishedRoutes {
    current: Mutex<Arc<RouteSnapshot>>,
}

impl PublishedRoutes {
    pub fn new(initial: RouteSnapshot) -> Self {
        Self {
            current: Mutex::new(Arc::new(initial)),
        }
    }

    /// The snapshot new requests are served from.
    pub fn load(&self) -> Arc<RouteSnapshot> {
        Arc::clone(&self.current.lock())
    }

    /// Replaces the published snapshot and returns the previous one.
    pub fn publish(&self, next: Arc<RouteSnapshot>) -> Arc<RouteSnapshot> {
        std::mem::replace(&mut *self.current.lock(), next)
    }
}

impl fmt::Debug for PublishedRoutes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PublishedRoutes")
            .field("current", &*self.load())
            .finish()
    }
}
