//! Route compilation and lookup.

pub mod compiler;
pub mod composer;
pub mod prefix;
pub mod table;

pub use compiler::{HEALTH_PATH, VersionRouteCompiler};
pub use composer::{RebuildContext, RouteComposer};
pub use prefix::{MatchedRoute, RoutePattern};
pub use table::{RouteKind, RouteTable, TableRoute};
