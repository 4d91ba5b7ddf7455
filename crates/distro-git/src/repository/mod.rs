//! Git repository management.
//!
//! This module mirrors a remote repository and materializes its references
//! into version folders.

mod config;
mod enumerate;
mod materialize;
mod mirror;
mod refs;

pub use config::{MirrorConfig, MirrorConfigBuilder};
pub use enumerate::RefEnumerator;
pub use materialize::{CheckoutStats, WorktreeMaterializer};
pub use mirror::{MirrorState, RepositoryMirror, SyncOutcome};
pub use refs::{RefKind, Reference};
