//! # Distro Git
//!
//! Version-folder materialization for distroserver.
//!
//! This crate keeps a bare mirror of a remote repository and turns every
//! branch and tag into a plain directory tree that the server compiles into
//! routes.
//!
//! ## Features
//!
//! - Git operations via gix (pure Rust, no system git required)
//! - Bare mirror cloned once and fetched incrementally
//! - Annotated tags resolved to the commit they tag
//! - Each rebuild writes its own generation directory; served folders are
//!   never rewritten
//! - Deadlines on clone, fetch and checkout with cooperative interruption
//!
//! ## Example
//!
//! ```ignore
//! use distro_git::{MirrorConfig, RepositoryMirror};
//!
//! let config = MirrorConfig::builder()
//!     .uri("https://github.com/org/distro.git")
//!     .mirror_path("/var/lib/distroserver/mirror")
//!     .build()?;
//!
//! let mirror = RepositoryMirror::new(config, "/var/lib/distroserver/tree");
//! for folder in mirror.materialize().await? {
//!     println!("{}", folder.relative_path());
//! }
//! ```

pub mod error;
pub mod layout;
pub mod repository;
pub mod source;

// Re-exports
pub use error::MirrorError;
pub use layout::{GenerationStore, VersionFolder};
pub use repository::{
    CheckoutStats, MirrorConfig, MirrorConfigBuilder, MirrorState, RefEnumerator, RefKind,
    Reference, RepositoryMirror, SyncOutcome, WorktreeMaterializer,
};
pub use source::{LOCAL_GENERATIONS_DIR, LocalTree, VersionSource};

// Re-export gix for consumers that need object ids
pub use gix;
