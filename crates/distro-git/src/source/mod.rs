//! Version sources.
//!
//! A [`VersionSource`] produces the list of version folders a rebuild
//! compiles: either by mirroring a remote repository
//! ([`RepositoryMirror`](crate::RepositoryMirror)) or by copying an
//! existing tree ([`LocalTree`]).

mod local;
mod traits;

pub use local::{LOCAL_GENERATIONS_DIR, LocalTree};
pub use traits::VersionSource;
