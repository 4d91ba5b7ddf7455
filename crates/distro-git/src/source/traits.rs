//! Version source trait definition.

use std::path::Path;

use async_trait::async_trait;

use crate::error::MirrorError;
use crate::layout::VersionFolder;

/// A producer of version folders.
///
/// # Implementors
///
/// - `RepositoryMirror` - mirrors a remote and checks out every branch and tag
/// - `LocalTree` - serves copies of an existing directory tree
///
/// # Example
///
/// ```ignore
/// use distro_git::{MirrorError, VersionFolder, VersionSource};
///
/// struct Fixed(Vec<VersionFolder>);
///
/// #[async_trait]
/// impl VersionSource for Fixed {
///     async fn materialize(&self) -> Result<Vec<VersionFolder>, MirrorError> {
///         Ok(self.0.clone())
///     }
///     // ...
/// }
/// ```
#[async_trait]
pub trait VersionSource: Send + Sync {
    /// Writes a new set of version folders and returns them.
    ///
    /// Folders returned by earlier calls are left untouched. The caller
    /// reports what became of the new set with [`commit`](Self::commit) or
    /// [`abandon`](Self::abandon).
    ///
    /// # Errors
    ///
    /// Any error means no folder list is available for this rebuild; the
    /// caller must keep serving what it has.
    async fn materialize(&self) -> Result<Vec<VersionFolder>, MirrorError>;

    /// Returns the name of this source, used for logging.
    fn name(&self) -> &str;

    /// Returns the directory the version folders are written below.
    fn tree_root(&self) -> &Path;

    /// The folders of the last materialization are now served. Older sets
    /// other than the previously served one may be removed.
    fn commit(&self) {}

    /// The folders of the last materialization will never be served.
    fn abandon(&self) {}
}
