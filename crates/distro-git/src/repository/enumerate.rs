//! Reference enumeration over a mirror.

use gix::ObjectId;
use gix::bstr::ByteSlice;
use tracing::{debug, warn};

use super::refs::Reference;
use crate::error::MirrorError;

/// Lists the branches and tags of a mirror with their target commits.
pub struct RefEnumerator<'repo> {
    repo: &'repo gix::Repository,
    remote_name: &'repo str,
}

impl<'repo> RefEnumerator<'repo> {
    /// Creates an enumerator for the remote-tracking refs of `remote_name`.
    pub fn new(repo: &'repo gix::Repository, remote_name: &'repo str) -> Self {
        Self { repo, remote_name }
    }

    /// Returns every remote-tracking branch and every tag, sorted by kind
    /// and name.
    ///
    /// Symbolic refs such as `refs/remotes/origin/HEAD` are skipped, as are
    /// refs whose names cannot become a version folder.
    pub fn list(&self) -> Result<Vec<Reference>, MirrorError> {
        let platform = self
            .repo
            .references()
            .map_err(|e| MirrorError::git(format!("Failed to read references: {}", e)))?;

        let mut references = Vec::new();
        let branch_prefix = format!("refs/remotes/{}/", self.remote_name);

        let branches = platform
            .remote_branches()
            .map_err(|e| MirrorError::git(format!("Failed to list branches: {}", e)))?;
        for reference in branches {
            let reference = reference
                .map_err(|e| MirrorError::git(format!("Failed to read branch: {}", e)))?;
            let Ok(full_name) = reference.name().as_bstr().to_str() else {
                warn!("Skipping branch with non UTF-8 name");
                continue;
            };
            let Some(name) = full_name.strip_prefix(branch_prefix.as_str()) else {
                continue;
            };
            if name == "HEAD" {
                continue;
            }
            let Some(target) = reference.target().try_id().map(|id| id.to_owned()) else {
                debug!(name = %full_name, "Skipping symbolic reference");
                continue;
            };
            self.push_valid(&mut references, Reference::branch(name, target));
        }

        let tags = platform
            .tags()
            .map_err(|e| MirrorError::git(format!("Failed to list tags: {}", e)))?;
        for reference in tags {
            let reference =
                reference.map_err(|e| MirrorError::git(format!("Failed to read tag: {}", e)))?;
            let Ok(full_name) = reference.name().as_bstr().to_str() else {
                warn!("Skipping tag with non UTF-8 name");
                continue;
            };
            let Some(name) = full_name.strip_prefix("refs/tags/") else {
                continue;
            };
            let Some(id) = reference.target().try_id().map(|id| id.to_owned()) else {
                debug!(name = %full_name, "Skipping symbolic reference");
                continue;
            };
            let target = self.resolve_tag(name, id)?;
            self.push_valid(&mut references, Reference::tag(name, target));
        }

        references.sort_by(|a, b| (a.kind(), a.name()).cmp(&(b.kind(), b.name())));
        debug!(count = references.len(), "Enumerated references");
        Ok(references)
    }

    fn push_valid(&self, references: &mut Vec<Reference>, reference: Reference) {
        match reference.validate() {
            Ok(()) => references.push(reference),
            Err(reason) => warn!(
                reference = %reference,
                reason,
                "Skipping reference that cannot be mapped to a version folder"
            ),
        }
    }

    /// Resolves a tag ref to its commit, dereferencing an annotated tag
    /// object exactly once.
    fn resolve_tag(&self, name: &str, id: ObjectId) -> Result<ObjectId, MirrorError> {
        let object = self
            .repo
            .find_object(id)
            .map_err(|e| MirrorError::git(format!("Failed to read tag '{}': {}", name, e)))?;

        match object.kind {
            gix::objs::Kind::Commit => Ok(id),
            gix::objs::Kind::Tag => {
                let target = object
                    .into_tag()
                    .target_id()
                    .map_err(|e| MirrorError::git(format!("Failed to decode tag '{}': {}", name, e)))?
                    .detach();
                let header = self.repo.find_header(target).map_err(|e| {
                    MirrorError::git(format!("Failed to read target of tag '{}': {}", name, e))
                })?;
                if header.kind() == gix::objs::Kind::Commit {
                    Ok(target)
                } else {
                    Err(MirrorError::NotACommit {
                        name: name.to_string(),
                        kind: header.kind().to_string(),
                    })
                }
            },
            other => Err(MirrorError::NotACommit {
                name: name.to_string(),
                kind: other.to_string(),
            }),
        }
    }
}
