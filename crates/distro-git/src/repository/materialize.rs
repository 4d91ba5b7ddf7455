//! Writes the tree of one reference into a version folder.

use std::fs;
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use gix::bstr::ByteSlice;
use gix::objs::tree::EntryKind;
use tracing::{debug, warn};
use uuid::Uuid;

use super::refs::Reference;
use crate::error::MirrorError;

/// Files and links written by one checkout.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CheckoutStats {
    pub files: usize,
    pub symlinks: usize,
    pub skipped_submodules: usize,
}

/// Checks out reference trees from a mirror's object store.
///
/// The object store is only read. Each checkout writes a private staging
/// directory next to its destination, so checkouts of different references
/// never touch the same files.
pub struct WorktreeMaterializer<'repo> {
    repo: &'repo gix::Repository,
}

impl<'repo> WorktreeMaterializer<'repo> {
    pub fn new(repo: &'repo gix::Repository) -> Self {
        Self { repo }
    }

    /// Replaces `destination` with the tree of `reference`.
    ///
    /// Anything previously in `destination`, including local edits and
    /// untracked files, is discarded. On failure the destination is left as
    /// it was.
    pub fn checkout(
        &self,
        reference: &Reference,
        destination: &Path,
        should_interrupt: &AtomicBool,
    ) -> Result<CheckoutStats, MirrorError> {
        reference
            .validate()
            .map_err(|reason| MirrorError::invalid_reference(reference.name(), reason))?;

        let parent = destination
            .parent()
            .ok_or_else(|| MirrorError::materialize(destination, "destination has no parent"))?;
        fs::create_dir_all(parent)?;

        let staging = sibling(destination, "staging");
        if staging.exists() {
            fs::remove_dir_all(&staging)?;
        }
        fs::create_dir_all(&staging)?;

        match self.write_tree(reference, &staging, should_interrupt) {
            Ok(stats) => {
                swap_into_place(&staging, destination)?;
                debug!(
                    reference = %reference,
                    files = stats.files,
                    symlinks = stats.symlinks,
                    "Checked out reference"
                );
                Ok(stats)
            },
            Err(e) => {
                if let Err(cleanup) = fs::remove_dir_all(&staging) {
                    warn!("Failed to remove staging directory {:?}: {}", staging, cleanup);
                }
                Err(e)
            },
        }
    }

    fn write_tree(
        &self,
        reference: &Reference,
        root: &Path,
        should_interrupt: &AtomicBool,
    ) -> Result<CheckoutStats, MirrorError> {
        let commit = self
            .repo
            .find_object(reference.target())
            .map_err(|e| MirrorError::git(format!("Failed to read commit of {}: {}", reference, e)))?
            .try_into_commit()
            .map_err(|e| MirrorError::git(format!("{} does not point at a commit: {}", reference, e)))?;
        let tree = commit
            .tree()
            .map_err(|e| MirrorError::git(format!("Failed to read tree of {}: {}", reference, e)))?;

        let mut recorder = gix::traverse::tree::Recorder::default();
        tree.traverse()
            .breadthfirst(&mut recorder)
            .map_err(|e| MirrorError::git(format!("Failed to walk tree of {}: {}", reference, e)))?;

        let mut stats = CheckoutStats::default();
        for entry in recorder.records {
            if should_interrupt.load(Ordering::Relaxed) {
                return Err(MirrorError::Interrupted);
            }

            let relative = entry
                .filepath
                .to_str()
                .map_err(|_| MirrorError::materialize(root, "tree contains a non UTF-8 path"))?;
            let path = safe_join(root, relative)?;

            match entry.mode.kind() {
                EntryKind::Tree => fs::create_dir_all(&path)?,
                EntryKind::Blob | EntryKind::BlobExecutable => {
                    let blob = self.read_blob(entry.oid, relative)?;
                    create_parent(&path)?;
                    fs::write(&path, &blob)?;
                    if entry.mode.kind() == EntryKind::BlobExecutable {
                        set_executable(&path)?;
                    }
                    stats.files += 1;
                },
                EntryKind::Link => {
                    let target = self.read_blob(entry.oid, relative)?;
                    create_parent(&path)?;
                    write_symlink(&target, &path)?;
                    stats.symlinks += 1;
                },
                EntryKind::Commit => {
                    debug!(path = relative, "Skipping submodule entry");
                    stats.skipped_submodules += 1;
                },
            }
        }

        Ok(stats)
    }

    fn read_blob(&self, id: gix::ObjectId, path: &str) -> Result<Vec<u8>, MirrorError> {
        let object = self
            .repo
            .find_object(id)
            .map_err(|e| MirrorError::git(format!("Failed to read blob '{}': {}", path, e)))?;
        Ok(object.detach().data)
    }
}

/// Returns a hidden, unique path next to `destination`.
pub(crate) fn sibling(destination: &Path, purpose: &str) -> PathBuf {
    let name = destination
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    destination.with_file_name(format!(".{}.{}-{}", name, purpose, Uuid::now_v7()))
}

fn swap_into_place(staging: &Path, destination: &Path) -> Result<(), MirrorError> {
    if destination.exists() {
        let retired = sibling(destination, "old");
        fs::rename(destination, &retired)?;
        fs::rename(staging, destination)?;
        if let Err(e) = fs::remove_dir_all(&retired) {
            warn!("Failed to remove retired folder {:?}: {}", retired, e);
        }
    } else {
        fs::rename(staging, destination)?;
    }
    Ok(())
}

fn safe_join(root: &Path, relative: &str) -> Result<PathBuf, MirrorError> {
    let relative = Path::new(relative);
    if !relative
        .components()
        .all(|component| matches!(component, Component::Normal(_)))
    {
        return Err(MirrorError::materialize(
            root,
            format!("tree entry '{}' escapes the version folder", relative.display()),
        ));
    }
    Ok(root.join(relative))
}

fn create_parent(path: &Path) -> std::io::Result<()> {
    match path.parent() {
        Some(parent) => fs::create_dir_all(parent),
        None => Ok(()),
    }
}

#[cfg(unix)]
fn set_executable(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o755))
}

#[cfg(not(unix))]
fn set_executable(_path: &Path) -> std::io::Result<()> {
    Ok(())
}

#[cfg(unix)]
fn write_symlink(target: &[u8], path: &Path) -> Result<(), MirrorError> {
    use std::os::unix::ffi::OsStrExt;
    let target = std::ffi::OsStr::from_bytes(target);
    std::os::unix::fs::symlink(target, path)?;
    Ok(())
}

#[cfg(not(unix))]
fn write_symlink(target: &[u8], path: &Path) -> Result<(), MirrorError> {
    // Without symlink support the link target is stored as file content.
    fs::write(path, target)?;
    Ok(())
}
