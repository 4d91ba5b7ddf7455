//! A version tree maintained on disk by someone else.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use distro_core::find_config_document;
use tracing::{debug, info, warn};
use walkdir::{DirEntry, WalkDir};

use super::VersionSource;
use crate::error::MirrorError;
use crate::layout::{GenerationStore, VersionFolder};
use crate::repository::RefKind;

/// Default directory, below the tree root, holding the copied generations.
pub const LOCAL_GENERATIONS_DIR: &str = ".generations";

/// Serves the version folders found under `branch/` and `release/` of an
/// existing tree.
///
/// Every materialization copies the folders into a fresh generation, so
/// edits made to the tree only become visible through a successful rebuild.
/// Branch names may contain `/`: a directory is a version folder when it has
/// a configuration document or no subdirectories.
#[derive(Debug, Clone)]
pub struct LocalTree {
    root: PathBuf,
    name: String,
    generations: Arc<GenerationStore>,
}

impl LocalTree {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let generations = root.join(LOCAL_GENERATIONS_DIR);
        Self::with_generations(root, generations)
    }

    /// Keeps the copied generations in `generations` instead of below the
    /// tree root.
    pub fn with_generations(root: impl Into<PathBuf>, generations: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let name = root.display().to_string();
        Self {
            root,
            name,
            generations: Arc::new(GenerationStore::new(generations)),
        }
    }

    /// Root of the tree being scanned.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Lists the version folders currently in the tree, branches first,
    /// each kind sorted by name.
    ///
    /// A missing `branch/` or `release/` directory contributes nothing;
    /// hidden entries and plain files are ignored. Nothing is copied.
    pub fn scan(&self) -> Result<Vec<VersionFolder>, MirrorError> {
        let mut folders = Vec::new();
        for kind in [RefKind::Branch, RefKind::Tag] {
            let mut names = self.scan_kind(kind)?;
            names.sort();
            folders.extend(
                names
                    .iter()
                    .map(|name| VersionFolder::existing(&self.root, kind, name)),
            );
        }
        Ok(folders)
    }

    fn scan_kind(&self, kind: RefKind) -> Result<Vec<String>, MirrorError> {
        let dir = self.root.join(kind.folder());
        if !dir.is_dir() {
            debug!("No {:?} directory in tree", dir);
            return Ok(Vec::new());
        }

        let mut names = Vec::new();
        let mut walker = WalkDir::new(&dir)
            .min_depth(1)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| !is_hidden(entry));

        while let Some(entry) = walker.next() {
            let entry = entry.map_err(|e| MirrorError::materialize(&dir, e.to_string()))?;
            if !entry.file_type().is_dir() {
                continue;
            }
            let path = entry.path();
            if find_config_document(path).is_none() && has_visible_subdirectory(path)? {
                continue;
            }

            walker.skip_current_dir();
            match folder_name(&dir, path) {
                Some(name) => names.push(name),
                None => warn!("Skipping version folder with non UTF-8 name: {:?}", path),
            }
        }
        Ok(names)
    }

    /// Scans the tree and copies every version folder into a new
    /// generation.
    fn snapshot(&self) -> Result<Vec<VersionFolder>, MirrorError> {
        let found = self.scan()?;
        let generation = self.generations.begin()?;

        let mut folders = Vec::with_capacity(found.len());
        for folder in &found {
            let copy = folder.rebased(&generation);
            if let Err(e) = copy_tree(folder.path(), copy.path()) {
                self.generations.abandon();
                return Err(e);
            }
            folders.push(copy);
        }

        info!(
            count = folders.len(),
            generation = %generation.display(),
            "Copied version folders"
        );
        Ok(folders)
    }
}

#[async_trait]
impl VersionSource for LocalTree {
    async fn materialize(&self) -> Result<Vec<VersionFolder>, MirrorError> {
        let tree = self.clone();
        tokio::task::spawn_blocking(move || tree.snapshot())
            .await
            .map_err(|e| MirrorError::git(format!("Scan task failed: {}", e)))?
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn tree_root(&self) -> &Path {
        self.generations.root()
    }

    fn commit(&self) {
        self.generations.commit();
    }

    fn abandon(&self) {
        self.generations.abandon();
    }
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry.file_name().to_string_lossy().starts_with('.')
}

fn has_visible_subdirectory(path: &Path) -> Result<bool, MirrorError> {
    for entry in fs::read_dir(path)? {
        let entry = entry?;
        if entry.file_type()?.is_dir() && !entry.file_name().to_string_lossy().starts_with('.') {
            return Ok(true);
        }
    }
    Ok(false)
}

/// `feature/pxe` for `<dir>/feature/pxe`.
fn folder_name(dir: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(dir).ok()?;
    let parts = relative
        .components()
        .map(|c| c.as_os_str().to_str())
        .collect::<Option<Vec<_>>>()?;
    Some(parts.join("/"))
}

/// Copies `source` to `destination`, keeping symlinks as links.
fn copy_tree(source: &Path, destination: &Path) -> Result<(), MirrorError> {
    fs::create_dir_all(destination)?;
    for entry in WalkDir::new(source).min_depth(1) {
        let entry = entry.map_err(|e| MirrorError::materialize(source, e.to_string()))?;
        let relative = entry
            .path()
            .strip_prefix(source)
            .map_err(|e| MirrorError::materialize(source, e.to_string()))?;
        let target = destination.join(relative);

        let file_type = entry.file_type();
        if file_type.is_dir() {
            fs::create_dir_all(&target)?;
        } else if file_type.is_symlink() {
            copy_symlink(entry.path(), &target)?;
        } else {
            fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}

#[cfg(unix)]
fn copy_symlink(link: &Path, target: &Path) -> std::io::Result<()> {
    std::os::unix::fs::symlink(fs::read_link(link)?, target)
}

#[cfg(not(unix))]
fn copy_symlink(link: &Path, target: &Path) -> std::io::Result<()> {
    fs::copy(link, target).map(|_| ())
}
