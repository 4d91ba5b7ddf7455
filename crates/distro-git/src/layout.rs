//! Layout of the version-folder tree.
//!
//! ```text
//! <generation>/
//!   branch/<branch name>/...
//!   release/<tag name>/...
//! ```

use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::error::MirrorError;
use crate::repository::{RefKind, Reference};

/// One version folder of the tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionFolder {
    relative_path: String,
    reference: Option<Reference>,
    path: PathBuf,
}

impl VersionFolder {
    /// The folder a reference is materialized into.
    pub fn for_reference(tree_root: &Path, reference: &Reference) -> Self {
        let relative_path = reference.relative_path();
        Self {
            path: tree_root.join(&relative_path),
            relative_path,
            reference: Some(reference.clone()),
        }
    }

    /// A folder found on disk, without reference information.
    pub fn existing(tree_root: &Path, kind: RefKind, name: &str) -> Self {
        let relative_path = format!("{}/{}", kind.folder(), name);
        Self {
            path: tree_root.join(&relative_path),
            relative_path,
            reference: None,
        }
    }

    /// `branch/<name>` or `release/<name>`.
    pub fn relative_path(&self) -> &str {
        &self.relative_path
    }

    /// The reference this folder was materialized from, if known.
    pub fn reference(&self) -> Option<&Reference> {
        self.reference.as_ref()
    }

    /// Absolute path of the folder.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The same folder below another root.
    pub fn rebased(&self, tree_root: &Path) -> Self {
        Self {
            relative_path: self.relative_path.clone(),
            reference: self.reference.clone(),
            path: tree_root.join(&self.relative_path),
        }
    }

    /// URL prefix the folder is mounted under, e.g. `/branch/master/`.
    ///
    /// Every path segment is percent-encoded, so `release/v1.0+ü` mounts as
    /// `/release/v1.0%2B%C3%BC/`.
    pub fn url_prefix(&self) -> String {
        let mut prefix = String::with_capacity(self.relative_path.len() + 2);
        for segment in self.relative_path.split('/') {
            prefix.push('/');
            prefix.push_str(&urlencoding::encode(segment));
        }
        prefix.push('/');
        prefix
    }
}

/// Prefix of generation directory names.
const GENERATION_PREFIX: &str = "gen-";

/// Published generations kept on disk: the current one and the one before
/// it, which may still be finishing requests.
const KEEP_PUBLISHED: usize = 2;

/// Per-rebuild directories below a store root.
///
/// ```text
/// <store root>/
///   gen-1/branch/master/...
///   gen-2/branch/master/...
/// ```
///
/// Every materialization writes a fresh `gen-<n>` directory, so folders
/// served by a published snapshot are never written again. A generation is
/// either committed once its routes are published or abandoned.
#[derive(Debug)]
pub struct GenerationStore {
    root: PathBuf,
    state: Mutex<StoreState>,
}

#[derive(Debug, Default)]
struct StoreState {
    next: Option<u64>,
    pending: Option<PathBuf>,
    published: VecDeque<PathBuf>,
}

impl GenerationStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            state: Mutex::new(StoreState::default()),
        }
    }

    /// Directory holding the generations.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Creates an empty generation directory and makes it the pending one.
    ///
    /// A previous pending generation that was neither committed nor
    /// abandoned is removed first.
    pub fn begin(&self) -> Result<PathBuf, MirrorError> {
        let mut state = self.state.lock();
        if let Some(stale) = state.pending.take() {
            remove_generation(&stale);
        }

        fs::create_dir_all(&self.root)?;
        let next = match state.next {
            Some(next) => next,
            None => existing_generations(&self.root)?
                .into_iter()
                .map(|(number, _)| number + 1)
                .max()
                .unwrap_or(1),
        };

        let dir = self.root.join(format!("{}{}", GENERATION_PREFIX, next));
        fs::create_dir(&dir)?;
        state.next = Some(next + 1);
        state.pending = Some(dir.clone());
        debug!(generation = %dir.display(), "Started generation");
        Ok(dir)
    }

    /// Marks the pending generation as published and removes every
    /// generation older than the previously published one.
    ///
    /// Returns the number of removed generations.
    pub fn commit(&self) -> usize {
        let mut state = self.state.lock();
        let Some(current) = state.pending.take() else {
            return 0;
        };
        state.published.push_back(current);
        while state.published.len() > KEEP_PUBLISHED {
            state.published.pop_front();
        }

        let generations = match existing_generations(&self.root) {
            Ok(generations) => generations,
            Err(e) => {
                warn!("Failed to list generations in {:?}: {}", self.root, e);
                return 0;
            },
        };

        let mut removed = 0;
        for (_, dir) in generations {
            if !state.published.contains(&dir) {
                remove_generation(&dir);
                removed += 1;
            }
        }
        if removed > 0 {
            info!(removed, "Retired old generations");
        }
        removed
    }

    /// Removes the pending generation.
    pub fn abandon(&self) {
        if let Some(dir) = self.state.lock().pending.take() {
            info!(generation = %dir.display(), "Abandoning unpublished generation");
            remove_generation(&dir);
        }
    }
}

/// `gen-<n>` directories directly below `root`, sorted by number.
fn existing_generations(root: &Path) -> Result<Vec<(u64, PathBuf)>, MirrorError> {
    if !root.is_dir() {
        return Ok(Vec::new());
    }

    let mut generations = Vec::new();
    for entry in fs::read_dir(root)? {
        let entry = entry?;
        let name = entry.file_name();
        let Some(number) = name
            .to_str()
            .and_then(|n| n.strip_prefix(GENERATION_PREFIX))
            .and_then(|n| n.parse::<u64>().ok())
        else {
            continue;
        };
        if entry.file_type()?.is_dir() {
            generations.push((number, entry.path()));
        }
    }
    generations.sort();
    Ok(generations)
}

fn remove_generation(dir: &Path) {
    if let Err(e) = fs::remove_dir_all(dir)
        && e.kind() != std::io::ErrorKind::NotFound
    {
        warn!("Failed to remove generation {:?}: {}", dir, e);
    }
}
