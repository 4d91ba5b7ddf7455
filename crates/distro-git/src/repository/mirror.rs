//! Bare repository mirror using gix (pure Rust).

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use gix::bstr::{BString, ByteSlice};
use parking_lot::RwLock;
use tracing::{debug, info, instrument, warn};

use super::enumerate::RefEnumerator;
use super::materialize::WorktreeMaterializer;
use super::MirrorConfig;
use crate::error::MirrorError;
use crate::layout::{GenerationStore, VersionFolder};
use crate::source::VersionSource;

/// State of the mirror.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MirrorState {
    /// Mirror has not been cloned yet.
    NotCloned,
    /// Mirror is currently being cloned.
    Cloning,
    /// Mirror is ready for use.
    Ready,
    /// Mirror is fetching from the remote.
    Fetching,
    /// The last clone attempt failed.
    Error(String),
}

/// Outcome of bringing the mirror up to date.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// The mirror was created.
    Cloned,
    /// New objects or ref updates were received.
    Updated,
    /// The remote had nothing new.
    UpToDate,
}

/// A local bare mirror of a remote repository and the version tree
/// materialized from it.
///
/// The first sync clones the remote; later syncs fetch incrementally. Every
/// [`materialize`](Self::materialize) call checks out all branches and tags
/// into a new generation, `<tree root>/gen-<n>/branch/<name>` and
/// `<tree root>/gen-<n>/release/<tag>`.
pub struct RepositoryMirror {
    config: MirrorConfig,
    generations: GenerationStore,
    state: Arc<RwLock<MirrorState>>,
}

impl RepositoryMirror {
    /// Creates a new RepositoryMirror instance.
    pub fn new(config: MirrorConfig, tree_root: impl Into<PathBuf>) -> Self {
        let state = if is_mirror(config.mirror_path()) {
            MirrorState::Ready
        } else {
            MirrorState::NotCloned
        };

        Self {
            config,
            generations: GenerationStore::new(tree_root),
            state: Arc::new(RwLock::new(state)),
        }
    }

    /// Returns the current mirror state.
    pub fn state(&self) -> MirrorState {
        self.state.read().clone()
    }

    /// Returns the configuration.
    pub fn config(&self) -> &MirrorConfig {
        &self.config
    }

    /// Returns the directory holding the generations.
    pub fn tree_root(&self) -> &Path {
        self.generations.root()
    }

    /// Marks the last materialized generation as served.
    pub fn commit(&self) {
        self.generations.commit();
    }

    /// Discards the last materialized generation.
    pub fn abandon(&self) {
        self.generations.abandon();
    }

    /// Checks if the mirror exists locally.
    pub fn exists_locally(&self) -> bool {
        is_mirror(self.config.mirror_path())
    }

    /// Clones the mirror on first use, fetches otherwise.
    pub async fn sync(&self) -> Result<SyncOutcome, MirrorError> {
        {
            let mut state = self.state.write();
            match *state {
                MirrorState::Cloning | MirrorState::Fetching => return Err(MirrorError::Busy),
                _ => {},
            }
            *state = if self.exists_locally() {
                MirrorState::Fetching
            } else {
                MirrorState::Cloning
            };
        }

        let result = if self.exists_locally() {
            self.fetch().await
        } else {
            self.clone_mirror().await
        };

        let mut state = self.state.write();
        match &result {
            Ok(_) => *state = MirrorState::Ready,
            Err(e) if !self.exists_locally() => *state = MirrorState::Error(e.to_string()),
            Err(_) => *state = MirrorState::Ready,
        }
        result
    }

    async fn clone_mirror(&self) -> Result<SyncOutcome, MirrorError> {
        let config = self.config.clone();
        info!(
            "Cloning mirror of {} into {:?}",
            self.config.uri(),
            self.config.mirror_path()
        );

        let result = run_with_deadline("clone", self.config.clone_timeout(), move |interrupt| {
            clone_blocking(&config, interrupt)
        })
        .await;

        if result.is_err() {
            // A partial clone must not be mistaken for a mirror next time.
            let path = self.config.mirror_path();
            if path.exists()
                && let Err(e) = std::fs::remove_dir_all(path)
            {
                warn!("Failed to remove partial mirror {:?}: {}", path, e);
            }
        } else {
            info!("Mirror cloned successfully");
        }
        result
    }

    async fn fetch(&self) -> Result<SyncOutcome, MirrorError> {
        let config = self.config.clone();
        debug!("Fetching updates into {:?}", self.config.mirror_path());

        let outcome = run_with_deadline("fetch", self.config.fetch_timeout(), move |interrupt| {
            fetch_blocking(&config, interrupt)
        })
        .await?;

        match outcome {
            SyncOutcome::UpToDate => info!("Mirror already up to date"),
            _ => info!("Mirror fetched successfully"),
        }
        Ok(outcome)
    }

    /// Brings the mirror up to date and checks out every branch and tag
    /// into a new generation.
    ///
    /// Fails as a whole if the sync or any single checkout fails. The
    /// partial generation is removed; earlier generations are never
    /// touched.
    #[instrument(skip(self), fields(uri = %self.config.uri()))]
    pub async fn materialize(&self) -> Result<Vec<VersionFolder>, MirrorError> {
        self.sync().await?;

        let generation = self.generations.begin()?;
        let config = self.config.clone();
        let root = generation.clone();
        let result = run_with_deadline(
            "checkout",
            self.config.checkout_timeout(),
            move |interrupt| checkout_all_blocking(&config, &root, interrupt),
        )
        .await;

        match result {
            Ok(folders) => {
                info!(
                    count = folders.len(),
                    generation = %generation.display(),
                    "Materialized version folders"
                );
                Ok(folders)
            },
            Err(e) => {
                self.generations.abandon();
                Err(e)
            },
        }
    }
}

impl std::fmt::Debug for RepositoryMirror {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RepositoryMirror")
            .field("uri", &self.config.uri())
            .field("mirror_path", &self.config.mirror_path())
            .field("tree_root", &self.generations.root())
            .field("state", &self.state())
            .finish()
    }
}

#[async_trait]
impl VersionSource for RepositoryMirror {
    async fn materialize(&self) -> Result<Vec<VersionFolder>, MirrorError> {
        RepositoryMirror::materialize(self).await
    }

    fn name(&self) -> &str {
        self.config.uri()
    }

    fn tree_root(&self) -> &Path {
        self.generations.root()
    }

    fn commit(&self) {
        RepositoryMirror::commit(self);
    }

    fn abandon(&self) {
        RepositoryMirror::abandon(self);
    }
}

fn is_mirror(path: &Path) -> bool {
    path.join("HEAD").is_file() && path.join("objects").is_dir()
}

/// Runs blocking git work with a deadline.
///
/// On expiry the interrupt flag is raised and the task is awaited before
/// returning, so no blocking work outlives the call.
async fn run_with_deadline<T, F>(
    operation: &'static str,
    deadline: Duration,
    work: F,
) -> Result<T, MirrorError>
where
    T: Send + 'static,
    F: FnOnce(&AtomicBool) -> Result<T, MirrorError> + Send + 'static,
{
    let interrupt = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&interrupt);
    let mut task = tokio::task::spawn_blocking(move || work(&flag));

    match tokio::time::timeout(deadline, &mut task).await {
        Ok(joined) => {
            joined.map_err(|e| MirrorError::git(format!("{} task failed: {}", operation, e)))?
        },
        Err(_) => {
            warn!(
                "{} exceeded its deadline of {:?}, interrupting",
                operation, deadline
            );
            interrupt.store(true, Ordering::SeqCst);
            if let Err(e) = task.await {
                warn!("{} task failed after interrupt: {}", operation, e);
            }
            Err(MirrorError::Timeout {
                operation,
                seconds: deadline.as_secs(),
            })
        },
    }
}

fn open_options(config: &MirrorConfig) -> gix::open::Options {
    gix::open::Options::default().config_overrides(config.config_overrides())
}

/// Blocking bare clone using gix.
fn clone_blocking(config: &MirrorConfig, interrupt: &AtomicBool) -> Result<SyncOutcome, MirrorError> {
    let mirror_path = config.mirror_path();
    if let Some(parent) = mirror_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let uri = config.effective_uri();
    let url = gix::url::parse(uri.as_str().into())
        .map_err(|e| MirrorError::InvalidConfig(format!("Invalid URL: {}", e)))?;

    let mut prepare = gix::clone::PrepareFetch::new(
        url,
        mirror_path,
        gix::create::Kind::Bare,
        gix::create::Options::default(),
        open_options(config),
    )
    .map_err(|e| MirrorError::git(format!("Failed to prepare clone: {}", e)))?
    .with_remote_name(config.remote_name())
    .map_err(|e| MirrorError::InvalidConfig(format!("Invalid remote name: {}", e)))?
    .configure_remote(|remote| Ok(remote.with_fetch_tags(gix::remote::fetch::Tags::All)));

    prepare
        .fetch_only(gix::progress::Discard, interrupt)
        .map_err(|e| classify(interrupt, "Clone failed", e))?;

    Ok(SyncOutcome::Cloned)
}

/// Blocking incremental fetch using gix.
fn fetch_blocking(config: &MirrorConfig, interrupt: &AtomicBool) -> Result<SyncOutcome, MirrorError> {
    let repo = gix::open_opts(config.mirror_path(), open_options(config))
        .map_err(|e| MirrorError::git(format!("Failed to open mirror: {}", e)))?;

    let remote = repo
        .find_remote(config.remote_name())
        .map_err(|e| MirrorError::git(format!("Failed to find remote: {}", e)))?
        .with_fetch_tags(gix::remote::fetch::Tags::All);

    let outcome = remote
        .connect(gix::remote::Direction::Fetch)
        .map_err(|e| classify(interrupt, "Failed to connect", e))?
        .prepare_fetch(gix::progress::Discard, Default::default())
        .map_err(|e| classify(interrupt, "Failed to prepare fetch", e))?
        .receive(gix::progress::Discard, interrupt)
        .map_err(|e| classify(interrupt, "Fetch failed", e))?;

    let pruned = prune_deleted_refs(&repo, config.remote_name(), &outcome.ref_map.remote_refs)?;

    Ok(match outcome.status {
        gix::remote::fetch::Status::NoPackReceived { .. } if pruned == 0 => SyncOutcome::UpToDate,
        _ => SyncOutcome::Updated,
    })
}

/// Deletes remote-tracking branches and tags the remote no longer
/// advertises. Fetching never removes refs on its own.
fn prune_deleted_refs(
    repo: &gix::Repository,
    remote_name: &str,
    advertised: &[gix::protocol::handshake::Ref],
) -> Result<usize, MirrorError> {
    use gix::refs::transaction::{Change, PreviousValue, RefEdit, RefLog};

    let advertised: BTreeSet<BString> = advertised
        .iter()
        .map(|r| r.unpack().0.to_owned())
        .collect();
    let branch_prefix = format!("refs/remotes/{}/", remote_name);

    let platform = repo
        .references()
        .map_err(|e| MirrorError::git(format!("Failed to read references: {}", e)))?;
    let local = platform
        .remote_branches()
        .map_err(|e| MirrorError::git(format!("Failed to list branches: {}", e)))?
        .chain(
            platform
                .tags()
                .map_err(|e| MirrorError::git(format!("Failed to list tags: {}", e)))?,
        );

    let mut edits = Vec::new();
    for reference in local {
        let reference =
            reference.map_err(|e| MirrorError::git(format!("Failed to read reference: {}", e)))?;
        let full_name = reference.name().as_bstr();

        let upstream_name: BString = match full_name.strip_prefix(branch_prefix.as_bytes()) {
            Some(b"HEAD") => continue,
            Some(branch) => [b"refs/heads/".as_slice(), branch].concat().into(),
            None if full_name.starts_with(b"refs/tags/") => full_name.to_owned(),
            None => continue,
        };
        if advertised.contains(&upstream_name) {
            continue;
        }

        debug!(reference = %full_name, "Pruning reference deleted on the remote");
        edits.push(RefEdit {
            change: Change::Delete {
                expected: PreviousValue::Any,
                log: RefLog::AndReference,
            },
            name: reference.name().to_owned(),
            deref: false,
        });
    }

    if edits.is_empty() {
        return Ok(0);
    }
    let applied = repo
        .edit_references(edits)
        .map_err(|e| MirrorError::git(format!("Failed to prune references: {}", e)))?;
    info!(pruned = applied.len(), "Pruned references deleted on the remote");
    Ok(applied.len())
}

/// Checks out every reference of the mirror below an empty generation
/// directory.
fn checkout_all_blocking(
    config: &MirrorConfig,
    generation: &Path,
    interrupt: &AtomicBool,
) -> Result<Vec<VersionFolder>, MirrorError> {
    let repo = gix::open_opts(config.mirror_path(), open_options(config))
        .map_err(|e| MirrorError::git(format!("Failed to open mirror: {}", e)))?;

    let references = RefEnumerator::new(&repo, config.remote_name()).list()?;
    let materializer = WorktreeMaterializer::new(&repo);

    let mut folders = Vec::with_capacity(references.len());
    for reference in &references {
        if interrupt.load(Ordering::Relaxed) {
            return Err(MirrorError::Interrupted);
        }
        let folder = VersionFolder::for_reference(generation, reference);
        info!(
            reference = %reference,
            commit = %reference.target(),
            folder = folder.relative_path(),
            "Materializing version folder"
        );
        materializer.checkout(reference, folder.path(), interrupt)?;
        folders.push(folder);
    }

    Ok(folders)
}

/// Maps a transport failure to the error the caller can act on.
fn classify(interrupt: &AtomicBool, context: &str, error: impl std::fmt::Display) -> MirrorError {
    if interrupt.load(Ordering::Relaxed) {
        MirrorError::Interrupted
    } else {
        MirrorError::unavailable(format!("{}: {}", context, error))
    }
}
