//! On-disk version trees and version sources for tests.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use distro_git::{LocalTree, MirrorError, VersionFolder, VersionSource};
use distro_server::{HotReloadServer, ServerOptions};
use tempfile::TempDir;
use tokio::sync::Notify;

/// A static `foo` mount and a template `bar` mount.
pub const FOO_AND_BAR: &str = r#"
endpoints:
  static:
    foo:
      source: files
  template:
    bar:
      template_path: templates
      default_template: default.txt
      content_type: text/plain
      filename_template: "{{ params.role }}"
vars:
  site: lab
"#;

/// A version tree in a temporary directory.
pub struct Tree {
    dir: TempDir,
}

impl Tree {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().expect("Failed to create temp dir"),
        }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn path(&self, relative: &str) -> PathBuf {
        self.dir.path().join(relative)
    }

    pub fn write(&self, relative: &str, content: &str) -> &Self {
        let path = self.path(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("Failed to create parent directory");
        }
        fs::write(path, content).expect("Failed to write fixture file");
        self
    }

    pub fn remove(&self, relative: &str) -> &Self {
        let path = self.path(relative);
        if path.is_dir() {
            fs::remove_dir_all(path).expect("Failed to remove fixture directory");
        } else {
            fs::remove_file(path).expect("Failed to remove fixture file");
        }
        self
    }

    /// Writes a folder with the `foo` and `bar` endpoints.
    pub fn foo_and_bar(&self, folder: &str, boot: &str) -> &Self {
        self.write(&format!("{folder}/config.yaml"), FOO_AND_BAR)
            .write(&format!("{folder}/files/boot.txt"), boot)
            .write(
                &format!("{folder}/templates/default.txt"),
                "default for {{ vars.site }}\n",
            )
            .write(
                &format!("{folder}/templates/compute.txt"),
                "compute {{ params.id }} at {{ base_url }}\n",
            )
    }

    /// A server serving copies of this tree.
    pub fn server(&self) -> Arc<HotReloadServer> {
        HotReloadServer::new(Arc::new(LocalTree::new(self.root())), ServerOptions::default())
    }

    pub fn server_with(&self, options: ServerOptions) -> Arc<HotReloadServer> {
        HotReloadServer::new(Arc::new(LocalTree::new(self.root())), options)
    }
}

/// Wraps a [`LocalTree`], failing on demand and optionally pausing until
/// released.
pub struct FlakySource {
    inner: LocalTree,
    fail: AtomicBool,
    hold: AtomicBool,
    calls: AtomicUsize,
    active: AtomicUsize,
    max_active: AtomicUsize,
    entered: Notify,
    release: Notify,
}

impl FlakySource {
    pub fn new(root: &Path) -> Arc<Self> {
        Arc::new(Self {
            inner: LocalTree::new(root),
            fail: AtomicBool::new(false),
            hold: AtomicBool::new(false),
            calls: AtomicUsize::new(0),
            active: AtomicUsize::new(0),
            max_active: AtomicUsize::new(0),
            entered: Notify::new(),
            release: Notify::new(),
        })
    }

    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    /// Makes the next materialization wait for [`release`](Self::release).
    pub fn hold_next(&self) {
        self.hold.store(true, Ordering::SeqCst);
    }

    /// Resolves once a held materialization has started.
    pub async fn wait_entered(&self) {
        self.entered.notified().await;
    }

    pub fn release(&self) {
        self.release.notify_one();
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Highest number of materializations seen running at once.
    pub fn max_active(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }

    async fn run(&self) -> Result<Vec<VersionFolder>, MirrorError> {
        if self.hold.swap(false, Ordering::SeqCst) {
            self.entered.notify_one();
            self.release.notified().await;
        }
        if self.fail.load(Ordering::SeqCst) {
            return Err(MirrorError::unavailable("remote unreachable"));
        }
        self.inner.materialize().await
    }
}

#[async_trait]
impl VersionSource for FlakySource {
    async fn materialize(&self) -> Result<Vec<VersionFolder>, MirrorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(active, Ordering::SeqCst);
        let result = self.run().await;
        self.active.fetch_sub(1, Ordering::SeqCst);
        result
    }

    fn name(&self) -> &str {
        "flaky"
    }

    fn tree_root(&self) -> &Path {
        self.inner.tree_root()
    }

    fn commit(&self) {
        self.inner.commit();
    }

    fn abandon(&self) {
        self.inner.abandon();
    }
}
