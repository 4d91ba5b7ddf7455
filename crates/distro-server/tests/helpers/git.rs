//! Origin repositories built with the `git` CLI.

use std::path::{Path, PathBuf};
use std::process::Command;

use tempfile::TempDir;

pub fn git_available() -> bool {
    Command::new("git")
        .arg("--version")
        .output()
        .is_ok_and(|output| output.status.success())
}

pub fn git(dir: &Path, args: &[&str]) {
    let output = Command::new("git")
        .args(["-c", "user.name=Distro Test", "-c", "user.email=distro@example.com"])
        .args(["-c", "commit.gpgsign=false", "-c", "tag.gpgsign=false"])
        .args(args)
        .current_dir(dir)
        .env("GIT_CONFIG_NOSYSTEM", "1")
        .env("GIT_CONFIG_GLOBAL", "/dev/null")
        .output()
        .expect("Failed to run git");
    assert!(
        output.status.success(),
        "git {:?} failed: {}",
        args,
        String::from_utf8_lossy(&output.stderr)
    );
}

/// Origin with `master`, `dev` and the annotated tag `v1.0`, each serving
/// `files/boot.txt` under the static mount `files`.
pub struct Origin {
    dir: TempDir,
}

impl Origin {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let origin = Self { dir };
        let repo = origin.repo();
        std::fs::create_dir_all(&repo).unwrap();

        git(&repo, &["init", "-q"]);
        git(&repo, &["symbolic-ref", "HEAD", "refs/heads/master"]);
        origin.write("config.yaml", "endpoints:\n  static:\n    files:\n      source: files\n");
        origin.write("files/boot.txt", "boot v1\n");
        origin.commit("initial");
        git(&repo, &["tag", "-a", "v1.0", "-m", "release 1.0"]);

        git(&repo, &["checkout", "-q", "-b", "dev"]);
        origin.write("files/boot.txt", "boot dev\n");
        origin.commit("dev boot");

        git(&repo, &["checkout", "-q", "master"]);
        origin
    }

    pub fn repo(&self) -> PathBuf {
        self.dir.path().join("origin")
    }

    pub fn mirror_path(&self) -> PathBuf {
        self.dir.path().join("mirror")
    }

    pub fn tree(&self) -> PathBuf {
        self.dir.path().join("tree")
    }

    pub fn write(&self, relative: &str, content: &str) {
        let path = self.repo().join(relative);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    pub fn commit(&self, message: &str) {
        git(&self.repo(), &["add", "-A"]);
        git(&self.repo(), &["commit", "-q", "-m", message]);
    }
}
