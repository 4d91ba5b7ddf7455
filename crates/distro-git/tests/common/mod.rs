#![allow(dead_code)]
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use tempfile::TempDir;

/// Returns true when the `git` CLI can be used to build fixtures.
pub fn git_available() -> bool {
    Command::new("git")
        .arg("--version")
        .output()
        .is_ok_and(|output| output.status.success())
}

/// Runs a git command in `dir`, panicking on failure.
pub fn git(dir: &Path, args: &[&str]) -> String {
    let output = Command::new("git")
        .args([
            "-c",
            "user.name=Distro Test",
            "-c",
            "user.email=distro@example.com",
            "-c",
            "commit.gpgsign=false",
            "-c",
            "tag.gpgsign=false",
        ])
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
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}

pub fn write(root: &Path, relative: &str, content: &str) {
    let path = root.join(relative);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("Failed to create parent directory");
    }
    fs::write(path, content).expect("Failed to write fixture file");
}

/// An origin repository with branches `master` and `dev` and the annotated
/// tag `v1.0`, plus scratch space for the mirror and the tree.
pub struct Fixture {
    pub dir: TempDir,
}

impl Fixture {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let origin = dir.path().join("origin");
        fs::create_dir_all(&origin).unwrap();

        git(&origin, &["init", "-q"]);
        git(&origin, &["symbolic-ref", "HEAD", "refs/heads/master"]);

        write(&origin, "config.yaml", "vars:\n  release: \"1.0\"\n");
        write(&origin, "files/boot.txt", "boot v1\n");
        git(&origin, &["add", "."]);
        git(&origin, &["commit", "-q", "-m", "initial"]);
        git(&origin, &["tag", "-a", "v1.0", "-m", "release 1.0"]);

        git(&origin, &["checkout", "-q", "-b", "dev"]);
        write(&origin, "files/boot.txt", "boot dev\n");
        git(&origin, &["commit", "-q", "-am", "dev boot"]);

        git(&origin, &["checkout", "-q", "master"]);
        write(&origin, "files/extra.txt", "master only\n");
        git(&origin, &["add", "."]);
        git(&origin, &["commit", "-q", "-m", "master extra"]);

        Self { dir }
    }

    pub fn origin(&self) -> PathBuf {
        self.dir.path().join("origin")
    }

    pub fn mirror_path(&self) -> PathBuf {
        self.dir.path().join("mirror")
    }

    pub fn tree(&self) -> PathBuf {
        self.dir.path().join("tree")
    }

    pub fn rev_parse(&self, spec: &str) -> String {
        git(&self.origin(), &["rev-parse", spec])
    }
}
