#![allow(dead_code)]
use std::fs;
use std::path::Path;

use tempfile::TempDir;

/// Creates an empty version folder in a fresh temporary directory.
pub fn folder() -> TempDir {
    tempfile::tempdir().expect("Failed to create temp folder")
}

/// Writes `content` to `relative` inside `root`, creating parent directories.
pub fn write(root: &Path, relative: &str, content: &str) {
    let path = root.join(relative);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("Failed to create parent directory");
    }
    fs::write(path, content).expect("Failed to write fixture file");
}

/// A folder document mounting one static and one template endpoint.
pub const MIXED_YAML: &str = r#"
endpoints:
  static:
    foo:
      source: files
  template:
    bar:
      template_path: templates
      default_template: index.txt
      content_type: text/plain
vars:
  region: eu-west
"#;
