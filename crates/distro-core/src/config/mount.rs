//! Endpoint mount paths.
//!
//! Endpoint names in a folder document are relative URL paths such as
//! `foo`, `/foo/` or `./docs/../foo`. They are normalized lexically into a
//! [`MountPath`], which is also the identity used to detect duplicates.

use std::fmt;

use crate::error::{ConfigError, Result};

/// Paths a folder document may not claim for its own endpoints.
pub const RESERVED_PATHS: &[&str] = &["/health"];

/// How requests beneath a mount are matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MountStyle {
    /// Matches `/name` exactly and everything below `/name/`.
    Resource,
    /// Matches `/name/` and everything below it.
    Directory,
}

/// A normalized endpoint path, always rooted and without a trailing slash.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MountPath(String);

impl MountPath {
    /// Normalizes and validates a raw endpoint name.
    pub fn parse(raw: &str) -> Result<Self> {
        let cleaned = clean(raw);
        if cleaned == "/" {
            return Err(ConfigError::invalid_mount(
                raw,
                "endpoint path cannot be the folder root",
            ));
        }

        for segment in cleaned.split('/').skip(1) {
            if segment.starts_with(':') || segment.starts_with('*') {
                return Err(ConfigError::invalid_mount(
                    raw,
                    "path segments cannot start with ':' or '*'",
                ));
            }
            if segment.contains(['{', '}']) {
                return Err(ConfigError::invalid_mount(
                    raw,
                    "path segments cannot contain '{' or '}'",
                ));
            }
            if segment.chars().any(char::is_control) {
                return Err(ConfigError::invalid_mount(
                    raw,
                    "path segments cannot contain control characters",
                ));
            }
        }

        if RESERVED_PATHS.contains(&cleaned.as_str()) {
            return Err(ConfigError::invalid_mount(raw, "path is reserved"));
        }

        Ok(Self(cleaned))
    }

    /// The normalized path, e.g. `/foo`.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The path routes are registered under for the given style:
    /// `/foo/` for directories, `/foo` for resources.
    pub fn route_path(&self, style: MountStyle) -> String {
        match style {
            MountStyle::Directory => format!("{}/", self.0),
            MountStyle::Resource => self.0.clone(),
        }
    }
}

impl fmt::Display for MountPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lexically cleans a slash-separated path and roots it at `/`.
///
/// Empty and `.` segments are dropped, `..` removes the previous segment
/// and never climbs above the root.
pub fn clean(raw: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();
    for segment in raw.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }
    format!("/{}", segments.join("/"))
}
