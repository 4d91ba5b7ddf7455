//! Git reference types.

use std::fmt;

use gix::ObjectId;

/// Kind of a mirrored reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RefKind {
    /// A remote-tracking branch (e.g., "master", "feature/pxe").
    Branch,
    /// A tag (e.g., "v1.0").
    Tag,
}

impl RefKind {
    /// Top-level directory of the version tree holding this kind.
    pub fn folder(&self) -> &'static str {
        match self {
            Self::Branch => "branch",
            Self::Tag => "release",
        }
    }

    /// Maps a top-level tree directory back to its kind.
    pub fn from_folder(folder: &str) -> Option<Self> {
        match folder {
            "branch" => Some(Self::Branch),
            "release" => Some(Self::Tag),
            _ => None,
        }
    }
}

/// A named pointer to a commit.
///
/// For tags, `target` is the commit the tag resolves to, never the id of an
/// annotated tag object.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Reference {
    kind: RefKind,
    name: String,
    target: ObjectId,
}

impl Reference {
    /// Creates a branch reference.
    pub fn branch(name: impl Into<String>, target: ObjectId) -> Self {
        Self {
            kind: RefKind::Branch,
            name: name.into(),
            target,
        }
    }

    /// Creates a tag reference.
    pub fn tag(name: impl Into<String>, target: ObjectId) -> Self {
        Self {
            kind: RefKind::Tag,
            name: name.into(),
            target,
        }
    }

    /// Returns the kind of reference.
    pub fn kind(&self) -> RefKind {
        self.kind
    }

    /// Returns the reference name without prefix.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the commit this reference points at.
    pub fn target(&self) -> ObjectId {
        self.target
    }

    /// Returns the path of the version folder, relative to the tree root.
    pub fn relative_path(&self) -> String {
        format!("{}/{}", self.kind.folder(), self.name)
    }

    /// Validates that the name can be used as a folder below the tree root
    /// and as a URL prefix.
    ///
    /// Returns an error message if the name is invalid.
    pub fn validate(&self) -> Result<(), &'static str> {
        let name = self.name();

        if name.is_empty() {
            return Err("reference name cannot be empty");
        }

        if name.starts_with('/') || name.ends_with('/') {
            return Err("reference name cannot start or end with '/'");
        }

        if name.contains("..") {
            return Err("reference name cannot contain '..'");
        }

        if name.contains("//") {
            return Err("reference name cannot contain '//'");
        }

        if name.split('/').any(|segment| segment == ".") {
            return Err("reference name cannot contain '.' segments");
        }

        // Check for invalid characters
        for c in name.chars() {
            if c.is_control()
                || c == '\\'
                || c == '~'
                || c == '^'
                || c == ':'
                || c == '?'
                || c == '*'
                || c == '['
                || c == '{'
                || c == '}'
            {
                return Err("reference name contains invalid characters");
            }
        }

        Ok(())
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            RefKind::Branch => write!(f, "{}", self.name),
            RefKind::Tag => write!(f, "tags/{}", self.name),
        }
    }
}
