//! Document formats accepted for a folder's configuration.

use std::path::Path;

use crate::config::ConfigDocument;
use crate::error::{ConfigError, Result};

pub mod json;
pub mod toml;
pub mod yaml;

/// Supported configuration formats, in lookup order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Yaml,
    Json,
    Toml,
}

impl ConfigFormat {
    /// Every format, in the order folders are searched.
    pub const ALL: [ConfigFormat; 3] = [ConfigFormat::Yaml, ConfigFormat::Json, ConfigFormat::Toml];

    /// Returns the file extensions associated with this format.
    pub fn extensions(&self) -> &'static [&'static str] {
        match self {
            ConfigFormat::Yaml => &["yaml", "yml"],
            ConfigFormat::Json => &["json"],
            ConfigFormat::Toml => &["toml"],
        }
    }

    /// Guesses the format from a file extension (without dot).
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "yaml" | "yml" => Some(ConfigFormat::Yaml),
            "json" => Some(ConfigFormat::Json),
            "toml" => Some(ConfigFormat::Toml),
            _ => None,
        }
    }

    /// Determines the format of a document from its path.
    pub fn from_path(path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .and_then(|ext| ext.to_str())
            .unwrap_or_default();
        Self::from_extension(ext).ok_or_else(|| ConfigError::UnsupportedFormat(ext.to_string()))
    }

    /// Returns the parser for this format.
    pub fn parser(&self) -> &'static dyn FormatParser {
        match self {
            ConfigFormat::Yaml => &yaml::YamlFormat,
            ConfigFormat::Json => &json::JsonFormat,
            ConfigFormat::Toml => &toml::TomlFormat,
        }
    }
}

/// A trait for parsing a configuration document from a string.
pub trait FormatParser: Send + Sync {
    /// Parses the input read from `origin` into a ConfigDocument.
    fn parse(&self, origin: &Path, input: &str) -> Result<ConfigDocument>;
}
