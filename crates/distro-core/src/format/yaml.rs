use std::path::Path;

use crate::config::ConfigDocument;
use crate::error::{ConfigError, Result};
use crate::format::FormatParser;

pub struct YamlFormat;

impl FormatParser for YamlFormat {
    fn parse(&self, origin: &Path, input: &str) -> Result<ConfigDocument> {
        // An empty YAML stream is a folder with nothing mounted.
        if input.trim().is_empty() {
            return Ok(ConfigDocument::default());
        }
        serde_yaml::from_str(input).map_err(|e| ConfigError::parse(origin, e.to_string()))
    }
}
