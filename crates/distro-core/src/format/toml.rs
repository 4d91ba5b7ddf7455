use std::path::Path;

use crate::config::ConfigDocument;
use crate::error::{ConfigError, Result};
use crate::format::FormatParser;

pub struct TomlFormat;

impl FormatParser for TomlFormat {
    fn parse(&self, origin: &Path, input: &str) -> Result<ConfigDocument> {
        ::toml::from_str(input).map_err(|e| ConfigError::parse(origin, e.to_string()))
    }
}
