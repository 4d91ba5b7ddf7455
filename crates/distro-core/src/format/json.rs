use std::path::Path;

use crate::config::ConfigDocument;
use crate::error::{ConfigError, Result};
use crate::format::FormatParser;

pub struct JsonFormat;

impl FormatParser for JsonFormat {
    fn parse(&self, origin: &Path, input: &str) -> Result<ConfigDocument> {
        serde_json::from_str(input).map_err(|e| ConfigError::parse(origin, e.to_string()))
    }
}
