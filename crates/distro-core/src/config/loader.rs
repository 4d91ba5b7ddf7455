use std::fs;
use std::path::{Path, PathBuf};

use super::document::ConfigDocument;
use crate::error::Result;
use crate::format::ConfigFormat;

/// File stem of a folder's configuration document.
pub const CONFIG_STEM: &str = "config";

/// Finds the configuration document of a version folder.
///
/// The folder root is searched before its `config/` directory; within a
/// directory the first extension in [`ConfigFormat::ALL`] order wins.
pub fn find_config_document(folder: &Path) -> Option<PathBuf> {
    [folder.to_path_buf(), folder.join(CONFIG_STEM)]
        .into_iter()
        .flat_map(|dir| {
            ConfigFormat::ALL
                .iter()
                .flat_map(|format| format.extensions().iter())
                .map(move |ext| dir.join(format!("{CONFIG_STEM}.{ext}")))
        })
        .find(|candidate| candidate.is_file())
}

pub(crate) fn read_document(path: &Path) -> Result<ConfigDocument> {
    let format = ConfigFormat::from_path(path)?;
    let content = fs::read_to_string(path)?;
    format.parser().parse(path, &content)
}
