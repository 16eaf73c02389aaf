//! Config file discovery and loading

use std::fs;
use std::path::{Path, PathBuf};

use tracing::warn;

use super::document::{decode_document, ConfigDocument};
use crate::error::ConfigError;

/// Conventional formatter-config names, in the order they are tried per directory.
pub const CONFIG_FILE_NAMES: [&str; 5] = [
    ".prettierrc",
    ".prettierrc.json",
    ".prettierrc.yaml",
    ".prettierrc.yml",
    ".prettierrc.toml",
];

/// Search upward from `start_dir` for the first directory containing any of `names`.
///
/// Within one directory the names are tried in order, so the first listed name wins.
/// Returns `None` if no directory up to the filesystem root has a match.
pub fn find_file_upward(start_dir: &Path, names: &[&str]) -> Option<PathBuf> {
    let mut current = start_dir.to_path_buf();

    loop {
        for name in names {
            let file_path = current.join(name);
            if file_path.is_file() {
                return Some(file_path);
            }
        }

        if !current.pop() {
            return None;
        }
    }
}

/// Find the nearest formatter config by searching upward from the given directory.
pub fn find_config_file(start_dir: &Path) -> Option<PathBuf> {
    find_file_upward(start_dir, &CONFIG_FILE_NAMES)
}

/// Read and decode a formatter config file.
pub fn load_config(path: &Path) -> Result<ConfigDocument, ConfigError> {
    let bytes = fs::read(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    decode_document(&bytes).map_err(|message| ConfigError::Invalid {
        path: path.to_path_buf(),
        message,
    })
}

/// Load a config file, degrading any failure to an empty document with a warning.
pub fn load_config_or_empty(path: &Path) -> ConfigDocument {
    match load_config(path) {
        Ok(doc) => doc,
        Err(e) => {
            warn!("{e}");
            ConfigDocument::new()
        }
    }
}
