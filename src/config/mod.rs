//! Configuration resolution for rprettier.
//!
//! This module provides:
//! - Untyped formatter-config documents decoded from JSON, YAML or TOML
//! - Config file discovery (search upward from the working directory)
//! - `.editorconfig` resolution and mapping onto engine options
//! - Per-file merging of editorconfig, formatter config and overrides

mod document;
mod editorconfig;
mod file;
mod merge;

pub use document::{decode_document, overlay, ConfigDocument, FILEPATH_KEY};
pub use editorconfig::{
    find_editorconfig, EditorConfig, EditorConfigDefinition, EndOfLine, IndentSize, IndentStyle,
    QuoteType, EDITORCONFIG_NAME,
};
pub use file::{
    find_config_file, find_file_upward, load_config, load_config_or_empty, CONFIG_FILE_NAMES,
};
pub use merge::{merge_config, ResolvedConfig};
