pub mod cache;
pub mod config;
pub mod engine;
pub mod error;
pub mod ignore_set;
pub mod output;
pub mod runner;
pub mod walker;

pub use cache::{cache_key, ArtifactCache, DirCache, NoopCache};
pub use config::{
    decode_document, find_config_file, find_editorconfig, load_config, merge_config,
    ConfigDocument, EditorConfig, EditorConfigDefinition, ResolvedConfig, CONFIG_FILE_NAMES,
};
pub use engine::{CommandEngine, Engine, EngineOutput, NO_PARSER_EXIT_CODE};
pub use error::{ConfigError, EngineError, FileError, RunError};
pub use ignore_set::{IgnoreMatcher, IgnoreSet, DEFAULT_IGNORE_FILE};
pub use output::{OutputMode, OutputSink};
pub use runner::{FileOutcome, RunArgs, RunSummary, Runner};
pub use walker::{expand_patterns, ExpandOptions, ExpandedPath};

/// Map a run's outcome to the process exit status: 0 when clean, 1 otherwise.
pub fn exit_code(result: &Result<RunSummary, RunError>) -> u8 {
    match result {
        Ok(_) => 0,
        Err(_) => 1,
    }
}
