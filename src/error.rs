//! Error types shared by the loader, engine adapter and runner

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Error type for formatter-config loading
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read
    #[error("unable to read config file \"{}\": {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    /// Neither decoder accepted the file
    #[error("invalid config file \"{}\": {message}", path.display())]
    Invalid { path: PathBuf, message: String },
}

/// Failure reported by an [`Engine`](crate::Engine) invocation
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("failed to start engine `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },
    #[error("engine i/o failed: {0}")]
    Io(#[from] io::Error),
    #[error("engine exited with status {code:?}: {stderr}")]
    Failed { code: Option<i32>, stderr: String },
}

/// Failure of a single file during the concurrent phase
#[derive(Debug, Error)]
pub enum FileError {
    /// Pattern resolution failed during expansion
    #[error("{0}")]
    Unmatched(String),
    #[error("unable to read file: {0}")]
    Read(#[source] io::Error),
    #[error("failed to write file: {0}")]
    Write(#[source] io::Error),
    #[error("failed to run formatter: {0}")]
    Engine(#[from] EngineError),
    #[error("cancelled before formatting")]
    Cancelled,
    /// The task formatting this file panicked or was aborted
    #[error("formatting task failed: {0}")]
    Task(String),
}

/// Terminal error of a whole run
#[derive(Debug, Error)]
pub enum RunError {
    /// The explicitly named config file could not be read
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// First hard per-file error, with the total number of failed files
    #[error("{}: {source} ({failed} file(s) failed)", path.display())]
    File {
        path: PathBuf,
        #[source]
        source: FileError,
        failed: usize,
    },
    #[error("code style issues found in {count} file(s)")]
    CheckFailed { count: usize },
    #[error("run cancelled")]
    Cancelled,
}

