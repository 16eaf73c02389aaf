//! Formatting engine boundary
//!
//! The engine is a black box: raw file bytes go in on stdin, the effective
//! configuration goes in as one JSON argument, formatted bytes come out on
//! stdout. Exit status 10 means no parser could be inferred for the file.

use std::io;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

use crate::error::EngineError;

/// Exit status an engine uses to signal "no parser could be inferred"
pub const NO_PARSER_EXIT_CODE: i32 = 10;

/// Result of one successful engine invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineOutput {
    Formatted(Vec<u8>),
    NoParser,
}

/// A formatting engine shared by every concurrent file task.
///
/// Each call must be independent of the others. Dropping the returned future
/// must abandon the invocation, which is how runs are cancelled.
#[async_trait]
pub trait Engine: Send + Sync {
    /// Stable identity used to namespace cached results.
    fn identity(&self) -> String;

    async fn format(&self, input: &[u8], config_json: &str) -> Result<EngineOutput, EngineError>;
}

/// Runs an external engine program once per file
#[derive(Debug, Clone)]
pub struct CommandEngine {
    program: String,
    args: Vec<String>,
}

impl CommandEngine {
    /// `args` are passed before the configuration argument on every call.
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }
}

#[async_trait]
impl Engine for CommandEngine {
    fn identity(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }

    async fn format(&self, input: &[u8], config_json: &str) -> Result<EngineOutput, EngineError> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .arg(config_json)
            .stdin(std::process::Stdio::piped())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| EngineError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        let stdin = child.stdin.take();
        let feed = async move {
            if let Some(mut stdin) = stdin {
                match stdin.write_all(input).await {
                    // the engine may exit without draining its input
                    Err(e) if e.kind() != io::ErrorKind::BrokenPipe => return Err(e),
                    _ => {}
                }
            }
            Ok(())
        };

        let (fed, output) = tokio::join!(feed, child.wait_with_output());
        let output = output?;
        fed?;

        match output.status.code() {
            _ if output.status.success() => {
                if !output.stderr.is_empty() {
                    debug!("engine: {}", String::from_utf8_lossy(&output.stderr).trim_end());
                }
                Ok(EngineOutput::Formatted(output.stdout))
            }
            Some(NO_PARSER_EXIT_CODE) => Ok(EngineOutput::NoParser),
            code => Err(EngineError::Failed {
                code,
                stderr: String::from_utf8_lossy(&output.stderr).trim_end().to_string(),
            }),
        }
    }
}
