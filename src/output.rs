//! Standard-output side of a run: formatted output and check-mode banners
//!
//! Diagnostics never go here; they are `tracing` events on stderr.

use std::io::{self, Write};
use std::sync::{Arc, Mutex};

use tracing::debug;

/// What happens to the engine's output for each file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Overwrite the file in place
    Write,
    /// Compare only; differences are counted
    Check,
    /// Print formatted output to stdout
    Print,
}

impl OutputMode {
    /// Write wins over check, check over print.
    pub fn from_flags(write: bool, check: bool) -> Self {
        if write {
            OutputMode::Write
        } else if check {
            OutputMode::Check
        } else {
            OutputMode::Print
        }
    }
}

/// Where stdout-bound bytes go
#[derive(Debug, Clone, Default)]
pub enum OutputSink {
    #[default]
    Stdout,
    /// In-memory capture, shared between clones
    Buffer(Arc<Mutex<Vec<u8>>>),
}

impl OutputSink {
    pub fn buffer() -> (Self, Arc<Mutex<Vec<u8>>>) {
        let buf = Arc::new(Mutex::new(Vec::new()));
        (OutputSink::Buffer(Arc::clone(&buf)), buf)
    }

    /// Write one file's output in a single locked write, so files never interleave mid-way.
    ///
    /// The stdout lock is taken on the blocking pool, off the async workers.
    pub async fn write_all(&self, bytes: &[u8]) -> io::Result<()> {
        match self {
            OutputSink::Stdout => {
                let bytes = bytes.to_vec();
                tokio::task::spawn_blocking(move || {
                    let mut out = io::stdout().lock();
                    out.write_all(&bytes)?;
                    out.flush()
                })
                .await
                .map_err(io::Error::other)?
            }
            OutputSink::Buffer(buf) => {
                buf.lock()
                    .unwrap_or_else(|poisoned| poisoned.into_inner())
                    .extend_from_slice(bytes);
                Ok(())
            }
        }
    }

    /// Best-effort status line; a closed stdout is not a run failure.
    pub async fn line(&self, line: &str) {
        if let Err(e) = self.write_all(format!("{line}\n").as_bytes()).await {
            debug!("failed to write to stdout: {e}");
        }
    }
}

pub const CHECK_BANNER: &str = "Checking formatting...";
pub const CHECK_CLEAN: &str = "All matched files use Prettier code style!";

pub fn check_failed_summary(count: usize) -> String {
    let noun = if count == 1 { "file" } else { "files" };
    format!("Code style issues found in {count} {noun}. Run Prettier with --write to fix.")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_precedence() {
        assert_eq!(OutputMode::from_flags(true, true), OutputMode::Write);
        assert_eq!(OutputMode::from_flags(false, true), OutputMode::Check);
        assert_eq!(OutputMode::from_flags(false, false), OutputMode::Print);
    }

    #[tokio::test]
    async fn test_buffer_sink_captures() {
        let (sink, buf) = OutputSink::buffer();
        sink.write_all(b"a").await.unwrap();
        sink.clone().line("b").await;
        assert_eq!(buf.lock().unwrap().as_slice(), b"ab\n");
    }

    #[test]
    fn test_check_failed_summary() {
        assert!(check_failed_summary(1).contains("in 1 file."));
        assert!(check_failed_summary(3).contains("in 3 files."));
    }
}
