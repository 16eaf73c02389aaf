//! Run orchestration
//!
//! Configuration and the file list are resolved once, single-threaded. Every
//! expanded path then gets its own task; all tasks share read-only state plus
//! one atomic check-failure counter, and are joined before the run returns.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use serde_json::Value;
use tokio::task::{self, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use crate::cache::{cache_key, ArtifactCache, NoopCache};
use crate::config::{
    find_config_file, load_config, load_config_or_empty, ConfigDocument, EditorConfig,
    ResolvedConfig,
};
use crate::engine::{Engine, EngineOutput};
use crate::error::{ConfigError, FileError, RunError};
use crate::output::{self, OutputMode, OutputSink};
use crate::walker::{absolutize, expand_patterns, ExpandOptions, ExpandedPath};

/// Options for one run
#[derive(Debug, Clone, Default)]
pub struct RunArgs {
    /// Directory patterns, config discovery and ignore files are relative to
    pub cwd: PathBuf,
    pub patterns: Vec<String>,
    /// Explicit formatter config; takes precedence over `no_config`
    pub config: Option<PathBuf>,
    pub no_config: bool,
    pub no_editorconfig: bool,
    pub check: bool,
    pub write: bool,
    /// Never warn about files without an inferrable parser
    pub ignore_unknown: bool,
    pub ignore_paths: Vec<PathBuf>,
    pub with_node_modules: bool,
    pub no_error_on_unmatched_pattern: bool,
}

/// What a successfully processed file ended up as
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileOutcome {
    /// Written, printed, or already formatted in check mode
    Formatted,
    /// The engine had no parser for it
    NoParser,
    /// Check mode found a difference
    CheckFailed,
}

/// Per-run tallies
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub formatted: usize,
    pub no_parser: usize,
    pub check_failed: usize,
    pub failed: usize,
}

/// Drives the engine over every file a run resolves to
#[derive(Clone)]
pub struct Runner {
    engine: Arc<dyn Engine>,
    cache: Arc<dyn ArtifactCache>,
    output: OutputSink,
}

/// Read-only state shared by all file tasks of one run
struct TaskContext {
    engine: Arc<dyn Engine>,
    cache: Arc<dyn ArtifactCache>,
    output: OutputSink,
    config: ResolvedConfig,
    mode: OutputMode,
    ignore_unknown: bool,
    cancel: CancellationToken,
    check_failed: AtomicUsize,
}

impl Runner {
    pub fn new(engine: Arc<dyn Engine>) -> Self {
        Self {
            engine,
            cache: Arc::new(NoopCache),
            output: OutputSink::Stdout,
        }
    }

    pub fn with_cache(mut self, cache: Arc<dyn ArtifactCache>) -> Self {
        self.cache = cache;
        self
    }

    pub fn with_output(mut self, output: OutputSink) -> Self {
        self.output = output;
        self
    }

    /// Format every file `args` resolves to.
    ///
    /// Per-file failures never stop other files. The error is the first hard
    /// failure to complete, else the check-failure count, else cancellation.
    pub async fn run(
        &self,
        args: &RunArgs,
        cancel: &CancellationToken,
    ) -> Result<RunSummary, RunError> {
        let config = resolve_config(args)?;
        let mode = OutputMode::from_flags(args.write, args.check);

        let paths = expand_patterns(&ExpandOptions {
            cwd: &args.cwd,
            patterns: &args.patterns,
            ignore_paths: &args.ignore_paths,
            with_node_modules: args.with_node_modules,
            no_error_on_unmatched_pattern: args.no_error_on_unmatched_pattern,
        });
        debug!("expanded {} path(s)", paths.len());

        if mode == OutputMode::Check {
            self.output.line(output::CHECK_BANNER).await;
        }

        let ctx = Arc::new(TaskContext {
            engine: Arc::clone(&self.engine),
            cache: Arc::clone(&self.cache),
            output: self.output.clone(),
            config,
            mode,
            ignore_unknown: args.ignore_unknown,
            cancel: cancel.clone(),
            check_failed: AtomicUsize::new(0),
        });

        let mut tasks = JoinSet::new();
        let mut task_paths: HashMap<task::Id, PathBuf> = HashMap::with_capacity(paths.len());
        for expanded in paths {
            let ctx = Arc::clone(&ctx);
            let path = expanded.path.clone();
            let handle = tasks.spawn(async move {
                let result = format_path(&ctx, &expanded).await;
                if let Ok(FileOutcome::CheckFailed) = result {
                    ctx.check_failed.fetch_add(1, Ordering::Relaxed);
                }
                result
            });
            task_paths.insert(handle.id(), path);
        }

        let mut summary = RunSummary::default();
        let mut first_error: Option<(PathBuf, FileError)> = None;

        while let Some(joined) = tasks.join_next_with_id().await {
            let (id, result) = match joined {
                Ok((id, result)) => (id, result),
                Err(e) => (e.id(), Err(FileError::Task(e.to_string()))),
            };
            let path = task_paths.remove(&id).unwrap_or_default();
            match result {
                Ok(FileOutcome::Formatted) => summary.formatted += 1,
                Ok(FileOutcome::NoParser) => summary.no_parser += 1,
                Ok(FileOutcome::CheckFailed) => {}
                Err(FileError::Cancelled) => summary.failed += 1,
                Err(e) => {
                    report_file_error(&path, &e);
                    summary.failed += 1;
                    first_error.get_or_insert((path, e));
                }
            }
        }
        summary.check_failed = ctx.check_failed.load(Ordering::Relaxed);

        if mode == OutputMode::Check {
            if summary.check_failed > 0 {
                warn!("{}", output::check_failed_summary(summary.check_failed));
            } else if summary.failed == 0 {
                self.output.line(output::CHECK_CLEAN).await;
            }
        }

        if let Some((path, source)) = first_error {
            return Err(RunError::File {
                path,
                source,
                failed: summary.failed,
            });
        }
        if summary.check_failed > 0 {
            return Err(RunError::CheckFailed {
                count: summary.check_failed,
            });
        }
        if cancel.is_cancelled() {
            return Err(RunError::Cancelled);
        }
        Ok(summary)
    }
}

/// Resolve editorconfig and formatter config: explicit path, then disabled, then discovery.
fn resolve_config(args: &RunArgs) -> Result<ResolvedConfig, RunError> {
    let editorconfig = if args.no_editorconfig {
        None
    } else {
        EditorConfig::resolve(&args.cwd)
    };

    let (document, config_dir) = match (&args.config, args.no_config) {
        (Some(path), _) => {
            let path = absolutize(&args.cwd, path);
            let document = match load_config(&path) {
                Ok(document) => document,
                Err(e @ ConfigError::Io { .. }) => {
                    error!("{e}");
                    return Err(e.into());
                }
                Err(e @ ConfigError::Invalid { .. }) => {
                    warn!("{e}");
                    ConfigDocument::new()
                }
            };
            (document, parent_dir(&path, &args.cwd))
        }
        (None, true) => (ConfigDocument::new(), args.cwd.clone()),
        (None, false) => match find_config_file(&args.cwd) {
            Some(path) => {
                debug!("using config {}", path.display());
                (load_config_or_empty(&path), parent_dir(&path, &args.cwd))
            }
            None => (ConfigDocument::new(), args.cwd.clone()),
        },
    };

    Ok(ResolvedConfig::new(editorconfig, document, &config_dir))
}

fn parent_dir(path: &Path, fallback: &Path) -> PathBuf {
    path.parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| fallback.to_path_buf())
}

async fn format_path(ctx: &TaskContext, expanded: &ExpandedPath) -> Result<FileOutcome, FileError> {
    if let Some(message) = &expanded.error {
        return Err(FileError::Unmatched(message.clone()));
    }
    if ctx.cancel.is_cancelled() {
        return Err(FileError::Cancelled);
    }

    let path = &expanded.path;
    let config_json = Value::Object(ctx.config.for_file(path)).to_string();

    let metadata = tokio::fs::metadata(path).await.map_err(FileError::Read)?;
    let input = tokio::fs::read(path).await.map_err(FileError::Read)?;

    let key = cache_key(&[
        ctx.engine.identity().as_bytes(),
        config_json.as_bytes(),
        &input,
    ]);
    let output = match ctx.cache.get(&key).await {
        Some(cached) => EngineOutput::Formatted(cached),
        None => {
            let output = tokio::select! {
                biased;
                _ = ctx.cancel.cancelled() => return Err(FileError::Cancelled),
                output = ctx.engine.format(&input, &config_json) => output?,
            };
            if let EngineOutput::Formatted(bytes) = &output {
                ctx.cache.put(&key, bytes).await;
            }
            output
        }
    };

    let formatted = match output {
        EngineOutput::Formatted(bytes) => bytes,
        EngineOutput::NoParser => {
            if !(expanded.ignore_unknown || ctx.ignore_unknown) {
                warn!(
                    "No parser could be inferred for file \"{}\".",
                    path.display()
                );
            }
            return Ok(FileOutcome::NoParser);
        }
    };

    match ctx.mode {
        OutputMode::Write => {
            tokio::fs::write(path, &formatted)
                .await
                .map_err(FileError::Write)?;
            tokio::fs::set_permissions(path, metadata.permissions())
                .await
                .map_err(FileError::Write)?;
        }
        OutputMode::Check => {
            if input != formatted {
                warn!("{}", path.display());
                return Ok(FileOutcome::CheckFailed);
            }
        }
        OutputMode::Print => ctx
            .output
            .write_all(&formatted)
            .await
            .map_err(FileError::Write)?,
    }
    Ok(FileOutcome::Formatted)
}

fn report_file_error(path: &Path, e: &FileError) {
    match e {
        FileError::Unmatched(message) => error!("{message}"),
        FileError::Read(_) => {
            warn!("Unable to read file \"{}\"", path.display());
            warn!("{e}");
        }
        _ => error!("[{}] {e}", path.display()),
    }
}
