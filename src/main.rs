use std::io::IsTerminal;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, ValueEnum};
use rprettier::{exit_code, CommandEngine, DirCache, RunArgs, RunError, Runner};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "rprettier")]
#[command(version, about = "Format files with a Prettier-compatible engine")]
struct Cli {
    /// Files, directories or glob patterns to format
    #[arg(required = true)]
    patterns: Vec<String>,

    /// Edit files in place
    #[arg(short, long)]
    write: bool,

    /// Check if files are formatted, exit 1 if any are not
    #[arg(short, long)]
    check: bool,

    /// Path to a formatter config file (overrides auto-discovery)
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Do not look for a formatter config file
    #[arg(long)]
    no_config: bool,

    /// Do not take .editorconfig into account
    #[arg(long)]
    no_editorconfig: bool,

    /// Ignore files whose type no parser can handle
    #[arg(short = 'u', long)]
    ignore_unknown: bool,

    /// Process files inside node_modules directories
    #[arg(long)]
    with_node_modules: bool,

    /// Do not fail when a pattern matches no files
    #[arg(long)]
    no_error_on_unmatched_pattern: bool,

    /// Additional ignore file (repeatable); .prettierignore is always read
    #[arg(long = "ignore-path", value_name = "PATH")]
    ignore_paths: Vec<PathBuf>,

    /// Engine program invoked once per file
    #[arg(long, env = "RPRETTIER_ENGINE", default_value = "prettier-engine")]
    engine: String,

    /// Argument passed to the engine before the config (repeatable)
    #[arg(long = "engine-arg", value_name = "ARG", allow_hyphen_values = true)]
    engine_args: Vec<String>,

    /// Reuse engine results from the per-user cache directory
    #[arg(long)]
    cache: bool,

    /// Diagnostic verbosity (RUST_LOG takes precedence)
    #[arg(long, value_enum, default_value_t = LogLevel::Log)]
    log_level: LogLevel,
}

#[derive(Clone, Copy, ValueEnum)]
enum LogLevel {
    Silent,
    Error,
    Warn,
    Log,
    Debug,
}

impl LogLevel {
    fn directive(self) -> &'static str {
        match self {
            LogLevel::Silent => "off",
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Log => "info",
            LogLevel::Debug => "debug",
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.log_level);

    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            error!("{e:#}");
            ExitCode::from(1)
        }
    }
}

fn init_tracing(level: LogLevel) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.directive()));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .with_target(false)
        .without_time()
        .init();
}

fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let cwd = std::env::current_dir().context("failed to resolve working directory")?;
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;

    let mut runner = Runner::new(Arc::new(CommandEngine::new(cli.engine, cli.engine_args)));
    if cli.cache {
        match DirCache::user_default() {
            Some(cache) => {
                debug!("caching engine results in {}", cache.dir().display());
                runner = runner.with_cache(Arc::new(cache));
            }
            None => warn!("No per-user cache directory available; caching disabled"),
        }
    }

    let args = RunArgs {
        cwd,
        patterns: cli.patterns,
        config: cli.config,
        no_config: cli.no_config,
        no_editorconfig: cli.no_editorconfig,
        check: cli.check,
        write: cli.write,
        ignore_unknown: cli.ignore_unknown,
        ignore_paths: cli.ignore_paths,
        with_node_modules: cli.with_node_modules,
        no_error_on_unmatched_pattern: cli.no_error_on_unmatched_pattern,
    };

    let cancel = CancellationToken::new();
    let result = runtime.block_on(async {
        let on_interrupt = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                on_interrupt.cancel();
            }
        });
        runner.run(&args, &cancel).await
    });

    // per-file failures were reported as they happened
    match &result {
        Err(RunError::Cancelled) => warn!("Interrupted"),
        Err(e) => debug!("{e}"),
        Ok(summary) => debug!("{summary:?}"),
    }
    Ok(ExitCode::from(exit_code(&result)))
}
