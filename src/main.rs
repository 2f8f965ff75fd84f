use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::sync::Arc;

use refmt_lib::config::{Config, MissingFilePolicy};
use refmt_lib::exit_codes::exit;
use refmt_lib::formatter::{FormatterRegistry, ToolExecutor};
use refmt_lib::{DiagnosticWriter, RunContext, RunStatus, Scheduler};

#[derive(Parser)]
#[command(
    name = "refmt",
    author,
    version,
    about = "Format files in place with external formatters, in parallel",
    long_about = None
)]
struct Cli {
    /// Files to format
    files: Vec<PathBuf>,

    /// Maximum number of files formatted at once (default: number of CPUs)
    #[arg(short, long)]
    jobs: Option<NonZeroUsize>,

    /// Configuration file path
    #[arg(short, long, conflicts_with = "no_config")]
    config: Option<PathBuf>,

    /// Ignore any .refmt.toml
    #[arg(long)]
    no_config: bool,

    /// Treat files that don't exist as failures
    #[arg(long)]
    strict_missing: bool,

    /// Show detailed output
    #[arg(short, long)]
    verbose: bool,
}

fn init_logging(verbose: bool) {
    let default_filter = if verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .format_timestamp(None)
        .init();
}

fn run(cli: Cli) -> Result<RunStatus> {
    let cwd = std::env::current_dir().context("Failed to determine the current directory")?;

    let config = if cli.no_config {
        Config::default()
    } else {
        let (config, path) = Config::load(cli.config.as_deref(), &cwd)?;
        if let Some(path) = path {
            log::debug!("[refmt-config] Loaded {}", path.display());
        }
        config
    };

    let missing_file = if cli.strict_missing {
        MissingFilePolicy::Fail
    } else {
        config.missing_file
    };
    let context = RunContext::discover(cwd, missing_file).context("Failed to load project settings")?;

    let executor = Arc::new(ToolExecutor::new(config.timeout));
    let registry = FormatterRegistry::from_config(&config, executor)?;

    let jobs = cli
        .jobs
        .or_else(|| config.jobs.and_then(NonZeroUsize::new))
        .unwrap_or_else(Scheduler::default_jobs);

    let writer = DiagnosticWriter::stderr();
    let scheduler = Scheduler::new(&context, &registry, &writer, jobs);
    log::debug!(
        "[refmt] {} files, {} workers, extensions: {}",
        cli.files.len(),
        scheduler.jobs(),
        registry.extensions().join(", ")
    );

    let result = scheduler.run(&cli.files)?;
    let summary = result.summary;
    log::info!(
        "{} formatted, {} skipped, {} failed",
        summary.formatted,
        summary.skipped,
        summary.failed
    );

    Ok(result.status)
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if cli.files.is_empty() {
        eprintln!("error: no files given\n\n{}", Cli::command().render_usage());
        exit::failure();
    }

    match run(cli) {
        Ok(status) => std::process::exit(status.exit_code()),
        Err(e) => {
            eprintln!("refmt: {e:#}");
            exit::tool_error();
        }
    }
}
