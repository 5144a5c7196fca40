use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Mutex;

use anyhow::{Context, Result};
use clap::Parser;
use glv_graph::{ContentConfig, DefaultFormatter, HistoryContent, HistoryError, Repository};
use tracing_subscriber::EnvFilter;

mod app;
mod config;

use config::Config;

const DEFAULT_PAGE_SIZE: usize = 40;

#[derive(Parser, Debug)]
#[command(
    name = "glv",
    version,
    about = "Browse first-parent history with foldable merges",
    long_about = None
)]
struct Args {
    /// Directory inside the repository
    #[arg(long, default_value = ".")]
    dir: PathBuf,

    /// Write logs to this file, filtered by GLV_LOG
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Match search text regardless of case
    #[arg(long)]
    ignore_case: bool,

    /// Commit or `A..B` range to show
    #[arg(default_value = "HEAD")]
    revision: String,

    /// Only show commits touching these paths
    #[arg(last = true)]
    paths: Vec<PathBuf>,
}

fn main() -> ExitCode {
    let args = Args::parse();

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            match e.downcast_ref::<HistoryError>() {
                Some(HistoryError::RevisionNotFound(_)) => {
                    eprintln!("No revisions match the given arguments.")
                }
                Some(HistoryError::PathNotFound(_)) => {
                    eprintln!("No paths match the given arguments.")
                }
                _ => eprintln!("glv: {:#}", e),
            }
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> Result<()> {
    let config = match Config::default_location() {
        Some(path) => Config::load(&path)?,
        None => Config::default(),
    };
    if let Some(path) = args.log_file.as_deref().or(config.log_file.as_deref()) {
        init_logging(path)?;
    }

    let repo = Repository::open(&args.dir)
        .with_context(|| format!("opening repository at {}", args.dir.display()))?;
    tracing::info!(workdir = %repo.working_dir().display(), "repository opened");

    let page_size = match config.history.page_size {
        0 => crossterm::terminal::size()
            .map(|(_, height)| height.saturating_sub(1).max(1) as usize)
            .unwrap_or(DEFAULT_PAGE_SIZE),
        size => size,
    };
    let content_config = ContentConfig {
        revision: args.revision,
        paths: args.paths,
        page_size,
    };
    // fails before the terminal switches to raw mode
    let content = HistoryContent::open(repo, &content_config)?;

    let formatter = DefaultFormatter {
        author_name_width: config.history.author_name_width,
        author_date_width: config.history.author_date_width,
    };
    let ignore_case = args.ignore_case || config.search.ignore_case;
    app::run_tui(content.into_shared(), formatter, ignore_case)
}

fn init_logging(path: &Path) -> Result<()> {
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("opening log file {}", path.display()))?;
    let filter = EnvFilter::try_from_env("GLV_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .init();
    Ok(())
}
