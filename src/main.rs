//! mirrorsync: one-way directory mirroring
//!
//! Makes a destination tree an exact copy of a source tree by removing extra
//! files, adding missing ones and refreshing stale ones.

use anyhow::{Context, Result};
use clap::Parser;
use mirrorsync::cli::Args;
use mirrorsync::i18n::{set_language, Language};
use mirrorsync::{sync_trees, ProgressTracker, Reporter, SyncError, SyncStats};
use std::process::ExitCode;
use tracing::{error, info};

/// Exit status for a run that finished with per-file errors (rsync's "partial transfer")
const EXIT_PARTIAL: u8 = 23;

#[compio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    if let Err(e) = init_logging(&args) {
        eprintln!("Error: {e:#}");
        return ExitCode::FAILURE;
    }
    if args.pirate {
        set_language(Language::Pirate);
    }

    match run(&args).await {
        Ok(stats) if stats.is_clean() => ExitCode::SUCCESS,
        Ok(stats) => {
            for failure in &stats.failures {
                eprintln!("{failure}");
            }
            ExitCode::from(EXIT_PARTIAL)
        }
        Err(e) => {
            error!("{e:#}");
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn init_logging(args: &Args) -> Result<()> {
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(args.log_level())
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_thread_names(false)
        .finish();

    tracing::subscriber::set_global_default(subscriber).context("Failed to install logger")
}

async fn run(args: &Args) -> Result<SyncStats> {
    let config = args.to_config().context("Invalid arguments")?;

    info!("Starting mirrorsync v{}", env!("CARGO_PKG_VERSION"));
    info!("Check by: {:?}", config.strategy);
    info!("Buffer size: {} KB", config.buffer_size / 1024);
    info!("Max files in flight: {}", config.max_files_in_flight);

    let progress = ProgressTracker::new(args.progress && !args.quiet);
    let result = if args.quiet {
        sync_trees(&config, Reporter::silent(), progress).await
    } else {
        sync_trees(&config, Reporter::stdout(args.numbered), progress).await
    };

    result.map_err(|e: SyncError| {
        let context = if e.is_config_error() {
            "Invalid arguments"
        } else {
            "Sync failed"
        };
        anyhow::Error::new(e).context(context)
    })
}
