//! Command-line interface definitions

use crate::config::{default_files_in_flight, SyncConfig, DEFAULT_BUFFER_SIZE, MAX_FILES_IN_FLIGHT_LIMIT};
use crate::detector::ChangeDetectionStrategy;
use crate::i18n::TranslationKey;
use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing::Level;

/// Largest accepted `--buffer-size-kb` (1 GiB)
const MAX_BUFFER_SIZE_KB: usize = 1024 * 1024;

/// One-way directory mirror: make DEST an exact copy of SOURCE
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[allow(clippy::struct_excessive_bools)]
pub struct Args {
    /// Source directory (positional or --source)
    #[arg(value_name = "SOURCE")]
    pub source_positional: Option<String>,

    /// Destination directory (positional or --destination)
    #[arg(value_name = "DEST")]
    pub dest_positional: Option<String>,

    /// Source directory (alternative to positional arg)
    #[arg(short, long, conflicts_with = "source_positional")]
    pub source: Option<String>,

    /// Destination directory (alternative to positional arg)
    #[arg(short, long, conflicts_with = "dest_positional")]
    pub destination: Option<String>,

    /// How files present on both sides are judged out of date
    #[arg(long, value_enum, default_value_t = ChangeDetectionStrategy::ModifiedDate)]
    pub check_by: ChangeDetectionStrategy,

    /// Maximum files checked or copied concurrently in the update pass (0 = auto)
    ///
    /// Auto uses four tasks per CPU core. Higher values help on fast storage
    /// but hold more file descriptors open at once.
    #[arg(long, default_value = "0")]
    pub max_files_in_flight: usize,

    /// Buffer size in KB for copy and compare (0 = 64 KB)
    #[arg(long, default_value = "0")]
    pub buffer_size_kb: usize,

    /// List what would change without touching the destination
    #[arg(long)]
    pub dry_run: bool,

    /// Prefix each listed path with its index in the pass
    #[arg(long)]
    pub numbered: bool,

    /// Show a progress bar on stderr while copying
    #[arg(long)]
    pub progress: bool,

    /// Verbose output (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Quiet mode (suppress all output except errors)
    #[arg(short, long)]
    pub quiet: bool,

    /// Arr, report in pirate speak
    #[arg(long)]
    pub pirate: bool,
}

impl Args {
    /// Source root from the positional argument or `--source`
    ///
    /// # Errors
    ///
    /// Returns an error if neither form was given
    pub fn get_source(&self) -> Result<PathBuf> {
        self.source_positional
            .as_deref()
            .or(self.source.as_deref())
            .map(PathBuf::from)
            .ok_or_else(|| anyhow::anyhow!(TranslationKey::ErrorRootsRequired.text()))
    }

    /// Destination root from the positional argument or `--destination`
    ///
    /// # Errors
    ///
    /// Returns an error if neither form was given
    pub fn get_destination(&self) -> Result<PathBuf> {
        self.dest_positional
            .as_deref()
            .or(self.destination.as_deref())
            .map(PathBuf::from)
            .ok_or_else(|| anyhow::anyhow!(TranslationKey::ErrorRootsRequired.text()))
    }

    /// Validate command-line arguments
    ///
    /// Root guard rails live in [`SyncConfig::validate`] and are applied by
    /// [`Args::to_config`].
    ///
    /// # Errors
    ///
    /// This function will return an error if:
    /// - Source/destination not specified
    /// - Max files in flight is above 10000
    /// - Buffer size is too large (>1GB)
    /// - Both --quiet and --verbose options are used
    pub fn validate(&self) -> Result<()> {
        self.get_source()?;
        self.get_destination()?;

        if self.max_files_in_flight > MAX_FILES_IN_FLIGHT_LIMIT {
            anyhow::bail!(
                "Max files in flight must be between 1 and {}, got: {}",
                MAX_FILES_IN_FLIGHT_LIMIT,
                self.max_files_in_flight
            );
        }

        if self.buffer_size_kb > MAX_BUFFER_SIZE_KB {
            anyhow::bail!(
                "Buffer size too large (max 1GB): {} KB",
                self.buffer_size_kb
            );
        }

        if self.quiet && self.verbose > 0 {
            anyhow::bail!("Cannot use both --quiet and --verbose options");
        }

        Ok(())
    }

    /// Build the run configuration, applying every guard rail
    ///
    /// # Errors
    ///
    /// Returns an error if [`Args::validate`] or [`SyncConfig::validate`] fails
    pub fn to_config(&self) -> Result<SyncConfig> {
        self.validate()?;
        let mut config = SyncConfig::new(self.get_source()?, self.get_destination()?, self.check_by);
        config.max_files_in_flight = self.effective_files_in_flight();
        config.buffer_size = self.effective_buffer_size();
        config.dry_run = self.dry_run;
        config.validate()?;
        Ok(config)
    }

    /// Concurrency bound with `0` resolved to the CPU-based default
    #[must_use]
    pub fn effective_files_in_flight(&self) -> usize {
        if self.max_files_in_flight == 0 {
            default_files_in_flight()
        } else {
            self.max_files_in_flight
        }
    }

    /// Get the actual buffer size in bytes
    #[must_use]
    pub const fn effective_buffer_size(&self) -> usize {
        if self.buffer_size_kb == 0 {
            DEFAULT_BUFFER_SIZE
        } else {
            self.buffer_size_kb * 1024
        }
    }

    /// Log level selected by `-v` count, or ERROR when quiet
    #[must_use]
    pub const fn log_level(&self) -> Level {
        if self.quiet {
            return Level::ERROR;
        }
        match self.verbose {
            0 => Level::WARN,
            1 => Level::INFO,
            2 => Level::DEBUG,
            _ => Level::TRACE,
        }
    }
}
