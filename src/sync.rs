//! Run orchestration
//!
//! [`sync_trees`] is the library entry point for one mirror run:
//!
//! 1. **Validation**: guard rails on both roots, before any filesystem access
//! 2. **Scan**: enumerate the source and destination trees
//! 3. **Reconcile**: Remove, Add and Update passes over the two path sets
//! 4. **Completion**: final status line and statistics
//!
//! # Usage
//!
//! ```rust,ignore
//! use mirrorsync::{sync_trees, ChangeDetectionStrategy, ProgressTracker, Reporter, SyncConfig};
//!
//! #[compio::main]
//! async fn main() -> mirrorsync::Result<()> {
//!     let config = SyncConfig::new("/data/photos", "/backup/photos", ChangeDetectionStrategy::ModifiedDate);
//!     let stats = sync_trees(&config, Reporter::stdout(false), ProgressTracker::new(false)).await?;
//!     println!("{} added, {} updated, {} removed", stats.files_added, stats.files_updated, stats.files_removed);
//!     Ok(())
//! }
//! ```

use crate::config::SyncConfig;
use crate::directory::enumerate;
use crate::error::{FileFailure, Result, SyncError};
use crate::file_ops::{CompioFileOps, FileOperations};
use crate::progress::ProgressTracker;
use crate::reconcile::Reconciler;
use crate::report::Reporter;
use std::io::{ErrorKind, Write};
use std::path::Path;
use std::rc::Rc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Statistics for one run
///
/// Counters describe work that was carried out, or in dry-run mode the work
/// that would have been.
#[derive(Debug, Default)]
pub struct SyncStats {
    /// Destination files deleted because the source no longer has them
    pub files_removed: u64,
    /// Source files copied to a new destination path
    pub files_added: u64,
    /// Stale destination files refreshed from the source
    pub files_updated: u64,
    /// Matched files the change detector judged current
    pub files_unchanged: u64,
    /// Empty destination directories removed after the Remove pass
    pub directories_pruned: u64,
    /// Total bytes written by the Add and Update passes
    pub bytes_copied: u64,
    /// Subtrees that could not be scanned
    pub scan_warnings: Vec<FileFailure>,
    /// Per-file errors from the reconciliation passes
    pub failures: Vec<FileFailure>,
    /// Wall time of the whole run
    pub duration: Duration,
}

impl SyncStats {
    /// True when no file failed; scan warnings do not count
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Mirror `config.source` into `config.destination` using compio file operations
///
/// # Errors
///
/// Fails only on configuration problems: a forbidden or overlapping root, a
/// source that is missing or not a directory, or a destination that exists
/// but is not a directory. Per-file problems are reported in the returned
/// [`SyncStats`].
#[allow(clippy::future_not_send)]
pub async fn sync_trees<W: Write>(
    config: &SyncConfig,
    reporter: Reporter<W>,
    progress: ProgressTracker,
) -> Result<SyncStats> {
    let ops = Rc::new(CompioFileOps::new(config.buffer_size));
    sync_trees_with(config, ops, reporter, progress).await
}

/// [`sync_trees`] over any [`FileOperations`] implementation
///
/// # Errors
///
/// Same as [`sync_trees`].
#[allow(clippy::future_not_send)]
pub async fn sync_trees_with<O, W>(
    config: &SyncConfig,
    ops: Rc<O>,
    mut reporter: Reporter<W>,
    progress: ProgressTracker,
) -> Result<SyncStats>
where
    O: FileOperations + 'static,
    W: Write,
{
    let start_time = Instant::now();
    let config = config.resolve()?;
    check_roots(&config.source, &config.destination).await?;

    info!(
        "Starting sync from {} to {} ({:?}{})",
        config.source.display(),
        config.destination.display(),
        config.strategy,
        if config.dry_run { ", dry run" } else { "" }
    );
    reporter.start(&config.source, &config.destination);

    let (source_scan, destination_scan) = futures::join!(
        enumerate(&*ops, &config.source),
        enumerate(&*ops, &config.destination)
    );

    let mut reconciler = Reconciler::new(config, ops, reporter, progress);
    let mut stats = reconciler
        .run(&source_scan.paths, &destination_scan.paths)
        .await;

    stats.scan_warnings = source_scan.warnings;
    stats.scan_warnings.extend(destination_scan.warnings);
    stats.duration = start_time.elapsed();

    reconciler.into_reporter().finish(stats.is_clean());

    info!(
        "Sync finished in {:?}: {} removed, {} added, {} updated, {} unchanged, {} bytes",
        stats.duration,
        stats.files_removed,
        stats.files_added,
        stats.files_updated,
        stats.files_unchanged,
        stats.bytes_copied
    );
    if !stats.is_clean() {
        warn!("{} files could not be synced", stats.failures.len());
    }

    Ok(stats)
}

/// Source must be an existing directory; destination may be missing
async fn check_roots(source: &Path, destination: &Path) -> Result<()> {
    match compio::fs::metadata(source).await {
        Ok(metadata) if metadata.is_dir() => {}
        Ok(_) => {
            return Err(SyncError::InvalidConfig(format!(
                "Source is not a directory: {}",
                source.display()
            )))
        }
        Err(e) if e.kind() == ErrorKind::NotFound => {
            return Err(SyncError::InvalidConfig(format!(
                "Source directory does not exist: {}",
                source.display()
            )))
        }
        Err(e) => {
            return Err(SyncError::InvalidConfig(format!(
                "Cannot access source {}: {}",
                source.display(),
                e
            )))
        }
    }

    match compio::fs::metadata(destination).await {
        Ok(metadata) if !metadata.is_dir() => Err(SyncError::InvalidConfig(format!(
            "Destination exists but is not a directory: {}",
            destination.display()
        ))),
        _ => Ok(()),
    }
}
