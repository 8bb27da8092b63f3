//! Three-pass reconciliation of a destination tree against a source tree
//!
//! Given the enumerated source and destination [`PathSet`]s the reconciler
//! runs, in this fixed order:
//!
//! 1. **Remove**: destination files whose relative key has no source
//!    counterpart are deleted, then empty directories are pruned.
//! 2. **Add**: source files with no destination counterpart are copied,
//!    creating parent directories as needed.
//! 3. **Update**: source files whose counterpart existed at scan time are
//!    checked with the [`ChangeDetector`]; stale ones are overwritten.
//!
//! The order matters. Update candidates are drawn from files that existed in
//! the destination before the run, so nothing the Add pass just created is
//! copied a second time, and removals happen before additions that may reuse
//! a freed name.
//!
//! Each pass lists its work through the [`Reporter`] before acting. A failing
//! file is logged, recorded in [`SyncStats::failures`] and skipped; the pass
//! carries on with the rest.
//!
//! The update pass spawns one compio task per file, bounded by
//! `max_files_in_flight`, and waits for every task before returning.

use crate::config::SyncConfig;
use crate::detector::ChangeDetector;
use crate::directory::prune_empty_directories;
use crate::error::{FileFailure, Pass, Result, SyncError};
use crate::file_ops::{ChildKind, FileOperations};
use crate::paths::PathSet;
use crate::progress::ProgressTracker;
use crate::report::Reporter;
use crate::sync::SyncStats;
use futures::stream::{self, StreamExt};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// One decision made by a reconciliation pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkItem {
    /// Delete a destination file that has no source counterpart
    Remove(PathBuf),
    /// Copy a source file that has no destination counterpart
    Add {
        source: PathBuf,
        destination: PathBuf,
    },
    /// Refresh a destination file from its source counterpart
    Update {
        source: PathBuf,
        destination: PathBuf,
    },
}

impl WorkItem {
    /// Path shown for this item in the run report
    #[must_use]
    pub fn reported_path(&self) -> &Path {
        match self {
            Self::Remove(destination) | Self::Update { destination, .. } => destination,
            Self::Add { source, .. } => source,
        }
    }

    /// Source and destination of a copying item
    #[must_use]
    pub fn into_transfer(self) -> Option<(PathBuf, PathBuf)> {
        match self {
            Self::Add {
                source,
                destination,
            }
            | Self::Update {
                source,
                destination,
            } => Some((source, destination)),
            Self::Remove(_) => None,
        }
    }
}

/// Destination files with no matching source key, in destination discovery order
#[must_use]
pub fn plan_removals(source: &PathSet, destination: &PathSet) -> Vec<WorkItem> {
    destination
        .entries()
        .filter(|(_, key)| !source.contains_key(key))
        .map(|(path, _)| WorkItem::Remove(path.to_path_buf()))
        .collect()
}

/// Source files with no matching destination key, in source discovery order
#[must_use]
pub fn plan_additions(source: &PathSet, destination: &PathSet) -> Vec<WorkItem> {
    source
        .entries()
        .filter(|(_, key)| !destination.contains_key(key))
        .map(|(path, key)| WorkItem::Add {
            source: path.to_path_buf(),
            destination: key.under(destination.root()),
        })
        .collect()
}

/// Source files whose counterpart was present at scan time, in source discovery order
///
/// These still have to pass the change detector before anything is copied.
#[must_use]
pub fn update_candidates(source: &PathSet, destination: &PathSet) -> Vec<WorkItem> {
    source
        .entries()
        .filter(|(_, key)| destination.contains_key(key))
        .map(|(path, key)| WorkItem::Update {
            source: path.to_path_buf(),
            destination: key.under(destination.root()),
        })
        .collect()
}

/// Drives the three passes for one run
pub struct Reconciler<O, W: Write> {
    config: SyncConfig,
    ops: Rc<O>,
    detector: ChangeDetector,
    reporter: Reporter<W>,
    progress: ProgressTracker,
}

impl<O, W> Reconciler<O, W>
where
    O: FileOperations + 'static,
    W: Write,
{
    pub fn new(
        config: SyncConfig,
        ops: Rc<O>,
        reporter: Reporter<W>,
        progress: ProgressTracker,
    ) -> Self {
        let detector = ChangeDetector::new(config.strategy, config.buffer_size);
        Self {
            config,
            ops,
            detector,
            reporter,
            progress,
        }
    }

    pub fn into_reporter(self) -> Reporter<W> {
        self.reporter
    }

    /// Run Remove, Add and Update against the scanned trees
    ///
    /// Never fails as a whole: per-file problems end up in
    /// [`SyncStats::failures`]. In dry-run mode the counters describe the work
    /// that would have been done.
    pub async fn run(&mut self, source: &PathSet, destination: &PathSet) -> SyncStats {
        let start_time = Instant::now();
        let mut stats = SyncStats::default();

        self.remove_pass(source, destination, &mut stats).await;
        self.add_pass(source, destination, &mut stats).await;
        self.update_pass(source, destination, &mut stats).await;

        self.progress.finish();
        if self.config.dry_run {
            self.reporter.dry_run_notice();
        }

        stats.duration = start_time.elapsed();
        stats
    }

    async fn remove_pass(&mut self, source: &PathSet, destination: &PathSet, stats: &mut SyncStats) {
        let items = plan_removals(source, destination);
        if !items.is_empty() {
            info!("Remove pass: {} files", items.len());
            self.reporter
                .pass(Pass::Remove, items.iter().map(WorkItem::reported_path));
        }

        if self.config.dry_run {
            stats.files_removed += items.len() as u64;
            return;
        }

        let paths: Vec<PathBuf> = items
            .into_iter()
            .filter_map(|item| match item {
                WorkItem::Remove(path) => Some(path),
                _ => None,
            })
            .collect();

        if !paths.is_empty() {
            let failures = self.ops.remove_paths(&paths).await;
            stats.files_removed += (paths.len() - failures.len()) as u64;
            for (path, e) in failures {
                error!("Failed to remove {}: {}", path.display(), e);
                stats.failures.push(FileFailure::new(path, Pass::Remove, e));
            }
        }

        // Runs even without removals: a leftover empty directory may sit
        // where the Add pass needs to put a file
        let pruned = prune_empty_directories(&*self.ops, destination.root()).await;
        stats.directories_pruned += pruned.removed.len() as u64;
        stats.failures.extend(pruned.failures);
    }

    async fn add_pass(&mut self, source: &PathSet, destination: &PathSet, stats: &mut SyncStats) {
        let items = plan_additions(source, destination);
        if items.is_empty() {
            return;
        }
        info!("Add pass: {} files", items.len());
        self.reporter
            .pass(Pass::Add, items.iter().map(WorkItem::reported_path));

        if self.config.dry_run {
            stats.files_added += items.len() as u64;
            return;
        }

        self.progress.start_pass("adding", items.len());
        for (src, dst) in items.into_iter().filter_map(WorkItem::into_transfer) {
            match transfer(&*self.ops, destination.root(), &src, &dst).await {
                Ok(bytes) => {
                    stats.files_added += 1;
                    stats.bytes_copied += bytes;
                }
                Err(e) => {
                    error!("Failed to add {}: {}", src.display(), e);
                    stats.failures.push(FileFailure::new(src, Pass::Add, e));
                }
            }
            self.progress.inc();
        }
    }

    async fn update_pass(&mut self, source: &PathSet, destination: &PathSet, stats: &mut SyncStats) {
        let candidates: Vec<(PathBuf, PathBuf)> = update_candidates(source, destination)
            .into_iter()
            .filter_map(WorkItem::into_transfer)
            .collect();
        if candidates.is_empty() {
            return;
        }
        let limit = self.config.max_files_in_flight.max(1);
        debug!(
            "Update pass: checking {} candidates, {} in flight",
            candidates.len(),
            limit
        );

        let detector = self.detector;
        let mut checked: Vec<(usize, Result<bool>)> = stream::iter(candidates.iter().enumerate())
            .map(|(index, (src, dst))| {
                let (src, dst) = (src.clone(), dst.clone());
                let handle =
                    compio::runtime::spawn(async move { detector.is_stale(&src, &dst).await });
                async move { (index, flatten_join(handle.await)) }
            })
            .buffer_unordered(limit)
            .collect()
            .await;
        checked.sort_unstable_by_key(|(index, _)| *index);

        let mut stale = Vec::new();
        for (index, result) in checked {
            let (src, dst) = &candidates[index];
            match result {
                Ok(true) => stale.push(WorkItem::Update {
                    source: src.clone(),
                    destination: dst.clone(),
                }),
                Ok(false) => stats.files_unchanged += 1,
                Err(e) => {
                    error!("Failed to compare {}: {}", dst.display(), e);
                    stats.failures.push(FileFailure::new(dst.clone(), Pass::Update, e));
                }
            }
        }
        if stale.is_empty() {
            return;
        }
        info!("Update pass: {} stale files", stale.len());
        self.reporter
            .pass(Pass::Update, stale.iter().map(WorkItem::reported_path));

        if self.config.dry_run {
            stats.files_updated += stale.len() as u64;
            return;
        }

        self.progress.start_pass("updating", stale.len());
        let ops = Rc::clone(&self.ops);
        let root = destination.root().to_path_buf();
        let progress = &self.progress;
        let copied: Vec<(PathBuf, Result<u64>)> = stream::iter(stale)
            .filter_map(|item| async move { item.into_transfer() })
            .map(|(src, dst)| {
                let ops = Rc::clone(&ops);
                let root = root.clone();
                let reported = dst.clone();
                let handle = compio::runtime::spawn(async move {
                    transfer(&*ops, &root, &src, &dst).await
                });
                async move { (reported, flatten_join(handle.await)) }
            })
            .buffer_unordered(limit)
            .inspect(|_| progress.inc())
            .collect()
            .await;

        for (dst, result) in copied {
            match result {
                Ok(bytes) => {
                    stats.files_updated += 1;
                    stats.bytes_copied += bytes;
                }
                Err(e) => {
                    error!("Failed to update {}: {}", dst.display(), e);
                    stats.failures.push(FileFailure::new(dst, Pass::Update, e));
                }
            }
        }
    }
}

/// Copy `src` to `dst`, creating the destination's parent chain first
async fn transfer<O: FileOperations>(ops: &O, root: &Path, src: &Path, dst: &Path) -> Result<u64> {
    clear_target(ops, root, dst).await?;
    if let Some(parent) = dst.parent() {
        ops.make_directories(parent).await?;
    }
    ops.copy_file(src, dst).await
}

/// Make room for a regular file at `dst`
///
/// Walking down from `root`, an entry that is not a real directory where one
/// is needed, or not a regular file at `dst` itself, is removed. Symlinks are
/// removed as links so their targets are never written.
async fn clear_target<O: FileOperations>(ops: &O, root: &Path, dst: &Path) -> Result<()> {
    let Ok(relative) = dst.strip_prefix(root) else {
        return Ok(());
    };
    let mut current = root.to_path_buf();
    let mut components = relative.components().peekable();

    while let Some(component) = components.next() {
        current.push(component);
        let is_target = components.peek().is_none();
        match ops.entry_kind(&current).await? {
            None => return Ok(()),
            Some(ChildKind::Directory) if !is_target => {}
            Some(ChildKind::File) if is_target => {}
            Some(kind) => {
                warn!("Replacing {:?} entry at {}", kind, current.display());
                return match ops.remove_paths(std::slice::from_ref(&current)).await.pop() {
                    Some((_, e)) => Err(e),
                    None => Ok(()),
                };
            }
        }
    }
    Ok(())
}

/// Turn a panicked or cancelled task into an ordinary per-file error
fn flatten_join<T, E: std::fmt::Debug>(joined: std::result::Result<Result<T>, E>) -> Result<T> {
    joined.unwrap_or_else(|e| Err(SyncError::TaskFailed(format!("{e:?}"))))
}
