//! mirrorsync: one-way directory mirroring on compio
//!
//! The library exposes the reconciliation engine behind the `mirrorsync`
//! binary. A run enumerates both trees, then removes, adds and updates
//! destination files until the destination mirrors the source.

pub mod cli;
pub mod config;
pub mod copy;
pub mod detector;
pub mod directory;
pub mod error;
pub mod file_ops;
pub mod i18n;
pub mod paths;
pub mod progress;
pub mod reconcile;
pub mod report;
pub mod sync;

// Re-export commonly used types
pub use config::SyncConfig;
pub use detector::{ChangeDetectionStrategy, ChangeDetector};
pub use error::{FileFailure, Pass, Result, SyncError};
pub use file_ops::{CompioFileOps, FileOperations};
pub use progress::ProgressTracker;
pub use report::Reporter;
pub use sync::{sync_trees, sync_trees_with, SyncStats};
