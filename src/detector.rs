//! Change detection for matched source/destination pairs
//!
//! Decides whether a destination file is stale relative to its source
//! counterpart. Two interchangeable strategies exist:
//!
//! - **modified-date**: metadata only. Stale iff the source modification time
//!   is strictly newer. Misses identical-content touches and content changes
//!   that did not advance the timestamp.
//! - **content-hash**: exact. Stale iff the bytes differ. Sizes are compared
//!   first; equal-sized files are read chunk by chunk and compared until the
//!   first difference.
//!
//! A destination that does not exist is always stale.

use crate::config::DEFAULT_BUFFER_SIZE;
use crate::error::{Result, SyncError};
use compio::fs::File;
use compio::io::AsyncReadAt;
use std::io::ErrorKind;
use std::path::Path;
use std::time::SystemTime;
use tracing::trace;

/// How a run decides that a destination file needs refreshing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum ChangeDetectionStrategy {
    /// Compare modification timestamps
    #[default]
    #[value(alias = "modified", alias = "mtime")]
    ModifiedDate,
    /// Compare full file contents
    #[value(alias = "content", alias = "file-change")]
    ContentHash,
}

/// Staleness checker bound to one strategy for the duration of a run
#[derive(Debug, Clone, Copy)]
pub struct ChangeDetector {
    strategy: ChangeDetectionStrategy,
    buffer_size: usize,
}

impl ChangeDetector {
    #[must_use]
    pub const fn new(strategy: ChangeDetectionStrategy, buffer_size: usize) -> Self {
        Self {
            strategy,
            buffer_size,
        }
    }

    /// Decide whether `dest` must be overwritten with `source`
    ///
    /// # Errors
    ///
    /// Returns an error if the source cannot be inspected, or if the
    /// destination exists but cannot be inspected.
    pub async fn is_stale(&self, source: &Path, dest: &Path) -> Result<bool> {
        let stale = match self.strategy {
            ChangeDetectionStrategy::ModifiedDate => modified_date_stale(source, dest).await?,
            ChangeDetectionStrategy::ContentHash => {
                content_differs(source, dest, self.buffer_size).await?
            }
        };
        trace!(
            "{:?}: {} is {}",
            self.strategy,
            dest.display(),
            if stale { "stale" } else { "current" }
        );
        Ok(stale)
    }
}

/// One-shot staleness check with the default buffer size
///
/// # Errors
///
/// See [`ChangeDetector::is_stale`].
pub async fn is_stale(source: &Path, dest: &Path, strategy: ChangeDetectionStrategy) -> Result<bool> {
    ChangeDetector::new(strategy, DEFAULT_BUFFER_SIZE)
        .is_stale(source, dest)
        .await
}

async fn modified_date_stale(source: &Path, dest: &Path) -> Result<bool> {
    let (source_mtime, dest_mtime) = futures::join!(modified_time(source), modified_time(dest));

    let dest_mtime = match dest_mtime? {
        Ok(mtime) => mtime,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(true),
        Err(e) => return Err(metadata_error(dest, &e)),
    };
    let source_mtime = source_mtime?.map_err(|e| metadata_error(source, &e))?;

    Ok(source_mtime > dest_mtime)
}

/// Modification time read with `std::fs` on the blocking pool
///
/// compio's own metadata reports zeroed timestamps, so it cannot be used
/// here. The outer error is a failed task, the inner one the stat itself.
async fn modified_time(path: &Path) -> Result<std::io::Result<SystemTime>> {
    let owned = path.to_path_buf();
    compio::runtime::spawn_blocking(move || std::fs::metadata(&owned)?.modified())
        .await
        .map_err(|e| SyncError::TaskFailed(format!("stat task for {} failed: {e:?}", path.display())))
}

async fn content_differs(source: &Path, dest: &Path, buffer_size: usize) -> Result<bool> {
    let dest_file = match File::open(dest).await {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(true),
        Err(e) => return Err(open_error(dest, &e)),
    };
    let source_file = File::open(source).await.map_err(|e| open_error(source, &e))?;

    let source_len = source_file
        .metadata()
        .await
        .map_err(|e| metadata_error(source, &e))?
        .len();
    let dest_len = dest_file
        .metadata()
        .await
        .map_err(|e| metadata_error(dest, &e))?
        .len();
    if source_len != dest_len {
        return Ok(true);
    }

    let mut offset = 0u64;
    while offset < source_len {
        let (source_chunk, dest_chunk) = futures::join!(
            read_chunk(&source_file, offset, buffer_size),
            read_chunk(&dest_file, offset, buffer_size)
        );
        let source_chunk = source_chunk.map_err(|e| read_error(source, &e))?;
        let dest_chunk = dest_chunk.map_err(|e| read_error(dest, &e))?;

        if source_chunk != dest_chunk {
            return Ok(true);
        }
        if source_chunk.is_empty() {
            // Truncated underneath us; equal so far and both at EOF
            break;
        }
        offset += source_chunk.len() as u64;
    }

    Ok(false)
}

/// Read up to `len` bytes at `offset`, retrying short reads until EOF
async fn read_chunk(file: &File, offset: u64, len: usize) -> std::io::Result<Vec<u8>> {
    let mut chunk = Vec::with_capacity(len);
    while chunk.len() < len {
        let buffer = vec![0u8; len - chunk.len()];
        let result = file.read_at(buffer, offset + chunk.len() as u64).await;
        let bytes_read = result.0?;
        if bytes_read == 0 {
            break;
        }
        chunk.extend_from_slice(&result.1[..bytes_read]);
    }
    Ok(chunk)
}

fn metadata_error(path: &Path, e: &std::io::Error) -> SyncError {
    SyncError::MetadataFailed(format!("Failed to stat {}: {}", path.display(), e))
}

fn open_error(path: &Path, e: &std::io::Error) -> SyncError {
    SyncError::FileSystem(format!("Failed to open {}: {}", path.display(), e))
}

fn read_error(path: &Path, e: &std::io::Error) -> SyncError {
    SyncError::FileSystem(format!("Failed to read {}: {}", path.display(), e))
}
