//! File content copying using compio positional I/O
//!
//! Copies are chunked `read_at`/`write_all_at` loops over io_uring-backed
//! files. The destination is created or truncated first; a failure partway
//! through leaves a short destination file behind, which the next run sees as
//! stale and rewrites.

use crate::error::{Result, SyncError};
use compio::fs::File;
use compio::io::{AsyncReadAt, AsyncWriteAtExt};
use std::path::Path;
use tracing::debug;

/// Copy `src` over `dst`, returning the number of bytes written
///
/// # Errors
///
/// Returns an error if the source cannot be opened or read, or the
/// destination cannot be created or written.
pub async fn copy_file(src: &Path, dst: &Path, buffer_size: usize) -> Result<u64> {
    let src_file = File::open(src).await.map_err(|e| {
        SyncError::CopyFailed(format!(
            "Failed to open source file {}: {}",
            src.display(),
            e
        ))
    })?;

    let mut dst_file = File::create(dst).await.map_err(|e| {
        SyncError::CopyFailed(format!(
            "Failed to create destination file {}: {}",
            dst.display(),
            e
        ))
    })?;

    let copied = copy_contents(&src_file, &mut dst_file, buffer_size)
        .await
        .map_err(|e| {
            SyncError::CopyFailed(format!(
                "{} -> {}: {}",
                src.display(),
                dst.display(),
                e
            ))
        })?;

    debug!(
        "Copied {} bytes from {} to {}",
        copied,
        src.display(),
        dst.display()
    );
    Ok(copied)
}

async fn copy_contents(
    src_file: &File,
    dst_file: &mut File,
    buffer_size: usize,
) -> std::io::Result<u64> {
    let mut buffer = vec![0u8; buffer_size];
    let mut offset = 0u64;

    loop {
        let result = src_file.read_at(buffer, offset).await;
        let bytes_read = result.0?;
        if bytes_read == 0 {
            break;
        }

        let write_buffer = result.1[..bytes_read].to_vec();
        dst_file.write_all_at(write_buffer, offset).await.0?;

        offset += bytes_read as u64;
        buffer = result.1;
    }

    Ok(offset)
}
