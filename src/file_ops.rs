//! Filesystem primitives the reconciler drives
//!
//! [`FileOperations`] is the seam between decision logic and I/O: the
//! enumerator lists directories through it and the reconciler performs every
//! mutation through it. [`CompioFileOps`] is the production implementation on
//! top of compio; tests wrap it to inject failures.
//!
//! None of the operations are atomic across paths. A batch removal reports
//! each path that failed and carries on with the rest.

use crate::copy::copy_file;
use crate::error::{Result, SyncError};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Kind of a directory entry, as seen without following symlinks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChildKind {
    File,
    Directory,
    /// Symlinks, sockets, devices, fifos
    Other,
}

/// One direct child of a listed directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Child {
    pub path: PathBuf,
    pub kind: ChildKind,
}

/// Primitive filesystem actions used by a sync run
///
/// Every method may fail; callers treat failures per path.
#[allow(async_fn_in_trait)]
pub trait FileOperations {
    /// Copy the bytes of `src` over `dst`, creating or truncating `dst`
    async fn copy_file(&self, src: &Path, dst: &Path) -> Result<u64>;

    /// Create `path` and any missing ancestors; succeeds if it already exists
    async fn make_directories(&self, path: &Path) -> Result<()>;

    /// Delete files and empty directories, returning the paths that failed
    async fn remove_paths(&self, paths: &[PathBuf]) -> Vec<(PathBuf, SyncError)>;

    /// List the direct children of a directory
    ///
    /// A missing directory is reported as [`SyncError::Io`] with
    /// [`ErrorKind::NotFound`].
    async fn list_immediate_children(&self, path: &Path) -> Result<Vec<Child>>;

    /// Kind of the entry at `path` without following symlinks, `None` if absent
    async fn entry_kind(&self, path: &Path) -> Result<Option<ChildKind>>;
}

/// [`FileOperations`] backed by compio's io_uring file API
#[derive(Debug, Clone)]
pub struct CompioFileOps {
    /// Buffer size for copy operations in bytes
    buffer_size: usize,
}

impl CompioFileOps {
    #[must_use]
    pub const fn new(buffer_size: usize) -> Self {
        Self { buffer_size }
    }
}

impl FileOperations for CompioFileOps {
    async fn copy_file(&self, src: &Path, dst: &Path) -> Result<u64> {
        copy_file(src, dst, self.buffer_size).await
    }

    async fn make_directories(&self, path: &Path) -> Result<()> {
        compio::fs::create_dir_all(path).await.map_err(|e| {
            SyncError::FileSystem(format!(
                "Failed to create directory {}: {}",
                path.display(),
                e
            ))
        })
    }

    async fn remove_paths(&self, paths: &[PathBuf]) -> Vec<(PathBuf, SyncError)> {
        let mut failures = Vec::new();

        for path in paths {
            let result = match compio::fs::symlink_metadata(path).await {
                Ok(metadata) if metadata.is_dir() => compio::fs::remove_dir(path).await,
                Ok(_) => compio::fs::remove_file(path).await,
                Err(e) => Err(e),
            };

            match result {
                Ok(()) => debug!("Removed {}", path.display()),
                Err(e) if e.kind() == ErrorKind::NotFound => {
                    debug!("Already gone: {}", path.display());
                }
                Err(e) => failures.push((
                    path.clone(),
                    SyncError::RemoveFailed(format!("Failed to remove {}: {}", path.display(), e)),
                )),
            }
        }

        failures
    }

    async fn list_immediate_children(&self, path: &Path) -> Result<Vec<Child>> {
        let dir = path.to_path_buf();
        let listing = compio::runtime::spawn_blocking(move || -> std::io::Result<Vec<Child>> {
            let mut children = Vec::new();
            for entry in std::fs::read_dir(&dir)? {
                let entry = entry?;
                children.push(Child {
                    path: entry.path(),
                    kind: kind_of(entry.file_type()?),
                });
            }
            Ok(children)
        })
        .await
        .map_err(|e| SyncError::TaskFailed(format!("directory listing task failed: {e:?}")))?;

        listing.map_err(SyncError::Io)
    }

    async fn entry_kind(&self, path: &Path) -> Result<Option<ChildKind>> {
        let owned = path.to_path_buf();
        let lookup = compio::runtime::spawn_blocking(move || std::fs::symlink_metadata(&owned))
            .await
            .map_err(|e| SyncError::TaskFailed(format!("stat task failed: {e:?}")))?;

        match lookup {
            Ok(metadata) => Ok(Some(kind_of(metadata.file_type()))),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(SyncError::MetadataFailed(format!(
                "Failed to stat {}: {}",
                path.display(),
                e
            ))),
        }
    }
}

fn kind_of(file_type: std::fs::FileType) -> ChildKind {
    if file_type.is_dir() {
        ChildKind::Directory
    } else if file_type.is_file() {
        ChildKind::File
    } else {
        ChildKind::Other
    }
}
