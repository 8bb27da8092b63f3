//! Directory traversal and empty-directory pruning
//!
//! Enumeration walks a root through [`FileOperations::list_immediate_children`]
//! and collects every regular file in discovery order. Unreadable subtrees are
//! skipped with a warning rather than failing the whole scan.

use crate::error::{FileFailure, Pass, SyncError};
use crate::file_ops::{ChildKind, FileOperations};
use crate::paths::PathSet;
use async_recursion::async_recursion;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Outcome of enumerating one root
#[derive(Debug)]
pub struct ScanResult {
    /// Regular files found under the root
    pub paths: PathSet,
    /// Subtrees that could not be listed
    pub warnings: Vec<FileFailure>,
}

/// Outcome of pruning empty directories under one root
#[derive(Debug, Default)]
pub struct PruneResult {
    /// Directories that were removed, deepest first
    pub removed: Vec<PathBuf>,
    /// Directories that could not be listed or removed
    pub failures: Vec<FileFailure>,
}

/// Collect every regular file below `root`
///
/// Directories are descended into; symlinks and special files are skipped.
/// A root that does not exist yields an empty set without a warning.
pub async fn enumerate<O: FileOperations>(ops: &O, root: &Path) -> ScanResult {
    let mut result = ScanResult {
        paths: PathSet::new(root),
        warnings: Vec::new(),
    };

    walk(ops, root, true, &mut result).await;

    info!(
        "Scanned {}: {} files, {} unreadable subtrees",
        root.display(),
        result.paths.len(),
        result.warnings.len()
    );
    result
}

#[async_recursion(?Send)]
async fn walk<O: FileOperations>(ops: &O, dir: &Path, is_root: bool, result: &mut ScanResult) {
    let children = match ops.list_immediate_children(dir).await {
        Ok(children) => children,
        Err(SyncError::Io(e)) if is_root && e.kind() == ErrorKind::NotFound => {
            debug!("Root {} does not exist yet", dir.display());
            return;
        }
        Err(e) => {
            skip_subtree(dir, e, &mut result.warnings);
            return;
        }
    };

    for child in children {
        match child.kind {
            ChildKind::File => {
                result.paths.insert(child.path);
            }
            ChildKind::Directory => walk(ops, &child.path, false, result).await,
            ChildKind::Other => debug!("Skipping non-regular entry {}", child.path.display()),
        }
    }
}

fn skip_subtree(dir: &Path, error: SyncError, warnings: &mut Vec<FileFailure>) {
    warn!("Skipping unreadable directory {}: {}", dir.display(), error);
    warnings.push(FileFailure::new(
        dir,
        Pass::Scan,
        SyncError::DirectoryTraversal(format!("Failed to read directory {}: {}", dir.display(), error)),
    ));
}

/// Remove every directory under `root` that is, or becomes, empty
///
/// Children are pruned before their parent is examined, so a chain of
/// directories emptied from the bottom disappears in one call. `root` itself is
/// kept.
pub async fn prune_empty_directories<O: FileOperations>(ops: &O, root: &Path) -> PruneResult {
    let mut result = PruneResult::default();
    prune(ops, root, true, &mut result).await;
    if !result.removed.is_empty() {
        info!(
            "Pruned {} empty directories under {}",
            result.removed.len(),
            root.display()
        );
    }
    result
}

/// Returns true if `dir` was removed
#[async_recursion(?Send)]
async fn prune<O: FileOperations>(ops: &O, dir: &Path, is_root: bool, result: &mut PruneResult) -> bool {
    let children = match ops.list_immediate_children(dir).await {
        Ok(children) => children,
        Err(SyncError::Io(e)) if e.kind() == ErrorKind::NotFound => return false,
        Err(e) => {
            warn!("Cannot inspect {} for pruning: {}", dir.display(), e);
            result.failures.push(FileFailure::new(dir, Pass::Prune, e));
            return false;
        }
    };

    let mut remaining = children.len();
    for child in &children {
        if child.kind == ChildKind::Directory && prune(ops, &child.path, false, result).await {
            remaining -= 1;
        }
    }

    if is_root || remaining > 0 {
        return false;
    }

    let dir = dir.to_path_buf();
    match ops.remove_paths(std::slice::from_ref(&dir)).await.pop() {
        None => {
            debug!("Removed empty directory {}", dir.display());
            result.removed.push(dir);
            true
        }
        Some((path, error)) => {
            warn!("Failed to remove empty directory {}: {}", path.display(), error);
            result.failures.push(FileFailure::new(path, Pass::Prune, error));
            false
        }
    }
}
