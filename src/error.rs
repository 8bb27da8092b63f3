//! Error handling and types

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Synchronization and file operation errors
#[derive(Error, Debug)]
pub enum SyncError {
    /// Standard I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid configuration error
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A root path that must never be synced to or from
    #[error("Refusing to use {path:?} as {role} root: {reason}")]
    ForbiddenRoot {
        /// Which side of the sync the path was given for
        role: RootRole,
        /// The rejected path, as supplied
        path: PathBuf,
        /// Why it was rejected
        reason: &'static str,
    },

    /// Directory traversal failed
    #[error("Directory traversal failed: {0}")]
    DirectoryTraversal(String),

    /// File copy operation failed
    #[error("Copy operation failed: {0}")]
    CopyFailed(String),

    /// Metadata operation failed
    #[error("Metadata operation failed: {0}")]
    MetadataFailed(String),

    /// Deleting a file or directory failed
    #[error("Remove operation failed: {0}")]
    RemoveFailed(String),

    /// General filesystem error
    #[error("File system error: {0}")]
    FileSystem(String),

    /// A spawned per-file task panicked or was cancelled
    #[error("Task failed: {0}")]
    TaskFailed(String),
}

impl SyncError {
    /// Whether this error is a configuration error (fatal, raised before any I/O)
    #[must_use]
    pub const fn is_config_error(&self) -> bool {
        matches!(self, Self::InvalidConfig(_) | Self::ForbiddenRoot { .. })
    }
}

pub type Result<T> = std::result::Result<T, SyncError>;

/// Which side of the sync a root belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RootRole {
    Source,
    Destination,
}

impl fmt::Display for RootRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Source => f.write_str("source"),
            Self::Destination => f.write_str("destination"),
        }
    }
}

/// The step of a run in which a non-fatal error happened
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pass {
    Scan,
    Remove,
    Prune,
    Add,
    Update,
}

impl fmt::Display for Pass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Scan => "scan",
            Self::Remove => "remove",
            Self::Prune => "prune",
            Self::Add => "add",
            Self::Update => "update",
        };
        f.write_str(name)
    }
}

/// A non-fatal error tied to one path
///
/// The run records these instead of aborting; a run that finishes with any
/// failures is a partial success.
#[derive(Debug)]
pub struct FileFailure {
    /// Path the failed operation was acting on
    pub path: PathBuf,
    /// Step that produced the failure
    pub pass: Pass,
    /// Underlying error
    pub error: SyncError,
}

impl FileFailure {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>, pass: Pass, error: SyncError) -> Self {
        Self {
            path: path.into(),
            pass,
            error,
        }
    }
}

impl fmt::Display for FileFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.pass, self.path.display(), self.error)
    }
}
