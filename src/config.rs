//! Run configuration and root guard rails
//!
//! A [`SyncConfig`] is an explicit value handed to [`crate::sync::sync_trees`];
//! nothing about a run lives in process-wide state. Validation only reads the
//! filesystem, so a rejected configuration can never mutate a tree.
//!
//! Roots are judged by where they really point: `..` segments and symlinks
//! are resolved before the `/`, home and nesting checks.

use crate::detector::ChangeDetectionStrategy;
use crate::error::{Result, RootRole, SyncError};
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

/// Default I/O buffer used for copying and content comparison
pub const DEFAULT_BUFFER_SIZE: usize = 64 * 1024;

/// Upper bound accepted for `max_files_in_flight`
pub const MAX_FILES_IN_FLIGHT_LIMIT: usize = 10_000;

/// Everything a single reconciliation run needs to know
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncConfig {
    /// Tree to mirror from
    pub source: PathBuf,
    /// Tree to make identical to `source`
    pub destination: PathBuf,
    /// How matched files are judged stale
    pub strategy: ChangeDetectionStrategy,
    /// Maximum number of concurrent per-file update tasks
    pub max_files_in_flight: usize,
    /// Buffer size in bytes for copy and compare
    pub buffer_size: usize,
    /// Report planned work without touching the destination
    pub dry_run: bool,
}

impl SyncConfig {
    #[must_use]
    pub fn new(
        source: impl Into<PathBuf>,
        destination: impl Into<PathBuf>,
        strategy: ChangeDetectionStrategy,
    ) -> Self {
        Self {
            source: source.into(),
            destination: destination.into(),
            strategy,
            max_files_in_flight: default_files_in_flight(),
            buffer_size: DEFAULT_BUFFER_SIZE,
            dry_run: false,
        }
    }

    /// Check the configuration against the guard rails
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::ForbiddenRoot`] if either root is empty, `/`, `~`
    /// or the user's home directory, and [`SyncError::InvalidConfig`] if the
    /// roots coincide, nest, or the tuning values are out of range.
    pub fn validate(&self) -> Result<()> {
        let home = home_dir();
        self.validate_with_home(home.as_deref())
    }

    /// Validate and return a copy whose roots are absolute
    ///
    /// # Errors
    ///
    /// Same as [`SyncConfig::validate`], plus an I/O error if the current
    /// directory is needed and unavailable.
    pub fn resolve(&self) -> Result<Self> {
        self.validate()?;
        Ok(Self {
            source: std::path::absolute(&self.source)?,
            destination: std::path::absolute(&self.destination)?,
            ..self.clone()
        })
    }

    fn validate_with_home(&self, home: Option<&Path>) -> Result<()> {
        let home = home.map(|h| resolve_root(h).unwrap_or_else(|_| h.to_path_buf()));
        let source = check_root(RootRole::Source, &self.source, home.as_deref())?;
        let destination = check_root(RootRole::Destination, &self.destination, home.as_deref())?;

        if source == destination {
            return Err(SyncError::InvalidConfig(format!(
                "source and destination are the same directory: {}",
                source.display()
            )));
        }
        if destination.starts_with(&source) || source.starts_with(&destination) {
            return Err(SyncError::InvalidConfig(format!(
                "source {} and destination {} must not be nested in each other",
                source.display(),
                destination.display()
            )));
        }

        if self.max_files_in_flight == 0 || self.max_files_in_flight > MAX_FILES_IN_FLIGHT_LIMIT {
            return Err(SyncError::InvalidConfig(format!(
                "max files in flight must be between 1 and {MAX_FILES_IN_FLIGHT_LIMIT}, got: {}",
                self.max_files_in_flight
            )));
        }
        if self.buffer_size == 0 {
            return Err(SyncError::InvalidConfig(
                "buffer size must be non-zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Reject roots whose deletion would be catastrophic
///
/// Returns the resolved root on success.
fn check_root(role: RootRole, path: &Path, home: Option<&Path>) -> Result<PathBuf> {
    let forbidden = |reason| {
        Err(SyncError::ForbiddenRoot {
            role,
            path: path.to_path_buf(),
            reason,
        })
    };

    if path.as_os_str().is_empty() {
        return forbidden("path is empty");
    }
    if path == Path::new("~") {
        return forbidden("home directory shorthand");
    }

    let resolved = resolve_root(path).map_err(|e| {
        SyncError::InvalidConfig(format!("cannot resolve {role} root {}: {e}", path.display()))
    })?;
    if resolved
        .components()
        .all(|c| matches!(c, Component::RootDir | Component::Prefix(_)))
    {
        return forbidden("filesystem root");
    }
    if home.is_some_and(|home| resolved == home) {
        return forbidden("home directory");
    }
    Ok(resolved)
}

/// Absolute path with symlinks and `..` resolved, even if it does not exist yet
///
/// The deepest existing ancestor is canonicalized and the missing tail is
/// appended lexically.
fn resolve_root(path: &Path) -> std::io::Result<PathBuf> {
    let absolute = std::path::absolute(path)?;
    let mut existing = absolute.as_path();
    let mut missing = Vec::new();

    let mut resolved = loop {
        match std::fs::canonicalize(existing) {
            Ok(canonical) => break canonical,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                let (Some(parent), Some(last)) = (existing.parent(), existing.components().next_back())
                else {
                    return Err(e);
                };
                missing.push(last);
                existing = parent;
            }
            Err(e) => return Err(e),
        }
    };

    for component in missing.into_iter().rev() {
        match component {
            Component::ParentDir => {
                resolved.pop();
            }
            Component::CurDir => {}
            other => resolved.push(other),
        }
    }
    Ok(resolved)
}

fn home_dir() -> Option<PathBuf> {
    std::env::var_os("HOME")
        .filter(|h| !h.is_empty())
        .map(PathBuf::from)
}

/// Concurrency used when the caller does not pick one
#[must_use]
pub fn default_files_in_flight() -> usize {
    num_cpus::get().clamp(1, 64) * 4
}
