//! Path sets and relative keys
//!
//! A file under the source root and a file under the destination root are the
//! same logical entry when their [`RelativeKey`]s match. Keys come from
//! component-wise prefix stripping, so a root string that happens to recur
//! deeper in a path cannot confuse the mapping.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Path of a file relative to the root it was found under
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RelativeKey(PathBuf);

impl RelativeKey {
    /// Strip `root` from `path`; `None` if `path` is not strictly below `root`
    #[must_use]
    pub fn from_path(root: &Path, path: &Path) -> Option<Self> {
        let suffix = path.strip_prefix(root).ok()?;
        if suffix.as_os_str().is_empty() {
            return None;
        }
        Some(Self(suffix.to_path_buf()))
    }

    /// The same entry located under another root
    #[must_use]
    pub fn under(&self, root: &Path) -> PathBuf {
        root.join(&self.0)
    }

    #[must_use]
    pub fn as_path(&self) -> &Path {
        &self.0
    }
}

/// Files discovered under one root, in discovery order, without duplicates
#[derive(Debug, Clone)]
pub struct PathSet {
    root: PathBuf,
    paths: Vec<PathBuf>,
    keys: HashSet<RelativeKey>,
}

impl PathSet {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            paths: Vec::new(),
            keys: HashSet::new(),
        }
    }

    /// Build a set from already-discovered paths, keeping their order
    ///
    /// Paths outside `root` and repeats are dropped.
    #[must_use]
    pub fn from_paths<I, P>(root: impl Into<PathBuf>, paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        let mut set = Self::new(root);
        for path in paths {
            set.insert(path.into());
        }
        set
    }

    /// Append a path; returns false if it was already present or not under the root
    pub fn insert(&mut self, path: PathBuf) -> bool {
        let Some(key) = RelativeKey::from_path(&self.root, &path) else {
            return false;
        };
        if !self.keys.insert(key) {
            return false;
        }
        self.paths.push(path);
        true
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.paths.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    /// Paths in discovery order
    pub fn iter(&self) -> impl Iterator<Item = &Path> {
        self.paths.iter().map(PathBuf::as_path)
    }

    /// Paths paired with their relative keys, in discovery order
    pub fn entries(&self) -> impl Iterator<Item = (&Path, RelativeKey)> + '_ {
        self.paths.iter().filter_map(move |path| {
            RelativeKey::from_path(&self.root, path).map(|key| (path.as_path(), key))
        })
    }

    #[must_use]
    pub fn contains_key(&self, key: &RelativeKey) -> bool {
        self.keys.contains(key)
    }
}
