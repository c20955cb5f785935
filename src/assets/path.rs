//! Asset path convention
//!
//! Asset references are written relative to the public asset directory with a
//! leading slash and without the directory itself: `/textures/floor.png`.

use std::cmp::Ordering;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};

/// Errors for malformed asset references
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssetPathError {
    /// The reference is empty
    Empty,
    /// The reference points outside the asset directory (URL or absolute URI)
    External(String),
    /// The reference escapes the asset directory with `..`
    ParentTraversal(String),
}

impl std::fmt::Display for AssetPathError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Empty => write!(f, "empty asset path"),
            Self::External(p) => write!(f, "asset path '{p}' is not inside the asset directory"),
            Self::ParentTraversal(p) => write!(f, "asset path '{p}' escapes the asset directory"),
        }
    }
}

impl std::error::Error for AssetPathError {}

/// A validated asset reference in canonical form
///
/// Equality, ordering and hashing look at the canonical path only.
#[derive(Debug, Clone)]
pub struct AssetPath {
    path: String,
    stripped_prefix: bool,
}

impl AssetPath {
    /// Parse a reference, stripping a leading asset directory prefix if present
    ///
    /// # Errors
    ///
    /// Returns an error for empty references, URLs, and `..` segments
    pub fn parse(raw: &str, asset_root: &str) -> Result<Self, AssetPathError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(AssetPathError::Empty);
        }
        if trimmed.contains("://") || trimmed.starts_with("data:") {
            return Err(AssetPathError::External(trimmed.to_string()));
        }

        let mut rest = trimmed.trim_start_matches('/');
        let root = asset_root.trim_matches('/');
        let mut stripped_prefix = false;
        if !root.is_empty()
            && let Some(after) = rest.strip_prefix(root)
            && after.starts_with('/')
        {
            rest = after.trim_start_matches('/');
            stripped_prefix = true;
        }

        let mut segments = Vec::new();
        for segment in rest.split('/') {
            match segment {
                "" | "." => {}
                ".." => return Err(AssetPathError::ParentTraversal(trimmed.to_string())),
                other => segments.push(other),
            }
        }
        if segments.is_empty() {
            return Err(AssetPathError::Empty);
        }

        Ok(Self {
            path: format!("/{}", segments.join("/")),
            stripped_prefix,
        })
    }

    /// Canonical form, e.g. `/models/tree.glb`
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.path
    }

    /// Whether the raw reference carried the asset directory prefix
    #[must_use]
    pub fn had_root_prefix(&self) -> bool {
        self.stripped_prefix
    }

    /// File extension in lower case
    #[must_use]
    pub fn extension(&self) -> Option<String> {
        Path::new(&self.path)
            .extension()
            .map(|ext| ext.to_string_lossy().to_ascii_lowercase())
    }

    /// Location on disk below the given asset directory
    #[must_use]
    pub fn to_disk_path(&self, asset_dir: impl AsRef<Path>) -> PathBuf {
        asset_dir.as_ref().join(self.path.trim_start_matches('/'))
    }
}

impl PartialEq for AssetPath {
    fn eq(&self, other: &Self) -> bool {
        self.path == other.path
    }
}

impl Eq for AssetPath {}

impl Hash for AssetPath {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.path.hash(state);
    }
}

impl PartialOrd for AssetPath {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for AssetPath {
    fn cmp(&self, other: &Self) -> Ordering {
        self.path.cmp(&other.path)
    }
}

impl std::fmt::Display for AssetPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.path)
    }
}
