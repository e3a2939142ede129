//! Immutable download policy.
//!
//! A [`Policy`] is built once from external configuration, validated eagerly,
//! and shared read-only by every request afterwards. There are no setters;
//! a different policy means building a new value.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::warn;

use crate::signature;

/// Smallest maximum size a policy accepts.
pub const MIN_MAX_BYTES: u64 = 1_000;

/// Default maximum size (50MB).
pub const DEFAULT_MAX_BYTES: u64 = 50_000_000;

/// Policy validation errors.
#[derive(Debug, Error, PartialEq)]
pub enum PolicyError {
    #[error("root is required")]
    MissingRoot,

    #[error("root must be an absolute path, got {0}")]
    RelativeRoot(PathBuf),

    #[error("root does not exist: {0}")]
    RootNotFound(PathBuf),

    #[error("root is not a directory: {0}")]
    RootNotADirectory(PathBuf),

    #[error("failed to canonicalize root {path}: {reason}")]
    RootUnresolvable { path: PathBuf, reason: String },

    #[error("allowed_extensions must have at least one value")]
    NoExtensions,

    #[error("allowed_extensions contains an empty value")]
    EmptyExtension,

    #[error("max_bytes must be >= {MIN_MAX_BYTES}, got {0}")]
    MaxBytesTooSmall(u64),
}

/// Validated, immutable access policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Policy {
    root: PathBuf,
    allowed_extensions: BTreeSet<String>,
    max_bytes: u64,
}

impl Policy {
    /// Validate and normalize a policy.
    ///
    /// The root is canonicalized through the filesystem; extensions are
    /// trimmed, lower-cased, given a leading dot and de-duplicated.
    pub fn new<P, I, S>(root: P, allowed_extensions: I, max_bytes: u64) -> Result<Self, PolicyError>
    where
        P: AsRef<Path>,
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let root = root.as_ref();
        if root.as_os_str().is_empty() {
            return Err(PolicyError::MissingRoot);
        }
        if !root.is_absolute() {
            return Err(PolicyError::RelativeRoot(root.to_path_buf()));
        }

        let metadata = fs::metadata(root).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => PolicyError::RootNotFound(root.to_path_buf()),
            _ => PolicyError::RootUnresolvable {
                path: root.to_path_buf(),
                reason: e.to_string(),
            },
        })?;
        if !metadata.is_dir() {
            return Err(PolicyError::RootNotADirectory(root.to_path_buf()));
        }

        let canonical_root = fs::canonicalize(root).map_err(|e| PolicyError::RootUnresolvable {
            path: root.to_path_buf(),
            reason: e.to_string(),
        })?;

        let allowed_extensions = normalize_extensions(allowed_extensions)?;

        if max_bytes < MIN_MAX_BYTES {
            return Err(PolicyError::MaxBytesTooSmall(max_bytes));
        }

        for ext in &allowed_extensions {
            if !signature::has_signature(ext) {
                warn!(
                    extension = %ext,
                    "Allowed extension has no content signature; such files will be rejected"
                );
            }
        }

        Ok(Self {
            root: canonical_root,
            allowed_extensions,
            max_bytes,
        })
    }

    /// Canonical absolute storage root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Normalized allow-list (lower-case, leading dot).
    pub fn allowed_extensions(&self) -> impl Iterator<Item = &str> {
        self.allowed_extensions.iter().map(String::as_str)
    }

    /// Maximum size in bytes a served file may have.
    pub fn max_bytes(&self) -> u64 {
        self.max_bytes
    }

    /// Whether an already-normalized extension is on the allow-list.
    pub fn allows_extension(&self, extension: &str) -> bool {
        self.allowed_extensions.contains(extension)
    }

    /// Whether a file of `size` bytes is within the limit.
    pub fn allows_size(&self, size: u64) -> bool {
        size <= self.max_bytes
    }
}

/// Normalize one extension: trimmed, lower-case, with a leading dot.
///
/// Returns `None` for blank input.
pub fn normalize_extension(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed == "." {
        return None;
    }
    let lower = trimmed.to_lowercase();
    if lower.starts_with('.') {
        Some(lower)
    } else {
        Some(format!(".{lower}"))
    }
}

fn normalize_extensions<I, S>(raw: I) -> Result<BTreeSet<String>, PolicyError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut set = BTreeSet::new();
    for ext in raw {
        let normalized = normalize_extension(ext.as_ref()).ok_or(PolicyError::EmptyExtension)?;
        set.insert(normalized);
    }
    if set.is_empty() {
        return Err(PolicyError::NoExtensions);
    }
    Ok(set)
}
