//! Path resolution and containment.
//!
//! Resolution happens in two steps around the link walk. [`resolve_candidate`]
//! rejects traversal and builds the joined path lexically; once the link guard
//! has inspected that chain, [`confirm_canonical`] lets the filesystem resolve
//! it and checks the result is the very same path, still under the root.

use std::fs;
use std::path::{Component, Path, PathBuf};

use tracing::{debug, warn};

use crate::error::AccessError;

/// Whether the raw request contains a `..` segment under either separator.
pub fn has_traversal(requested: &str) -> bool {
    requested.split(['/', '\\']).any(|segment| segment == "..")
}

/// Whether `path` is a strict descendant of `root`.
///
/// Comparison is per component, so `/data/secret` is not inside `/data/sec`.
/// Every component below the root must be a normal name.
pub fn is_contained(root: &Path, path: &Path) -> bool {
    match path.strip_prefix(root) {
        Ok(rest) => {
            let mut components = rest.components().peekable();
            components.peek().is_some()
                && components.all(|c| matches!(c, Component::Normal(_)))
        }
        Err(_) => false,
    }
}

/// Join the normalized name onto the root and check containment lexically.
pub fn resolve_candidate(
    root: &Path,
    requested: &str,
    plain_name: &str,
) -> Result<PathBuf, AccessError> {
    if has_traversal(requested) {
        warn!(
            security_event = "path_traversal_attempt",
            reason = "parent_segment",
            name = %plain_name,
            "Blocked request containing a parent-directory segment"
        );
        return Err(AccessError::InvalidPath);
    }

    let candidate = root.join(plain_name);
    if !is_contained(root, &candidate) {
        warn!(
            security_event = "path_traversal_attempt",
            reason = "outside_root",
            name = %plain_name,
            "Blocked name that does not stay under the storage root"
        );
        return Err(AccessError::InvalidPath);
    }

    Ok(candidate)
}

/// Canonicalize `candidate` through the filesystem and re-check it.
///
/// The canonical path must stay under the root and must equal the candidate,
/// up to letter case; any other difference means an indirection was
/// introduced after the link walk. Returns the on-disk spelling.
pub fn confirm_canonical(root: &Path, candidate: &Path) -> Result<PathBuf, AccessError> {
    let canonical = fs::canonicalize(candidate).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => AccessError::NotFound,
        _ => {
            warn!(error = %e, "Failed to canonicalize download candidate");
            AccessError::InvalidPath
        }
    })?;

    if !is_contained(root, &canonical) {
        warn!(
            security_event = "path_traversal_attempt",
            reason = "canonical_outside_root",
            "Blocked path that canonicalizes outside the storage root"
        );
        return Err(AccessError::InvalidPath);
    }

    if canonical != candidate {
        if differs_only_in_case(&canonical, candidate) {
            debug!("Canonical path differs from the request only in letter case");
            return Ok(canonical);
        }
        warn!(
            security_event = "link_escape_attempt",
            reason = "canonical_mismatch",
            "Blocked path whose canonical form differs from the checked chain"
        );
        return Err(AccessError::PathNotAllowed);
    }

    Ok(canonical)
}

/// Whether two paths are the same apart from ASCII letter case.
///
/// Case-insensitive filesystems report the on-disk spelling from
/// `canonicalize`, so `NOTES.txt` resolves to `notes.txt` without any link
/// being involved.
fn differs_only_in_case(canonical: &Path, candidate: &Path) -> bool {
    canonical
        .as_os_str()
        .eq_ignore_ascii_case(candidate.as_os_str())
}
