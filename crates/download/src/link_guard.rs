//! Indirection checks along the resolved chain.
//!
//! A link placed *inside* the root can point anywhere, so every segment from
//! the first one below the root down to the leaf is inspected without
//! following it. The leaf must also be a regular file.

use std::fs::{self, Metadata};
use std::path::Path;

use tracing::warn;

use crate::error::AccessError;

#[cfg(windows)]
const FILE_ATTRIBUTE_REPARSE_POINT: u32 = 0x400;

/// Walk `path` below `root`, rejecting links, junctions and special files.
///
/// `path` must already be lexically contained in `root`.
pub fn check_chain(root: &Path, path: &Path) -> Result<(), AccessError> {
    let relative = path
        .strip_prefix(root)
        .map_err(|_| AccessError::InvalidPath)?;

    let mut current = root.to_path_buf();
    let mut leaf: Option<Metadata> = None;

    for segment in relative.components() {
        current.push(segment);

        let metadata = fs::symlink_metadata(&current).map_err(|e| {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(error = %e, "Failed to inspect path segment");
            }
            AccessError::from_lookup(e)
        })?;

        if is_indirection(&metadata) {
            warn!(
                security_event = "link_escape_attempt",
                reason = "indirection_segment",
                "Blocked path containing a symbolic link or reparse point"
            );
            return Err(AccessError::PathNotAllowed);
        }

        leaf = Some(metadata);
    }

    match leaf {
        Some(metadata) if metadata.file_type().is_file() => Ok(()),
        Some(_) => {
            warn!(
                security_event = "special_file_access",
                reason = "not_regular_file",
                "Blocked request for a directory or special file"
            );
            Err(AccessError::PathNotAllowed)
        }
        None => Err(AccessError::InvalidPath),
    }
}

/// Whether an entry redirects somewhere else.
pub fn is_indirection(metadata: &Metadata) -> bool {
    if metadata.file_type().is_symlink() {
        return true;
    }

    #[cfg(windows)]
    {
        use std::os::windows::fs::MetadataExt;
        if metadata.file_attributes() & FILE_ATTRIBUTE_REPARSE_POINT != 0 {
            return true;
        }
    }

    false
}
