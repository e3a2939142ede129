//! Handle acquisition.
//!
//! The file is opened before anything about its size or content is trusted.
//! Every later decision reads from the returned handle, so the object that
//! was validated is the object that gets served, even if the name is
//! re-pointed afterwards.

use std::fs::{File, Metadata, OpenOptions};
use std::path::Path;

use tracing::{debug, warn};

use crate::error::AccessError;
use crate::link_guard::is_indirection;

#[cfg(windows)]
const FILE_SHARE_READ: u32 = 0x0000_0001;
#[cfg(windows)]
const FILE_FLAG_OPEN_REPARSE_POINT: u32 = 0x0020_0000;

/// Open `path` read-only and return the handle with its own metadata.
///
/// On Unix the open refuses to follow a final symlink (`O_NOFOLLOW`) and does
/// not wait on a FIFO (`O_NONBLOCK`). On Windows other openers may only read
/// while the handle lives, and a reparse point is opened as itself instead of
/// its target. The handle must describe a regular file.
pub fn open_shared_read(path: &Path) -> Result<(File, Metadata), AccessError> {
    let file = open_options().open(path).map_err(classify_open_error)?;

    let metadata = file.metadata().map_err(|e| {
        warn!(error = %e, "Failed to read metadata from open handle");
        AccessError::Io(e)
    })?;

    if is_indirection(&metadata) || !metadata.file_type().is_file() {
        warn!(
            security_event = "substitution_attempt",
            reason = "handle_not_regular_file",
            "Opened handle does not refer to a regular file"
        );
        return Err(AccessError::PathNotAllowed);
    }

    debug!(size = metadata.len(), "Opened download handle");
    Ok((file, metadata))
}

#[cfg(unix)]
fn open_options() -> OpenOptions {
    use nix::fcntl::OFlag;
    use std::os::unix::fs::OpenOptionsExt;

    let mut options = OpenOptions::new();
    options
        .read(true)
        .custom_flags((OFlag::O_NOFOLLOW | OFlag::O_NONBLOCK).bits());
    options
}

#[cfg(windows)]
fn open_options() -> OpenOptions {
    use std::os::windows::fs::OpenOptionsExt;

    let mut options = OpenOptions::new();
    options
        .read(true)
        .share_mode(FILE_SHARE_READ)
        .custom_flags(FILE_FLAG_OPEN_REPARSE_POINT);
    options
}

#[cfg(not(any(unix, windows)))]
fn open_options() -> OpenOptions {
    let mut options = OpenOptions::new();
    options.read(true);
    options
}

fn classify_open_error(err: std::io::Error) -> AccessError {
    #[cfg(unix)]
    {
        if err.raw_os_error() == Some(nix::errno::Errno::ELOOP as i32) {
            warn!(
                security_event = "substitution_attempt",
                reason = "leaf_became_symlink",
                "Refused to open a leaf that is a symbolic link"
            );
            return AccessError::PathNotAllowed;
        }
    }

    if err.kind() == std::io::ErrorKind::NotFound {
        debug!("Download target vanished before open");
    } else {
        warn!(error = %err, "Failed to open download target");
    }
    AccessError::from_lookup(err)
}
