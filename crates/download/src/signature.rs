//! Magic-byte checks and content types.
//!
//! The check reads from the already-open handle. It is a consistency test
//! between name and content, not a malware scanner.

use std::io::{Read, Seek, SeekFrom};

use tracing::{error, warn};

use crate::error::AccessError;

/// Number of leading bytes inspected; covers the longest signature.
pub const SIGNATURE_PROBE_LEN: usize = 8;

/// Fallback content type for unmapped extensions.
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

const PNG_SIGNATURE: &[u8] = &[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];
const PDF_SIGNATURE: &[u8] = b"%PDF";
const JPEG_SIGNATURE: &[u8] = &[0xFF, 0xD8, 0xFF];

/// Expected leading bytes for an extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signature {
    /// Content must start with these bytes.
    Prefix(&'static [u8]),
    /// Any content is accepted.
    Any,
}

/// Signature table entry for a normalized extension, if one is registered.
pub fn signature_for(extension: &str) -> Option<Signature> {
    match extension {
        ".pdf" => Some(Signature::Prefix(PDF_SIGNATURE)),
        ".png" => Some(Signature::Prefix(PNG_SIGNATURE)),
        ".jpg" | ".jpeg" => Some(Signature::Prefix(JPEG_SIGNATURE)),
        ".txt" => Some(Signature::Any),
        _ => None,
    }
}

/// Whether an extension has a registered signature.
pub fn has_signature(extension: &str) -> bool {
    signature_for(extension).is_some()
}

/// Content type announced for an extension.
pub fn content_type_for(extension: &str) -> &'static str {
    match extension {
        ".txt" => "text/plain",
        ".csv" => "text/csv",
        ".htm" | ".html" => "text/html",
        ".json" => "application/json",
        ".xml" => "text/xml",
        ".pdf" => "application/pdf",
        ".zip" => "application/zip",
        ".png" => "image/png",
        ".jpg" | ".jpeg" => "image/jpeg",
        ".gif" => "image/gif",
        ".svg" => "image/svg+xml",
        ".webp" => "image/webp",
        _ => DEFAULT_CONTENT_TYPE,
    }
}

/// Check the handle's leading bytes against the extension's signature.
///
/// On success the read position is back at offset 0. On failure the caller
/// drops the handle.
pub fn validate<R: Read + Seek>(handle: &mut R, extension: &str) -> Result<(), AccessError> {
    let Some(signature) = signature_for(extension) else {
        warn!(
            security_event = "type_mismatch",
            extension = %extension,
            reason = "no_signature",
            "Rejected allowed extension without a registered signature"
        );
        return Err(AccessError::TypeMismatch);
    };

    if let Signature::Prefix(expected) = signature {
        let mut probe = [0u8; SIGNATURE_PROBE_LEN];
        let read = read_probe(handle, &mut probe)?;
        if !probe[..read].starts_with(expected) {
            warn!(
                security_event = "type_mismatch",
                extension = %extension,
                reason = "signature_mismatch",
                "Rejected file whose content does not match its extension"
            );
            return Err(AccessError::TypeMismatch);
        }
    }

    handle.seek(SeekFrom::Start(0)).map_err(|e| {
        error!(error = %e, "Failed to rewind download handle");
        AccessError::Io(e)
    })?;

    Ok(())
}

/// Fill `buf` from the handle, stopping early only at end of file.
fn read_probe<R: Read>(handle: &mut R, buf: &mut [u8]) -> Result<usize, AccessError> {
    let mut filled = 0;
    while filled < buf.len() {
        match handle.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => {
                error!(error = %e, "Failed to read signature probe");
                return Err(AccessError::Io(e));
            }
        }
    }
    Ok(filled)
}
