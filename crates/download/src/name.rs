//! Requested-name normalization.

use tracing::warn;

use crate::error::AccessError;

/// Reduce an untrusted request to its final path component.
///
/// Both `/` and `\` count as separators regardless of platform, so a request
/// built for another OS cannot smuggle a directory prefix through. The result
/// is rejected if it is empty, whitespace-only, `.`/`..`, or contains a NUL
/// or other control character (the name is later echoed into headers).
pub fn normalize_name(requested: &str) -> Result<String, AccessError> {
    let name = requested
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default();

    if name.trim().is_empty() || name == "." || name == ".." {
        return Err(AccessError::InvalidName);
    }

    if name.chars().any(char::is_control) {
        warn!(
            security_event = "invalid_name",
            reason = "control_character",
            "Blocked file name with control character"
        );
        return Err(AccessError::InvalidName);
    }

    Ok(name.to_string())
}

/// Lower-cased extension of a plain name, with a leading dot.
///
/// Follows `Path::extension` semantics: a leading-dot name such as `.env`
/// has no extension.
pub fn extension_of(name: &str) -> Option<String> {
    std::path::Path::new(name)
        .extension()
        .and_then(|ext| ext.to_str())
        .filter(|ext| !ext.is_empty())
        .map(|ext| format!(".{}", ext.to_lowercase()))
}
