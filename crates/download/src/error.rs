//! Error types for the download subsystem.
//!
//! Every stage of the pipeline returns [`AccessError`]. Its `Display` output is
//! the externally safe message for the failure class; it never contains a
//! filesystem path. Underlying I/O errors are kept as the error source so they
//! can be logged, but they are not part of the message.

use serde::Serialize;
use thiserror::Error;

/// Pipeline failure raised by one of the access stages.
#[derive(Debug, Error)]
pub enum AccessError {
    /// The requested name is empty, whitespace-only, `.`/`..` or contains
    /// control characters.
    #[error("Invalid file name.")]
    InvalidName,

    /// The request tried to traverse, or the resolved path left the root.
    #[error("Invalid path.")]
    InvalidPath,

    /// A link, junction or non-regular file was found on the path.
    #[error("Path not allowed.")]
    PathNotAllowed,

    /// The extension is not on the allow-list.
    #[error("File type not allowed.")]
    TypeNotAllowed,

    /// The file does not exist (or vanished before it could be opened).
    #[error("Not found.")]
    NotFound,

    /// The opened file exceeds the configured maximum size.
    #[error("File too large.")]
    TooLarge,

    /// The file's leading bytes do not match its extension.
    #[error("Type mismatch.")]
    TypeMismatch,

    /// Unexpected filesystem failure.
    #[error("Internal error.")]
    Io(#[source] std::io::Error),
}

impl AccessError {
    /// The boundary-level kind of this error.
    pub fn kind(&self) -> RejectionKind {
        match self {
            AccessError::InvalidName => RejectionKind::InvalidName,
            AccessError::InvalidPath => RejectionKind::InvalidPath,
            AccessError::PathNotAllowed => RejectionKind::PathNotAllowed,
            AccessError::TypeNotAllowed => RejectionKind::TypeNotAllowed,
            AccessError::NotFound => RejectionKind::NotFound,
            AccessError::TooLarge => RejectionKind::TooLarge,
            AccessError::TypeMismatch => RejectionKind::TypeMismatch,
            AccessError::Io(_) => RejectionKind::IoError,
        }
    }

    /// Map an I/O error from a lookup or open into the closed taxonomy.
    ///
    /// Only "does not exist" is given a specific kind; everything else is a
    /// generic I/O failure so no errno leaks to the caller.
    pub(crate) fn from_lookup(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => AccessError::NotFound,
            _ => AccessError::Io(err),
        }
    }
}

/// Closed set of rejection kinds reported to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectionKind {
    /// The requested name is not a usable plain file name.
    InvalidName,
    /// The request traverses or resolves outside the root.
    InvalidPath,
    /// A link, junction or non-regular file was involved.
    PathNotAllowed,
    /// The extension is not on the allow-list.
    TypeNotAllowed,
    /// No such file, or the file is empty.
    NotFound,
    /// The file exceeds the size limit.
    TooLarge,
    /// Content does not match the extension.
    TypeMismatch,
    /// Unexpected filesystem failure.
    IoError,
}

impl RejectionKind {
    /// Transport status a caller must answer with for this kind.
    pub fn status_code(self) -> u16 {
        match self {
            RejectionKind::InvalidName
            | RejectionKind::InvalidPath
            | RejectionKind::PathNotAllowed
            | RejectionKind::TypeNotAllowed
            | RejectionKind::TypeMismatch => 400,
            RejectionKind::NotFound => 404,
            RejectionKind::TooLarge => 413,
            RejectionKind::IoError => 500,
        }
    }

    /// Message that is safe to show to the requester.
    pub fn safe_message(self) -> &'static str {
        match self {
            RejectionKind::InvalidName => "Invalid file name.",
            RejectionKind::InvalidPath => "Invalid path.",
            RejectionKind::PathNotAllowed => "Path not allowed.",
            RejectionKind::TypeNotAllowed => "File type not allowed.",
            RejectionKind::NotFound => "Not found.",
            RejectionKind::TooLarge => "File too large.",
            RejectionKind::TypeMismatch => "Type mismatch.",
            RejectionKind::IoError => "Internal error.",
        }
    }
}
