//! Outcome of a download attempt.

use std::fs::File;

use serde::Serialize;

use crate::error::{AccessError, RejectionKind};

/// A validated file ready to be streamed.
///
/// The handle is owned by whoever holds this value and is closed on drop.
#[derive(Debug)]
pub struct DownloadFile<H = File> {
    /// Open handle positioned at offset 0.
    pub handle: H,
    /// Plain file name, never a path.
    pub display_name: String,
    /// Content type derived from the extension.
    pub content_type: &'static str,
    /// Size in bytes, read from the open handle.
    pub size: u64,
}

impl<H> DownloadFile<H> {
    /// Swap the handle type, keeping the validated attributes.
    pub fn map_handle<T>(self, f: impl FnOnce(H) -> T) -> DownloadFile<T> {
        DownloadFile {
            handle: f(self.handle),
            display_name: self.display_name,
            content_type: self.content_type,
            size: self.size,
        }
    }
}

/// A refused request: kind plus a message safe to show externally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Rejection {
    pub kind: RejectionKind,
    pub message: &'static str,
}

impl Rejection {
    pub fn new(kind: RejectionKind) -> Self {
        Self {
            kind,
            message: kind.safe_message(),
        }
    }

    /// Transport status for this rejection.
    pub fn status_code(&self) -> u16 {
        self.kind.status_code()
    }
}

impl From<&AccessError> for Rejection {
    fn from(err: &AccessError) -> Self {
        Rejection::new(err.kind())
    }
}

impl From<AccessError> for Rejection {
    fn from(err: AccessError) -> Self {
        Rejection::from(&err)
    }
}

/// Result of running the access pipeline.
#[derive(Debug)]
#[must_use]
pub enum DownloadOutcome<H = File> {
    Success(DownloadFile<H>),
    Rejected(Rejection),
}

impl<H> DownloadOutcome<H> {
    pub fn is_success(&self) -> bool {
        matches!(self, DownloadOutcome::Success(_))
    }

    /// The rejection kind, if the request was refused.
    pub fn rejection_kind(&self) -> Option<RejectionKind> {
        match self {
            DownloadOutcome::Success(_) => None,
            DownloadOutcome::Rejected(rejection) => Some(rejection.kind),
        }
    }

    /// Convert into a `Result` for `?`-style callers.
    pub fn into_result(self) -> Result<DownloadFile<H>, Rejection> {
        match self {
            DownloadOutcome::Success(file) => Ok(file),
            DownloadOutcome::Rejected(rejection) => Err(rejection),
        }
    }

    /// Swap the handle type of a successful outcome.
    pub fn map_handle<T>(self, f: impl FnOnce(H) -> T) -> DownloadOutcome<T> {
        match self {
            DownloadOutcome::Success(file) => DownloadOutcome::Success(file.map_handle(f)),
            DownloadOutcome::Rejected(rejection) => DownloadOutcome::Rejected(rejection),
        }
    }
}

impl<H> From<Result<DownloadFile<H>, AccessError>> for DownloadOutcome<H> {
    fn from(result: Result<DownloadFile<H>, AccessError>) -> Self {
        match result {
            Ok(file) => DownloadOutcome::Success(file),
            Err(err) => DownloadOutcome::Rejected(Rejection::from(err)),
        }
    }
}
