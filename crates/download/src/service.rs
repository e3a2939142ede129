//! The access pipeline.
//!
//! ```text
//! normalize name -> resolve (lexical) -> link guard -> resolve (canonical)
//!   -> extension gate -> open -> size gate -> signature -> outcome
//! ```
//!
//! Each stage returns early on failure. Once the handle is open it is owned
//! by a local binding, so any later failure drops (closes) it before the
//! rejection is returned.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, error, info};

use crate::error::AccessError;
use crate::link_guard;
use crate::name::{extension_of, normalize_name};
use crate::opener::open_shared_read;
use crate::outcome::{DownloadFile, DownloadOutcome, Rejection};
use crate::policy::Policy;
use crate::resolve::{confirm_canonical, resolve_candidate};
use crate::signature;

/// A request that passed name, path, link and extension checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedTarget {
    /// Canonical path, under the root, free of indirections.
    pub path: PathBuf,
    /// Normalized extension (lower-case, leading dot).
    pub extension: String,
    /// Plain leaf name.
    pub display_name: String,
}

/// Entry point to the secure file access pipeline.
///
/// Cheap to clone; all clones share the same immutable [`Policy`].
#[derive(Debug, Clone)]
pub struct FileAccess {
    policy: Arc<Policy>,
}

impl FileAccess {
    /// Create a pipeline over a validated policy.
    pub fn new(policy: Policy) -> Self {
        Self::with_shared_policy(Arc::new(policy))
    }

    /// Create a pipeline over an already shared policy.
    pub fn with_shared_policy(policy: Arc<Policy>) -> Self {
        Self { policy }
    }

    /// The policy this pipeline enforces.
    pub fn policy(&self) -> &Policy {
        &self.policy
    }

    /// Run the path stages without opening anything.
    pub fn resolve(&self, requested: &str) -> Result<ResolvedTarget, AccessError> {
        let root = self.policy.root();

        let display_name = normalize_name(requested)?;
        let candidate = resolve_candidate(root, requested, &display_name)?;

        // Nothing above touches the filesystem; the allow-list answer must not
        // depend on whether the file exists.
        let extension = match extension_of(&display_name) {
            Some(ext) if self.policy.allows_extension(&ext) => ext,
            _ => {
                debug!(name = %display_name, "Rejected extension not on the allow-list");
                return Err(AccessError::TypeNotAllowed);
            }
        };

        link_guard::check_chain(root, &candidate)?;
        let path = confirm_canonical(root, &candidate)?;

        Ok(ResolvedTarget {
            path,
            extension,
            display_name,
        })
    }

    /// Run the full pipeline on the calling thread.
    pub fn open_blocking(&self, requested: &str) -> DownloadOutcome {
        let result = self.try_open(requested);
        match &result {
            Ok(file) => info!(
                name = %file.display_name,
                size = file.size,
                content_type = file.content_type,
                "Serving file"
            ),
            Err(AccessError::Io(source)) => error!(error = %source, "Download failed"),
            Err(other) => debug!(kind = ?other.kind(), "Download rejected"),
        }
        DownloadOutcome::from(result)
    }

    /// Run the full pipeline on the blocking pool and hand back an async handle.
    ///
    /// The pipeline runs to completion as one unit, so the caller only ever
    /// suspends around it. If the returned future is dropped, the finished
    /// job's outcome is discarded and its handle closed.
    pub async fn open(&self, requested: &str) -> DownloadOutcome<tokio::fs::File> {
        let access = self.clone();
        let requested = requested.to_owned();

        match tokio::task::spawn_blocking(move || access.open_blocking(&requested)).await {
            Ok(outcome) => outcome.map_handle(tokio::fs::File::from_std),
            Err(e) => {
                error!(error = %e, "Download task failed");
                DownloadOutcome::Rejected(Rejection::from(AccessError::Io(
                    std::io::Error::other("download task failed"),
                )))
            }
        }
    }

    fn try_open(&self, requested: &str) -> Result<DownloadFile, AccessError> {
        let target = self.resolve(requested)?;

        let (mut handle, metadata) = open_shared_read(&target.path)?;

        let size = metadata.len();
        if size == 0 {
            debug!(name = %target.display_name, "Empty file treated as missing");
            return Err(AccessError::NotFound);
        }
        if !self.policy.allows_size(size) {
            info!(
                name = %target.display_name,
                size,
                limit = self.policy.max_bytes(),
                "Rejected file over the size limit"
            );
            return Err(AccessError::TooLarge);
        }

        signature::validate(&mut handle, &target.extension)?;

        Ok(DownloadFile {
            handle,
            content_type: signature::content_type_for(&target.extension),
            display_name: target.display_name,
            size,
        })
    }
}
