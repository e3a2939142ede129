//! # Download
//!
//! Confined, substitution-safe file access for download endpoints.
//!
//! Given an untrusted file name and an immutable [`Policy`], the pipeline
//! either yields an open, validated handle or a typed rejection. It defends
//! against:
//!
//! - **Path traversal**: names are reduced to their last component, `..`
//!   segments are refused, and containment is checked per path component.
//! - **Link escape**: every segment below the root is inspected without being
//!   followed; symbolic links and reparse points are refused.
//! - **Check/use races**: the file is opened first and size and content are
//!   read from that handle only.
//! - **Type spoofing**: leading bytes must match the extension's signature.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use download::{DownloadOutcome, FileAccess, Policy};
//!
//! # async fn serve() -> Result<(), Box<dyn std::error::Error>> {
//! let policy = Policy::new("/data/downloads", [".txt", ".pdf"], 50_000_000)?;
//! let access = FileAccess::new(policy);
//!
//! match access.open("report.pdf").await {
//!     DownloadOutcome::Success(file) => {
//!         // stream file.handle with file.content_type / file.display_name
//!     }
//!     DownloadOutcome::Rejected(rejection) => {
//!         // answer rejection.status_code() with rejection.message
//!     }
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - [`policy`]: validated, immutable configuration
//! - [`name`]: requested-name normalization
//! - [`resolve`]: joining and containment
//! - [`link_guard`]: link and special-file checks
//! - [`opener`]: handle acquisition
//! - [`signature`]: magic bytes and content types
//! - [`outcome`]: success and rejection values
//! - [`service`]: the pipeline

pub mod error;
pub mod link_guard;
pub mod name;
pub mod opener;
pub mod outcome;
pub mod policy;
pub mod resolve;
pub mod service;
pub mod signature;

pub use error::{AccessError, RejectionKind};
pub use outcome::{DownloadFile, DownloadOutcome, Rejection};
pub use policy::{Policy, PolicyError, DEFAULT_MAX_BYTES, MIN_MAX_BYTES};
pub use service::{FileAccess, ResolvedTarget};
