//! # safe-fetch
//!
//! Command-line front end for the [`download`] pipeline.
//!
//! The binary loads a TOML configuration, builds the immutable download
//! policy from it and answers requests the way an HTTP endpoint would:
//! a validated file is streamed with its headers, a rejection is answered
//! with its status code and safe message.
//!
//! - [`config`]: configuration file, env overrides and validation
//! - [`transport`]: status mapping, response headers, byte ranges, checksums

pub mod config;
pub mod transport;

pub use config::{default_config_path, Config, ConfigError};
pub use transport::{ByteRange, ResponseHead, TransportError};
