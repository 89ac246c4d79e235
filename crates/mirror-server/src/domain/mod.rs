//! Domain layer for mirror-server.
//!
//! Holds the process-wide configuration.  It is fixed at startup and shared
//! read-only by every session; there is no runtime reload.

pub mod config;

pub use config::{ConfigError, FileConfig, ServerConfig};
