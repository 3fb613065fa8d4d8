//! # coderun
//!
//! Sandboxed execution of untrusted JavaScript and Java snippets for a
//! browser-based IDE.
//!
//! ## Features
//!
//! - **Throwaway containers:** one locked-down container per request, no network,
//!   read-only root, all capabilities dropped
//! - **Two-layer timeouts:** in-container `timeout` plus a host-side backstop
//! - **Guaranteed cleanup:** per-request workspaces removed on every exit path
//! - **Two backends:** Docker Engine API or the `docker` CLI

pub mod config;
pub mod error;
pub mod sandbox;
pub mod server;
pub mod service;

pub use config::Config;
pub use error::{Error, Result};
pub use service::ExecutionService;

/// Application version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const NAME: &str = env!("CARGO_PKG_NAME");
