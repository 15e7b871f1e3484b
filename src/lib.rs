//! # Image Diff
//!
//! Compares an uploaded image against a fixed reference image and explains
//! where they differ.
//!
//! ## Core Philosophy
//! - **Show WHERE** - Box every region that differs, on both images
//! - **One number** - A structural similarity score users can read at a glance
//! - **Plain artifacts** - Everything the engine sees is written out as images
//!
//! ## Architecture
//! The library is split into a core engine (HTTP-agnostic) and presentation layers:
//! - `core` - The comparison engine
//! - `config` - Paths, sizes and server settings
//! - `events` - Event-driven progress reporting
//! - `error` - User-friendly error types
//! - `server` - HTTP front end
//! - `cli` - Command-line interface (binary only)

pub mod config;
pub mod core;
pub mod error;
pub mod events;
pub mod server;

// Re-export commonly used types at the crate root
pub use error::{ImageDiffError, Result};

/// Initialize tracing for the library
///
/// This should be called by the application entry point (CLI or server).
/// The filter comes from `RUST_LOG`, falling back to `default_filter`.
pub fn init_tracing(default_filter: &str) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| ImageDiffError::Config(format!("Failed to install tracing subscriber: {}", e)))
}
