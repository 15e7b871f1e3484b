//! # Engine Module
//!
//! Orchestrates one comparison: decode -> normalize -> grayscale ->
//! structural similarity -> threshold -> regions -> annotate -> persist.
//!
//! ## Example
//! ```rust,ignore
//! use image_diff::config::ServiceConfig;
//! use image_diff::core::artifacts::ArtifactKey;
//! use image_diff::core::engine::DiffEngine;
//!
//! let engine = DiffEngine::new(ServiceConfig::default());
//! let report = engine.compare_upload(&bytes, "upload.jpg", &ArtifactKey::Latest)?;
//! println!("{}", report.prediction());
//! ```

mod executor;

pub use executor::{ComparisonOutcome, DiffEngine, DiffEngineBuilder};
