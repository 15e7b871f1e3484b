//! # Core Module
//!
//! The image comparison engine, free of any HTTP concerns.
//!
//! ## Modules
//! - `decode` - Turns uploads and files into pixels
//! - `normalize` - Stretches images onto the comparison grid
//! - `grayscale` - RGB to intensity conversion
//! - `similarity` - Structural similarity score and map
//! - `threshold` - Automatic binarisation of the difference map
//! - `regions` - Outer contours and their bounding boxes
//! - `annotate` - Draws region boxes onto color images
//! - `artifacts` - Persists the candidate slot and generated images
//! - `reporter` - Explains the result
//! - `engine` - Orchestrates the full comparison

pub mod annotate;
pub mod artifacts;
pub mod decode;
pub mod engine;
pub mod grayscale;
pub mod normalize;
pub mod regions;
pub mod reporter;
pub mod similarity;
pub mod threshold;

// Re-export commonly used types
pub use artifacts::{ArtifactKey, ArtifactPaths, ArtifactStore};
pub use engine::{ComparisonOutcome, DiffEngine};
pub use regions::Region;
pub use reporter::ComparisonReport;
