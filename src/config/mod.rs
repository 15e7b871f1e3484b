//! # Config Module
//!
//! Explicit service configuration: where uploads, the reference image and
//! generated artifacts live, the comparison size, and how the server binds.
//!
//! ## Example
//! ```rust,ignore
//! use image_diff::config::ServiceConfig;
//!
//! let config = ServiceConfig::builder()
//!     .static_dir("static")
//!     .bind_addr("0.0.0.0:8000")
//!     .per_request_artifacts(true)
//!     .build()?;
//! config.ensure_directories()?;
//! ```

use crate::core::similarity::DEFAULT_WINDOW_SIZE;
use crate::error::{ImageDiffError, StorageError};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

const UPLOAD_SUBDIR: &str = "uploads";
const ORIGINAL_SUBDIR: &str = "original";
const GENERATED_SUBDIR: &str = "generated";

/// Pixel grid both images are stretched to before comparison
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetSize {
    pub width: u32,
    pub height: u32,
}

impl TargetSize {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl Default for TargetSize {
    fn default() -> Self {
        Self::new(250, 160)
    }
}

impl std::fmt::Display for TargetSize {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// File names of the four generated artifacts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArtifactNames {
    pub annotated_reference: String,
    pub annotated_candidate: String,
    pub difference: String,
    pub threshold: String,
}

impl Default for ArtifactNames {
    fn default() -> Self {
        Self {
            annotated_reference: "image_original.jpg".to_string(),
            annotated_candidate: "image_uploaded.jpg".to_string(),
            difference: "image_diff.jpg".to_string(),
            threshold: "image_thresh.jpg".to_string(),
        }
    }
}

/// Complete service configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Root served under `/static`
    pub static_dir: PathBuf,
    /// Where the latest (normalized) upload is kept
    pub upload_dir: PathBuf,
    /// Where the reference image lives
    pub original_dir: PathBuf,
    /// Where comparison artifacts are written
    pub generated_dir: PathBuf,
    /// File name of the reference image inside `original_dir`
    pub reference_file_name: String,
    /// File name of the candidate slot inside `upload_dir`
    pub candidate_file_name: String,
    /// Size both images are normalized to
    pub target: TargetSize,
    /// Names of the generated artifacts
    pub artifact_names: ArtifactNames,
    /// Write each comparison into its own `generated_dir/<uuid>/` directory
    pub per_request_artifacts: bool,
    /// JPEG quality used for every written image (1-100)
    pub jpeg_quality: u8,
    /// Address the HTTP server listens on
    pub bind_addr: String,
    /// Largest accepted upload in bytes
    pub max_upload_bytes: usize,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        let static_dir = PathBuf::from("static");
        Self {
            upload_dir: static_dir.join(UPLOAD_SUBDIR),
            original_dir: static_dir.join(ORIGINAL_SUBDIR),
            generated_dir: static_dir.join(GENERATED_SUBDIR),
            static_dir,
            reference_file_name: "image.jpg".to_string(),
            candidate_file_name: "image.jpg".to_string(),
            target: TargetSize::default(),
            artifact_names: ArtifactNames::default(),
            per_request_artifacts: false,
            jpeg_quality: 95,
            bind_addr: "127.0.0.1:8000".to_string(),
            max_upload_bytes: 20 * 1024 * 1024,
        }
    }
}

impl ServiceConfig {
    /// Start building a configuration from the defaults
    pub fn builder() -> ServiceConfigBuilder {
        ServiceConfigBuilder::new()
    }

    /// Load a configuration from a JSON file.
    ///
    /// Fields missing from the file keep their default values, except the
    /// upload, original and generated directories, which follow the file's
    /// `static_dir` unless set explicitly.
    pub fn from_json_file(path: &Path) -> Result<Self, ImageDiffError> {
        let invalid =
            |e: serde_json::Error| ImageDiffError::Config(format!("Invalid config {}: {}", path.display(), e));
        let text = fs::read_to_string(path).map_err(|e| {
            ImageDiffError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        let value: serde_json::Value = serde_json::from_str(&text).map_err(invalid)?;
        let mut config: Self = serde_json::from_value(value.clone()).map_err(invalid)?;

        let static_dir = config.static_dir.clone();
        for (key, dir, name) in [
            ("upload_dir", &mut config.upload_dir, UPLOAD_SUBDIR),
            ("original_dir", &mut config.original_dir, ORIGINAL_SUBDIR),
            ("generated_dir", &mut config.generated_dir, GENERATED_SUBDIR),
        ] {
            if value.get(key).is_none() {
                *dir = static_dir.join(name);
            }
        }

        config.validate()?;
        Ok(config)
    }

    /// Full path of the reference image
    pub fn reference_path(&self) -> PathBuf {
        self.original_dir.join(&self.reference_file_name)
    }

    /// Full path of the candidate slot
    pub fn candidate_path(&self) -> PathBuf {
        self.upload_dir.join(&self.candidate_file_name)
    }

    /// Check values the engine cannot work with
    pub fn validate(&self) -> Result<(), ImageDiffError> {
        if self.target.width < DEFAULT_WINDOW_SIZE || self.target.height < DEFAULT_WINDOW_SIZE {
            return Err(ImageDiffError::Config(format!(
                "Target size {} is smaller than the {}x{} similarity window",
                self.target, DEFAULT_WINDOW_SIZE, DEFAULT_WINDOW_SIZE
            )));
        }
        if !(1..=100).contains(&self.jpeg_quality) {
            return Err(ImageDiffError::Config(format!(
                "Invalid JPEG quality: {} (must be 1-100)",
                self.jpeg_quality
            )));
        }
        if self.max_upload_bytes == 0 {
            return Err(ImageDiffError::Config(
                "max_upload_bytes must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Create the upload, original and generated directories if missing
    pub fn ensure_directories(&self) -> Result<(), StorageError> {
        for dir in [&self.upload_dir, &self.original_dir, &self.generated_dir] {
            if !dir.exists() {
                debug!(path = %dir.display(), "creating directory");
            }
            fs::create_dir_all(dir).map_err(|e| StorageError::CreateDirectory {
                path: dir.clone(),
                source: e,
            })?;
        }
        Ok(())
    }
}

/// Builder for [`ServiceConfig`]
pub struct ServiceConfigBuilder {
    config: ServiceConfig,
}

impl ServiceConfigBuilder {
    /// Create a new builder with default values
    pub fn new() -> Self {
        Self {
            config: ServiceConfig::default(),
        }
    }

    /// Start from an existing configuration (e.g. one loaded from a file)
    pub fn from_config(config: ServiceConfig) -> Self {
        Self { config }
    }

    /// Set the static root and re-derive the three working directories under it
    pub fn static_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        self.config.upload_dir = dir.join(UPLOAD_SUBDIR);
        self.config.original_dir = dir.join(ORIGINAL_SUBDIR);
        self.config.generated_dir = dir.join(GENERATED_SUBDIR);
        self.config.static_dir = dir;
        self
    }

    pub fn upload_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.upload_dir = dir.into();
        self
    }

    pub fn original_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.original_dir = dir.into();
        self
    }

    pub fn generated_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.generated_dir = dir.into();
        self
    }

    /// Set the size both images are normalized to
    pub fn target(mut self, target: TargetSize) -> Self {
        self.config.target = target;
        self
    }

    /// Key artifacts by request instead of overwriting one set of files
    pub fn per_request_artifacts(mut self, enabled: bool) -> Self {
        self.config.per_request_artifacts = enabled;
        self
    }

    pub fn jpeg_quality(mut self, quality: u8) -> Self {
        self.config.jpeg_quality = quality;
        self
    }

    pub fn bind_addr(mut self, addr: impl Into<String>) -> Self {
        self.config.bind_addr = addr.into();
        self
    }

    pub fn max_upload_bytes(mut self, limit: usize) -> Self {
        self.config.max_upload_bytes = limit;
        self
    }

    /// Validate and return the configuration
    pub fn build(self) -> Result<ServiceConfig, ImageDiffError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

impl Default for ServiceConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
