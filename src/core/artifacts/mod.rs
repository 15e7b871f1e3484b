//! # Artifacts Module
//!
//! Persists the candidate upload slot and the four comparison artifacts.
//!
//! ## Layout
//! - `upload_dir/<candidate>`: the most recent normalized upload
//! - `generated_dir/<name>`: artifacts of the latest comparison
//! - `generated_dir/<uuid>/<name>`: artifacts keyed by request
//!
//! Every file is encoded into a temporary file next to its destination
//! and renamed over it, so readers see either the previous or the new
//! image, never a partial one.

use crate::config::{ArtifactNames, ServiceConfig};
use crate::error::StorageError;
use image::codecs::jpeg::JpegEncoder;
use image::{GenericImageView, GrayImage, PixelWithColorType, RgbImage};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::debug;
use uuid::Uuid;

/// Where a comparison's artifacts go
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKey {
    /// Fixed file names, overwritten by every comparison
    Latest,
    /// A sub-directory named after the request
    Request(Uuid),
}

impl ArtifactKey {
    /// A fresh per-request key
    pub fn new_request() -> Self {
        ArtifactKey::Request(Uuid::new_v4())
    }
}

/// The four images produced by a comparison
#[derive(Debug, Clone)]
pub struct ComparisonArtifacts {
    /// Reference with region boxes drawn on it
    pub annotated_reference: RgbImage,
    /// Candidate with region boxes drawn on it
    pub annotated_candidate: RgbImage,
    /// Similarity map rescaled to 0-255
    pub difference: GrayImage,
    /// Binary threshold map
    pub threshold: GrayImage,
}

/// Where each artifact was written
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactPaths {
    pub annotated_reference: PathBuf,
    pub annotated_candidate: PathBuf,
    pub difference: PathBuf,
    pub threshold: PathBuf,
}

impl ArtifactPaths {
    /// All four paths in a fixed order
    pub fn all(&self) -> [&Path; 4] {
        [
            &self.annotated_reference,
            &self.annotated_candidate,
            &self.difference,
            &self.threshold,
        ]
    }
}

/// Writes uploads and artifacts to disk
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    candidate_path: PathBuf,
    generated_dir: PathBuf,
    names: ArtifactNames,
    jpeg_quality: u8,
}

impl ArtifactStore {
    /// Create a store from the service configuration
    pub fn from_config(config: &ServiceConfig) -> Self {
        Self {
            candidate_path: config.candidate_path(),
            generated_dir: config.generated_dir.clone(),
            names: config.artifact_names.clone(),
            jpeg_quality: config.jpeg_quality.clamp(1, 100),
        }
    }

    /// Directory the artifacts for `key` are written to
    pub fn artifact_dir(&self, key: &ArtifactKey) -> PathBuf {
        match key {
            ArtifactKey::Latest => self.generated_dir.clone(),
            ArtifactKey::Request(id) => self.generated_dir.join(id.to_string()),
        }
    }

    /// Paths the artifacts for `key` are written to
    pub fn paths_for(&self, key: &ArtifactKey) -> ArtifactPaths {
        let dir = self.artifact_dir(key);
        ArtifactPaths {
            annotated_reference: dir.join(&self.names.annotated_reference),
            annotated_candidate: dir.join(&self.names.annotated_candidate),
            difference: dir.join(&self.names.difference),
            threshold: dir.join(&self.names.threshold),
        }
    }

    /// Overwrite the candidate slot with a normalized upload
    pub fn store_candidate(&self, candidate: &RgbImage) -> Result<PathBuf, StorageError> {
        let path = self.candidate_path.clone();
        if let Some(dir) = path.parent() {
            ensure_dir(dir)?;
        }
        let staged = self.stage_jpeg(&path, candidate)?;
        commit(staged, &path)?;
        debug!(path = %path.display(), "candidate stored");
        Ok(path)
    }

    /// Write the four artifacts and return where they went.
    ///
    /// All four are encoded before any is renamed into place, so an encoding
    /// failure leaves the previous set untouched.
    pub fn persist(
        &self,
        artifacts: &ComparisonArtifacts,
        key: &ArtifactKey,
    ) -> Result<ArtifactPaths, StorageError> {
        ensure_dir(&self.artifact_dir(key))?;
        let paths = self.paths_for(key);

        let staged = [
            self.stage_jpeg(&paths.annotated_reference, &artifacts.annotated_reference)?,
            self.stage_jpeg(&paths.annotated_candidate, &artifacts.annotated_candidate)?,
            self.stage_jpeg(&paths.difference, &artifacts.difference)?,
            self.stage_jpeg(&paths.threshold, &artifacts.threshold)?,
        ];
        for (temp, path) in staged.into_iter().zip(paths.all()) {
            commit(temp, path)?;
        }

        debug!(dir = %self.artifact_dir(key).display(), "artifacts persisted");
        Ok(paths)
    }

    /// Encode `image` into a temporary file next to `path`
    fn stage_jpeg<I>(&self, path: &Path, image: &I) -> Result<NamedTempFile, StorageError>
    where
        I: GenericImageView,
        I::Pixel: PixelWithColorType,
    {
        let dir = path.parent().unwrap_or_else(|| Path::new("."));
        let write_error = |source: std::io::Error| StorageError::Write {
            path: path.to_path_buf(),
            source,
        };

        let mut temp = NamedTempFile::new_in(dir).map_err(write_error)?;
        {
            let mut writer = BufWriter::new(temp.as_file_mut());
            JpegEncoder::new_with_quality(&mut writer, self.jpeg_quality)
                .encode_image(image)
                .map_err(|e| StorageError::Encode {
                    path: path.to_path_buf(),
                    reason: e.to_string(),
                })?;
            writer.flush().map_err(write_error)?;
        }
        Ok(temp)
    }
}

fn commit(temp: NamedTempFile, path: &Path) -> Result<(), StorageError> {
    temp.persist(path).map_err(|e| StorageError::Write {
        path: path.to_path_buf(),
        source: e.error,
    })?;
    Ok(())
}

fn ensure_dir(dir: &Path) -> Result<(), StorageError> {
    fs::create_dir_all(dir).map_err(|e| StorageError::CreateDirectory {
        path: dir.to_path_buf(),
        source: e,
    })
}
