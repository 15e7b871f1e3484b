//! Comparison execution.

use crate::config::ServiceConfig;
use crate::core::annotate::{draw_regions, BOX_COLOR, BOX_STROKE};
use crate::core::artifacts::{ArtifactKey, ArtifactStore, ComparisonArtifacts};
use crate::core::decode::{decode_bytes, decode_file};
use crate::core::grayscale::to_gray;
use crate::core::normalize::Normalizer;
use crate::core::regions::{external_regions, Region};
use crate::core::reporter::{round_percent, ComparisonReport};
use crate::core::similarity::{structural_similarity_with, SsimConfig};
use crate::core::threshold::otsu_inverse;
use crate::error::{CompareError, ImageDiffError};
use crate::events::{null_sender, ComparisonEvent, ComparisonPhase, Event, EventSender};
use chrono::Utc;
use image::{DynamicImage, Rgb, RgbImage};
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info, warn};

/// In-memory result of comparing two images
#[derive(Debug, Clone)]
pub struct ComparisonOutcome {
    /// Mean structural similarity in [0, 1]
    pub score: f64,
    /// Score x 100, rounded to two decimals
    pub score_percent: f64,
    /// Otsu level used for the threshold map
    pub threshold_level: u8,
    /// Boxes around differing regions
    pub regions: Vec<Region>,
    /// Annotated images, difference map and threshold map
    pub artifacts: ComparisonArtifacts,
}

/// Builder for [`DiffEngine`]
pub struct DiffEngineBuilder {
    config: ServiceConfig,
    ssim: SsimConfig,
    box_color: Rgb<u8>,
    box_stroke: u32,
}

impl DiffEngineBuilder {
    /// Create a builder with the default configuration
    pub fn new() -> Self {
        Self {
            config: ServiceConfig::default(),
            ssim: SsimConfig::default(),
            box_color: BOX_COLOR,
            box_stroke: BOX_STROKE,
        }
    }

    /// Use the given service configuration
    pub fn config(mut self, config: ServiceConfig) -> Self {
        self.config = config;
        self
    }

    /// Override the SSIM parameters
    pub fn ssim(mut self, ssim: SsimConfig) -> Self {
        self.ssim = ssim;
        self
    }

    /// Colour of the region boxes
    pub fn box_color(mut self, color: Rgb<u8>) -> Self {
        self.box_color = color;
        self
    }

    /// Stroke width of the region boxes
    pub fn box_stroke(mut self, stroke: u32) -> Self {
        self.box_stroke = stroke;
        self
    }

    /// Build the engine
    pub fn build(self) -> DiffEngine {
        DiffEngine {
            store: ArtifactStore::from_config(&self.config),
            config: self.config,
            ssim: self.ssim,
            box_color: self.box_color,
            box_stroke: self.box_stroke,
        }
    }
}

impl Default for DiffEngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Compares candidate images against a reference image
pub struct DiffEngine {
    config: ServiceConfig,
    ssim: SsimConfig,
    store: ArtifactStore,
    box_color: Rgb<u8>,
    box_stroke: u32,
}

impl DiffEngine {
    /// Create an engine with default SSIM and annotation settings
    pub fn new(config: ServiceConfig) -> Self {
        DiffEngineBuilder::new().config(config).build()
    }

    /// Create a new engine builder
    pub fn builder() -> DiffEngineBuilder {
        DiffEngineBuilder::new()
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    pub fn store(&self) -> &ArtifactStore {
        &self.store
    }

    /// Compare two decoded images without touching the filesystem.
    ///
    /// Both images are stretched to the configured target size first.
    pub fn compare_images(
        &self,
        reference: &DynamicImage,
        candidate: &DynamicImage,
    ) -> Result<ComparisonOutcome, CompareError> {
        let mut normalizer = Normalizer::new(self.config.target);
        let reference = normalizer.resize_rgb(reference)?;
        let candidate = normalizer.resize_rgb(candidate)?;
        self.compare_normalized(reference, candidate, &null_sender())
    }

    /// Compare an uploaded image against the configured reference image
    pub fn compare_upload(
        &self,
        bytes: &[u8],
        source_name: &str,
        key: &ArtifactKey,
    ) -> Result<ComparisonReport, ImageDiffError> {
        self.compare_upload_with_events(bytes, source_name, key, &null_sender())
    }

    /// Compare an uploaded image with event reporting
    pub fn compare_upload_with_events(
        &self,
        bytes: &[u8],
        source_name: &str,
        key: &ArtifactKey,
        events: &EventSender,
    ) -> Result<ComparisonReport, ImageDiffError> {
        let reference_path = self.config.reference_path();
        self.run_reported(events, |engine| {
            events.send(phase(ComparisonPhase::Decoding));
            let candidate = decode_bytes(bytes, source_name)?;
            engine.run(&reference_path, &candidate, key, events)
        })
    }

    /// Compare two image files
    pub fn compare_files(
        &self,
        reference_path: &Path,
        candidate_path: &Path,
        key: &ArtifactKey,
    ) -> Result<ComparisonReport, ImageDiffError> {
        self.compare_files_with_events(reference_path, candidate_path, key, &null_sender())
    }

    /// Compare two image files with event reporting
    pub fn compare_files_with_events(
        &self,
        reference_path: &Path,
        candidate_path: &Path,
        key: &ArtifactKey,
        events: &EventSender,
    ) -> Result<ComparisonReport, ImageDiffError> {
        self.run_reported(events, |engine| {
            events.send(phase(ComparisonPhase::Decoding));
            let candidate = decode_file(candidate_path)?;
            engine.run(reference_path, &candidate, key, events)
        })
    }

    /// Wrap a comparison with start/failure events
    fn run_reported<F>(&self, events: &EventSender, f: F) -> Result<ComparisonReport, ImageDiffError>
    where
        F: FnOnce(&Self) -> Result<ComparisonReport, ImageDiffError>,
    {
        events.send(Event::Comparison(ComparisonEvent::Started));
        let result = f(self);
        if let Err(ref error) = result {
            warn!(%error, "comparison failed");
            events.send(Event::Comparison(ComparisonEvent::Failed {
                message: error.to_string(),
            }));
        }
        result
    }

    /// Full flow: normalize + store candidate, load + normalize reference,
    /// compare, persist artifacts.
    fn run(
        &self,
        reference_path: &Path,
        candidate: &DynamicImage,
        key: &ArtifactKey,
        events: &EventSender,
    ) -> Result<ComparisonReport, ImageDiffError> {
        let start_time = Instant::now();
        let mut normalizer = Normalizer::new(self.config.target);

        events.send(phase(ComparisonPhase::Normalizing));
        let candidate = normalizer.resize_rgb(candidate)?;
        let candidate_path = self.store.store_candidate(&candidate)?;
        events.send(Event::Comparison(ComparisonEvent::ArtifactWritten {
            path: candidate_path,
        }));

        // The stored reference is normally already at the target size, in
        // which case this is a no-op; it is re-normalized every time because
        // it may be replaced between requests.
        events.send(phase(ComparisonPhase::Decoding));
        let reference = decode_file(reference_path).map_err(ImageDiffError::Reference)?;
        events.send(phase(ComparisonPhase::Normalizing));
        let reference = normalizer.resize_rgb(&reference)?;

        let outcome = self.compare_normalized(reference, candidate, events)?;

        events.send(phase(ComparisonPhase::Persisting));
        let paths = self.store.persist(&outcome.artifacts, key)?;
        for path in paths.all() {
            events.send(Event::Comparison(ComparisonEvent::ArtifactWritten {
                path: path.to_path_buf(),
            }));
        }

        let duration_ms = start_time.elapsed().as_millis() as u64;
        info!(
            score = outcome.score_percent,
            regions = outcome.regions.len(),
            duration_ms,
            "comparison complete"
        );
        events.send(Event::Comparison(ComparisonEvent::Completed {
            score_percent: outcome.score_percent,
            duration_ms,
        }));

        Ok(ComparisonReport {
            request_id: match key {
                ArtifactKey::Latest => None,
                ArtifactKey::Request(id) => Some(*id),
            },
            score_percent: outcome.score_percent,
            score: outcome.score,
            threshold_level: outcome.threshold_level,
            regions: outcome.regions,
            compared_size: self.config.target,
            artifacts: paths,
            compared_at: Utc::now(),
            duration_ms,
        })
    }

    /// Steps after normalization: grayscale, SSIM, threshold, contours,
    /// annotation.
    fn compare_normalized(
        &self,
        mut reference: RgbImage,
        mut candidate: RgbImage,
        events: &EventSender,
    ) -> Result<ComparisonOutcome, CompareError> {
        events.send(phase(ComparisonPhase::Scoring));
        let reference_gray = to_gray(&reference);
        let candidate_gray = to_gray(&candidate);
        let ssim = structural_similarity_with(&reference_gray, &candidate_gray, &self.ssim)?;
        debug!(score = ssim.score, "structural similarity computed");

        events.send(phase(ComparisonPhase::Thresholding));
        let difference = ssim.to_gray_map();
        let threshold = otsu_inverse(&difference);
        let regions = external_regions(&threshold.image);
        events.send(Event::Comparison(ComparisonEvent::RegionsFound {
            count: regions.len(),
        }));

        events.send(phase(ComparisonPhase::Annotating));
        draw_regions(&mut reference, &regions, self.box_color, self.box_stroke);
        draw_regions(&mut candidate, &regions, self.box_color, self.box_stroke);

        Ok(ComparisonOutcome {
            score: ssim.score,
            score_percent: round_percent(ssim.score),
            threshold_level: threshold.level,
            regions,
            artifacts: ComparisonArtifacts {
                annotated_reference: reference,
                annotated_candidate: candidate,
                difference,
                threshold: threshold.image,
            },
        })
    }
}

fn phase(phase: ComparisonPhase) -> Event {
    Event::Comparison(ComparisonEvent::PhaseChanged { phase })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TargetSize;
    use crate::events::EventChannel;
    use tempfile::TempDir;

    fn textured(width: u32, height: u32) -> RgbImage {
        RgbImage::from_fn(width, height, |x, y| {
            let v = ((x * 7919 + y * 104_729) ^ (x * y)) as u8;
            Rgb([v, v.wrapping_mul(3), v.wrapping_add(91)])
        })
    }

    fn paint(image: &mut RgbImage, x0: u32, y0: u32, w: u32, h: u32, color: Rgb<u8>) {
        for y in y0..y0 + h {
            for x in x0..x0 + w {
                image.put_pixel(x, y, color);
            }
        }
    }

    fn engine_in(dir: &TempDir) -> DiffEngine {
        let config = ServiceConfig::builder()
            .static_dir(dir.path().join("static"))
            .build()
            .unwrap();
        DiffEngine::new(config)
    }

    #[test]
    fn identical_images_score_one_hundred() {
        let engine = DiffEngine::new(ServiceConfig::default());
        let image = DynamicImage::ImageRgb8(textured(250, 160));

        let outcome = engine.compare_images(&image, &image).unwrap();

        assert_eq!(outcome.score_percent, 100.0);
        assert!(outcome.regions.is_empty());
        assert_eq!(outcome.artifacts.annotated_reference, textured(250, 160));
    }

    #[test]
    fn altered_rectangle_is_boxed() {
        let engine = DiffEngine::new(ServiceConfig::default());
        let reference = textured(250, 160);
        let mut candidate = reference.clone();
        paint(&mut candidate, 100, 50, 40, 30, Rgb([0, 0, 255]));

        let outcome = engine
            .compare_images(
                &DynamicImage::ImageRgb8(reference),
                &DynamicImage::ImageRgb8(candidate),
            )
            .unwrap();

        assert!(outcome.score_percent < 100.0);
        let dominant = outcome
            .regions
            .iter()
            .max_by_key(|r| r.area())
            .unwrap();
        assert!(dominant.x.abs_diff(100) <= 5, "x was {}", dominant.x);
        assert!(dominant.y.abs_diff(50) <= 5, "y was {}", dominant.y);
        assert!(dominant.right().abs_diff(139) <= 5);
        assert!(dominant.bottom().abs_diff(79) <= 5);
    }

    #[test]
    fn annotation_draws_on_both_color_images() {
        let engine = DiffEngine::new(ServiceConfig::default());
        let reference = textured(250, 160);
        let mut candidate = reference.clone();
        paint(&mut candidate, 100, 50, 40, 30, Rgb([0, 0, 255]));

        let outcome = engine
            .compare_images(
                &DynamicImage::ImageRgb8(reference),
                &DynamicImage::ImageRgb8(candidate),
            )
            .unwrap();

        let region = outcome.regions[0];
        let mid_x = region.x + region.width / 2;
        assert_eq!(
            outcome.artifacts.annotated_reference.get_pixel(mid_x, region.y),
            &BOX_COLOR
        );
        assert_eq!(
            outcome.artifacts.annotated_candidate.get_pixel(mid_x, region.y),
            &BOX_COLOR
        );
    }

    #[test]
    fn images_of_any_size_are_normalized_first() {
        let engine = DiffEngine::new(ServiceConfig::default());
        let reference = DynamicImage::ImageRgb8(textured(500, 320));
        let candidate = DynamicImage::ImageRgb8(textured(90, 40));

        let outcome = engine.compare_images(&reference, &candidate).unwrap();

        assert_eq!(outcome.artifacts.difference.dimensions(), (250, 160));
        assert_eq!(outcome.artifacts.threshold.dimensions(), (250, 160));
    }

    #[test]
    fn custom_target_size_is_respected() {
        let config = ServiceConfig::builder()
            .target(TargetSize::new(64, 48))
            .build()
            .unwrap();
        let engine = DiffEngine::new(config);
        let image = DynamicImage::ImageRgb8(textured(250, 160));

        let outcome = engine.compare_images(&image, &image).unwrap();

        assert_eq!(outcome.artifacts.annotated_candidate.dimensions(), (64, 48));
    }

    #[test]
    fn files_flow_emits_phases_and_writes_artifacts() {
        let dir = TempDir::new().unwrap();
        let engine = engine_in(&dir);
        let reference_path = dir.path().join("reference.png");
        let candidate_path = dir.path().join("candidate.png");
        textured(250, 160).save(&reference_path).unwrap();
        textured(250, 160).save(&candidate_path).unwrap();

        let (sender, receiver) = EventChannel::new();
        let report = engine
            .compare_files_with_events(&reference_path, &candidate_path, &ArtifactKey::Latest, &sender)
            .unwrap();
        drop(sender);

        assert_eq!(report.score_percent, 100.0);
        assert!(report.artifacts.all().iter().all(|p| p.exists()));

        let events: Vec<Event> = receiver.iter().collect();
        assert!(matches!(
            events.first(),
            Some(Event::Comparison(ComparisonEvent::Started))
        ));
        assert!(matches!(
            events.last(),
            Some(Event::Comparison(ComparisonEvent::Completed { .. }))
        ));
    }

    #[test]
    fn corrupt_upload_fails_without_artifacts() {
        let dir = TempDir::new().unwrap();
        let engine = engine_in(&dir);

        let (sender, receiver) = EventChannel::new();
        let result = engine.compare_upload_with_events(
            b"definitely not an image",
            "upload.jpg",
            &ArtifactKey::Latest,
            &sender,
        );
        drop(sender);

        assert!(matches!(result, Err(ImageDiffError::Decode(_))));
        assert!(!engine.store().paths_for(&ArtifactKey::Latest).difference.exists());
        assert!(receiver
            .iter()
            .any(|e| matches!(e, Event::Comparison(ComparisonEvent::Failed { .. }))));
    }

    #[test]
    fn missing_reference_is_a_reference_error() {
        let dir = TempDir::new().unwrap();
        let engine = engine_in(&dir);
        let candidate_path = dir.path().join("candidate.png");
        textured(50, 50).save(&candidate_path).unwrap();

        let result = engine.compare_files(
            &dir.path().join("missing.png"),
            &candidate_path,
            &ArtifactKey::Latest,
        );

        assert!(matches!(result, Err(ImageDiffError::Reference(_))));
    }
}
