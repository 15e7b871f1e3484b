//! Integration tests for the comparison engine.
//!
//! These tests verify end-to-end behavior through the public API:
//! - Scores and boxes for known alterations
//! - Determinism of the written artifacts
//! - Error handling for bad uploads
//! - Per-request artifact directories

use image::{DynamicImage, Rgb, RgbImage};
use image_diff::config::ServiceConfig;
use image_diff::core::{ArtifactKey, DiffEngine};
use image_diff::ImageDiffError;
use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn textured(width: u32, height: u32) -> RgbImage {
    RgbImage::from_fn(width, height, |x, y| {
        let v = ((x * 31 + y * 17) % 200) as u8 + 20;
        Rgb([v, 255 - v, (x as u8).wrapping_mul(5)])
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
    config.ensure_directories().unwrap();
    DiffEngine::new(config)
}

fn save_png(dir: &TempDir, name: &str, image: &RgbImage) -> PathBuf {
    let path = dir.path().join(name);
    image.save(&path).unwrap();
    path
}

fn png_bytes(image: &RgbImage) -> Vec<u8> {
    let mut bytes = Vec::new();
    DynamicImage::ImageRgb8(image.clone())
        .write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
        .unwrap();
    bytes
}

fn read_all(paths: [&Path; 4]) -> Vec<Vec<u8>> {
    paths.iter().map(|p| fs::read(p).unwrap()).collect()
}

#[test]
fn identical_files_score_one_hundred_without_boxes() {
    let dir = TempDir::new().unwrap();
    let engine = engine_in(&dir);
    let reference = save_png(&dir, "reference.png", &textured(250, 160));
    let candidate = save_png(&dir, "candidate.png", &textured(250, 160));

    let report = engine
        .compare_files(&reference, &candidate, &ArtifactKey::Latest)
        .unwrap();

    assert_eq!(report.score_percent, 100.0);
    assert!(report.regions.is_empty());
    assert!(report.is_identical());
    assert_eq!(report.prediction(), "100.00% correct");
}

#[test]
fn single_alteration_has_one_dominant_box() {
    let dir = TempDir::new().unwrap();
    let engine = engine_in(&dir);
    let original = textured(250, 160);
    let mut altered = original.clone();
    paint(&mut altered, 60, 40, 50, 40, Rgb([0, 0, 0]));

    let reference = save_png(&dir, "reference.png", &original);
    let candidate = save_png(&dir, "candidate.png", &altered);

    let report = engine
        .compare_files(&reference, &candidate, &ArtifactKey::Latest)
        .unwrap();

    assert!(report.score_percent < 100.0);
    let dominant = report.regions.iter().max_by_key(|r| r.area()).unwrap();
    assert!(dominant.contains(85, 60));
    assert!(dominant.x.abs_diff(60) <= 5, "x was {}", dominant.x);
    assert!(dominant.y.abs_diff(40) <= 5, "y was {}", dominant.y);
    let others: u64 = report
        .regions
        .iter()
        .filter(|r| *r != dominant)
        .map(|r| r.area())
        .sum();
    assert!(others < dominant.area());
}

#[test]
fn disjoint_alterations_get_separate_boxes() {
    let dir = TempDir::new().unwrap();
    let engine = engine_in(&dir);
    let original = textured(250, 160);
    let mut altered = original.clone();
    paint(&mut altered, 20, 20, 30, 30, Rgb([0, 0, 0]));
    paint(&mut altered, 180, 100, 30, 30, Rgb([255, 255, 255]));

    let reference = save_png(&dir, "reference.png", &original);
    let candidate = save_png(&dir, "candidate.png", &altered);

    let report = engine
        .compare_files(&reference, &candidate, &ArtifactKey::Latest)
        .unwrap();

    assert!(report.regions.len() >= 2);
    let first = report.regions.iter().find(|r| r.contains(35, 35)).unwrap();
    let second = report.regions.iter().find(|r| r.contains(195, 115)).unwrap();
    assert_ne!(first, second);
}

#[test]
fn rerun_produces_identical_artifacts() {
    let dir = TempDir::new().unwrap();
    let engine = engine_in(&dir);
    let original = textured(300, 200);
    let mut altered = original.clone();
    paint(&mut altered, 120, 60, 40, 40, Rgb([10, 200, 30]));

    let reference = save_png(&dir, "reference.png", &original);
    let candidate = save_png(&dir, "candidate.png", &altered);

    let first = engine
        .compare_files(&reference, &candidate, &ArtifactKey::Latest)
        .unwrap();
    let first_bytes = read_all(first.artifacts.all());

    let second = engine
        .compare_files(&reference, &candidate, &ArtifactKey::Latest)
        .unwrap();
    let second_bytes = read_all(second.artifacts.all());

    assert_eq!(first.score, second.score);
    assert_eq!(first.regions, second.regions);
    assert_eq!(first_bytes, second_bytes);
}

#[test]
fn upload_is_compared_against_configured_reference() {
    let dir = TempDir::new().unwrap();
    let engine = engine_in(&dir);
    let reference = textured(250, 160);
    // PNG bytes under the .jpg slot name keep the comparison lossless
    fs::write(engine.config().reference_path(), png_bytes(&reference)).unwrap();

    let report = engine
        .compare_upload(&png_bytes(&reference), "upload.png", &ArtifactKey::Latest)
        .unwrap();

    assert_eq!(report.score_percent, 100.0);
    assert!(engine.config().candidate_path().exists());
    assert!(report.artifacts.all().iter().all(|p| p.exists()));
}

#[test]
fn corrupt_upload_writes_nothing() {
    let dir = TempDir::new().unwrap();
    let engine = engine_in(&dir);
    fs::write(engine.config().reference_path(), png_bytes(&textured(250, 160))).unwrap();

    let result = engine.compare_upload(b"GIF89a but not really", "fake.gif", &ArtifactKey::Latest);

    assert!(matches!(result, Err(ImageDiffError::Decode(_))));
    assert!(!engine.config().candidate_path().exists());
    let generated = engine.store().paths_for(&ArtifactKey::Latest);
    assert!(generated.all().iter().all(|p| !p.exists()));
}

#[test]
fn empty_upload_is_rejected() {
    let dir = TempDir::new().unwrap();
    let engine = engine_in(&dir);

    let result = engine.compare_upload(&[], "empty.jpg", &ArtifactKey::Latest);

    let error = result.unwrap_err();
    assert!(error.is_client_error());
}

#[test]
fn per_request_keys_use_separate_directories() {
    let dir = TempDir::new().unwrap();
    let engine = engine_in(&dir);
    let reference = save_png(&dir, "reference.png", &textured(250, 160));
    let candidate = save_png(&dir, "candidate.png", &textured(250, 160));

    let first_key = ArtifactKey::new_request();
    let second_key = ArtifactKey::new_request();
    let first = engine.compare_files(&reference, &candidate, &first_key).unwrap();
    let second = engine.compare_files(&reference, &candidate, &second_key).unwrap();

    assert!(first.request_id.is_some());
    assert_ne!(first.request_id, second.request_id);
    assert_ne!(first.artifacts.difference, second.artifacts.difference);
    assert!(first.artifacts.difference.exists());
    assert!(second.artifacts.difference.exists());
    assert_eq!(
        first.artifacts.difference.parent().unwrap(),
        engine.store().artifact_dir(&first_key)
    );
}
