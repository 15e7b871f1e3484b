//! # Similarity Module
//!
//! Structural similarity (SSIM) between two grayscale images.
//!
//! ## How It Works
//! 1. Local means, variances and covariance are taken over a sliding
//!    `7x7` uniform window (borders reflected, `d c b a | a b c d`)
//! 2. Variances use the sample normalisation `N / (N - 1)`
//! 3. Each pixel gets
//!    `((2 ux uy + C1)(2 vxy + C2)) / ((ux² + uy² + C1)(vx + vy + C2))`
//!    with `C1 = (K1 L)²`, `C2 = (K2 L)²`, `L` the data range
//! 4. The score is the mean of that map, ignoring a border of half a
//!    window where the filter saw reflected pixels
//!
//! Rows are processed in parallel with rayon; every output value only
//! depends on its own inputs, so results are identical run to run.

use crate::error::CompareError;
use image::{GrayImage, Luma};
use rayon::prelude::*;

/// Default side length of the sliding window
pub const DEFAULT_WINDOW_SIZE: u32 = 7;

/// SSIM parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SsimConfig {
    /// Side of the square uniform window (odd)
    pub window_size: u32,
    /// Luminance stabiliser
    pub k1: f64,
    /// Contrast stabiliser
    pub k2: f64,
    /// Dynamic range of the pixel values (255 for 8-bit)
    pub data_range: f64,
    /// Use `N / (N - 1)` normalisation for variances
    pub sample_covariance: bool,
}

impl Default for SsimConfig {
    fn default() -> Self {
        Self {
            window_size: DEFAULT_WINDOW_SIZE,
            k1: 0.01,
            k2: 0.03,
            data_range: 255.0,
            sample_covariance: true,
        }
    }
}

/// Mean similarity plus the per-pixel similarity map
#[derive(Debug, Clone)]
pub struct SsimResult {
    /// Mean similarity, 1.0 for identical images
    pub score: f64,
    /// Row-major per-pixel similarity
    pub map: Vec<f64>,
    pub width: u32,
    pub height: u32,
}

impl SsimResult {
    /// Similarity at a single pixel
    pub fn value_at(&self, x: u32, y: u32) -> f64 {
        self.map[(y * self.width + x) as usize]
    }

    /// Rescale the map from [0, 1] to an 8-bit image.
    ///
    /// Values outside [0, 1] (SSIM can go negative) are clamped before
    /// truncation.
    pub fn to_gray_map(&self) -> GrayImage {
        let mut gray = GrayImage::new(self.width, self.height);
        for (value, pixel) in self.map.iter().zip(gray.pixels_mut()) {
            *pixel = Luma([(value * 255.0).clamp(0.0, 255.0) as u8]);
        }
        gray
    }
}

/// Compute SSIM with the default parameters
pub fn structural_similarity(a: &GrayImage, b: &GrayImage) -> Result<SsimResult, CompareError> {
    structural_similarity_with(a, b, &SsimConfig::default())
}

/// Compute SSIM with explicit parameters
pub fn structural_similarity_with(
    a: &GrayImage,
    b: &GrayImage,
    config: &SsimConfig,
) -> Result<SsimResult, CompareError> {
    let (width, height) = a.dimensions();
    if a.dimensions() != b.dimensions() {
        return Err(CompareError::DimensionMismatch {
            left_width: width,
            left_height: height,
            right_width: b.width(),
            right_height: b.height(),
        });
    }

    let window = config.window_size;
    if window == 0 || window % 2 == 0 {
        return Err(CompareError::InvalidDimensions {
            width: window,
            height: window,
        });
    }
    if width < window || height < window {
        return Err(CompareError::ImageTooSmall {
            width,
            height,
            window,
        });
    }

    let (w, h, win) = (width as usize, height as usize, window as usize);

    let x: Vec<f64> = a.as_raw().iter().map(|&v| f64::from(v)).collect();
    let y: Vec<f64> = b.as_raw().iter().map(|&v| f64::from(v)).collect();
    let xx: Vec<f64> = x.iter().map(|v| v * v).collect();
    let yy: Vec<f64> = y.iter().map(|v| v * v).collect();
    let xy: Vec<f64> = x.iter().zip(&y).map(|(p, q)| p * q).collect();

    let ux = uniform_filter(&x, w, h, win);
    let uy = uniform_filter(&y, w, h, win);
    let uxx = uniform_filter(&xx, w, h, win);
    let uyy = uniform_filter(&yy, w, h, win);
    let uxy = uniform_filter(&xy, w, h, win);

    let np = (win * win) as f64;
    let cov_norm = if config.sample_covariance {
        np / (np - 1.0)
    } else {
        1.0
    };
    let c1 = (config.k1 * config.data_range).powi(2);
    let c2 = (config.k2 * config.data_range).powi(2);

    let mut map = vec![0.0; w * h];
    map.par_chunks_mut(w).enumerate().for_each(|(row, out)| {
        let base = row * w;
        for (col, value) in out.iter_mut().enumerate() {
            let i = base + col;
            let vx = cov_norm * (uxx[i] - ux[i] * ux[i]);
            let vy = cov_norm * (uyy[i] - uy[i] * uy[i]);
            let vxy = cov_norm * (uxy[i] - ux[i] * uy[i]);

            let a1 = 2.0 * ux[i] * uy[i] + c1;
            let a2 = 2.0 * vxy + c2;
            let b1 = ux[i] * ux[i] + uy[i] * uy[i] + c1;
            let b2 = vx + vy + c2;
            *value = (a1 * a2) / (b1 * b2);
        }
    });

    let score = cropped_mean(&map, w, h, (win - 1) / 2);

    Ok(SsimResult {
        score,
        map,
        width,
        height,
    })
}

/// Mean of the map without a `pad`-pixel border
fn cropped_mean(map: &[f64], width: usize, height: usize, pad: usize) -> f64 {
    let (x_range, y_range) = if width > 2 * pad && height > 2 * pad {
        (pad..width - pad, pad..height - pad)
    } else {
        (0..width, 0..height)
    };

    let count = (x_range.len() * y_range.len()) as f64;
    let sum: f64 = y_range
        .map(|y| map[y * width + x_range.start..y * width + x_range.end].iter().sum::<f64>())
        .sum();
    sum / count
}

/// Separable box filter with reflected borders
fn uniform_filter(data: &[f64], width: usize, height: usize, size: usize) -> Vec<f64> {
    let radius = (size / 2) as isize;
    let norm = 1.0 / size as f64;

    let mut horizontal = vec![0.0; data.len()];
    horizontal
        .par_chunks_mut(width)
        .zip(data.par_chunks(width))
        .for_each(|(out, row)| {
            for (x, value) in out.iter_mut().enumerate() {
                let sum: f64 = (-radius..=radius)
                    .map(|k| row[reflect(x as isize + k, width)])
                    .sum();
                *value = sum * norm;
            }
        });

    let mut filtered = vec![0.0; data.len()];
    filtered
        .par_chunks_mut(width)
        .enumerate()
        .for_each(|(y, out)| {
            for (x, value) in out.iter_mut().enumerate() {
                let sum: f64 = (-radius..=radius)
                    .map(|k| horizontal[reflect(y as isize + k, height) * width + x])
                    .sum();
                *value = sum * norm;
            }
        });

    filtered
}

/// Half-sample symmetric index reflection (`d c b a | a b c d | d c b a`)
#[inline]
fn reflect(index: isize, len: usize) -> usize {
    let len = len as isize;
    let period = 2 * len;
    let mut i = index.rem_euclid(period);
    if i >= len {
        i = period - i - 1;
    }
    i as usize
}
