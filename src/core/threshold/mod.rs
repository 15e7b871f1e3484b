//! Automatic binarisation of the difference map.
//!
//! The cutoff comes from Otsu's method (`imageproc::contrast::otsu_level`),
//! which picks the level that maximises between-class variance. The map is
//! inverted: low similarity means "different", so pixels at or below the
//! level become foreground.

use image::{GrayImage, Luma};
use imageproc::contrast::otsu_level;
use tracing::debug;

/// Foreground value in threshold maps
pub const FOREGROUND: u8 = 255;
/// Background value in threshold maps
pub const BACKGROUND: u8 = 0;

/// A binary map together with the level that produced it
#[derive(Debug, Clone)]
pub struct ThresholdMap {
    /// Otsu level chosen for the input
    pub level: u8,
    /// 255 where the input was `<= level`, 0 elsewhere
    pub image: GrayImage,
}

impl ThresholdMap {
    /// Number of foreground pixels
    pub fn foreground_count(&self) -> usize {
        self.image.pixels().filter(|p| p.0[0] == FOREGROUND).count()
    }
}

/// Inverse binary threshold at the Otsu level
pub fn otsu_inverse(image: &GrayImage) -> ThresholdMap {
    let level = otsu_level(image);
    let threshold = inverse_binary(image, level);
    debug!(level, "difference map thresholded");
    ThresholdMap {
        level,
        image: threshold,
    }
}

/// Inverse binary threshold at a fixed level
pub fn inverse_binary(image: &GrayImage, level: u8) -> GrayImage {
    let mut out = GrayImage::new(image.width(), image.height());
    for (src, dst) in image.pixels().zip(out.pixels_mut()) {
        *dst = if src.0[0] <= level {
            Luma([FOREGROUND])
        } else {
            Luma([BACKGROUND])
        };
    }
    out
}
