//! RGB to single-channel intensity conversion.
//!
//! Uses the ITU-R BT.601 luma weights `0.299 R + 0.587 G + 0.114 B`
//! rather than the Rec. 709 weights `image::DynamicImage::to_luma8`
//! applies, so scores line up with the usual SSIM tooling.

use image::{GrayImage, Luma, RgbImage};

/// Convert an RGB image to 8-bit grayscale (rounded to nearest)
pub fn to_gray(image: &RgbImage) -> GrayImage {
    let (width, height) = image.dimensions();
    let mut gray = GrayImage::new(width, height);
    for (src, dst) in image.pixels().zip(gray.pixels_mut()) {
        *dst = Luma([luma(src.0)]);
    }
    gray
}

#[inline]
fn luma([r, g, b]: [u8; 3]) -> u8 {
    let weighted = 299 * u32::from(r) + 587 * u32::from(g) + 114 * u32::from(b);
    ((weighted + 500) / 1000) as u8
}
