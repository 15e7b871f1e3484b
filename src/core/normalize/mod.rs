//! Size normalization.
//!
//! Both images are stretched (never cropped) onto the same pixel grid
//! before comparison. Uses fast_image_resize, which picks AVX2/NEON
//! kernels when available.

use crate::config::TargetSize;
use crate::error::CompareError;
use fast_image_resize::{images::Image, FilterType, PixelType, ResizeAlg, ResizeOptions, Resizer};
use image::{DynamicImage, RgbImage};
use tracing::debug;

/// Reusable resizer that stretches images to a fixed target size
pub struct Normalizer {
    resizer: Resizer,
    target: TargetSize,
}

impl Normalizer {
    /// Create a normalizer for the given target size
    pub fn new(target: TargetSize) -> Self {
        Self {
            resizer: Resizer::new(),
            target,
        }
    }

    /// The size every image is normalized to
    pub fn target(&self) -> TargetSize {
        self.target
    }

    /// Convert to 3-channel RGB and stretch to the target size.
    ///
    /// Alpha is dropped. An image that already has the target size is
    /// returned unchanged.
    pub fn resize_rgb(&mut self, image: &DynamicImage) -> Result<RgbImage, CompareError> {
        let rgb = image.to_rgb8();
        let (src_width, src_height) = rgb.dimensions();
        let TargetSize { width, height } = self.target;

        if src_width == 0 || src_height == 0 {
            return Err(CompareError::InvalidDimensions {
                width: src_width,
                height: src_height,
            });
        }
        if width == 0 || height == 0 {
            return Err(CompareError::InvalidDimensions { width, height });
        }

        if (src_width, src_height) == (width, height) {
            return Ok(rgb);
        }

        debug!(
            from = %format!("{}x{}", src_width, src_height),
            to = %self.target,
            "resizing image"
        );

        let src_image = Image::from_vec_u8(src_width, src_height, rgb.into_raw(), PixelType::U8x3)
            .map_err(|e| CompareError::ResizeFailed(format!("Invalid source buffer: {}", e)))?;
        let mut dst_image = Image::new(width, height, PixelType::U8x3);

        // Bicubic (Catmull-Rom) convolution
        let options =
            ResizeOptions::new().resize_alg(ResizeAlg::Convolution(FilterType::CatmullRom));

        self.resizer
            .resize(&src_image, &mut dst_image, &options)
            .map_err(|e| CompareError::ResizeFailed(e.to_string()))?;

        RgbImage::from_raw(width, height, dst_image.into_vec()).ok_or_else(|| {
            CompareError::ResizeFailed("Failed to create result buffer".to_string())
        })
    }
}

/// Convenience function for one-off normalization
pub fn normalize(image: &DynamicImage, target: TargetSize) -> Result<RgbImage, CompareError> {
    Normalizer::new(target).resize_rgb(image)
}
