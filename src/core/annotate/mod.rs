//! Bounding-box annotation on color images.

use crate::core::regions::Region;
use image::{Rgb, RgbImage};
use imageproc::drawing::draw_hollow_rect_mut;
use imageproc::rect::Rect;

/// Box colour used on generated artifacts (red)
pub const BOX_COLOR: Rgb<u8> = Rgb([255, 0, 0]);
/// Box stroke width in pixels
pub const BOX_STROKE: u32 = 2;

/// Draw every region as a hollow box, `stroke` pixels thick.
///
/// The outermost ring sits one pixel beyond the region's last column and
/// row; further rings step inward. Pixels outside the canvas are clipped.
pub fn draw_regions(canvas: &mut RgbImage, regions: &[Region], color: Rgb<u8>, stroke: u32) {
    for region in regions {
        for ring in 0..stroke {
            let width = (region.width + 1).saturating_sub(2 * ring);
            let height = (region.height + 1).saturating_sub(2 * ring);
            if width == 0 || height == 0 {
                break;
            }
            let rect = Rect::at((region.x + ring) as i32, (region.y + ring) as i32)
                .of_size(width, height);
            draw_hollow_rect_mut(canvas, rect, color);
        }
    }
}

/// Draw regions with the standard colour and stroke
pub fn annotate(canvas: &mut RgbImage, regions: &[Region]) {
    draw_regions(canvas, regions, BOX_COLOR, BOX_STROKE);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_regions_leaves_image_untouched() {
        let mut canvas = RgbImage::from_pixel(20, 20, Rgb([10, 10, 10]));
        let before = canvas.clone();

        annotate(&mut canvas, &[]);

        assert_eq!(canvas, before);
    }

    #[test]
    fn box_is_two_pixels_thick() {
        let mut canvas = RgbImage::new(40, 40);
        let region = Region {
            x: 10,
            y: 10,
            width: 10,
            height: 10,
        };

        annotate(&mut canvas, &[region]);

        // Top edge: outer ring at y=10, inner ring at y=11, interior untouched
        assert_eq!(canvas.get_pixel(15, 10), &BOX_COLOR);
        assert_eq!(canvas.get_pixel(15, 11), &BOX_COLOR);
        assert_eq!(canvas.get_pixel(15, 12), &Rgb([0, 0, 0]));
        // Right edge sits one past the last column
        assert_eq!(canvas.get_pixel(20, 15), &BOX_COLOR);
        assert_eq!(canvas.get_pixel(19, 15), &BOX_COLOR);
        assert_eq!(canvas.get_pixel(18, 15), &Rgb([0, 0, 0]));
        // Outside the box
        assert_eq!(canvas.get_pixel(9, 15), &Rgb([0, 0, 0]));
    }

    #[test]
    fn boxes_touching_the_border_are_clipped() {
        let mut canvas = RgbImage::new(10, 10);
        let region = Region {
            x: 5,
            y: 5,
            width: 5,
            height: 5,
        };

        annotate(&mut canvas, &[region]);

        assert_eq!(canvas.get_pixel(5, 9), &BOX_COLOR);
    }
}
