//! Region extraction: outer contours of the threshold map and their
//! bounding boxes.
//!
//! Contours are traced with Suzuki-Abe border following
//! (`imageproc::contours::find_contours`). Only outermost borders are
//! kept; holes and anything nested inside another region are ignored.

use image::GrayImage;
use imageproc::contours::{find_contours, BorderType, Contour};
use serde::{Deserialize, Serialize};

/// Axis-aligned bounding box of one differing region.
///
/// `width` and `height` count pixels, so a single-pixel region is 1x1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Region {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Region {
    /// Last column covered by the region
    pub fn right(&self) -> u32 {
        self.x + self.width - 1
    }

    /// Last row covered by the region
    pub fn bottom(&self) -> u32 {
        self.y + self.height - 1
    }

    pub fn area(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }

    /// Whether the point lies inside the box
    pub fn contains(&self, x: u32, y: u32) -> bool {
        x >= self.x && x <= self.right() && y >= self.y && y <= self.bottom()
    }

    /// Bounding box of a traced contour
    fn from_contour(contour: &Contour<u32>) -> Option<Self> {
        let first = contour.points.first()?;
        let (mut min_x, mut min_y) = (first.x, first.y);
        let (mut max_x, mut max_y) = (first.x, first.y);
        for p in &contour.points {
            min_x = min_x.min(p.x);
            min_y = min_y.min(p.y);
            max_x = max_x.max(p.x);
            max_y = max_y.max(p.y);
        }
        Some(Self {
            x: min_x,
            y: min_y,
            width: max_x - min_x + 1,
            height: max_y - min_y + 1,
        })
    }
}

/// Bounding boxes of the outer contours of a binary image.
///
/// Any non-zero pixel counts as foreground. Regions come back in the
/// order the tracer finds them (raster order of their top-left border
/// pixel).
pub fn external_regions(binary: &GrayImage) -> Vec<Region> {
    let contours: Vec<Contour<u32>> = find_contours(binary);

    contours
        .iter()
        .filter(|c| matches!(c.border_type, BorderType::Outer) && c.parent.is_none())
        .filter_map(Region::from_contour)
        .collect()
}
