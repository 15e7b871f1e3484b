//! Terminal visualization of a comparison.
//!
//! Gives a quick picture of where two images differ without opening
//! the generated artifacts.

use super::ComparisonReport;
use crate::core::threshold::FOREGROUND;
use image::GrayImage;

/// Renders scores and threshold maps as text
pub struct ScoreVisualizer {
    /// Number of columns in the coarse difference map
    columns: u32,
}

impl ScoreVisualizer {
    /// Create a visualizer that draws maps `columns` characters wide
    pub fn new(columns: u32) -> Self {
        Self {
            columns: columns.max(1),
        }
    }

    /// Generate an ASCII map of a threshold image
    ///
    /// Each character covers a block of pixels:
    /// - `.` = no differing pixels in the block
    /// - `X` = at least one differing pixel
    ///
    /// Rows are taller than columns are wide to compensate for terminal
    /// character aspect ratio.
    pub fn visualize_threshold(&self, threshold: &GrayImage) -> String {
        let (width, height) = threshold.dimensions();
        let mut output = String::new();
        output.push_str("Difference Map (. = same, X = different):\n\n");
        if width == 0 || height == 0 {
            return output;
        }

        let block_w = width.div_ceil(self.columns).max(1);
        let block_h = (block_w * 2).min(height).max(1);

        for by in (0..height).step_by(block_h as usize) {
            output.push_str("  ");
            for bx in (0..width).step_by(block_w as usize) {
                let differs = (by..(by + block_h).min(height)).any(|y| {
                    (bx..(bx + block_w).min(width))
                        .any(|x| threshold.get_pixel(x, y).0[0] == FOREGROUND)
                });
                output.push(if differs { 'X' } else { '.' });
            }
            output.push('\n');
        }

        output
    }

    /// Generate a summary of the comparison
    pub fn summarize(&self, report: &ComparisonReport) -> String {
        let regions = match report.regions.len() {
            0 => "no differing regions".to_string(),
            1 => "1 differing region".to_string(),
            n => format!("{} differing regions", n),
        };
        format!(
            "{} ({}, compared at {})",
            report.prediction(),
            regions,
            report.compared_size
        )
    }

    /// Generate a compact similarity indicator
    ///
    /// Returns a visual bar showing similarity:
    /// `[████████░░] 80%`
    pub fn similarity_bar(&self, similarity_percent: f64) -> String {
        let filled = (similarity_percent.clamp(0.0, 100.0) / 10.0).round() as usize;
        let empty = 10 - filled;

        format!(
            "[{}{}] {:.0}%",
            "█".repeat(filled),
            "░".repeat(empty),
            similarity_percent
        )
    }
}

impl Default for ScoreVisualizer {
    fn default() -> Self {
        Self::new(50)
    }
}
