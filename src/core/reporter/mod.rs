//! # Reporter Module
//!
//! Explains HOW different the uploaded image is from the reference.
//!
//! ## Explanation Levels
//! 1. **Simple**: "87.41% correct"
//! 2. **Visual**: similarity bar and a coarse map of differing areas
//! 3. **Technical**: raw score, threshold level, region boxes, artifact paths

mod visualization;

pub use visualization::ScoreVisualizer;

use crate::config::TargetSize;
use crate::core::artifacts::ArtifactPaths;
use crate::core::regions::Region;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Complete report of one comparison
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComparisonReport {
    /// Request key when artifacts are stored per request
    pub request_id: Option<Uuid>,
    /// Score x 100, rounded to two decimals
    pub score_percent: f64,
    /// Raw mean structural similarity
    pub score: f64,
    /// Otsu level used for the threshold map
    pub threshold_level: u8,
    /// Boxes around the differing regions
    pub regions: Vec<Region>,
    /// Size both images were compared at
    pub compared_size: TargetSize,
    /// Where the artifacts were written
    pub artifacts: ArtifactPaths,
    /// When the comparison finished
    pub compared_at: DateTime<Utc>,
    /// Duration in milliseconds
    pub duration_ms: u64,
}

impl ComparisonReport {
    /// The one-line verdict shown to users, e.g. `87.41% correct`
    pub fn prediction(&self) -> String {
        format_prediction(self.score_percent)
    }

    /// Whether the images have the same structure everywhere
    pub fn is_identical(&self) -> bool {
        self.regions.is_empty() && (self.score_percent - 100.0).abs() < f64::EPSILON
    }
}

/// Scale a [0, 1] score to a percentage rounded to two decimals
pub fn round_percent(score: f64) -> f64 {
    (score * 100.0 * 100.0).round() / 100.0
}

/// `NN.NN% correct`
pub fn format_prediction(score_percent: f64) -> String {
    format!("{:.2}% correct", score_percent)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn report(score: f64, regions: Vec<Region>) -> ComparisonReport {
        let dir = PathBuf::from("/static/generated");
        ComparisonReport {
            request_id: None,
            score_percent: round_percent(score),
            score,
            threshold_level: 120,
            regions,
            compared_size: TargetSize::default(),
            artifacts: ArtifactPaths {
                annotated_reference: dir.join("image_original.jpg"),
                annotated_candidate: dir.join("image_uploaded.jpg"),
                difference: dir.join("image_diff.jpg"),
                threshold: dir.join("image_thresh.jpg"),
            },
            compared_at: Utc::now(),
            duration_ms: 12,
        }
    }

    #[test]
    fn round_percent_keeps_two_decimals() {
        assert_eq!(round_percent(1.0), 100.0);
        assert_eq!(round_percent(0.87412), 87.41);
        assert_eq!(round_percent(0.123456), 12.35);
        assert_eq!(round_percent(0.0), 0.0);
    }

    #[test]
    fn prediction_formats_percent() {
        assert_eq!(report(0.87412, vec![]).prediction(), "87.41% correct");
        assert_eq!(report(1.0, vec![]).prediction(), "100.00% correct");
    }

    #[test]
    fn identical_requires_full_score_and_no_regions() {
        assert!(report(1.0, vec![]).is_identical());
        assert!(!report(0.9, vec![]).is_identical());

        let region = Region {
            x: 1,
            y: 1,
            width: 2,
            height: 2,
        };
        assert!(!report(1.0, vec![region]).is_identical());
    }

    #[test]
    fn report_serializes_to_json() {
        let json = serde_json::to_value(report(0.5, vec![])).unwrap();

        assert_eq!(json["score_percent"], 50.0);
        assert_eq!(json["compared_size"]["width"], 250);
        assert!(json["artifacts"]["difference"]
            .as_str()
            .unwrap()
            .ends_with("image_diff.jpg"));
    }
}
