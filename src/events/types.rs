//! Event type definitions for progress reporting.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// All events emitted by the image difference engine
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    /// Comparison events
    Comparison(ComparisonEvent),
}

/// Events during a single comparison
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ComparisonEvent {
    /// A comparison has started
    Started,
    /// The comparison moved to a new phase
    PhaseChanged { phase: ComparisonPhase },
    /// Contours were extracted from the threshold map
    RegionsFound { count: usize },
    /// One artifact (or the candidate slot) was written
    ArtifactWritten { path: PathBuf },
    /// The comparison finished
    Completed { score_percent: f64, duration_ms: u64 },
    /// The comparison failed
    Failed { message: String },
}

/// Phases of a comparison
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ComparisonPhase {
    Decoding,
    Normalizing,
    Scoring,
    Thresholding,
    Annotating,
    Persisting,
}

impl std::fmt::Display for ComparisonPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ComparisonPhase::Decoding => write!(f, "Decoding images"),
            ComparisonPhase::Normalizing => write!(f, "Normalizing size"),
            ComparisonPhase::Scoring => write!(f, "Computing structural similarity"),
            ComparisonPhase::Thresholding => write!(f, "Thresholding difference map"),
            ComparisonPhase::Annotating => write!(f, "Annotating regions"),
            ComparisonPhase::Persisting => write!(f, "Writing artifacts"),
        }
    }
}
