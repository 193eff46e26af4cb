pub mod extractor;

use serde::{Deserialize, Serialize};

use crate::pose::Pose;

pub use extractor::{StepExtractor, StepExtractorBuilder};

/// Target pose the dancer should hold at one musical beat.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    pub timestamp: f64,
    pub pose: Pose,
}

impl Step {
    pub fn new(timestamp: f64, pose: Pose) -> Self {
        Self { timestamp, pose }
    }
}
