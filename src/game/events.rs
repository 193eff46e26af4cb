//! Payloads emitted by a [`DanceSession`](crate::game::DanceSession) to its connection.

use indexmap::IndexMap;
use serde::Serialize;

use crate::pose::{FrameDetections, Pose, TrackId};
use crate::storage::{DancerId, ReferenceId, SessionId};

/// A dancer to register: its live track id and an optional encoded avatar image.
#[derive(Debug, Clone, PartialEq)]
pub struct DancerRegistration {
    pub track_id: TrackId,
    pub avatar: Option<Vec<u8>>,
}

/// Raw detections of a calibration frame.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PrepareResult {
    #[serde(flatten)]
    pub detections: FrameDetections,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RegisteredDancer {
    pub track_id: TrackId,
    pub dancer_id: DancerId,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Registration {
    pub session_id: SessionId,
    pub reference_id: ReferenceId,
    pub total_steps: usize,
    pub dancers: Vec<RegisteredDancer>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DancerResult {
    pub track_id: TrackId,
    pub dancer_id: DancerId,
    pub pose: Pose,
    pub score: f64,
    pub average: f64,
}

/// Scores of one frame that matched a step.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DanceResult {
    pub step_index: usize,
    pub timestamp: f64,
    pub dancers: Vec<DancerResult>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FinalScores {
    pub session_id: Option<SessionId>,
    pub scores: IndexMap<TrackId, f64>,
}
