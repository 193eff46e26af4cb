use std::sync::Arc;

use indexmap::IndexMap;

use crate::pose::TrackId;
use crate::steps::Step;
use crate::storage::{DancerId, ReferenceId, SessionId};

/// Maximum distance between a frame timestamp and a step timestamp that still counts as that step.
pub const STEP_TIMESTAMP_TOLERANCE: f64 = 0.001;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DancerEntry {
    pub dancer_id: DancerId,
    pub cumulative: f64,
}

/// Scores of one registered game, keyed by the track id each dancer was registered under.
#[derive(Debug, Clone)]
pub struct GameState {
    session_id: SessionId,
    reference_id: ReferenceId,
    steps: Arc<[Step]>,
    dancers: IndexMap<TrackId, DancerEntry>,
}

impl GameState {
    pub fn new(
        session_id: SessionId,
        reference_id: ReferenceId,
        steps: Arc<[Step]>,
        dancers: impl IntoIterator<Item = (TrackId, DancerId)>,
    ) -> Self {
        let dancers = dancers
            .into_iter()
            .map(|(track_id, dancer_id)| {
                let entry = DancerEntry {
                    dancer_id,
                    cumulative: 0.0,
                };
                (track_id, entry)
            })
            .collect();
        Self {
            session_id,
            reference_id,
            steps,
            dancers,
        }
    }

    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    pub fn reference_id(&self) -> ReferenceId {
        self.reference_id
    }

    pub fn total_steps(&self) -> usize {
        self.steps.len()
    }

    pub fn dancers(&self) -> &IndexMap<TrackId, DancerEntry> {
        &self.dancers
    }

    pub fn contains(&self, track_id: TrackId) -> bool {
        self.dancers.contains_key(&track_id)
    }

    /// First step within [`STEP_TIMESTAMP_TOLERANCE`] of `timestamp`.
    pub fn match_step(&self, timestamp: f64) -> Option<(usize, &Step)> {
        self.steps
            .iter()
            .enumerate()
            .find(|(_, step)| (step.timestamp - timestamp).abs() <= STEP_TIMESTAMP_TOLERANCE)
    }

    /// Adds `score` to the dancer's total and returns its id with the new running average.
    pub fn record(&mut self, track_id: TrackId, score: f64) -> Option<(DancerId, f64)> {
        let total_steps = self.steps.len();
        let entry = self.dancers.get_mut(&track_id)?;
        entry.cumulative += score;
        Some((entry.dancer_id, running_average(entry.cumulative, total_steps)))
    }

    /// Running averages of every dancer, in registration order.
    pub fn final_scores(&self) -> IndexMap<TrackId, f64> {
        self.dancers
            .iter()
            .map(|(&track_id, entry)| {
                (track_id, running_average(entry.cumulative, self.steps.len()))
            })
            .collect()
    }
}

fn running_average(cumulative: f64, total_steps: usize) -> f64 {
    if total_steps == 0 {
        0.0
    } else {
        cumulative / total_steps as f64
    }
}
