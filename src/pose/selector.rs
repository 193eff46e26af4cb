use indexmap::IndexMap;
use tracing::debug;

use crate::pose::detection::{BoundingBox, TrackId};

/// Larger than any distance from the center of the unit square.
const INITIAL_BOUND: f64 = 2.0;

#[derive(Debug, Default, Clone, Copy)]
struct RunningCenter {
    mean_x: f64,
    mean_y: f64,
    samples: u32,
}

impl RunningCenter {
    fn push(&mut self, (x, y): (f64, f64)) {
        self.samples += 1;
        let n = f64::from(self.samples);
        self.mean_x += (x - self.mean_x) / n;
        self.mean_y += (y - self.mean_y) / n;
    }

    fn distance_from_center(&self) -> f64 {
        (self.mean_x - 0.5).hypot(self.mean_y - 0.5)
    }
}

/// Picks the track whose average box center sits closest to the middle of the frame.
///
/// Boxes must be in normalized image coordinates. Tracks are considered in order
/// of first appearance and ties keep the earlier track.
pub fn select_main_subject<'a, I>(frames: I) -> Option<TrackId>
where
    I: IntoIterator<Item = &'a IndexMap<TrackId, BoundingBox>>,
{
    let mut centers: IndexMap<TrackId, RunningCenter> = IndexMap::new();
    for frame in frames {
        for (track_id, bbox) in frame {
            centers.entry(*track_id).or_default().push(bbox.center());
        }
    }

    let mut best: Option<TrackId> = None;
    let mut best_distance = INITIAL_BOUND;
    for (track_id, center) in &centers {
        let distance = center.distance_from_center();
        if distance < best_distance {
            best_distance = distance;
            best = Some(*track_id);
        }
    }
    debug!(
        "Main subject {:?} at distance {:.3} out of {} tracks",
        best,
        best_distance,
        centers.len()
    );
    best
}
