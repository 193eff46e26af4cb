use crate::pose::keypoint::KeypointIndex;
use crate::pose::normalize::Pose;

pub const MAX_SCORE: f64 = 100.0;

/// Credit given to a joint neither pose could see, as a fraction of its weight.
const DOUBLY_OCCLUDED_CREDIT: f64 = 0.5;

/// Scores how closely `live` matches `reference`, in [0, 100] with two decimals.
pub fn grade(live: &Pose, reference: &Pose) -> f64 {
    grade_scaled(live, reference, 1.0)
}

pub fn grade_scaled(live: &Pose, reference: &Pose, scaling: f64) -> f64 {
    let score: f64 = KeypointIndex::ALL
        .iter()
        .map(|&index| {
            let weight = index.weight();
            let (a, b) = (live.get(index), reference.get(index));
            if a.is_occluded() && b.is_occluded() {
                weight * DOUBLY_OCCLUDED_CREDIT * scaling
            } else {
                let similarity = (-2.0 * a.distance(b)).exp() * weight;
                similarity * ((a.confidence + b.confidence) / 2.0) * scaling
            }
        })
        .sum();
    round_to_hundredths(score.clamp(0.0, MAX_SCORE))
}

fn round_to_hundredths(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
