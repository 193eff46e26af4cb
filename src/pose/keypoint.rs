use serde::{Deserialize, Serialize};

/// Confidence below which a keypoint counts as occluded.
pub const OCCLUSION_THRESHOLD: f64 = 0.5;

/// Canonical center every occluded keypoint collapses to.
pub const CANONICAL_CENTER: (f64, f64) = (0.5, 0.5);

/// COCO body keypoints in detector output order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(usize)]
pub enum KeypointIndex {
    Nose = 0,
    LeftEye = 1,
    RightEye = 2,
    LeftEar = 3,
    RightEar = 4,
    LeftShoulder = 5,
    RightShoulder = 6,
    LeftElbow = 7,
    RightElbow = 8,
    LeftWrist = 9,
    RightWrist = 10,
    LeftHip = 11,
    RightHip = 12,
    LeftKnee = 13,
    RightKnee = 14,
    LeftAnkle = 15,
    RightAnkle = 16,
}

impl KeypointIndex {
    pub const COUNT: usize = 17;

    pub const ALL: [KeypointIndex; KeypointIndex::COUNT] = [
        Self::Nose,
        Self::LeftEye,
        Self::RightEye,
        Self::LeftEar,
        Self::RightEar,
        Self::LeftShoulder,
        Self::RightShoulder,
        Self::LeftElbow,
        Self::RightElbow,
        Self::LeftWrist,
        Self::RightWrist,
        Self::LeftHip,
        Self::RightHip,
        Self::LeftKnee,
        Self::RightKnee,
        Self::LeftAnkle,
        Self::RightAnkle,
    ];

    /// Grading weight of the joint. Torso joints dominate, face joints barely count.
    pub fn weight(self) -> f64 {
        match self {
            Self::Nose | Self::LeftEye | Self::RightEye | Self::LeftEar | Self::RightEar => 2.0,
            Self::LeftShoulder | Self::RightShoulder | Self::LeftHip | Self::RightHip => 12.0,
            Self::LeftElbow | Self::RightElbow | Self::LeftWrist | Self::RightWrist => 8.0,
            Self::LeftKnee | Self::RightKnee => 6.0,
            Self::LeftAnkle | Self::RightAnkle => 4.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Keypoint {
    pub confidence: f64,
    pub x: f64,
    pub y: f64,
}

impl Keypoint {
    pub fn new(confidence: f64, x: f64, y: f64) -> Self {
        Self { confidence, x, y }
    }

    /// A keypoint nobody saw.
    pub fn occluded() -> Self {
        Self::new(0.0, CANONICAL_CENTER.0, CANONICAL_CENTER.1)
    }

    pub fn is_occluded(&self) -> bool {
        self.confidence < OCCLUSION_THRESHOLD
    }

    pub fn distance(&self, other: &Keypoint) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn weights_sum_to_one_hundred() {
        let total: f64 = KeypointIndex::ALL.iter().map(|k| k.weight()).sum();
        assert_eq!(total, 100.0);
    }

    #[test]
    fn all_is_in_detector_order() {
        for (i, index) in KeypointIndex::ALL.iter().enumerate() {
            assert_eq!(*index as usize, i);
        }
    }

    #[test]
    fn occlusion_threshold_is_inclusive_at_half() {
        assert!(!Keypoint::new(0.5, 0.1, 0.1).is_occluded());
        assert!(Keypoint::new(0.49, 0.1, 0.1).is_occluded());
        assert!(Keypoint::occluded().is_occluded());
    }
}
