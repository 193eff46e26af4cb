use serde::{Deserialize, Serialize};

use crate::error::PoseError;
use crate::pose::detection::{BoundingBox, Detection};
use crate::pose::keypoint::{Keypoint, KeypointIndex, CANONICAL_CENTER};

/// A skeleton expressed relative to its own bounding box.
///
/// Coordinates are `(v - center) / box_height + 0.5`, so a pose is unchanged by
/// moving or scaling the subject. Occluded keypoints sit on the canonical center
/// but keep their confidence for weighting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Pose {
    keypoints: Vec<Keypoint>,
}

impl Pose {
    /// Pose where no keypoint was seen.
    pub fn neutral() -> Self {
        Self {
            keypoints: vec![Keypoint::occluded(); KeypointIndex::COUNT],
        }
    }

    pub fn from_keypoints(keypoints: [Keypoint; KeypointIndex::COUNT]) -> Self {
        Self {
            keypoints: keypoints.to_vec(),
        }
    }

    /// The one normalization used for both reference steps and live frames.
    pub fn normalize(detection: &Detection) -> Result<Self, PoseError> {
        normalize_keypoints(&detection.bbox, &detection.keypoints).map(Self::from_keypoints)
    }

    pub fn keypoints(&self) -> &[Keypoint] {
        &self.keypoints
    }

    pub fn get(&self, index: KeypointIndex) -> &Keypoint {
        &self.keypoints[index as usize]
    }

    /// Rejects deserialized poses that do not carry a full skeleton.
    pub fn validate(self) -> Result<Self, PoseError> {
        if self.keypoints.len() != KeypointIndex::COUNT {
            return Err(PoseError::InvalidDetection(format!(
                "pose has {} keypoints",
                self.keypoints.len()
            )));
        }
        Ok(self)
    }
}

fn normalize_keypoints(
    bbox: &BoundingBox,
    keypoints: &[Keypoint; KeypointIndex::COUNT],
) -> Result<[Keypoint; KeypointIndex::COUNT], PoseError> {
    let height = bbox.height();
    if !height.is_finite() || height <= 0.0 {
        return Err(PoseError::InvalidDetection(format!(
            "degenerate bounding box height {height}"
        )));
    }
    let (cx, cy) = bbox.center();
    Ok(keypoints.map(|kp| {
        if kp.is_occluded() {
            Keypoint::new(kp.confidence, CANONICAL_CENTER.0, CANONICAL_CENTER.1)
        } else {
            Keypoint::new(
                kp.confidence,
                (kp.x - cx) / height + 0.5,
                (kp.y - cy) / height + 0.5,
            )
        }
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detection(bbox: BoundingBox, keypoints: [Keypoint; KeypointIndex::COUNT]) -> Detection {
        Detection {
            track_id: 1,
            confidence: 0.9,
            bbox,
            keypoints,
        }
    }

    #[test]
    fn identity_box_leaves_canonical_pose_unchanged() {
        let keypoints: [Keypoint; KeypointIndex::COUNT] = std::array::from_fn(|i| {
            let step = i as f64 / 32.0;
            Keypoint::new(0.9, 0.25 + step, 0.75 - step)
        });
        let identity = BoundingBox::new(0.0, 0.0, 1.0, 1.0);
        let pose = Pose::normalize(&detection(identity, keypoints)).unwrap();
        assert_eq!(pose, Pose::from_keypoints(keypoints));
    }

    #[test]
    fn occluded_keypoints_collapse_to_center() {
        let keypoints: [Keypoint; KeypointIndex::COUNT] = std::array::from_fn(|i| {
            let confidence = if i % 2 == 0 { 0.2 } else { 0.95 };
            Keypoint::new(confidence, 300.0 + i as f64, 40.0 * i as f64)
        });
        let bbox = BoundingBox::new(250.0, 0.0, 350.0, 640.0);
        let pose = Pose::normalize(&detection(bbox, keypoints)).unwrap();
        for (raw, kp) in keypoints.iter().zip(pose.keypoints()) {
            assert_eq!(kp.confidence, raw.confidence);
            if raw.confidence < 0.5 {
                assert_eq!((kp.x, kp.y), (0.5, 0.5));
            }
        }
    }

    #[test]
    fn translation_and_scale_do_not_change_pose() {
        let base: [Keypoint; KeypointIndex::COUNT] =
            std::array::from_fn(|i| Keypoint::new(1.0, 10.0 + i as f64, 5.0 * i as f64));
        let moved = base.map(|kp| Keypoint::new(kp.confidence, kp.x * 2.0 + 100.0, kp.y * 2.0 + 50.0));
        let a = Pose::normalize(&detection(BoundingBox::new(0.0, 0.0, 40.0, 80.0), base)).unwrap();
        let b = Pose::normalize(&detection(BoundingBox::new(100.0, 50.0, 180.0, 210.0), moved))
            .unwrap();
        for (ka, kb) in a.keypoints().iter().zip(b.keypoints()) {
            assert!((ka.x - kb.x).abs() < 1e-9);
            assert!((ka.y - kb.y).abs() < 1e-9);
        }
    }

    #[test]
    fn degenerate_box_is_invalid() {
        let keypoints = [Keypoint::new(1.0, 1.0, 1.0); KeypointIndex::COUNT];
        let flat = BoundingBox::new(0.0, 10.0, 5.0, 10.0);
        assert!(matches!(
            Pose::normalize(&detection(flat, keypoints)),
            Err(PoseError::InvalidDetection(_))
        ));
    }

    #[test]
    fn neutral_pose_is_fully_occluded() {
        let pose = Pose::neutral();
        assert_eq!(pose.keypoints().len(), KeypointIndex::COUNT);
        assert!(pose.keypoints().iter().all(|kp| kp.confidence == 0.0 && kp.x == 0.5));
    }

    #[test]
    fn short_pose_fails_validation() {
        let pose: Pose = serde_json::from_str(r#"[{"confidence":1.0,"x":0.5,"y":0.5}]"#).unwrap();
        assert!(pose.validate().is_err());
    }
}
