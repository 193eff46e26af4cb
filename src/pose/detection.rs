use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::PoseError;
use crate::pose::keypoint::{Keypoint, KeypointIndex};

/// Detector-assigned identity of a subject within one tracking sequence.
pub type TrackId = u32;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
}

impl BoundingBox {
    pub fn new(x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        Self { x1, y1, x2, y2 }
    }

    pub fn center(&self) -> (f64, f64) {
        ((self.x1 + self.x2) / 2.0, (self.y1 + self.y2) / 2.0)
    }

    pub fn height(&self) -> f64 {
        self.y2 - self.y1
    }

    /// Rescales pixel coordinates into the image's [0,1] space.
    pub fn normalized(&self, width: u32, height: u32) -> BoundingBox {
        let (w, h) = (f64::from(width.max(1)), f64::from(height.max(1)));
        BoundingBox::new(self.x1 / w, self.y1 / h, self.x2 / w, self.y2 / h)
    }
}

/// Keypoints as the detector reports them: parallel coordinate and visibility arrays.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawKeypoints {
    pub x: Vec<f64>,
    pub y: Vec<f64>,
    pub visible: Vec<f64>,
}

/// One detection in the pose model's wire shape, before validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawDetection {
    #[serde(default)]
    pub track_id: Option<TrackId>,
    #[serde(default)]
    pub confidence: f64,
    #[serde(rename = "box")]
    pub bbox: BoundingBox,
    #[serde(default)]
    pub keypoints: RawKeypoints,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Detection {
    pub track_id: TrackId,
    pub confidence: f64,
    pub bbox: BoundingBox,
    pub keypoints: [Keypoint; KeypointIndex::COUNT],
}

impl Detection {
    /// Validates a raw detection. `Ok(None)` means the tracker has not assigned an id yet.
    pub fn from_raw(raw: RawDetection) -> Result<Option<Self>, PoseError> {
        let RawKeypoints { x, y, visible } = &raw.keypoints;
        if x.len() != KeypointIndex::COUNT
            || y.len() != KeypointIndex::COUNT
            || visible.len() != KeypointIndex::COUNT
        {
            return Err(PoseError::InvalidDetection(format!(
                "expected {} keypoints, got x={} y={} visible={}",
                KeypointIndex::COUNT,
                x.len(),
                y.len(),
                visible.len()
            )));
        }
        let Some(track_id) = raw.track_id else {
            return Ok(None);
        };
        let keypoints: [Keypoint; KeypointIndex::COUNT] =
            std::array::from_fn(|i| Keypoint::new(visible[i], x[i], y[i]));
        Ok(Some(Self {
            track_id,
            confidence: raw.confidence,
            bbox: raw.bbox,
            keypoints,
        }))
    }
}

/// Everything the pose model found in one image.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FrameDetections {
    pub width: u32,
    pub height: u32,
    pub detections: Vec<Detection>,
}

impl FrameDetections {
    pub fn empty(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            detections: Vec::new(),
        }
    }

    /// Keeps every valid tracked detection; malformed ones are dropped on their own.
    pub fn from_raw(width: u32, height: u32, raw: Vec<RawDetection>) -> Self {
        let mut detections = Vec::with_capacity(raw.len());
        for detection in raw {
            let track_id = detection.track_id;
            match Detection::from_raw(detection) {
                Ok(Some(detection)) => detections.push(detection),
                Ok(None) => {}
                Err(e) => warn!("Dropped detection of track {:?}: {}", track_id, e),
            }
        }
        Self {
            width,
            height,
            detections,
        }
    }

    pub fn find(&self, track_id: TrackId) -> Option<&Detection> {
        self.detections.iter().find(|d| d.track_id == track_id)
    }

    /// Bounding boxes per track in normalized image coordinates, in detection order.
    pub fn normalized_boxes(&self) -> IndexMap<TrackId, BoundingBox> {
        self.detections
            .iter()
            .map(|d| (d.track_id, d.bbox.normalized(self.width, self.height)))
            .collect()
    }
}
