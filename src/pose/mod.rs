pub mod detection;
pub mod grader;
pub mod keypoint;
pub mod normalize;
pub mod selector;

pub use detection::{
    BoundingBox, Detection, FrameDetections, RawDetection, RawKeypoints, TrackId,
};
pub use grader::{grade, grade_scaled};
pub use keypoint::{Keypoint, KeypointIndex};
pub use normalize::Pose;
pub use selector::select_main_subject;
