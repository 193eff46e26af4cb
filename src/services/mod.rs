//! Seams to the opaque collaborators: the pose model, beat tracking and video decoding.

pub mod sidecar;

use std::path::Path;

use async_trait::async_trait;
use image::DynamicImage;
use serde::{Deserialize, Serialize};

use crate::error::ServiceError;
use crate::pose::FrameDetections;

pub use sidecar::SidecarClient;

/// Pose detector with its own tracker.
///
/// Track ids stay stable across successive calls on one instance; instances never
/// share tracker state, so each connection or extraction job creates its own.
#[async_trait]
pub trait PoseModel: Send {
    async fn track(&mut self, image: &DynamicImage) -> Result<FrameDetections, ServiceError>;
}

#[async_trait]
pub trait PoseModelFactory: Send + Sync {
    async fn create(&self) -> Result<Box<dyn PoseModel>, ServiceError>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BeatAnalysis {
    pub tempo: f64,
    /// Beat times in seconds, increasing.
    pub beats: Vec<f64>,
    #[serde(default)]
    pub signal: Vec<f32>,
    pub sample_rate: u32,
}

#[async_trait]
pub trait BeatAnalyzer: Send + Sync {
    /// Decodes the audio track to mono PCM at `sample_rate` and tracks its beats.
    async fn analyze(&self, video: &Path, sample_rate: u32) -> Result<BeatAnalysis, ServiceError>;
}

#[async_trait]
pub trait VideoSource: Send {
    fn fps(&self) -> f64;
    async fn frame(&mut self, index: u64) -> Result<DynamicImage, ServiceError>;
}

#[async_trait]
pub trait VideoFrames: Send + Sync {
    async fn open(&self, video: &Path) -> Result<Box<dyn VideoSource>, ServiceError>;
}
