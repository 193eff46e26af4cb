use std::path::Path;
use std::sync::Arc;

use image::DynamicImage;
use indexmap::IndexMap;
use tracing::{debug, info, warn};

use crate::common::imaging::encode_jpeg;
use crate::error::AppError;
use crate::pose::{select_main_subject, BoundingBox, FrameDetections, Pose, TrackId};
use crate::services::{BeatAnalyzer, PoseModelFactory, VideoFrames};
use crate::steps::Step;
use crate::storage::{NewReference, ReferenceId, Storage};

/// A decoded frame together with the beat it was sampled for.
struct SampledFrame {
    beat: usize,
    image: DynamicImage,
}

/// Turns a reference video into beat-aligned steps.
pub struct StepExtractor {
    beats: Arc<dyn BeatAnalyzer>,
    video: Arc<dyn VideoFrames>,
    models: Arc<dyn PoseModelFactory>,
    storage: Arc<dyn Storage>,
    sample_rate: u32,
}

impl StepExtractor {
    /// Extracts the steps of `video` and stores them with the reference metadata.
    pub async fn extract_steps(
        &self,
        video: &Path,
        selected: bool,
    ) -> Result<ReferenceId, AppError> {
        let (steps, thumbnail) = self.extract(video).await?;
        let title = video
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default();
        let reference = NewReference {
            filepath: video.to_string_lossy().into_owned(),
            title,
            thumbnail,
            selected,
        };
        let id = self.storage.create_reference(reference, &steps)?;
        info!("Stored reference {} with {} steps", id, steps.len());
        Ok(id)
    }

    /// Returns the steps and a JPEG thumbnail of the first decoded frame.
    pub async fn extract(&self, video: &Path) -> Result<(Vec<Step>, Option<Vec<u8>>), AppError> {
        let analysis = self.beats.analyze(video, self.sample_rate).await?;
        let frames = self.sample_frames(video, &analysis.beats).await?;

        let thumbnail = match frames.first() {
            Some(frame) => match encode_jpeg(&frame.image) {
                Ok(bytes) => Some(bytes),
                Err(e) => {
                    warn!("Could not encode thumbnail for {}: {}", video.display(), e);
                    None
                }
            },
            None => None,
        };

        let detections = self.track_frames(&frames).await?;
        let steps = build_steps(&analysis.beats, &detections);
        Ok((steps, thumbnail))
    }

    async fn sample_frames(
        &self,
        video: &Path,
        beats: &[f64],
    ) -> Result<Vec<SampledFrame>, AppError> {
        let mut source = self.video.open(video).await?;
        let fps = source.fps();
        let mut frames = Vec::with_capacity(beats.len());
        for (beat, timestamp) in beats.iter().enumerate() {
            let index = (timestamp * fps).round().max(0.0) as u64;
            match source.frame(index).await {
                Ok(image) => frames.push(SampledFrame { beat, image }),
                Err(e) => warn!("Could not read frame at index {}: {}", index, e),
            }
        }
        debug!("Decoded {} of {} beat frames", frames.len(), beats.len());
        Ok(frames)
    }

    /// Runs one tracker over the whole frame sequence, keyed by beat index.
    async fn track_frames(
        &self,
        frames: &[SampledFrame],
    ) -> Result<IndexMap<usize, FrameDetections>, AppError> {
        let mut model = self.models.create().await?;
        let mut detections = IndexMap::with_capacity(frames.len());
        for frame in frames {
            match model.track(&frame.image).await {
                Ok(found) => {
                    detections.insert(frame.beat, found);
                }
                Err(e) => warn!("Pose tracking failed for beat {}: {}", frame.beat, e),
            }
        }
        Ok(detections)
    }
}

/// Builds one step per beat from the main subject's poses, carrying the last pose forward
/// over beats where the subject is missing.
fn build_steps(beats: &[f64], detections: &IndexMap<usize, FrameDetections>) -> Vec<Step> {
    let boxes: Vec<IndexMap<TrackId, BoundingBox>> = detections
        .values()
        .map(FrameDetections::normalized_boxes)
        .collect();
    let Some(subject) = select_main_subject(&boxes) else {
        info!("No subject found in {} frames", detections.len());
        return Vec::new();
    };

    let mut previous: Option<Pose> = None;
    let mut steps = Vec::with_capacity(beats.len());
    for (beat, timestamp) in beats.iter().enumerate() {
        let found = detections
            .get(&beat)
            .and_then(|frame| frame.find(subject))
            .and_then(|detection| match Pose::normalize(detection) {
                Ok(pose) => Some(pose),
                Err(e) => {
                    warn!("Skipping pose at beat {}: {}", beat, e);
                    None
                }
            });
        let pose = match found.or_else(|| previous.clone()) {
            Some(pose) => pose,
            None => Pose::neutral(),
        };
        previous = Some(pose.clone());
        steps.push(Step::new(*timestamp, pose));
    }
    steps
}

pub struct StepExtractorBuilder {
    beats: Arc<dyn BeatAnalyzer>,
    video: Arc<dyn VideoFrames>,
    models: Arc<dyn PoseModelFactory>,
    storage: Arc<dyn Storage>,
    sample_rate: u32,
}

impl StepExtractorBuilder {
    pub fn new(
        beats: Arc<dyn BeatAnalyzer>,
        video: Arc<dyn VideoFrames>,
        models: Arc<dyn PoseModelFactory>,
        storage: Arc<dyn Storage>,
    ) -> Self {
        Self {
            beats,
            video,
            models,
            storage,
            sample_rate: 44_100,
        }
    }

    pub fn sample_rate(mut self, sample_rate: u32) -> Self {
        self.sample_rate = sample_rate;
        self
    }

    pub fn build(self) -> StepExtractor {
        StepExtractor {
            beats: self.beats,
            video: self.video,
            models: self.models,
            storage: self.storage,
            sample_rate: self.sample_rate,
        }
    }
}
