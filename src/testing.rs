//! Fakes for the inference collaborators, shared by unit tests.

use std::collections::{HashSet, VecDeque};
use std::io;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use image::{DynamicImage, ImageBuffer, Rgb};

use crate::common::imaging::encode_jpeg;
use crate::error::ServiceError;
use crate::pose::{BoundingBox, Detection, FrameDetections, Keypoint, TrackId};
use crate::services::{
    BeatAnalysis, BeatAnalyzer, PoseModel, PoseModelFactory, VideoFrames, VideoSource,
};

pub const FRAME_WIDTH: u32 = 100;
pub const FRAME_HEIGHT: u32 = 100;

pub fn solid_image() -> DynamicImage {
    DynamicImage::ImageRgb8(ImageBuffer::from_pixel(
        FRAME_WIDTH,
        FRAME_HEIGHT,
        Rgb([40, 80, 120]),
    ))
}

pub fn jpeg_bytes() -> Vec<u8> {
    encode_jpeg(&solid_image()).unwrap()
}

/// A 20x40 subject centred on `center`, every keypoint at `confidence`.
pub fn detection(track_id: TrackId, center: (f64, f64), confidence: f64) -> Detection {
    let (cx, cy) = center;
    Detection {
        track_id,
        confidence,
        bbox: BoundingBox::new(cx - 10.0, cy - 20.0, cx + 10.0, cy + 20.0),
        keypoints: std::array::from_fn(|i| {
            Keypoint::new(confidence, cx - 8.0 + i as f64, cy - 16.0 + 2.0 * i as f64)
        }),
    }
}

pub fn frame_of(detections: Vec<Detection>) -> FrameDetections {
    FrameDetections {
        width: FRAME_WIDTH,
        height: FRAME_HEIGHT,
        detections,
    }
}

pub struct FakeBeats {
    beats: Vec<f64>,
}

impl FakeBeats {
    pub fn new(beats: Vec<f64>) -> Self {
        Self { beats }
    }
}

#[async_trait]
impl BeatAnalyzer for FakeBeats {
    async fn analyze(&self, _video: &Path, sample_rate: u32) -> Result<BeatAnalysis, ServiceError> {
        Ok(BeatAnalysis {
            tempo: 120.0,
            beats: self.beats.clone(),
            signal: Vec::new(),
            sample_rate,
        })
    }
}

/// Video whose listed frame indices decode; every other index fails.
#[derive(Clone)]
pub struct FakeVideo {
    fps: f64,
    frames: HashSet<u64>,
    requested: Arc<Mutex<Vec<u64>>>,
}

impl FakeVideo {
    pub fn new(fps: f64) -> Self {
        Self {
            fps,
            frames: HashSet::new(),
            requested: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn with_frames(mut self, indices: &[u64]) -> Self {
        self.frames.extend(indices.iter().copied());
        self
    }

    pub fn requested(&self) -> Arc<Mutex<Vec<u64>>> {
        self.requested.clone()
    }
}

#[async_trait]
impl VideoSource for FakeVideo {
    fn fps(&self) -> f64 {
        self.fps
    }

    async fn frame(&mut self, index: u64) -> Result<DynamicImage, ServiceError> {
        self.requested.lock().unwrap().push(index);
        if self.frames.contains(&index) {
            Ok(solid_image())
        } else {
            Err(ServiceError::FrameDecode(format!("no frame {index}")))
        }
    }
}

#[async_trait]
impl VideoFrames for FakeVideo {
    async fn open(&self, _video: &Path) -> Result<Box<dyn VideoSource>, ServiceError> {
        Ok(Box::new(self.clone()))
    }
}

/// Pose models that answer with pre-recorded detections in call order, then empty frames.
#[derive(Clone, Default)]
pub struct ScriptedModelFactory {
    script: Arc<Mutex<VecDeque<FrameDetections>>>,
    created: Arc<AtomicUsize>,
}

impl ScriptedModelFactory {
    pub fn new(script: Vec<FrameDetections>) -> Self {
        Self {
            script: Arc::new(Mutex::new(script.into())),
            created: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn push(&self, frame: FrameDetections) {
        self.script.lock().unwrap().push_back(frame);
    }

    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }
}

struct ScriptedModel {
    script: Arc<Mutex<VecDeque<FrameDetections>>>,
}

#[async_trait]
impl PoseModel for ScriptedModel {
    async fn track(&mut self, image: &DynamicImage) -> Result<FrameDetections, ServiceError> {
        let next = self.script.lock().unwrap().pop_front();
        Ok(next.unwrap_or_else(|| FrameDetections::empty(image.width(), image.height())))
    }
}

#[async_trait]
impl PoseModelFactory for ScriptedModelFactory {
    async fn create(&self) -> Result<Box<dyn PoseModel>, ServiceError> {
        self.created.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(ScriptedModel {
            script: self.script.clone(),
        }))
    }
}

/// Factory whose sidecar is never reachable.
pub struct UnavailableModelFactory;

#[async_trait]
impl PoseModelFactory for UnavailableModelFactory {
    async fn create(&self) -> Result<Box<dyn PoseModel>, ServiceError> {
        Err(ServiceError::Connect(io::Error::new(
            io::ErrorKind::ConnectionRefused,
            "sidecar offline",
        )))
    }
}
