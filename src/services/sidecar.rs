//! Client for the inference sidecar that hosts the pose model, beat tracker and video decoder.
//!
//! Requests and responses are JSON documents sent with the same length-prefixed
//! framing as the live channel. Every pose model instance opens its own
//! connection; the sidecar keeps one tracker per connection.

use std::path::Path;

use async_trait::async_trait;
use image::DynamicImage;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::io::BufStream;
use tokio::net::TcpStream;
use tracing::{debug, info};

use crate::common::imaging::{decode_base64, decode_image, encode_base64, encode_jpeg};
use crate::error::{FrameError, ServiceError};
use crate::intake::frame::codec::{read_frame, write_frame};
use crate::pose::{FrameDetections, RawDetection};
use crate::services::{
    BeatAnalysis, BeatAnalyzer, PoseModel, PoseModelFactory, VideoFrames, VideoSource,
};

#[derive(Debug, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
enum SidecarRequest<'a> {
    Track { image: String, persist: bool },
    AnalyzeAudio { path: &'a str, sample_rate: u32 },
    OpenVideo { path: &'a str },
    Frame { path: &'a str, index: u64 },
}

#[derive(Debug, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
enum SidecarResponse<T> {
    Ok { result: T },
    Error { message: String },
}

#[derive(Debug, Deserialize)]
struct TrackResult {
    detections: Vec<RawDetection>,
}

#[derive(Debug, Deserialize)]
struct VideoInfo {
    fps: f64,
}

#[derive(Debug, Deserialize)]
struct FrameResult {
    image: Option<String>,
}

struct SidecarConnection {
    stream: BufStream<TcpStream>,
    max_frame_bytes: usize,
}

impl SidecarConnection {
    async fn connect(addr: &str, max_frame_bytes: usize) -> Result<Self, ServiceError> {
        let stream = TcpStream::connect(addr)
            .await
            .map_err(ServiceError::Connect)?;
        debug!("Connected to inference sidecar at {}", addr);
        Ok(Self {
            stream: BufStream::new(stream),
            max_frame_bytes,
        })
    }

    async fn request<T: DeserializeOwned>(
        &mut self,
        request: &SidecarRequest<'_>,
    ) -> Result<T, ServiceError> {
        let payload = serde_json::to_vec(request).map_err(FrameError::InvalidPayload)?;
        write_frame(&mut self.stream, &payload).await?;
        let response = read_frame(&mut self.stream, self.max_frame_bytes).await?;
        let response: SidecarResponse<T> =
            serde_json::from_slice(&response).map_err(FrameError::InvalidPayload)?;
        match response {
            SidecarResponse::Ok { result } => Ok(result),
            SidecarResponse::Error { message } => Err(ServiceError::Remote(message)),
        }
    }
}

/// Factory and one-shot services backed by the sidecar at `addr`.
#[derive(Debug, Clone)]
pub struct SidecarClient {
    addr: String,
    max_frame_bytes: usize,
}

impl SidecarClient {
    pub fn new(addr: impl Into<String>, max_frame_bytes: usize) -> Self {
        Self {
            addr: addr.into(),
            max_frame_bytes,
        }
    }

    async fn connect(&self) -> Result<SidecarConnection, ServiceError> {
        SidecarConnection::connect(&self.addr, self.max_frame_bytes).await
    }
}

fn path_str(path: &Path) -> Result<&str, ServiceError> {
    path.to_str()
        .ok_or_else(|| ServiceError::Remote(format!("path is not UTF-8: {}", path.display())))
}

pub struct RemotePoseModel {
    connection: SidecarConnection,
}

#[async_trait]
impl PoseModel for RemotePoseModel {
    async fn track(&mut self, image: &DynamicImage) -> Result<FrameDetections, ServiceError> {
        let request = SidecarRequest::Track {
            image: encode_base64(&encode_jpeg(image)?),
            persist: true,
        };
        let result: TrackResult = self.connection.request(&request).await?;
        Ok(FrameDetections::from_raw(
            image.width(),
            image.height(),
            result.detections,
        ))
    }
}

#[async_trait]
impl PoseModelFactory for SidecarClient {
    async fn create(&self) -> Result<Box<dyn PoseModel>, ServiceError> {
        Ok(Box::new(RemotePoseModel {
            connection: self.connect().await?,
        }))
    }
}

#[async_trait]
impl BeatAnalyzer for SidecarClient {
    async fn analyze(&self, video: &Path, sample_rate: u32) -> Result<BeatAnalysis, ServiceError> {
        let mut connection = self.connect().await?;
        let analysis: BeatAnalysis = connection
            .request(&SidecarRequest::AnalyzeAudio {
                path: path_str(video)?,
                sample_rate,
            })
            .await?;
        info!(
            "Estimated tempo {:.1} BPM with {} beats for {}",
            analysis.tempo,
            analysis.beats.len(),
            video.display()
        );
        Ok(analysis)
    }
}

pub struct SidecarVideoSource {
    connection: SidecarConnection,
    path: String,
    fps: f64,
}

#[async_trait]
impl VideoSource for SidecarVideoSource {
    fn fps(&self) -> f64 {
        self.fps
    }

    async fn frame(&mut self, index: u64) -> Result<DynamicImage, ServiceError> {
        let result: FrameResult = self
            .connection
            .request(&SidecarRequest::Frame {
                path: &self.path,
                index,
            })
            .await?;
        let encoded = result
            .image
            .ok_or_else(|| ServiceError::FrameDecode(format!("no frame at index {index}")))?;
        let bytes = decode_base64(&encoded)
            .ok_or_else(|| ServiceError::FrameDecode(format!("frame {index} is not base64")))?;
        decode_image(&bytes)
    }
}

#[async_trait]
impl VideoFrames for SidecarClient {
    async fn open(&self, video: &Path) -> Result<Box<dyn VideoSource>, ServiceError> {
        let path = path_str(video)?.to_string();
        let mut connection = self.connect().await?;
        let info: VideoInfo = connection
            .request(&SidecarRequest::OpenVideo { path: &path })
            .await?;
        Ok(Box::new(SidecarVideoSource {
            connection,
            path,
            fps: info.fps,
        }))
    }
}
