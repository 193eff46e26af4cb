use thiserror::Error;
use uuid::Uuid;

use crate::storage::ReferenceId;

// Main Application Error Type

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Failed to bind to port {1}: {0}")]
    Bind(std::io::Error, u16),
    #[error("Failed to send shutdown to client handle: {0}")]
    ClientShutdown(Uuid),
    #[error("Client Error: {0}")]
    Client(String),
    #[error("Configuration Error: {0}")]
    Configuration(#[from] config::ConfigError),
    #[error("Frame Error: {0}")]
    Frame(#[from] FrameError),
    #[error("Service Error: {0}")]
    Service(#[from] ServiceError),
    #[error("Storage Error: {0}")]
    Storage(#[from] StorageError),
    #[error("Session Error: {0}")]
    Session(#[from] SessionError),
}

// Wire protocol errors
#[derive(Error, Debug)]
pub enum FrameError {
    #[error("Failed to read frame: {0}")]
    Read(std::io::Error),
    #[error("Failed to write frame: {0}")]
    Write(std::io::Error),
    #[error("Invalid frame length: {0}")]
    InvalidFrameLength(usize),
    #[error("Frame of {0} bytes exceeds the limit of {1} bytes")]
    FrameTooLarge(usize, usize),
    #[error("Invalid frame tag: {0}")]
    InvalidFrameTag(u8),
    #[error("Invalid frame payload: {0}")]
    InvalidPayload(#[from] serde_json::Error),
    #[error("Connection closed")]
    Closed,
}

impl FrameError {
    /// A well-delimited frame whose content could not be understood. The stream itself
    /// is still usable.
    pub fn is_malformed(&self) -> bool {
        matches!(
            self,
            FrameError::InvalidFrameLength(_)
                | FrameError::InvalidFrameTag(_)
                | FrameError::InvalidPayload(_)
        )
    }
}

#[derive(Error, Debug, PartialEq)]
pub enum PoseError {
    #[error("Invalid detection: {0}")]
    InvalidDetection(String),
}

// Errors raised by the pose model, beat analysis and video decoding collaborators
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Failed to reach inference sidecar: {0}")]
    Connect(std::io::Error),
    #[error("Inference sidecar protocol error: {0}")]
    Protocol(#[from] FrameError),
    #[error("Inference sidecar rejected request: {0}")]
    Remote(String),
    #[error("Failed to decode frame: {0}")]
    FrameDecode(String),
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("sqlite error: {0}")]
    Sql(#[from] rusqlite::Error),
    #[error("failed to encode pose: {0}")]
    Encoding(#[from] serde_json::Error),
    #[error("cannot prepare database location: {0}")]
    Io(#[from] std::io::Error),
    #[error("storage lock poisoned")]
    Poisoned,
    #[error("storage task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("corrupt row: {0}")]
    Corrupt(String),
}

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Unknown reference: {0}")]
    UnknownReference(ReferenceId),
    #[error("Session is disconnected")]
    Disconnected,
    #[error(transparent)]
    Storage(#[from] StorageError),
}
