pub mod cli;
pub mod common;
pub mod config;
pub mod error;
pub mod game;
pub mod intake;
pub mod network;
pub mod pose;
pub mod services;
pub mod steps;
pub mod storage;

#[cfg(test)]
mod testing;

pub use error::{AppError, FrameError, PoseError, ServiceError, SessionError, StorageError};
