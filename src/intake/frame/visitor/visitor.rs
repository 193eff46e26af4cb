use async_trait::async_trait;

use crate::error::AppError;
use crate::game::DancerRegistration;
use crate::intake::frame::Message;
use crate::storage::ReferenceId;

/// Handles the frames of one connection. A returned message is written back to the client.
#[async_trait]
pub trait FrameVisitor: Send {
    async fn ping(&mut self) -> Result<Option<Message>, AppError>;
    async fn prepare(&mut self, image: Vec<u8>) -> Result<Option<Message>, AppError>;
    async fn register(
        &mut self,
        reference_id: ReferenceId,
        dancers: Vec<DancerRegistration>,
    ) -> Result<Option<Message>, AppError>;
    async fn dance(
        &mut self,
        timestamp: f64,
        image: Vec<u8>,
    ) -> Result<Option<Message>, AppError>;
    async fn finished(&mut self) -> Result<Option<Message>, AppError>;
    async fn shutdown(&mut self) -> Result<Option<Message>, AppError>;
}
