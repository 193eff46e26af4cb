use async_trait::async_trait;
use tracing::{debug, warn};

use crate::error::{AppError, SessionError};
use crate::game::{DanceSession, DancerRegistration};
use crate::intake::frame::{visitor::FrameVisitor, Message};
use crate::storage::ReferenceId;

/// Routes a connection's frames into its [`DanceSession`].
///
/// Session failures become `Error` replies; only transport failures end the connection.
pub struct DanceVisitor {
    session: DanceSession,
}

impl DanceVisitor {
    pub fn new(session: DanceSession) -> Self {
        Self { session }
    }

    pub fn session(&self) -> &DanceSession {
        &self.session
    }
}

fn report(error: SessionError) -> Option<Message> {
    match &error {
        SessionError::Storage(e) => warn!("Session storage failure: {}", e),
        _ => debug!("Session request rejected: {}", error),
    }
    Some(Message::error(error.to_string()))
}

#[async_trait]
impl FrameVisitor for DanceVisitor {
    async fn ping(&mut self) -> Result<Option<Message>, AppError> {
        Ok(Some(Message::Pong))
    }

    async fn prepare(&mut self, image: Vec<u8>) -> Result<Option<Message>, AppError> {
        Ok(self
            .session
            .prepare(&image)
            .await
            .map(Message::PrepareResponse))
    }

    async fn register(
        &mut self,
        reference_id: ReferenceId,
        dancers: Vec<DancerRegistration>,
    ) -> Result<Option<Message>, AppError> {
        match self.session.register(reference_id, dancers).await {
            Ok(registration) => Ok(Some(Message::Registered(registration))),
            Err(e) => Ok(report(e)),
        }
    }

    async fn dance(
        &mut self,
        timestamp: f64,
        image: Vec<u8>,
    ) -> Result<Option<Message>, AppError> {
        Ok(self
            .session
            .dance(&image, timestamp)
            .await
            .map(Message::DanceResponse))
    }

    async fn finished(&mut self) -> Result<Option<Message>, AppError> {
        match self.session.finish().await {
            Ok(scores) => Ok(Some(Message::Scores(scores))),
            Err(e) => Ok(report(e)),
        }
    }

    async fn shutdown(&mut self) -> Result<Option<Message>, AppError> {
        self.session.disconnect().await;
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::{SessionState, StepCatalog};
    use crate::intake::frame::Frame;
    use crate::storage::InMemoryStorage;
    use crate::testing::{jpeg_bytes, ScriptedModelFactory};
    use std::sync::Arc;
    use uuid::Uuid;

    async fn visitor() -> DanceVisitor {
        let storage = Arc::new(InMemoryStorage::new());
        let catalog = Arc::new(StepCatalog::new(storage.clone()));
        let models = ScriptedModelFactory::new(vec![]);
        let session = DanceSession::connect(Uuid::new_v4(), &models, catalog, storage).await;
        DanceVisitor::new(session)
    }

    #[tokio::test]
    async fn ping_is_answered_with_pong() {
        let mut visitor = visitor().await;
        let reply = Frame::Ping.accept(&mut visitor).await.unwrap();
        assert_eq!(reply, Some(Message::Pong));
    }

    #[tokio::test]
    async fn unknown_reference_is_reported_to_the_client() {
        let mut visitor = visitor().await;
        let frame = Frame::Register {
            reference_id: 77,
            dancers: vec![],
        };
        let reply = frame.accept(&mut visitor).await.unwrap();
        assert_eq!(reply, Some(Message::error("Unknown reference: 77")));
    }

    #[tokio::test]
    async fn unscored_frames_send_nothing() {
        let mut visitor = visitor().await;
        let frame = Frame::Dance {
            timestamp: 0.0,
            image: jpeg_bytes(),
        };
        assert_eq!(frame.accept(&mut visitor).await.unwrap(), None);
    }

    #[tokio::test]
    async fn shutdown_disconnects_the_session() {
        let mut visitor = visitor().await;
        assert_eq!(Frame::Shutdown.accept(&mut visitor).await.unwrap(), None);
        assert_eq!(visitor.session().state(), SessionState::Disconnected);
    }
}
