use crate::{
    error::{AppError, FrameError},
    intake::frame::{
        reader::FrameReader, visitor::FrameVisitor, writer::FrameWriter, Frame, Message,
    },
};
use tokio::sync::broadcast::{self, Receiver, Sender};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

pub struct Client {
    id: Uuid,
    reader: Box<dyn FrameReader>,
    writer: Box<dyn FrameWriter>,
    visitor: Box<dyn FrameVisitor>,
    shutdown_rx: Receiver<()>,
}

#[derive(Debug, Clone)]
pub struct ClientHandle {
    pub id: Uuid,
    shutdown_tx: Sender<()>,
}

impl ClientHandle {
    /// A handle for a client that will be built later; the receiver goes to [`Client::new`].
    pub fn channel(id: Uuid) -> (Self, Receiver<()>) {
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        (Self { id, shutdown_tx }, shutdown_rx)
    }

    pub fn send_shutdown(&self) -> Result<(), AppError> {
        match self.shutdown_tx.send(()) {
            Ok(_) => Ok(()),
            Err(e) => {
                error!(
                    "Error sending shutdown to client handle {:?}: {:?}",
                    self.id,
                    e.to_string()
                );
                Err(AppError::ClientShutdown(self.id))
            }
        }
    }
}

impl Client {
    pub fn new(
        id: Uuid,
        reader: Box<dyn FrameReader>,
        writer: Box<dyn FrameWriter>,
        visitor: Box<dyn FrameVisitor>,
        shutdown_rx: Receiver<()>,
    ) -> Self {
        Self {
            id,
            reader,
            writer,
            visitor,
            shutdown_rx,
        }
    }

    /// Reads, handles and answers one frame. `Ok(false)` once the client is gone.
    async fn handle_next_message(
        id: Uuid,
        reader: &mut dyn FrameReader,
        writer: &mut dyn FrameWriter,
        visitor: &mut dyn FrameVisitor,
    ) -> Result<bool, AppError> {
        let frame = match reader.read().await {
            Ok(frame) => frame,
            Err(FrameError::Closed) => return Ok(false),
            Err(e) if e.is_malformed() => {
                warn!("Client {:?} sent a malformed frame: {}", id, e);
                writer.write(&Message::error(e.to_string())).await?;
                return Ok(true);
            }
            Err(e) => return Err(e.into()),
        };
        debug!("Client {:?} sent frame with tag {}", id, frame.tag());
        let keep_running = !matches!(frame, Frame::Shutdown);
        if let Some(reply) = frame.accept(visitor).await? {
            writer.write(&reply).await?;
        }
        Ok(keep_running)
    }

    pub async fn run_pipeline(&mut self) -> Result<(), AppError> {
        info!("Running client pipeline for {:?}", self.id);
        let result = loop {
            let next_message = Self::handle_next_message(
                self.id,
                self.reader.as_mut(),
                self.writer.as_mut(),
                self.visitor.as_mut(),
            );
            tokio::select! {
                Ok(()) = self.shutdown_rx.recv() => {
                    debug!("Client pipeline for {:?} received shutdown", self.id);
                    break Ok(());
                }
                result = next_message => {
                    match result {
                        Ok(true) => {}
                        Ok(false) => {
                            debug!("Client {:?} has disconnected", self.id);
                            break Ok(());
                        }
                        Err(e) => {
                            error!("Client pipeline for {:?} failed: {:?}", self.id, e);
                            break Err(e);
                        }
                    }
                }
            }
        };
        // releases the session whichever way the loop ended
        self.visitor.shutdown().await?;
        debug!("Client pipeline for {:?} finished", self.id);
        result
    }

    pub fn id(&self) -> Uuid {
        self.id
    }
}
