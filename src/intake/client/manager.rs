use std::sync::Arc;

use crate::{
    error::AppError,
    game::{DanceSession, StepCatalog},
    intake::{
        client::{
            client::{Client, ClientHandle},
            supervisor::{ClientEntry, ClientSupervisorCommand},
            ClientSupervisor,
        },
        frame::{reader::FrameReader, visitor::DanceVisitor, writer::FrameWriter},
    },
    services::PoseModelFactory,
    storage::Storage,
};

use tokio::{
    sync::{mpsc, oneshot},
    task::JoinHandle,
};
use tracing::{debug, error};
use uuid::Uuid;

fn supervisor_gone() -> AppError {
    AppError::Client("client supervisor is not running".to_string())
}

/// Cheap to clone; starts clients and talks to the supervisor task.
#[derive(Clone)]
pub struct ClientManagerHandle {
    command_tx: mpsc::Sender<ClientSupervisorCommand>,
    models: Arc<dyn PoseModelFactory>,
    catalog: Arc<StepCatalog>,
    storage: Arc<dyn Storage>,
}

impl ClientManagerHandle {
    /// Starts a client task with its own session and pose model.
    pub async fn add_client(
        &self,
        reader: Box<dyn FrameReader>,
        writer: Box<dyn FrameWriter>,
    ) -> Result<Uuid, AppError> {
        let id = Uuid::new_v4();
        debug!("Adding client {:?}", id);
        let (handle, shutdown_rx) = ClientHandle::channel(id);
        let models = self.models.clone();
        let catalog = self.catalog.clone();
        let storage = self.storage.clone();
        let command_tx = self.command_tx.clone();
        let client_task = tokio::spawn(async move {
            debug!("Client {:?} starting task", id);
            let session = DanceSession::connect(id, models.as_ref(), catalog, storage).await;
            let visitor = Box::new(DanceVisitor::new(session));
            let mut client = Client::new(id, reader, writer, visitor, shutdown_rx);
            let result = client.run_pipeline().await;
            if command_tx
                .send(ClientSupervisorCommand::ClientFinished { id })
                .await
                .is_err()
            {
                debug!("Supervisor gone before client {:?} finished", id);
            }
            result
        });

        let entry = ClientEntry {
            id,
            client_task,
            handle,
        };
        let (responder, response_rx) = oneshot::channel();
        self.command_tx
            .send(ClientSupervisorCommand::AddClient { entry, responder })
            .await
            .map_err(|_| supervisor_gone())?;

        let client_id = response_rx.await.map_err(|_| supervisor_gone())?;
        debug!("Client {:?} added and started", client_id);
        Ok(client_id)
    }

    pub async fn list_clients(&self) -> Result<Vec<Uuid>, AppError> {
        let (responder, response_rx) = oneshot::channel();
        self.command_tx
            .send(ClientSupervisorCommand::ListClients { responder })
            .await
            .map_err(|_| supervisor_gone())?;
        response_rx.await.map_err(|_| supervisor_gone())
    }

    /// Asks every running client to stop and returns how many were told.
    pub async fn shutdown_all(&self) -> Result<usize, AppError> {
        let (responder, response_rx) = oneshot::channel();
        self.command_tx
            .send(ClientSupervisorCommand::ShutdownAll { responder })
            .await
            .map_err(|_| supervisor_gone())?;
        response_rx.await.map_err(|_| supervisor_gone())
    }
}

pub struct ClientManager {
    client_handler: JoinHandle<()>,
}

impl ClientManager {
    pub fn new(
        models: Arc<dyn PoseModelFactory>,
        catalog: Arc<StepCatalog>,
        storage: Arc<dyn Storage>,
        command_buffer_size: usize,
    ) -> (Self, ClientManagerHandle) {
        let (command_tx, mut command_rx) =
            mpsc::channel::<ClientSupervisorCommand>(command_buffer_size.max(1));
        let client_handler = tokio::spawn(async move {
            let mut supervisor = ClientSupervisor::new();
            while let Some(command) = command_rx.recv().await {
                supervisor.handle_command(command);
            }
            error!("Client supervisor command channel closed");
        });
        (
            Self { client_handler },
            ClientManagerHandle {
                command_tx,
                models,
                catalog,
                storage,
            },
        )
    }

    pub fn stop(&self) {
        self.client_handler.abort();
    }
}
