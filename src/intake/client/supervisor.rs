use crate::{error::AppError, intake::client::client::ClientHandle};
use tokio::sync::oneshot;
use tracing::{debug, warn};
use uuid::Uuid;

pub struct ClientEntry {
    pub id: Uuid,
    pub client_task: tokio::task::JoinHandle<Result<(), AppError>>,
    pub handle: ClientHandle,
}

pub enum ClientSupervisorCommand {
    AddClient {
        entry: ClientEntry,
        responder: oneshot::Sender<Uuid>,
    },
    /// Sent by a client task when its pipeline has ended.
    ClientFinished {
        id: Uuid,
    },
    ShutdownAll {
        responder: oneshot::Sender<usize>,
    },
    ListClients {
        responder: oneshot::Sender<Vec<Uuid>>,
    },
}

#[derive(Default)]
pub struct ClientSupervisor {
    clients: Vec<ClientEntry>,
}

impl ClientSupervisor {
    pub fn new() -> Self {
        Self {
            clients: Vec::new(),
        }
    }

    pub fn add_client(&mut self, client_entry: ClientEntry) {
        // a client that ended before it was registered has already reported itself
        self.clients.retain(|entry| !entry.client_task.is_finished());
        if !client_entry.client_task.is_finished() {
            self.clients.push(client_entry);
        }
    }

    pub fn remove_client(&mut self, client_id: Uuid) {
        self.clients.retain(|entry| entry.id != client_id);
    }

    pub fn list_clients(&self) -> Vec<Uuid> {
        self.clients.iter().map(|entry| entry.id).collect()
    }

    fn shutdown_all(&self) -> usize {
        self.clients
            .iter()
            .filter(|entry| match entry.handle.send_shutdown() {
                Ok(()) => true,
                Err(e) => {
                    warn!("Client {} did not take shutdown: {}", entry.id, e);
                    false
                }
            })
            .count()
    }

    pub fn handle_command(&mut self, command: ClientSupervisorCommand) {
        match command {
            ClientSupervisorCommand::AddClient { entry, responder } => {
                let id = entry.id;
                self.add_client(entry);
                let _ = responder.send(id);
            }
            ClientSupervisorCommand::ClientFinished { id } => {
                debug!("Client {} finished", id);
                self.remove_client(id);
            }
            ClientSupervisorCommand::ShutdownAll { responder } => {
                let _ = responder.send(self.shutdown_all());
            }
            ClientSupervisorCommand::ListClients { responder } => {
                let _ = responder.send(self.list_clients());
            }
        }
    }
}
