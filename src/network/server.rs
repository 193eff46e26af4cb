use std::future::Future;
use std::net::SocketAddr;

use crate::{
    error::AppError,
    intake::{
        client::manager::ClientManagerHandle,
        frame::{reader::FramedAsyncBufferedReader, writer::FramedAsyncBufferedWriter},
    },
};
use tokio::net::{TcpListener, TcpStream};

use tracing::{debug, error, info};
use uuid::Uuid;

pub struct Server {
    port: u16,
    listener: TcpListener,
    client_manager: ClientManagerHandle,
    max_frame_bytes: usize,
}

impl Server {
    pub async fn bind(
        port: u16,
        client_manager: ClientManagerHandle,
        max_frame_bytes: usize,
    ) -> Result<Self, AppError> {
        let listener = TcpListener::bind(format!("0.0.0.0:{}", port))
            .await
            .map_err(|e| AppError::Bind(e, port))?;
        Ok(Self {
            port,
            listener,
            client_manager,
            max_frame_bytes,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, AppError> {
        self.listener
            .local_addr()
            .map_err(|e| AppError::Bind(e, self.port))
    }

    /// Accepts clients until `shutdown` resolves, then asks every client to stop.
    pub async fn run<F>(&self, shutdown: F) -> Result<(), AppError>
    where
        F: Future<Output = ()>,
    {
        info!("Listening for dancers on {}", self.local_addr()?);
        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    let stopped = self.client_manager.shutdown_all().await?;
                    info!("Server shutting down, stopped {} clients", stopped);
                    return Ok(());
                }
                result = self.listener.accept() => {
                    match result {
                        Ok((stream, peer)) => {
                            debug!("New client attempting to connect: {:?}", peer);
                            match self.handle_client(stream).await {
                                Ok(client_id) => {
                                    let live = self.client_manager.list_clients().await?.len();
                                    info!(
                                        "Client connected: {:?} for peer {:?} ({} live)",
                                        client_id, peer, live
                                    );
                                }
                                Err(e) => error!("Could not start client for {:?}: {}", peer, e),
                            }
                        }
                        Err(e) => error!("Error accepting connection: {:?}", e),
                    }
                }
            }
        }
    }

    async fn handle_client(&self, stream: TcpStream) -> Result<Uuid, AppError> {
        if let Err(e) = stream.set_nodelay(true) {
            debug!("Could not disable Nagle: {}", e);
        }
        let (stream_rx, stream_tx) = stream.into_split();
        let reader = FramedAsyncBufferedReader::new(stream_rx, self.max_frame_bytes);
        let writer = FramedAsyncBufferedWriter::new(stream_tx);
        self.client_manager
            .add_client(Box::new(reader), Box::new(writer))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::StepCatalog;
    use crate::intake::client::ClientManager;
    use crate::intake::frame::codec::{read_frame, write_frame};
    use crate::intake::frame::frame::{DANCE_TAG, FINISHED_TAG, REGISTER_TAG};
    use crate::intake::frame::message::{DANCE_RESPONSE_TAG, ERROR_TAG, REGISTERED_TAG, SCORES_TAG};
    use crate::pose::Pose;
    use crate::steps::Step;
    use crate::storage::{InMemoryStorage, NewReference, Storage};
    use crate::testing::{detection, frame_of, jpeg_bytes, ScriptedModelFactory};
    use std::sync::Arc;
    use tokio::sync::oneshot;

    async fn request(stream: &mut TcpStream, payload: &[u8]) -> (u8, serde_json::Value) {
        write_frame(stream, payload).await.unwrap();
        let reply = read_frame(stream, 1 << 20).await.unwrap();
        (reply[0], serde_json::from_slice(&reply[1..]).unwrap())
    }

    #[tokio::test]
    async fn plays_a_full_game_over_tcp() {
        let storage = Arc::new(InMemoryStorage::new());
        let pose = Pose::normalize(&detection(2, (40.0, 30.0), 1.0)).unwrap();
        let reference_id = storage
            .create_reference(
                NewReference {
                    filepath: "refs/jive.mp4".to_string(),
                    title: "jive".to_string(),
                    thumbnail: None,
                    selected: true,
                },
                &[Step::new(0.0, pose.clone()), Step::new(0.5, pose)],
            )
            .unwrap();
        let script = vec![frame_of(vec![detection(2, (40.0, 30.0), 1.0)])];
        let models = ScriptedModelFactory::new(script);
        let catalog = Arc::new(StepCatalog::new(storage.clone()));
        let (manager, handle) = ClientManager::new(Arc::new(models), catalog, storage.clone(), 8);
        let server = Server::bind(0, handle, 1 << 20).await.unwrap();
        let port = server.local_addr().unwrap().port();
        let (stop_tx, stop_rx) = oneshot::channel::<()>();
        let server_task = tokio::spawn(async move {
            server
                .run(async {
                    let _ = stop_rx.await;
                })
                .await
        });

        let mut stream = TcpStream::connect(("127.0.0.1", port)).await.unwrap();

        let mut unknown = vec![REGISTER_TAG];
        unknown.extend_from_slice(br#"{"reference_id": 404, "dancers": [[2, null]]}"#);
        let (tag, body) = request(&mut stream, &unknown).await;
        assert_eq!(tag, ERROR_TAG);
        assert_eq!(body["message"], "Unknown reference: 404");

        let mut register = vec![REGISTER_TAG];
        let body = serde_json::json!({"reference_id": reference_id, "dancers": [[2, null]]});
        register.extend_from_slice(&serde_json::to_vec(&body).unwrap());
        let (tag, body) = request(&mut stream, &register).await;
        assert_eq!(tag, REGISTERED_TAG);
        assert_eq!(body["total_steps"], 2);

        let mut dance = vec![DANCE_TAG];
        dance.extend_from_slice(&0.0f64.to_le_bytes());
        dance.extend_from_slice(&jpeg_bytes());
        let (tag, body) = request(&mut stream, &dance).await;
        assert_eq!(tag, DANCE_RESPONSE_TAG);
        assert_eq!(body["dancers"][0]["score"], 100.0);
        assert_eq!(body["dancers"][0]["average"], 50.0);

        let (tag, body) = request(&mut stream, &[FINISHED_TAG]).await;
        assert_eq!(tag, SCORES_TAG);
        assert_eq!(body["scores"]["2"], 50.0);

        stop_tx.send(()).unwrap();
        server_task.await.unwrap().unwrap();
        manager.stop();
    }
}
