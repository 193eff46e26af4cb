use std::sync::Arc;

use indexmap::IndexMap;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::common::imaging::{decode_image, encode_jpeg};
use crate::error::{SessionError, StorageError};
use crate::game::catalog::StepCatalog;
use crate::game::events::{
    DanceResult, DancerRegistration, DancerResult, FinalScores, PrepareResult, RegisteredDancer,
    Registration,
};
use crate::game::state::GameState;
use crate::pose::{grade, FrameDetections, Pose, TrackId};
use crate::services::{PoseModel, PoseModelFactory};
use crate::storage::{DancerId, NewDancer, ReferenceId, Storage};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Connected,
    Registered,
    Playing,
    Disconnected,
}

/// The grading state machine of one live connection.
///
/// Owns the connection's pose model, so track ids stay continuous across every
/// `prepare` and `dance` frame of the connection and are never shared with another one.
/// Frame operations take `&mut self` and therefore run one at a time.
pub struct DanceSession {
    connection_id: Uuid,
    model: Option<Box<dyn PoseModel>>,
    catalog: Arc<StepCatalog>,
    storage: Arc<dyn Storage>,
    state: SessionState,
    game: Option<GameState>,
    finished: Option<FinalScores>,
}

impl DanceSession {
    /// Creates the connection's own pose model. A model that cannot be created leaves the
    /// session usable, with frame operations turned into no-ops.
    pub async fn connect(
        connection_id: Uuid,
        models: &dyn PoseModelFactory,
        catalog: Arc<StepCatalog>,
        storage: Arc<dyn Storage>,
    ) -> Self {
        let model = match models.create().await {
            Ok(model) => Some(model),
            Err(e) => {
                error!("No pose model for connection {}: {}", connection_id, e);
                None
            }
        };
        info!("Connection {} ready", connection_id);
        Self {
            connection_id,
            model,
            catalog,
            storage,
            state: SessionState::Connected,
            game: None,
            finished: None,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn game(&self) -> Option<&GameState> {
        self.game.as_ref()
    }

    pub fn has_model(&self) -> bool {
        self.model.is_some()
    }

    /// Runs detection on a calibration frame without touching the game.
    pub async fn prepare(&mut self, frame: &[u8]) -> Option<PrepareResult> {
        let detections = self.detect(frame).await?;
        Some(PrepareResult { detections })
    }

    pub async fn register(
        &mut self,
        reference_id: ReferenceId,
        dancers: Vec<DancerRegistration>,
    ) -> Result<Registration, SessionError> {
        if self.state == SessionState::Disconnected {
            return Err(SessionError::Disconnected);
        }
        if let Some(previous) = self.game.take() {
            info!(
                "Connection {} re-registered, closing session {}",
                self.connection_id,
                previous.session_id()
            );
            self.persist_scores(&previous).await?;
        }
        self.finished = None;
        self.state = SessionState::Connected;

        let steps = self
            .catalog
            .steps(reference_id)?
            .ok_or(SessionError::UnknownReference(reference_id))?;

        let mut registrations: IndexMap<TrackId, Option<Vec<u8>>> = IndexMap::new();
        for dancer in dancers {
            if registrations.contains_key(&dancer.track_id) {
                warn!(
                    "Connection {} registered track {} twice, keeping the first",
                    self.connection_id, dancer.track_id
                );
                continue;
            }
            let avatar = dancer.avatar.and_then(|bytes| self.reencode_avatar(&bytes));
            registrations.insert(dancer.track_id, avatar);
        }

        let new_dancers: Vec<NewDancer> = registrations
            .values()
            .map(|avatar| NewDancer {
                avatar: avatar.clone(),
            })
            .collect();
        let storage = self.storage.clone();
        let record =
            tokio::task::spawn_blocking(move || storage.create_session(reference_id, &new_dancers))
                .await
                .map_err(StorageError::from)??;

        let pairs: Vec<(TrackId, _)> = registrations
            .keys()
            .copied()
            .zip(record.dancer_ids.iter().copied())
            .collect();
        let game = GameState::new(record.id, reference_id, steps, pairs.iter().copied());
        let registration = Registration {
            session_id: record.id,
            reference_id,
            total_steps: game.total_steps(),
            dancers: pairs
                .into_iter()
                .map(|(track_id, dancer_id)| RegisteredDancer {
                    track_id,
                    dancer_id,
                })
                .collect(),
        };
        info!(
            "Connection {} registered {} dancers for reference {} ({} steps)",
            self.connection_id,
            registration.dancers.len(),
            reference_id,
            registration.total_steps
        );
        self.game = Some(game);
        self.state = SessionState::Registered;
        Ok(registration)
    }

    /// Scores the registered dancers in `frame` against the step at `timestamp`.
    ///
    /// Returns `None` for undecodable frames, frames outside any step, and frames that
    /// arrive without an active game.
    pub async fn dance(&mut self, frame: &[u8], timestamp: f64) -> Option<DanceResult> {
        // detection runs for every frame so the tracker keeps its ids
        let detections = self.detect(frame).await?;
        let connection_id = self.connection_id;
        let game = self.game.as_mut()?;
        let Some((step_index, step)) = game.match_step(timestamp) else {
            debug!(
                "Connection {} frame at {:.3}s matches no step",
                connection_id, timestamp
            );
            return None;
        };
        let reference = step.pose.clone();

        let mut dancers = Vec::new();
        for detection in &detections.detections {
            if !game.contains(detection.track_id) {
                continue;
            }
            let pose = match Pose::normalize(detection) {
                Ok(pose) => pose,
                Err(e) => {
                    warn!(
                        "Connection {} dropped track {}: {}",
                        connection_id, detection.track_id, e
                    );
                    continue;
                }
            };
            let score = grade(&pose, &reference);
            if let Some((dancer_id, average)) = game.record(detection.track_id, score) {
                dancers.push(DancerResult {
                    track_id: detection.track_id,
                    dancer_id,
                    pose,
                    score,
                    average,
                });
            }
        }
        self.state = SessionState::Playing;
        Some(DanceResult {
            step_index,
            timestamp,
            dancers,
        })
    }

    /// Persists every dancer's running average as its final score and ends the game.
    /// Calling it again returns the same scores.
    pub async fn finish(&mut self) -> Result<FinalScores, SessionError> {
        if let Some(scores) = &self.finished {
            return Ok(scores.clone());
        }
        let Some(game) = self.game.take() else {
            return Ok(FinalScores::default());
        };
        if let Err(e) = self.persist_scores(&game).await {
            self.game = Some(game);
            return Err(e);
        }
        let scores = FinalScores {
            session_id: Some(game.session_id()),
            scores: game.final_scores(),
        };
        info!(
            "Connection {} finished session {} of reference {}",
            self.connection_id,
            game.session_id(),
            game.reference_id()
        );
        if self.state != SessionState::Disconnected {
            self.state = SessionState::Connected;
        }
        self.finished = Some(scores.clone());
        Ok(scores)
    }

    /// Releases the pose model, saving the scores of a game that was never finished.
    pub async fn disconnect(&mut self) {
        if self.state == SessionState::Disconnected {
            return;
        }
        if let Some(game) = self.game.take() {
            if let Err(e) = self.persist_scores(&game).await {
                error!(
                    "Connection {} lost scores of session {}: {}",
                    self.connection_id,
                    game.session_id(),
                    e
                );
            }
        }
        self.model = None;
        self.state = SessionState::Disconnected;
        info!("Connection {} disconnected", self.connection_id);
    }

    async fn detect(&mut self, frame: &[u8]) -> Option<FrameDetections> {
        if self.state == SessionState::Disconnected {
            return None;
        }
        let model = self.model.as_mut()?;
        let image = match decode_image(frame) {
            Ok(image) => image,
            Err(e) => {
                debug!("Connection {} dropped frame: {}", self.connection_id, e);
                return None;
            }
        };
        match model.track(&image).await {
            Ok(detections) => Some(detections),
            Err(e) => {
                warn!("Connection {} detection failed: {}", self.connection_id, e);
                None
            }
        }
    }

    fn reencode_avatar(&self, bytes: &[u8]) -> Option<Vec<u8>> {
        let image = match decode_image(bytes) {
            Ok(image) => image,
            Err(e) => {
                warn!("Connection {} sent unreadable avatar: {}", self.connection_id, e);
                return None;
            }
        };
        encode_jpeg(&image).ok()
    }

    async fn persist_scores(&mut self, game: &GameState) -> Result<(), SessionError> {
        let scores: Vec<(DancerId, f64)> = game
            .final_scores()
            .into_iter()
            .filter_map(|(track_id, score)| {
                game.dancers()
                    .get(&track_id)
                    .map(|entry| (entry.dancer_id, score))
            })
            .collect();
        let storage = self.storage.clone();
        tokio::task::spawn_blocking(move || {
            scores
                .into_iter()
                .try_for_each(|(dancer_id, score)| storage.update_dancer_score(dancer_id, score))
        })
        .await
        .map_err(StorageError::from)??;
        debug!(
            "Connection {} saved scores of session {}",
            self.connection_id,
            game.session_id()
        );
        Ok(())
    }
}

impl Drop for DanceSession {
    fn drop(&mut self) {
        // scores are only saved by `finish` and `disconnect`
        if let Some(game) = &self.game {
            warn!(
                "Connection {} dropped without disconnecting, session {} left unsaved",
                self.connection_id,
                game.session_id()
            );
        }
    }
}
