pub mod memory;
pub mod sqlite;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::StorageError;
use crate::steps::Step;

pub use memory::InMemoryStorage;
pub use sqlite::SqliteStorage;

pub type ReferenceId = i64;
pub type SessionId = i64;
pub type DancerId = i64;

#[derive(Debug, Clone, PartialEq)]
pub struct NewReference {
    pub filepath: String,
    pub title: String,
    pub thumbnail: Option<Vec<u8>>,
    pub selected: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Reference {
    pub id: ReferenceId,
    pub filepath: String,
    pub title: String,
    #[serde(skip)]
    pub thumbnail: Option<Vec<u8>>,
    pub selected: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewDancer {
    pub avatar: Option<Vec<u8>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DancerRecord {
    pub id: DancerId,
    pub session_id: SessionId,
    pub avatar: Option<Vec<u8>>,
    pub score: f64,
}

/// A created session and its dancers, in the order they were requested.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionRecord {
    pub id: SessionId,
    pub reference_id: ReferenceId,
    pub dancer_ids: Vec<DancerId>,
}

/// Persistence for references, their steps and the sessions danced against them.
///
/// Multi-row writes (`create_reference`, `create_session`) are all-or-nothing.
pub trait Storage: Send + Sync {
    fn create_reference(
        &self,
        reference: NewReference,
        steps: &[Step],
    ) -> Result<ReferenceId, StorageError>;
    fn reference(&self, id: ReferenceId) -> Result<Option<Reference>, StorageError>;
    fn list_references(&self) -> Result<Vec<Reference>, StorageError>;
    /// `None` when the reference does not exist; an existing reference may have no steps.
    fn steps(&self, reference_id: ReferenceId) -> Result<Option<Vec<Step>>, StorageError>;
    fn create_session(
        &self,
        reference_id: ReferenceId,
        dancers: &[NewDancer],
    ) -> Result<SessionRecord, StorageError>;
    fn update_dancer_score(&self, dancer_id: DancerId, score: f64) -> Result<(), StorageError>;
    fn dancer(&self, dancer_id: DancerId) -> Result<Option<DancerRecord>, StorageError>;
}
