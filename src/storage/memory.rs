use std::collections::HashMap;
use std::sync::RwLock;

use chrono::Utc;

use crate::error::StorageError;
use crate::steps::Step;
use crate::storage::{
    DancerId, DancerRecord, NewDancer, NewReference, Reference, ReferenceId, SessionId,
    SessionRecord, Storage,
};

#[derive(Default)]
struct Tables {
    references: Vec<Reference>,
    steps: HashMap<ReferenceId, Vec<Step>>,
    sessions: HashMap<SessionId, ReferenceId>,
    dancers: HashMap<DancerId, DancerRecord>,
    next_id: i64,
}

impl Tables {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

/// Process-local storage for tests and runs without a database.
#[derive(Default)]
pub struct InMemoryStorage {
    tables: RwLock<Tables>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Storage for InMemoryStorage {
    fn create_reference(
        &self,
        reference: NewReference,
        steps: &[Step],
    ) -> Result<ReferenceId, StorageError> {
        let mut tables = self.tables.write().map_err(|_| StorageError::Poisoned)?;
        let id = tables.next_id();
        tables.references.push(Reference {
            id,
            filepath: reference.filepath,
            title: reference.title,
            thumbnail: reference.thumbnail,
            selected: reference.selected,
            created_at: Utc::now(),
        });
        tables.steps.insert(id, steps.to_vec());
        Ok(id)
    }

    fn reference(&self, id: ReferenceId) -> Result<Option<Reference>, StorageError> {
        let tables = self.tables.read().map_err(|_| StorageError::Poisoned)?;
        Ok(tables.references.iter().find(|r| r.id == id).cloned())
    }

    fn list_references(&self) -> Result<Vec<Reference>, StorageError> {
        let tables = self.tables.read().map_err(|_| StorageError::Poisoned)?;
        Ok(tables.references.clone())
    }

    fn steps(&self, reference_id: ReferenceId) -> Result<Option<Vec<Step>>, StorageError> {
        let tables = self.tables.read().map_err(|_| StorageError::Poisoned)?;
        Ok(tables.steps.get(&reference_id).cloned())
    }

    fn create_session(
        &self,
        reference_id: ReferenceId,
        dancers: &[NewDancer],
    ) -> Result<SessionRecord, StorageError> {
        let mut tables = self.tables.write().map_err(|_| StorageError::Poisoned)?;
        if !tables.steps.contains_key(&reference_id) {
            return Err(StorageError::NotFound(format!("reference {reference_id}")));
        }
        let session_id = tables.next_id();
        tables.sessions.insert(session_id, reference_id);
        let mut dancer_ids = Vec::with_capacity(dancers.len());
        for dancer in dancers {
            let id = tables.next_id();
            tables.dancers.insert(
                id,
                DancerRecord {
                    id,
                    session_id,
                    avatar: dancer.avatar.clone(),
                    score: 0.0,
                },
            );
            dancer_ids.push(id);
        }
        Ok(SessionRecord {
            id: session_id,
            reference_id,
            dancer_ids,
        })
    }

    fn update_dancer_score(&self, dancer_id: DancerId, score: f64) -> Result<(), StorageError> {
        let mut tables = self.tables.write().map_err(|_| StorageError::Poisoned)?;
        let dancer = tables
            .dancers
            .get_mut(&dancer_id)
            .ok_or_else(|| StorageError::NotFound(format!("dancer {dancer_id}")))?;
        dancer.score = score;
        Ok(())
    }

    fn dancer(&self, dancer_id: DancerId) -> Result<Option<DancerRecord>, StorageError> {
        let tables = self.tables.read().map_err(|_| StorageError::Poisoned)?;
        Ok(tables.dancers.get(&dancer_id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pose::Pose;

    fn reference() -> NewReference {
        NewReference {
            filepath: "refs/salsa.mp4".to_string(),
            title: "salsa".to_string(),
            thumbnail: None,
            selected: false,
        }
    }

    #[test]
    fn stores_steps_per_reference() {
        let storage = InMemoryStorage::new();
        let steps = vec![Step::new(0.5, Pose::neutral())];
        let id = storage.create_reference(reference(), &steps).unwrap();
        assert_eq!(storage.steps(id).unwrap(), Some(steps));
        assert_eq!(storage.steps(id + 100).unwrap(), None);
        assert_eq!(storage.list_references().unwrap().len(), 1);
    }

    #[test]
    fn session_creates_dancers_with_zero_score() {
        let storage = InMemoryStorage::new();
        let id = storage.create_reference(reference(), &[]).unwrap();
        let session = storage
            .create_session(id, &[NewDancer::default(), NewDancer::default()])
            .unwrap();
        assert_eq!(session.dancer_ids.len(), 2);
        let dancer = storage.dancer(session.dancer_ids[1]).unwrap().unwrap();
        assert_eq!(dancer.score, 0.0);
        assert_eq!(dancer.session_id, session.id);
    }

    #[test]
    fn session_for_unknown_reference_fails() {
        let storage = InMemoryStorage::new();
        assert!(storage.create_session(42, &[NewDancer::default()]).is_err());
    }
}
