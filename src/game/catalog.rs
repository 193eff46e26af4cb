use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use tracing::debug;

use crate::error::StorageError;
use crate::steps::Step;
use crate::storage::{ReferenceId, Storage};

/// Read-through cache of step sequences shared by every connection.
///
/// Steps never change after extraction, so a sequence is loaded once and handed out as
/// a shared slice.
pub struct StepCatalog {
    storage: Arc<dyn Storage>,
    cache: RwLock<HashMap<ReferenceId, Arc<[Step]>>>,
}

impl StepCatalog {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self {
            storage,
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// `None` when no reference with this id exists.
    pub fn steps(&self, reference_id: ReferenceId) -> Result<Option<Arc<[Step]>>, StorageError> {
        {
            let cache = self.cache.read().map_err(|_| StorageError::Poisoned)?;
            if let Some(steps) = cache.get(&reference_id) {
                return Ok(Some(steps.clone()));
            }
        }

        let Some(steps) = self.storage.steps(reference_id)? else {
            return Ok(None);
        };
        let steps: Arc<[Step]> = steps.into();
        debug!("Loaded {} steps for reference {}", steps.len(), reference_id);
        let mut cache = self.cache.write().map_err(|_| StorageError::Poisoned)?;
        Ok(Some(cache.entry(reference_id).or_insert(steps).clone()))
    }

    pub fn cached(&self) -> usize {
        self.cache.read().map(|cache| cache.len()).unwrap_or_default()
    }
}
