//! In-memory observation store.

use std::sync::RwLock;

use super::ObservationStore;
use crate::error::StorageError;
use crate::signal::Observation;

#[derive(Debug, Default)]
pub struct MemoryStore {
    observations: RwLock<Vec<Observation>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ObservationStore for MemoryStore {
    fn save(&self, observation: &Observation) -> Result<(), StorageError> {
        let mut observations = self
            .observations
            .write()
            .map_err(|_| StorageError::LockPoisoned)?;
        observations.push(observation.clone());
        Ok(())
    }

    fn query(&self, device_id: &str, limit: usize) -> Result<Vec<Observation>, StorageError> {
        let observations = self
            .observations
            .read()
            .map_err(|_| StorageError::LockPoisoned)?;

        let mut matching: Vec<Observation> = observations
            .iter()
            .filter(|obs| device_id.is_empty() || obs.device_id == device_id)
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        if limit > 0 {
            matching.truncate(limit);
        }
        Ok(matching)
    }

    fn count(&self) -> Result<usize, StorageError> {
        let observations = self
            .observations
            .read()
            .map_err(|_| StorageError::LockPoisoned)?;
        Ok(observations.len())
    }
}
