//! Observation history stores.
//!
//! The temporal smoother only needs "recent observations for a device,
//! newest first", so the trait stays small. An in-memory store backs tests
//! and one-shot runs; the SQLite store keeps history across runs.

use crate::error::StorageError;
use crate::signal::Observation;

pub mod memory;
#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use memory::MemoryStore;
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteStore;

pub trait ObservationStore: Send + Sync {
    /// Persist a single observation.
    fn save(&self, observation: &Observation) -> Result<(), StorageError>;

    /// Most recent observations for `device_id`, newest first.
    ///
    /// An empty `device_id` matches every device; a `limit` of 0 means no limit.
    fn query(&self, device_id: &str, limit: usize) -> Result<Vec<Observation>, StorageError>;

    /// Total number of stored observations.
    fn count(&self) -> Result<usize, StorageError>;
}
