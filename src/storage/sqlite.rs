//! SQLite observation store using `rusqlite`.
//!
//! Signals are stored as a JSON column and decoded through the same
//! versioned decoder as exported observations, so legacy rows still load.

use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::{debug, info};

use super::ObservationStore;
use crate::error::StorageError;
use crate::signal::{decode_signals, Observation, SCHEMA_VERSION};

const SELECT_COLUMNS: &str = "id, device_id, firmware, timestamp, signals_json";

/// Thread-safe SQLite wrapper.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) the database file at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StorageError> {
        let path = path.as_ref();
        let conn = Connection::open(path).map_err(|e| StorageError::Unavailable {
            reason: format!("{}: {}", path.display(), e),
        })?;
        init_schema(&conn)?;
        info!("[SqliteStore] Opened {}", path.display());
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn open_in_memory() -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory().map_err(|e| StorageError::Unavailable {
            reason: e.to_string(),
        })?;
        init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Newest observation of `device_id` recorded under `firmware_hash`.
    pub fn latest_for_firmware(
        &self,
        device_id: &str,
        firmware_hash: &str,
    ) -> Result<Option<Observation>, StorageError> {
        let conn = self.conn.lock().map_err(|_| StorageError::LockPoisoned)?;
        let sql = format!(
            "SELECT {} FROM observations WHERE device_id = ?1 AND firmware = ?2 \
             ORDER BY timestamp DESC LIMIT 1",
            SELECT_COLUMNS
        );
        let row = conn
            .query_row(&sql, params![device_id, firmware_hash], read_row)
            .optional()?;
        row.map(RawRow::into_observation).transpose()
    }
}

fn init_schema(conn: &Connection) -> Result<(), StorageError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS observations (
             id           TEXT PRIMARY KEY,
             device_id    TEXT NOT NULL,
             firmware     TEXT NOT NULL DEFAULT '',
             timestamp    TEXT NOT NULL,
             signals_json TEXT NOT NULL
         );
         CREATE INDEX IF NOT EXISTS idx_observations_device_time
             ON observations (device_id, timestamp);",
    )
    .map_err(|e| StorageError::Unavailable {
        reason: format!("schema init failed: {}", e),
    })
}

/// Fixed-width RFC3339 so lexical order in SQL matches chronological order
fn encode_timestamp(timestamp: &DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

struct RawRow {
    id: String,
    device_id: String,
    firmware: String,
    timestamp: String,
    signals_json: String,
}

fn read_row(row: &Row<'_>) -> rusqlite::Result<RawRow> {
    Ok(RawRow {
        id: row.get(0)?,
        device_id: row.get(1)?,
        firmware: row.get(2)?,
        timestamp: row.get(3)?,
        signals_json: row.get(4)?,
    })
}

impl RawRow {
    fn into_observation(self) -> Result<Observation, StorageError> {
        let timestamp = DateTime::parse_from_rfc3339(&self.timestamp)
            .map_err(|e| StorageError::Serialization {
                reason: format!("bad timestamp '{}': {}", self.timestamp, e),
            })?
            .with_timezone(&Utc);
        let value: serde_json::Value = serde_json::from_str(&self.signals_json)?;
        let signals = decode_signals(&value)?;

        Ok(Observation {
            schema_version: SCHEMA_VERSION.to_string(),
            id: self.id,
            device_id: self.device_id,
            firmware_hash: if self.firmware.is_empty() {
                None
            } else {
                Some(self.firmware)
            },
            timestamp,
            signals,
        })
    }
}

impl ObservationStore for SqliteStore {
    fn save(&self, observation: &Observation) -> Result<(), StorageError> {
        let signals_json = serde_json::to_string(&observation.signals)?;
        let conn = self.conn.lock().map_err(|_| StorageError::LockPoisoned)?;
        conn.execute(
            "INSERT INTO observations (id, device_id, firmware, timestamp, signals_json) \
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                observation.id,
                observation.device_id,
                observation.firmware_hash.as_deref().unwrap_or(""),
                encode_timestamp(&observation.timestamp),
                signals_json
            ],
        )
        .map_err(|e| StorageError::WriteFailed {
            reason: e.to_string(),
        })?;
        debug!(
            "[SqliteStore] Saved observation {} for {}",
            observation.id, observation.device_id
        );
        Ok(())
    }

    fn query(&self, device_id: &str, limit: usize) -> Result<Vec<Observation>, StorageError> {
        let conn = self.conn.lock().map_err(|_| StorageError::LockPoisoned)?;
        let sql = format!(
            "SELECT {} FROM observations WHERE (?1 = '' OR device_id = ?1) \
             ORDER BY timestamp DESC LIMIT ?2",
            SELECT_COLUMNS
        );
        // SQLite treats a negative LIMIT as unbounded
        let limit: i64 = if limit == 0 { -1 } else { limit as i64 };

        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params![device_id, limit], read_row)?
            .collect::<rusqlite::Result<Vec<RawRow>>>()?;

        rows.into_iter().map(RawRow::into_observation).collect()
    }

    fn count(&self) -> Result<usize, StorageError> {
        let conn = self.conn.lock().map_err(|_| StorageError::LockPoisoned)?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM observations", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}
