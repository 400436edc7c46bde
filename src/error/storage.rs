// Storage error types and constants

use crate::error::{component_of, ErrorCode};
use log::error;
use std::fmt;

/// Storage error code constants
///
/// Error code range: 4001-4005
pub struct StorageErrorCodes {}

impl StorageErrorCodes {
    /// Backend could not be reached or opened
    pub const UNAVAILABLE: i32 = 4001;

    /// Read query failed
    pub const QUERY_FAILED: i32 = 4002;

    /// Insert failed
    pub const WRITE_FAILED: i32 = 4003;

    /// Observation payload could not be encoded/decoded
    pub const SERIALIZATION: i32 = 4004;

    /// Store lock was poisoned
    pub const LOCK_POISONED: i32 = 4005;
}

/// Log a storage error with structured context
///
/// `context` is the caller as `Type::method`; its type names the component.
pub fn log_storage_error(err: &StorageError, context: &str) {
    error!(
        "Storage error in {}: code={}, component={}, message={}",
        context,
        err.code(),
        component_of(context),
        err.message()
    );
}

/// Observation store errors
///
/// The temporal smoother degrades to "no smoothing" on any of these; only
/// the diagnostics CLI surfaces them to the user.
///
/// Error code range: 4001-4005
#[derive(Debug, Clone, PartialEq)]
pub enum StorageError {
    Unavailable { reason: String },
    QueryFailed { reason: String },
    WriteFailed { reason: String },
    Serialization { reason: String },
    LockPoisoned,
}

impl ErrorCode for StorageError {
    fn code(&self) -> i32 {
        match self {
            StorageError::Unavailable { .. } => StorageErrorCodes::UNAVAILABLE,
            StorageError::QueryFailed { .. } => StorageErrorCodes::QUERY_FAILED,
            StorageError::WriteFailed { .. } => StorageErrorCodes::WRITE_FAILED,
            StorageError::Serialization { .. } => StorageErrorCodes::SERIALIZATION,
            StorageError::LockPoisoned => StorageErrorCodes::LOCK_POISONED,
        }
    }

    fn message(&self) -> String {
        match self {
            StorageError::Unavailable { reason } => format!("Storage unavailable: {}", reason),
            StorageError::QueryFailed { reason } => format!("Query failed: {}", reason),
            StorageError::WriteFailed { reason } => format!("Write failed: {}", reason),
            StorageError::Serialization { reason } => {
                format!("Observation serialization failed: {}", reason)
            }
            StorageError::LockPoisoned => "Observation store lock poisoned".to_string(),
        }
    }
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "StorageError::{:?} (code {}): {}",
            self,
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for StorageError {}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::Serialization {
            reason: err.to_string(),
        }
    }
}

#[cfg(feature = "sqlite")]
impl From<rusqlite::Error> for StorageError {
    fn from(err: rusqlite::Error) -> Self {
        StorageError::QueryFailed {
            reason: err.to_string(),
        }
    }
}
