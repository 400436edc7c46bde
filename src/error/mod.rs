// Error types for the signal fusion engine
//
// This module defines custom error types for capture sessions and the
// observation store, providing structured error handling with stable
// numeric codes.

mod capture;
mod storage;

pub use capture::{log_capture_error, CaptureError, CaptureErrorCodes};
pub use storage::{log_storage_error, StorageError, StorageErrorCodes};

/// Error codes for structured error reporting
///
/// This trait provides a standard way to get error codes and messages
/// from custom error types.
pub trait ErrorCode {
    /// Get the numeric error code
    fn code(&self) -> i32;

    /// Get the human-readable error message
    fn message(&self) -> String;
}

/// Component half of a `Type::method` context string
pub(crate) fn component_of(context: &str) -> &str {
    context.split("::").next().unwrap_or(context)
}
