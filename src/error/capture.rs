// Capture error types and constants

use crate::error::{component_of, ErrorCode};
use log::error;
use std::fmt;

/// Capture error code constants
///
/// Single source of truth for the numeric codes surfaced by capture
/// sessions, so callers can branch on a stable integer.
///
/// Error code range: 3001-3005
pub struct CaptureErrorCodes {}

impl CaptureErrorCodes {
    /// Camera could not be opened
    pub const CAMERA_OPEN_FAILED: i32 = 3001;

    /// Camera failed while capturing a frame
    pub const CAPTURE_FAILED: i32 = 3002;

    /// Every frame of the session was dropped
    pub const NO_FRAMES_CAPTURED: i32 = 3003;

    /// Signal parser could not interpret a frame
    pub const PARSE_FAILED: i32 = 3004;

    /// Capture or smoothing configuration is invalid
    pub const INVALID_CONFIG: i32 = 3005;
}

/// Log a capture error with structured context
///
/// Fields logged:
/// - error_code: Numeric error code for programmatic handling
/// - component: Type half of `context`, e.g. `ObservationSession`
/// - message: Human-readable error message
/// - context: The caller as `Type::method`
pub fn log_capture_error(err: &CaptureError, context: &str) {
    error!(
        "Capture error in {}: code={}, component={}, message={}",
        context,
        err.code(),
        component_of(context),
        err.message()
    );
}

/// Capture-related errors
///
/// Session-fatal failures (camera open/capture, zero frames) and the
/// frame-local parse failure that the orchestrator tolerates.
///
/// Error code range: 3001-3005
#[derive(Debug, Clone, PartialEq)]
pub enum CaptureError {
    /// Camera could not be opened
    CameraOpenFailed { reason: String },

    /// Camera-level failure while capturing frame `frame` (0-based)
    CaptureFailed { frame: usize, reason: String },

    /// No frame produced a parsed signal set
    NoFramesCaptured { attempted: usize },

    /// Parser rejected a frame (dropped by the orchestrator)
    ParseFailed { reason: String },

    /// Configuration rejected by validation
    InvalidConfig { reason: String },
}

impl ErrorCode for CaptureError {
    fn code(&self) -> i32 {
        match self {
            CaptureError::CameraOpenFailed { .. } => CaptureErrorCodes::CAMERA_OPEN_FAILED,
            CaptureError::CaptureFailed { .. } => CaptureErrorCodes::CAPTURE_FAILED,
            CaptureError::NoFramesCaptured { .. } => CaptureErrorCodes::NO_FRAMES_CAPTURED,
            CaptureError::ParseFailed { .. } => CaptureErrorCodes::PARSE_FAILED,
            CaptureError::InvalidConfig { .. } => CaptureErrorCodes::INVALID_CONFIG,
        }
    }

    fn message(&self) -> String {
        match self {
            CaptureError::CameraOpenFailed { reason } => {
                format!("Camera open failed: {}", reason)
            }
            CaptureError::CaptureFailed { frame, reason } => {
                format!("Frame {} capture failed: {}", frame, reason)
            }
            CaptureError::NoFramesCaptured { attempted } => {
                format!("No frames captured ({} attempted)", attempted)
            }
            CaptureError::ParseFailed { reason } => {
                format!("Signal parse failed: {}", reason)
            }
            CaptureError::InvalidConfig { reason } => {
                format!("Invalid configuration: {}", reason)
            }
        }
    }
}

impl fmt::Display for CaptureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "CaptureError::{:?} (code {}): {}",
            self,
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for CaptureError {}

impl From<serde_json::Error> for CaptureError {
    fn from(err: serde_json::Error) -> Self {
        CaptureError::ParseFailed {
            reason: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capture_error_codes() {
        assert_eq!(
            CaptureError::CameraOpenFailed {
                reason: "test".to_string()
            }
            .code(),
            CaptureErrorCodes::CAMERA_OPEN_FAILED
        );
        assert_eq!(
            CaptureError::CaptureFailed {
                frame: 2,
                reason: "test".to_string()
            }
            .code(),
            CaptureErrorCodes::CAPTURE_FAILED
        );
        assert_eq!(
            CaptureError::NoFramesCaptured { attempted: 5 }.code(),
            CaptureErrorCodes::NO_FRAMES_CAPTURED
        );
        assert_eq!(
            CaptureError::ParseFailed {
                reason: "test".to_string()
            }
            .code(),
            3004
        );
        assert_eq!(
            CaptureError::InvalidConfig {
                reason: "test".to_string()
            }
            .code(),
            3005
        );
    }

    #[test]
    fn test_capture_error_messages() {
        let err = CaptureError::CaptureFailed {
            frame: 3,
            reason: "device unplugged".to_string(),
        };
        assert_eq!(err.message(), "Frame 3 capture failed: device unplugged");

        let err = CaptureError::NoFramesCaptured { attempted: 5 };
        assert!(err.message().contains("No frames captured"));
    }

    #[test]
    fn test_capture_error_display() {
        let err = CaptureError::NoFramesCaptured { attempted: 5 };
        let display = format!("{}", err);
        assert!(display.contains("CaptureError"));
        assert!(display.contains(&err.code().to_string()));
    }

    #[test]
    fn test_from_json_error_is_parse_failure() {
        let json_err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let err: CaptureError = json_err.into();
        assert!(matches!(err, CaptureError::ParseFailed { .. }));
    }
}
