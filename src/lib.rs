// Percepta Fusion - signal fusion and temporal consistency engine
// Multi-frame LED/display capture, confidence calibration, history smoothing

// Module declarations
pub mod capture;
pub mod classifier;
pub mod config;
pub mod debug;
pub mod error;
pub mod fixtures;
pub mod fusion;
pub mod signal;
pub mod smoothing;
pub mod storage;

// Re-exports for convenience
pub use capture::{
    Camera, Clock, ManualClock, MultiFrameCapture, ObservationSession, SessionReport,
    SignalParser, SystemClock,
};
pub use classifier::JsonSignalParser;
pub use config::AppConfig;
pub use error::{CaptureError, ErrorCode, StorageError};
pub use fusion::fuse_frames;
pub use signal::{
    BootTimingSignal, DisplaySignal, DisplayTextEntry, FrameResult, LedSignal, Observation, Rgb,
    Signal,
};
pub use smoothing::{Smoothed, SmoothingOutcome, TemporalSmoother};
pub use storage::{MemoryStore, ObservationStore};
#[cfg(feature = "sqlite")]
pub use storage::SqliteStore;

use std::sync::Once;

static LOGGING: Once = Once::new();

/// Install the stderr tracing subscriber and pipeline tracer
///
/// Safe to call more than once; only the first call has an effect. The
/// filter honors `RUST_LOG` and defaults to `info`.
pub fn init_logging() {
    LOGGING.call_once(|| {
        let filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
        // Another subscriber may already be installed by the host binary
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .try_init();
        debug::pipeline_tracer::init();
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_logging_is_idempotent() {
        let _guard = debug::pipeline_tracer::FLAG_LOCK
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        init_logging();
        init_logging();
    }
}
