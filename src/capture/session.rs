// ObservationSession - one end-to-end observation of a device
//
// open camera -> capture window -> close camera -> fuse -> smooth
//
// The camera is closed whether or not capture succeeded. Persisting the
// resulting observation is left to the caller.

use std::sync::Arc;

use tracing::{info, warn};

use crate::capture::{Camera, Clock, MultiFrameCapture, SignalParser, SystemClock};
use crate::config::AppConfig;
use crate::error::{log_capture_error, CaptureError, ErrorCode};
use crate::fusion::fuse_frames;
use crate::signal::Observation;
use crate::smoothing::{SmoothingOutcome, TemporalSmoother};
use crate::storage::ObservationStore;

/// Result of a single observation session
#[derive(Debug, Clone)]
pub struct SessionReport {
    /// Fused and smoothed observation
    pub observation: Observation,
    /// What the smoother did with it
    pub outcome: SmoothingOutcome,
    /// Frames that parsed successfully
    pub frames_captured: usize,
}

pub struct ObservationSession {
    camera: Box<dyn Camera>,
    parser: Box<dyn SignalParser>,
    store: Arc<dyn ObservationStore>,
    clock: Arc<dyn Clock>,
    config: AppConfig,
    firmware_hash: Option<String>,
}

impl ObservationSession {
    pub fn new(
        camera: Box<dyn Camera>,
        parser: Box<dyn SignalParser>,
        store: Arc<dyn ObservationStore>,
        config: AppConfig,
    ) -> Self {
        Self {
            camera,
            parser,
            store,
            clock: Arc::new(SystemClock),
            config,
            firmware_hash: None,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_firmware(mut self, firmware_hash: impl Into<String>) -> Self {
        self.firmware_hash = Some(firmware_hash.into());
        self
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Observe `device_id` once
    ///
    /// # Errors
    /// * `InvalidConfig` - Configuration failed validation
    /// * `CameraOpenFailed` - Camera could not be opened
    /// * `CaptureFailed` / `NoFramesCaptured` - Capture window failed
    pub fn observe(&mut self, device_id: &str) -> Result<SessionReport, CaptureError> {
        self.config.validate()?;

        if let Err(err) = self.camera.open() {
            let err = match err {
                CaptureError::CameraOpenFailed { .. } => err,
                other => CaptureError::CameraOpenFailed {
                    reason: other.message(),
                },
            };
            log_capture_error(&err, "ObservationSession::observe");
            return Err(err);
        }

        let capture = MultiFrameCapture::from_config(&self.config.capture, self.clock.clone());
        let captured = capture.capture(self.camera.as_mut(), self.parser.as_ref());

        if let Err(err) = self.camera.close() {
            warn!(
                "[ObservationSession] Camera close failed (ignored): {}",
                err.message()
            );
        }

        let frames = captured.map_err(|err| {
            log_capture_error(&err, "ObservationSession::observe");
            err
        })?;

        let signals = fuse_frames(&frames, &self.config.fusion);
        let observation = Observation::new(device_id, signals, self.clock.now())
            .with_firmware(self.firmware_hash.clone());

        let smoother = TemporalSmoother::from_config(
            self.store.clone(),
            &self.config.smoothing,
            self.clock.clone(),
        );
        let smoothed = smoother.smooth(observation);

        info!(
            "[ObservationSession] Observed {} from {} frames: {} signals ({})",
            device_id,
            frames.len(),
            smoothed.observation.signals.len(),
            smoothed.outcome
        );

        Ok(SessionReport {
            observation: smoothed.observation,
            outcome: smoothed.outcome,
            frames_captured: frames.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::ManualClock;
    use crate::signal::{LedSignal, Signal};
    use crate::storage::MemoryStore;
    use chrono::{TimeZone, Utc};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct ScriptedCamera {
        fail_open: bool,
        fail_frame: Option<usize>,
        fail_close: bool,
        captured: usize,
        closes: Arc<AtomicUsize>,
    }

    impl ScriptedCamera {
        fn new(closes: Arc<AtomicUsize>) -> Self {
            Self {
                fail_open: false,
                fail_frame: None,
                fail_close: false,
                captured: 0,
                closes,
            }
        }
    }

    impl Camera for ScriptedCamera {
        fn open(&mut self) -> Result<(), CaptureError> {
            if self.fail_open {
                return Err(CaptureError::CaptureFailed {
                    frame: 0,
                    reason: "device busy".to_string(),
                });
            }
            Ok(())
        }

        fn capture_frame(&mut self) -> Result<Vec<u8>, CaptureError> {
            let index = self.captured;
            self.captured += 1;
            if self.fail_frame == Some(index) {
                return Err(CaptureError::CaptureFailed {
                    frame: index,
                    reason: "usb reset".to_string(),
                });
            }
            Ok(vec![index as u8])
        }

        fn close(&mut self) -> Result<(), CaptureError> {
            self.closes.fetch_add(1, Ordering::SeqCst);
            if self.fail_close {
                return Err(CaptureError::CaptureFailed {
                    frame: self.captured,
                    reason: "release timed out".to_string(),
                });
            }
            Ok(())
        }
    }

    fn blink_parser(frame: &[u8]) -> Result<Vec<Signal>, CaptureError> {
        Ok(vec![Signal::Led(LedSignal::new("PWR", frame[0] % 2 == 0, 0.9))])
    }

    fn session(camera: ScriptedCamera) -> ObservationSession {
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap(),
        ));
        ObservationSession::new(
            Box::new(camera),
            Box::new(blink_parser),
            Arc::new(MemoryStore::new()),
            AppConfig::default(),
        )
        .with_clock(clock)
    }

    #[test]
    fn test_observe_fuses_blinking_led() {
        let closes = Arc::new(AtomicUsize::new(0));
        let mut session = session(ScriptedCamera::new(closes.clone())).with_firmware("fw-1");

        let report = session.observe("dev-1").unwrap();

        assert_eq!(report.frames_captured, 5);
        assert_eq!(report.outcome, SmoothingOutcome::NoHistory);
        assert_eq!(report.observation.device_id, "dev-1");
        assert_eq!(report.observation.firmware_hash.as_deref(), Some("fw-1"));
        let led = report.observation.led("PWR").unwrap();
        assert!(led.on);
        assert_eq!(led.blink_hz, 2.0);
        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_open_failure_maps_to_camera_open_failed() {
        let closes = Arc::new(AtomicUsize::new(0));
        let mut camera = ScriptedCamera::new(closes.clone());
        camera.fail_open = true;

        let err = session(camera).observe("dev-1").unwrap_err();
        match err {
            CaptureError::CameraOpenFailed { reason } => assert!(reason.contains("device busy")),
            other => panic!("Expected CameraOpenFailed, got {:?}", other),
        }
        assert_eq!(closes.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_camera_closed_after_capture_failure() {
        let closes = Arc::new(AtomicUsize::new(0));
        let mut camera = ScriptedCamera::new(closes.clone());
        camera.fail_frame = Some(2);

        let err = session(camera).observe("dev-1").unwrap_err();
        assert_eq!(err.code(), crate::error::CaptureErrorCodes::CAPTURE_FAILED);
        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_close_failure_after_capture_ignored() {
        let closes = Arc::new(AtomicUsize::new(0));
        let mut camera = ScriptedCamera::new(closes.clone());
        camera.fail_close = true;

        let report = session(camera).observe("dev-1").unwrap();
        assert_eq!(report.frames_captured, 5);
        assert!(report.observation.led("PWR").is_some());
        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_close_failure_keeps_capture_error() {
        let closes = Arc::new(AtomicUsize::new(0));
        let mut camera = ScriptedCamera::new(closes.clone());
        camera.fail_frame = Some(1);
        camera.fail_close = true;

        let err = session(camera).observe("dev-1").unwrap_err();
        match err {
            CaptureError::CaptureFailed { frame, reason } => {
                assert_eq!(frame, 1);
                assert!(reason.contains("usb reset"));
            }
            other => panic!("Expected CaptureFailed, got {:?}", other),
        }
        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_invalid_config_rejected_before_open() {
        let closes = Arc::new(AtomicUsize::new(0));
        let mut config = AppConfig::default();
        config.capture.frame_count = 0;

        let mut session = ObservationSession::new(
            Box::new(ScriptedCamera::new(closes.clone())),
            Box::new(blink_parser),
            Arc::new(MemoryStore::new()),
            config,
        );

        let err = session.observe("dev-1").unwrap_err();
        assert!(matches!(err, CaptureError::InvalidConfig { .. }));
        assert_eq!(closes.load(Ordering::SeqCst), 0);
    }
}
