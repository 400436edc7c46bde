// MultiFrameCapture - sample a device over a short window of frames
//
// LED blink behavior only shows up across time, so a session captures a
// fixed number of frames with a fixed wait between them. Each frame is
// handed to the signal parser; a frame the parser rejects is dropped, but
// a camera failure aborts the whole session.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::capture::{Camera, Clock, SignalParser};
use crate::config::CaptureConfig;
use crate::debug::pipeline_tracer;
use crate::error::{CaptureError, ErrorCode};
use crate::signal::FrameResult;

/// Default number of frames per session
pub const DEFAULT_FRAME_COUNT: usize = 5;
/// Default wait between frames (5 x 200ms ≈ 1 second window)
pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(200);

/// Drives camera and parser across the capture window
pub struct MultiFrameCapture {
    frame_count: usize,
    interval: Duration,
    clock: Arc<dyn Clock>,
}

impl MultiFrameCapture {
    /// Create with default window (5 frames, 200ms apart)
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self::with_options(clock, DEFAULT_FRAME_COUNT, DEFAULT_INTERVAL)
    }

    pub fn with_options(clock: Arc<dyn Clock>, frame_count: usize, interval: Duration) -> Self {
        Self {
            frame_count,
            interval,
            clock,
        }
    }

    pub fn from_config(config: &CaptureConfig, clock: Arc<dyn Clock>) -> Self {
        Self::with_options(clock, config.frame_count, config.interval())
    }

    pub fn frame_count(&self) -> usize {
        self.frame_count
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Capture and parse every frame of the window
    ///
    /// # Returns
    /// * `Ok(frames)` - Parsed frames in capture order (at least one)
    /// * `Err(CaptureError::CaptureFailed)` - Camera failed on some frame
    /// * `Err(CaptureError::NoFramesCaptured)` - Every frame was dropped
    pub fn capture(
        &self,
        camera: &mut dyn Camera,
        parser: &dyn SignalParser,
    ) -> Result<Vec<FrameResult>, CaptureError> {
        let mut results = Vec::with_capacity(self.frame_count);

        for index in 0..self.frame_count {
            let frame = camera
                .capture_frame()
                .map_err(|err| CaptureError::CaptureFailed {
                    frame: index,
                    reason: err.message(),
                })?;
            let captured_at = self.clock.now();
            pipeline_tracer::trace_capture(index, self.frame_count, frame.len());

            match parser.parse(&frame) {
                Ok(signals) => {
                    pipeline_tracer::trace_parse(index, signals.len());
                    results.push(FrameResult {
                        signals,
                        captured_at,
                    });
                }
                Err(err) => {
                    warn!(
                        "[MultiFrameCapture] Dropping frame {}/{}: {}",
                        index + 1,
                        self.frame_count,
                        err.message()
                    );
                    pipeline_tracer::trace_parse_drop(index, &err.message());
                }
            }

            // No wait after the final frame
            if index + 1 < self.frame_count {
                self.clock.sleep(self.interval);
            }
        }

        if results.is_empty() {
            return Err(CaptureError::NoFramesCaptured {
                attempted: self.frame_count,
            });
        }

        info!(
            "[MultiFrameCapture] Captured {}/{} frames",
            results.len(),
            self.frame_count
        );
        debug!(
            "[MultiFrameCapture] Window {:?} -> {:?}",
            results.first().map(|f| f.captured_at),
            results.last().map(|f| f.captured_at)
        );

        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::ManualClock;
    use crate::signal::{LedSignal, Signal};
    use chrono::{TimeZone, Utc};

    /// Camera returning the frame index as a single byte
    struct CountingCamera {
        next: u8,
        fail_at: Option<u8>,
    }

    impl Camera for CountingCamera {
        fn open(&mut self) -> Result<(), CaptureError> {
            Ok(())
        }

        fn capture_frame(&mut self) -> Result<Vec<u8>, CaptureError> {
            let index = self.next;
            self.next += 1;
            if self.fail_at == Some(index) {
                return Err(CaptureError::CaptureFailed {
                    frame: index as usize,
                    reason: "sensor timeout".to_string(),
                });
            }
            Ok(vec![index])
        }

        fn close(&mut self) -> Result<(), CaptureError> {
            Ok(())
        }
    }

    fn led_parser(frame: &[u8]) -> Result<Vec<Signal>, CaptureError> {
        Ok(vec![Signal::Led(LedSignal::new("LED", frame[0] % 2 == 0, 0.9))])
    }

    fn manual_clock() -> Arc<ManualClock> {
        Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap(),
        ))
    }

    #[test]
    fn test_default_window() {
        let capture = MultiFrameCapture::new(manual_clock());
        assert_eq!(capture.frame_count(), 5);
        assert_eq!(capture.interval(), Duration::from_millis(200));
    }

    #[test]
    fn test_captures_all_frames_with_spacing() {
        let clock = manual_clock();
        let start = clock.now();
        let capture = MultiFrameCapture::new(clock.clone());
        let mut camera = CountingCamera {
            next: 0,
            fail_at: None,
        };

        let frames = capture.capture(&mut camera, &led_parser).unwrap();

        assert_eq!(frames.len(), 5);
        for (i, frame) in frames.iter().enumerate() {
            let expected = start + chrono::Duration::milliseconds(i as i64 * 200);
            assert_eq!(frame.captured_at, expected);
        }
        // Four waits, none after the last frame
        assert_eq!(clock.now() - start, chrono::Duration::milliseconds(800));
    }

    #[test]
    fn test_parse_failure_drops_frame() {
        let capture = MultiFrameCapture::new(manual_clock());
        let mut camera = CountingCamera {
            next: 0,
            fail_at: None,
        };
        let flaky = |frame: &[u8]| -> Result<Vec<Signal>, CaptureError> {
            if frame[0] == 2 {
                Err(CaptureError::ParseFailed {
                    reason: "garbled".to_string(),
                })
            } else {
                led_parser(frame)
            }
        };

        let frames = capture.capture(&mut camera, &flaky).unwrap();
        assert_eq!(frames.len(), 4);
    }

    #[test]
    fn test_camera_failure_aborts() {
        let capture = MultiFrameCapture::new(manual_clock());
        let mut camera = CountingCamera {
            next: 0,
            fail_at: Some(3),
        };

        let err = capture.capture(&mut camera, &led_parser).unwrap_err();
        match err {
            CaptureError::CaptureFailed { frame, reason } => {
                assert_eq!(frame, 3);
                assert!(reason.contains("sensor timeout"));
            }
            other => panic!("Expected CaptureFailed, got {:?}", other),
        }
    }

    #[test]
    fn test_all_frames_dropped() {
        let capture =
            MultiFrameCapture::with_options(manual_clock(), 3, Duration::from_millis(100));
        let mut camera = CountingCamera {
            next: 0,
            fail_at: None,
        };
        let reject = |_: &[u8]| -> Result<Vec<Signal>, CaptureError> {
            Err(CaptureError::ParseFailed {
                reason: "unreadable".to_string(),
            })
        };

        let err = capture.capture(&mut camera, &reject).unwrap_err();
        assert_eq!(err, CaptureError::NoFramesCaptured { attempted: 3 });
    }

    #[test]
    fn test_zero_frame_window_reports_no_frames() {
        let capture = MultiFrameCapture::with_options(manual_clock(), 0, DEFAULT_INTERVAL);
        let mut camera = CountingCamera {
            next: 0,
            fail_at: None,
        };

        assert_eq!(
            capture.capture(&mut camera, &led_parser).unwrap_err(),
            CaptureError::NoFramesCaptured { attempted: 0 }
        );
    }
}
