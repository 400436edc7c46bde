// Capture module - camera/parser seams, time sources and session orchestration
//
// The pipeline never talks to hardware or a vision model directly: frames
// come from a `Camera` and are turned into per-frame signals by a
// `SignalParser`. Both are injected so fixtures and tests can drive the
// whole pipeline deterministically.

use crate::error::CaptureError;
use crate::signal::Signal;

pub mod clock;
pub mod multi_frame;
pub mod session;

pub use clock::{Clock, ManualClock, SystemClock};
pub use multi_frame::{MultiFrameCapture, DEFAULT_FRAME_COUNT, DEFAULT_INTERVAL};
pub use session::{ObservationSession, SessionReport};

/// Source of raw frames
pub trait Camera {
    fn open(&mut self) -> Result<(), CaptureError>;
    fn capture_frame(&mut self) -> Result<Vec<u8>, CaptureError>;
    fn close(&mut self) -> Result<(), CaptureError>;
}

/// Turns one raw frame into the signals visible in it
pub trait SignalParser {
    fn parse(&self, frame: &[u8]) -> Result<Vec<Signal>, CaptureError>;
}

impl<F> SignalParser for F
where
    F: Fn(&[u8]) -> Result<Vec<Signal>, CaptureError>,
{
    fn parse(&self, frame: &[u8]) -> Result<Vec<Signal>, CaptureError> {
        self(frame)
    }
}
