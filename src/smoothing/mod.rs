// Smoothing module - cross-check a fresh observation against recent history
//
// A single glitched frame window can flip an LED or garble a display. The
// smoother compares each new signal with the same-named signals from the
// device's recent observations and, when history disagrees with the new
// reading, substitutes the most recent historical value.

use std::fmt;

pub mod temporal;

pub use temporal::TemporalSmoother;

use crate::signal::Observation;

/// What the smoother did with an observation
#[derive(Debug, Clone, PartialEq)]
pub enum SmoothingOutcome {
    /// History could not be loaded; observation returned unsmoothed
    Degraded { reason: String },
    /// No history inside the window; observation returned unchanged
    NoHistory,
    /// Voting ran; `substituted` signals were replaced by history
    Applied { substituted: usize },
}

impl SmoothingOutcome {
    pub fn is_degraded(&self) -> bool {
        matches!(self, SmoothingOutcome::Degraded { .. })
    }
}

impl fmt::Display for SmoothingOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SmoothingOutcome::Degraded { reason } => write!(f, "degraded: {}", reason),
            SmoothingOutcome::NoHistory => write!(f, "no history"),
            SmoothingOutcome::Applied { substituted } => {
                write!(f, "smoothed, {} substituted", substituted)
            }
        }
    }
}

/// Smoothed observation plus the path taken
#[derive(Debug, Clone)]
pub struct Smoothed {
    pub observation: Observation,
    pub outcome: SmoothingOutcome,
}
