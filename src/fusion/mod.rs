// Fusion module - combine per-frame readings into one signal per name
//
// This module provides three components:
// 1. LED aggregation: on/off tally, blink frequency estimate
// 2. Display aggregation: text deduplication and change tracking
// 3. Confidence calibration: pure per-signal quality adjustments
//
// Fusion order within a session is LEDs, then displays, then boot timing.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};

use crate::config::FusionConfig;
use crate::signal::{DisplaySignal, FrameResult, LedSignal, Signal};

pub mod confidence;
pub mod display;
pub mod led;

pub use confidence::{calibrate_display, calibrate_led, DISPLAY_CONFIDENCE_FLOOR};
pub use display::aggregate_displays;
pub use led::{aggregate_leds, LedAggregator};

/// Fuse all frames of a capture session into observation signals
///
/// Boot timing is not fused: the reading from the last frame that
/// reported one is carried through unchanged.
pub fn fuse_frames(frames: &[FrameResult], config: &FusionConfig) -> Vec<Signal> {
    let mut signals: Vec<Signal> = aggregate_leds(frames, config.blink_normalization)
        .into_iter()
        .map(Signal::Led)
        .collect();

    signals.extend(aggregate_displays(frames).into_iter().map(Signal::Display));

    let boot = frames.iter().rev().find_map(|frame| {
        frame.signals.iter().find_map(|signal| match signal {
            Signal::BootTiming(boot) => Some(boot.clone()),
            Signal::Led(_) | Signal::Display(_) => None,
        })
    });
    if let Some(boot) = boot {
        signals.push(Signal::BootTiming(boot));
    }

    signals
}

/// Signals that are grouped by name during aggregation
pub(crate) trait Named {
    fn signal_name(&self) -> &str;
}

impl Named for LedSignal {
    fn signal_name(&self) -> &str {
        &self.name
    }
}

impl Named for DisplaySignal {
    fn signal_name(&self) -> &str {
        &self.name
    }
}

/// Readings of one signal name across a session
pub(crate) struct NameGroup<'a, T> {
    pub name: String,
    /// (frame timestamp, reading) in capture order
    pub observations: Vec<(DateTime<Utc>, &'a T)>,
    /// Number of distinct frames the name appeared in
    pub frames_seen: usize,
}

/// Group readings by name, preserving first-appearance order
pub(crate) fn group_by_name<'a, T, F>(frames: &'a [FrameResult], extract: F) -> Vec<NameGroup<'a, T>>
where
    T: Named + 'a,
    F: Fn(&'a Signal) -> Option<&'a T>,
{
    let mut index: HashMap<&'a str, usize> = HashMap::new();
    let mut groups: Vec<NameGroup<'a, T>> = Vec::new();

    for frame in frames {
        let mut seen_in_frame: HashSet<usize> = HashSet::new();

        for signal in &frame.signals {
            let Some(reading) = extract(signal) else {
                continue;
            };
            let name = reading.signal_name();

            let slot = match index.get(name) {
                Some(&slot) => slot,
                None => {
                    groups.push(NameGroup {
                        name: name.to_string(),
                        observations: Vec::new(),
                        frames_seen: 0,
                    });
                    index.insert(name, groups.len() - 1);
                    groups.len() - 1
                }
            };

            groups[slot].observations.push((frame.captured_at, reading));
            if seen_in_frame.insert(slot) {
                groups[slot].frames_seen += 1;
            }
        }
    }

    groups
}

/// Seconds between the earliest and latest frame, if there are two or more
pub(crate) fn capture_span_secs(frames: &[FrameResult]) -> Option<f64> {
    if frames.len() < 2 {
        return None;
    }
    let first = frames.iter().map(|frame| frame.captured_at).min()?;
    let last = frames.iter().map(|frame| frame.captured_at).max()?;
    Some((last - first).num_milliseconds() as f64 / 1000.0)
}
