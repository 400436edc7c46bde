// LED aggregation - fuse per-frame LED readings into one signal per name
//
// A unanimous on/off tally yields a steady LED. A mixed tally means the
// LED blinked during the window: it is reported as logically on, with a
// frequency estimated from the number of on/off transitions between
// consecutive readings (two transitions per full cycle).

use crate::config::BlinkNormalization;
use crate::debug::pipeline_tracer;
use crate::fusion::confidence::calibrate_led;
use crate::fusion::{capture_span_secs, group_by_name};
use crate::signal::{FrameResult, LedSignal, Signal};

/// Per-name accumulator of LED readings in capture order
#[derive(Debug, Clone)]
pub struct LedAggregator {
    name: String,
    observations: Vec<LedSignal>,
}

impl LedAggregator {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            observations: Vec::new(),
        }
    }

    pub fn add_observation(&mut self, led: LedSignal) {
        self.observations.push(led);
    }

    pub fn observation_count(&self) -> usize {
        self.observations.len()
    }

    /// Number of on/off changes between consecutive readings
    pub fn transition_count(&self) -> usize {
        self.observations
            .windows(2)
            .filter(|pair| pair[0].on != pair[1].on)
            .count()
    }

    /// Fuse the readings into one LED signal (before calibration)
    ///
    /// # Arguments
    /// * `window_secs` - Duration the transition count is normalized over;
    ///   1.0 reproduces the `transitions / 2` estimate
    ///
    /// # Returns
    /// `None` if no readings were added
    pub fn aggregate(&self, window_secs: f64) -> Option<LedSignal> {
        let first = self.observations.first()?;

        let on_count = self.observations.iter().filter(|obs| obs.on).count();
        let off_count = self.observations.len() - on_count;

        // Color, brightness and the rest come from the first reading
        let mut led = first.clone();
        led.name = self.name.clone();

        if on_count > 0 && off_count > 0 {
            let transitions = self.transition_count() as f64;
            led.blink_hz = transitions / 2.0 / window_secs;
            led.on = true;
        } else {
            led.on = on_count > 0;
            led.blink_hz = 0.0;
        }

        let total: f64 = self.observations.iter().map(|obs| obs.confidence).sum();
        led.confidence = total / self.observations.len() as f64;

        Some(led)
    }
}

/// Combine LED readings across frames into one calibrated signal per name
///
/// Output order follows the first appearance of each name.
pub fn aggregate_leds(frames: &[FrameResult], normalization: BlinkNormalization) -> Vec<LedSignal> {
    if frames.is_empty() {
        return Vec::new();
    }

    let window_secs = match normalization {
        BlinkNormalization::AssumedWindow => 1.0,
        BlinkNormalization::ElapsedTime => match capture_span_secs(frames) {
            Some(secs) if secs > 0.0 => secs,
            // Single frame or identical timestamps: nothing to normalize over
            _ => 1.0,
        },
    };

    let groups = group_by_name(frames, |signal| match signal {
        Signal::Led(led) => Some(led),
        Signal::Display(_) | Signal::BootTiming(_) => None,
    });

    let total_frames = frames.len() as f64;
    let mut leds = Vec::with_capacity(groups.len());

    for group in groups {
        let mut aggregator = LedAggregator::new(group.name.clone());
        for (_, led) in &group.observations {
            aggregator.add_observation((*led).clone());
        }

        let Some(fused) = aggregator.aggregate(window_secs) else {
            continue;
        };
        pipeline_tracer::trace_led_fusion(
            &fused.name,
            aggregator.observation_count(),
            fused.on,
            fused.blink_hz,
        );

        let detection_rate = group.frames_seen as f64 / total_frames;
        leds.push(calibrate_led(fused, detection_rate));
    }

    leds
}
