// TemporalSmoother - history vote over a short window
//
// Per call:
//   query history -> (error) Degraded
//                 -> filter to window -> (empty) NoHistory
//                 -> vote per signal -> Applied
//
// Nothing is kept between calls; history lives in the store.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use super::{Smoothed, SmoothingOutcome};
use crate::capture::Clock;
use crate::config::SmoothingConfig;
use crate::debug::pipeline_tracer;
use crate::error::{log_storage_error, ErrorCode};
use crate::signal::{DisplaySignal, LedSignal, Observation, Signal};
use crate::storage::ObservationStore;

pub struct TemporalSmoother {
    store: Arc<dyn ObservationStore>,
    clock: Arc<dyn Clock>,
    window: Duration,
    min_agreement: usize,
    history_limit: usize,
    blink_tolerance: f64,
}

impl TemporalSmoother {
    pub fn new(store: Arc<dyn ObservationStore>, clock: Arc<dyn Clock>) -> Self {
        Self::from_config(store, &SmoothingConfig::default(), clock)
    }

    pub fn from_config(
        store: Arc<dyn ObservationStore>,
        config: &SmoothingConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            clock,
            window: config.window(),
            min_agreement: config.min_agreement,
            history_limit: config.history_limit,
            blink_tolerance: config.blink_tolerance,
        }
    }

    /// Smooth `observation` against the device's recent history
    ///
    /// Never fails: storage errors yield `SmoothingOutcome::Degraded` with
    /// the observation untouched.
    pub fn smooth(&self, observation: Observation) -> Smoothed {
        let history = match self.store.query(&observation.device_id, self.history_limit) {
            Ok(history) => history,
            Err(err) => {
                log_storage_error(&err, "TemporalSmoother::smooth");
                warn!(
                    "[TemporalSmoother] History unavailable for {}, returning unsmoothed",
                    observation.device_id
                );
                return Smoothed {
                    observation,
                    outcome: SmoothingOutcome::Degraded {
                        reason: err.message(),
                    },
                };
            }
        };

        let recent = self.recent_history(&observation, history);
        if recent.is_empty() {
            debug!(
                "[TemporalSmoother] No history within {:?} for {}",
                self.window, observation.device_id
            );
            return Smoothed {
                observation,
                outcome: SmoothingOutcome::NoHistory,
            };
        }

        let mut observation = observation;
        let mut substituted = 0;
        let signals = std::mem::take(&mut observation.signals);

        observation.signals = signals
            .into_iter()
            .map(|signal| {
                let smoothed = match signal {
                    Signal::Led(led) => self.smooth_led(led, &recent).map(Signal::Led),
                    Signal::Display(display) => {
                        self.smooth_display(display, &recent).map(Signal::Display)
                    }
                    Signal::BootTiming(boot) => Vote::Kept(Signal::BootTiming(boot)),
                };
                match smoothed {
                    Vote::Kept(signal) => signal,
                    Vote::Substituted(signal) => {
                        substituted += 1;
                        signal
                    }
                }
            })
            .collect();

        if substituted > 0 {
            info!(
                "[TemporalSmoother] Replaced {} signal(s) for {} with history ({} observations)",
                substituted,
                observation.device_id,
                recent.len()
            );
        }

        Smoothed {
            observation,
            outcome: SmoothingOutcome::Applied { substituted },
        }
    }

    /// History inside the window, newest first, excluding `current` itself
    fn recent_history(&self, current: &Observation, history: Vec<Observation>) -> Vec<Observation> {
        // A window too large to represent reaches back without limit
        let cutoff = i64::try_from(self.window.as_millis())
            .ok()
            .and_then(chrono::Duration::try_milliseconds)
            .and_then(|window| self.clock.now().checked_sub_signed(window));

        let mut recent: Vec<Observation> = history
            .into_iter()
            .filter(|obs| obs.id != current.id)
            .filter(|obs| cutoff.map_or(true, |cutoff| obs.timestamp > cutoff))
            .collect();
        recent.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        recent
    }

    fn smooth_led(&self, led: LedSignal, recent: &[Observation]) -> Vote<LedSignal> {
        let history: Vec<&LedSignal> = recent
            .iter()
            .flat_map(|obs| obs.leds().filter(|hist| hist.name == led.name))
            .collect();

        if history.len() < self.min_agreement {
            pipeline_tracer::trace_smooth(&led.name, 0, history.len(), true);
            return Vote::Kept(led);
        }

        let agreement = history
            .iter()
            .filter(|hist| leds_match(&led, hist, self.blink_tolerance))
            .count();
        let kept = agreement >= self.min_agreement;
        pipeline_tracer::trace_smooth(&led.name, agreement, history.len(), kept);

        if kept {
            return Vote::Kept(led);
        }

        debug!(
            "[TemporalSmoother] LED {} disagrees with history ({}/{}), using newest historical",
            led.name,
            agreement,
            history.len()
        );
        match history.first() {
            Some(newest) => Vote::Substituted((*newest).clone()),
            None => Vote::Kept(led),
        }
    }

    fn smooth_display(&self, reading: DisplaySignal, recent: &[Observation]) -> Vote<DisplaySignal> {
        // A transition in progress is never overwritten
        if reading.changed {
            return Vote::Kept(reading);
        }

        let history: Vec<&str> = recent
            .iter()
            .flat_map(|obs| {
                obs.displays()
                    .filter(|hist| hist.name == reading.name)
                    .map(|hist| hist.text.as_str())
            })
            .collect();

        if history.len() < self.min_agreement {
            pipeline_tracer::trace_smooth(&reading.name, 0, history.len(), true);
            return Vote::Kept(reading);
        }

        let agreement = history.iter().filter(|text| **text == reading.text).count();
        let kept = agreement >= self.min_agreement;
        pipeline_tracer::trace_smooth(&reading.name, agreement, history.len(), kept);

        if kept {
            return Vote::Kept(reading);
        }

        match history.first() {
            Some(newest) => {
                debug!(
                    "[TemporalSmoother] Display {} text '{}' disagrees with history, using '{}'",
                    reading.name, reading.text, newest
                );
                Vote::Substituted(DisplaySignal::new(
                    reading.name.clone(),
                    *newest,
                    reading.confidence,
                ))
            }
            None => Vote::Kept(reading),
        }
    }
}

enum Vote<T> {
    Kept(T),
    Substituted(T),
}

impl<T> Vote<T> {
    fn map<U>(self, f: impl FnOnce(T) -> U) -> Vote<U> {
        match self {
            Vote::Kept(value) => Vote::Kept(f(value)),
            Vote::Substituted(value) => Vote::Substituted(f(value)),
        }
    }
}

/// Same on state and, if either blinks, frequencies within `tolerance`
/// of their average
fn leds_match(a: &LedSignal, b: &LedSignal, tolerance: f64) -> bool {
    if a.on != b.on {
        return false;
    }
    if a.blink_hz > 0.0 || b.blink_hz > 0.0 {
        let avg = (a.blink_hz + b.blink_hz) / 2.0;
        if avg <= 0.0 {
            return false;
        }
        if (a.blink_hz - b.blink_hz).abs() / avg > tolerance {
            return false;
        }
    }
    true
}
