// Integration tests for temporal smoothing against persisted history

#![cfg(feature = "sqlite")]

use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeZone, Utc};
use serde_json::json;

use percepta_fusion::fixtures::FixtureCamera;
use percepta_fusion::{
    AppConfig, Clock, JsonSignalParser, LedSignal, ManualClock, Observation, ObservationSession,
    ObservationStore, Signal, SmoothingOutcome, SqliteStore, TemporalSmoother,
};

fn led_frames(states: &[bool], text: &str) -> Vec<Vec<u8>> {
    states
        .iter()
        .map(|on| {
            serde_json::to_vec(&json!({
                "leds": [{"name": "STATUS", "on": on, "confidence": 0.9}],
                "displays": [{"name": "LCD", "text": text, "confidence": 0.9}]
            }))
            .unwrap()
        })
        .collect()
}

fn observe(
    store: &Arc<SqliteStore>,
    clock: &Arc<ManualClock>,
    frames: Vec<Vec<u8>>,
) -> percepta_fusion::SessionReport {
    let mut config = AppConfig::default();
    config.capture.frame_count = frames.len();
    ObservationSession::new(
        Box::new(FixtureCamera::new(frames)),
        Box::new(JsonSignalParser::new()),
        store.clone(),
        config,
    )
    .with_clock(clock.clone())
    .observe("bench-07")
    .unwrap()
}

#[test]
fn test_glitch_session_replaced_by_history() {
    let store = Arc::new(SqliteStore::open_in_memory().unwrap());
    let clock = Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2025, 5, 5, 12, 0, 0).unwrap(),
    ));
    let blinking = [true, false, true, false, true];

    // Three consistent sessions, each saved by the caller
    for _ in 0..3 {
        let report = observe(&store, &clock, led_frames(&blinking, "Ready"));
        store.save(&report.observation).unwrap();
    }
    assert_eq!(store.count().unwrap(), 3);

    // Glitched window: LED reads off in every frame, display misread
    let report = observe(&store, &clock, led_frames(&[false; 5], "Rcady"));

    assert_eq!(report.outcome, SmoothingOutcome::Applied { substituted: 2 });
    let led = report.observation.led("STATUS").unwrap();
    assert!(led.on);
    assert!((led.blink_hz - 2.0).abs() < 1e-9);
    assert_eq!(report.observation.display("LCD").unwrap().text, "Ready");
}

#[test]
fn test_history_expires_after_window() {
    let store = Arc::new(SqliteStore::open_in_memory().unwrap());
    let clock = Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2025, 5, 5, 12, 0, 0).unwrap(),
    ));

    for _ in 0..3 {
        let report = observe(&store, &clock, led_frames(&[true; 5], "Ready"));
        store.save(&report.observation).unwrap();
    }

    clock.advance(Duration::from_secs(30));
    let report = observe(&store, &clock, led_frames(&[false; 5], "Ready"));

    assert_eq!(report.outcome, SmoothingOutcome::NoHistory);
    assert!(!report.observation.led("STATUS").unwrap().on);
}

#[test]
fn test_history_from_other_devices_ignored() {
    let store = Arc::new(SqliteStore::open_in_memory().unwrap());
    let clock = Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2025, 5, 5, 12, 0, 0).unwrap(),
    ));
    for _ in 0..3 {
        store
            .save(&Observation::new(
                "other-device",
                vec![Signal::Led(LedSignal::new("STATUS", true, 0.9))],
                clock.now(),
            ))
            .unwrap();
    }

    let smoother = TemporalSmoother::new(store.clone(), clock.clone());
    let fresh = Observation::new(
        "bench-07",
        vec![Signal::Led(LedSignal::new("STATUS", false, 0.9))],
        clock.now(),
    );

    let smoothed = smoother.smooth(fresh.clone());
    assert_eq!(smoothed.outcome, SmoothingOutcome::NoHistory);
    assert_eq!(smoothed.observation, fresh);
}

#[test]
fn test_changed_display_survives_disagreeing_history() {
    let store = Arc::new(SqliteStore::open_in_memory().unwrap());
    let clock = Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2025, 5, 5, 12, 0, 0).unwrap(),
    ));
    for _ in 0..3 {
        let report = observe(&store, &clock, led_frames(&[true; 5], "Ready"));
        store.save(&report.observation).unwrap();
    }

    let frames: Vec<Vec<u8>> = ["Ready", "Ready", "Updating", "Updating", "Updating"]
        .iter()
        .map(|text| {
            serde_json::to_vec(&json!({
                "leds": [{"name": "STATUS", "on": true, "confidence": 0.9}],
                "displays": [{"name": "LCD", "text": text, "confidence": 0.9}]
            }))
            .unwrap()
        })
        .collect();
    let report = observe(&store, &clock, frames);

    let display = report.observation.display("LCD").unwrap();
    assert!(display.changed);
    assert_eq!(display.text, "Updating");
    assert_eq!(report.outcome, SmoothingOutcome::Applied { substituted: 0 });
}
