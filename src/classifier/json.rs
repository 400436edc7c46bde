// JsonSignalParser - decode structured classifier output into signals
//
// Frames handed to this parser are the classifier's JSON report for one
// image:
//
//   {"leds":     [{"name", "on", "color"?, "blink_hz"?, "brightness"?, "confidence"}],
//    "displays": [{"name", "text", "confidence"}],
//    "boot_timing": {"duration_ms", "confidence"}?}
//
// A payload that is not a JSON object fails the frame. Individual entries
// that don't decode are skipped so one bad entry doesn't cost the frame.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use serde::Deserialize;
use serde_json::Value;
use tracing::warn;

use crate::capture::SignalParser;
use crate::error::CaptureError;
use crate::signal::{BootTimingSignal, DisplaySignal, LedSignal, Rgb, Signal};

/// Color names the classifier is prompted with
static COLOR_TABLE: Lazy<HashMap<&'static str, Rgb>> = Lazy::new(|| {
    HashMap::from([
        ("red", Rgb::new(255, 0, 0)),
        ("green", Rgb::new(0, 255, 0)),
        ("blue", Rgb::new(0, 0, 255)),
        ("yellow", Rgb::new(255, 255, 0)),
        ("white", Rgb::new(255, 255, 255)),
        ("orange", Rgb::new(255, 165, 0)),
    ])
});

/// Map a color name to RGB; unknown names map to the unset color
pub fn color_from_name(name: &str) -> Rgb {
    COLOR_TABLE
        .get(name.trim().to_ascii_lowercase().as_str())
        .copied()
        .unwrap_or_default()
}

#[derive(Debug, Deserialize)]
struct LedReport {
    #[serde(default)]
    name: String,
    #[serde(default)]
    on: bool,
    #[serde(default)]
    color: Option<String>,
    #[serde(default)]
    blink_hz: f64,
    #[serde(default)]
    brightness: u8,
    #[serde(default)]
    confidence: f64,
}

#[derive(Debug, Deserialize)]
struct DisplayReport {
    #[serde(default)]
    name: String,
    #[serde(default)]
    text: String,
    #[serde(default)]
    confidence: f64,
}

#[derive(Debug, Deserialize)]
struct BootReport {
    duration_ms: u64,
    #[serde(default)]
    confidence: f64,
}

/// Parser for the classifier's structured JSON output
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonSignalParser;

impl JsonSignalParser {
    pub fn new() -> Self {
        Self
    }

    fn parse_value(&self, root: &Value) -> Result<Vec<Signal>, CaptureError> {
        let obj = root.as_object().ok_or_else(|| CaptureError::ParseFailed {
            reason: "classifier output must be a JSON object".to_string(),
        })?;

        let mut signals = Vec::new();

        for (index, entry) in entries(obj.get("leds")).enumerate() {
            match serde_json::from_value::<LedReport>(entry.clone()) {
                Ok(report) => signals.push(Signal::Led(led_from_report(report, index))),
                Err(err) => warn!("[JsonSignalParser] Skipping LED entry {}: {}", index, err),
            }
        }

        for (index, entry) in entries(obj.get("displays")).enumerate() {
            match serde_json::from_value::<DisplayReport>(entry.clone()) {
                Ok(report) => signals.push(Signal::Display(display_from_report(report, index))),
                Err(err) => warn!("[JsonSignalParser] Skipping display entry {}: {}", index, err),
            }
        }

        if let Some(boot) = obj.get("boot_timing").filter(|value| !value.is_null()) {
            match serde_json::from_value::<BootReport>(boot.clone()) {
                Ok(report) => signals.push(Signal::BootTiming(BootTimingSignal {
                    duration_ms: report.duration_ms,
                    confidence: report.confidence.clamp(0.0, 1.0),
                })),
                Err(err) => warn!("[JsonSignalParser] Skipping boot timing: {}", err),
            }
        }

        Ok(signals)
    }
}

impl SignalParser for JsonSignalParser {
    fn parse(&self, frame: &[u8]) -> Result<Vec<Signal>, CaptureError> {
        let root: Value = serde_json::from_slice(frame)?;
        self.parse_value(&root)
    }
}

fn entries(value: Option<&Value>) -> impl Iterator<Item = &Value> {
    value
        .and_then(Value::as_array)
        .into_iter()
        .flat_map(|items| items.iter())
}

fn led_from_report(report: LedReport, index: usize) -> LedSignal {
    let name = if report.name.is_empty() {
        format!("LED{}", index + 1)
    } else {
        report.name
    };
    LedSignal {
        name,
        on: report.on,
        color: report
            .color
            .as_deref()
            .map(color_from_name)
            .unwrap_or_default(),
        brightness: report.brightness,
        blink_hz: report.blink_hz.max(0.0),
        confidence: report.confidence.clamp(0.0, 1.0),
    }
}

fn display_from_report(report: DisplayReport, index: usize) -> DisplaySignal {
    let name = if report.name.is_empty() {
        format!("Display{}", index + 1)
    } else {
        report.name
    };
    DisplaySignal::new(name, report.text, report.confidence.clamp(0.0, 1.0))
}
