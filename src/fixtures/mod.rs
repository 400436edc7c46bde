//! Fixture utilities for the deterministic diagnostics harness.
//!
//! A fixture is a JSON file holding the classifier output for each frame of
//! one capture session plus optional expectations about the fused result.
//! `FixtureCamera` replays those frames so the full session can run without
//! hardware, and `FixtureExpectations::verify` checks the outcome.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::capture::Camera;
use crate::config::AppConfig;
use crate::error::CaptureError;
use crate::signal::Observation;

/// Default location for fixture JSON files.
pub const DEFAULT_FIXTURE_ROOT: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/fixtures");

/// One recorded capture session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Fixture {
    pub name: String,
    /// Wait between frames; falls back to the configured interval.
    #[serde(default)]
    pub interval_ms: Option<u64>,
    /// Classifier output per frame. `null` stands for an unreadable frame.
    pub frames: Vec<Value>,
    /// Frame index at which the camera reports a hardware failure.
    #[serde(default)]
    pub camera_fails_at: Option<usize>,
    #[serde(default)]
    pub expect: Option<FixtureExpectations>,
}

impl Fixture {
    pub fn from_json(data: &str) -> Result<Self> {
        let fixture: Fixture = serde_json::from_str(data).context("parsing fixture")?;
        if fixture.frames.is_empty() {
            return Err(anyhow!("Fixture '{}' has no frames", fixture.name));
        }
        Ok(fixture)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let json =
            fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
        Self::from_json(&json).with_context(|| format!("loading fixture {}", path.display()))
    }

    /// Raw frame payloads as the camera would deliver them.
    pub fn frame_payloads(&self) -> Result<Vec<Vec<u8>>> {
        self.frames
            .iter()
            .map(|frame| serde_json::to_vec(frame).map_err(|err| anyhow!(err)))
            .collect()
    }

    /// Configuration with the capture window sized to this fixture.
    pub fn apply_to(&self, config: &mut AppConfig) {
        config.capture.frame_count = self.frames.len();
        if let Some(interval_ms) = self.interval_ms {
            config.capture.interval_ms = interval_ms;
        }
    }

    pub fn camera(&self) -> Result<FixtureCamera> {
        let mut camera = FixtureCamera::new(self.frame_payloads()?);
        if let Some(index) = self.camera_fails_at {
            camera = camera.failing_at(index);
        }
        Ok(camera)
    }
}

/// Camera that replays recorded frame payloads in order.
#[derive(Debug, Clone)]
pub struct FixtureCamera {
    frames: Vec<Vec<u8>>,
    next: usize,
    fail_at: Option<usize>,
    fail_open: bool,
    is_open: bool,
    close_count: usize,
}

impl FixtureCamera {
    pub fn new(frames: Vec<Vec<u8>>) -> Self {
        Self {
            frames,
            next: 0,
            fail_at: None,
            fail_open: false,
            is_open: false,
            close_count: 0,
        }
    }

    /// Fail when frame `index` is requested.
    pub fn failing_at(mut self, index: usize) -> Self {
        self.fail_at = Some(index);
        self
    }

    /// Fail on `open`.
    pub fn unavailable(mut self) -> Self {
        self.fail_open = true;
        self
    }

    pub fn is_open(&self) -> bool {
        self.is_open
    }

    pub fn close_count(&self) -> usize {
        self.close_count
    }
}

impl Camera for FixtureCamera {
    fn open(&mut self) -> std::result::Result<(), CaptureError> {
        if self.fail_open {
            return Err(CaptureError::CameraOpenFailed {
                reason: "fixture camera unavailable".to_string(),
            });
        }
        self.is_open = true;
        self.next = 0;
        Ok(())
    }

    fn capture_frame(&mut self) -> std::result::Result<Vec<u8>, CaptureError> {
        let index = self.next;
        if !self.is_open {
            return Err(CaptureError::CaptureFailed {
                frame: index,
                reason: "camera not open".to_string(),
            });
        }
        if self.fail_at == Some(index) {
            return Err(CaptureError::CaptureFailed {
                frame: index,
                reason: "fixture camera failure".to_string(),
            });
        }
        let frame = self
            .frames
            .get(index)
            .cloned()
            .ok_or_else(|| CaptureError::CaptureFailed {
                frame: index,
                reason: format!("fixture has only {} frames", self.frames.len()),
            })?;
        self.next += 1;
        Ok(frame)
    }

    fn close(&mut self) -> std::result::Result<(), CaptureError> {
        self.is_open = false;
        self.close_count += 1;
        Ok(())
    }
}

/// Expectations about the fused observation of a fixture.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FixtureExpectations {
    #[serde(default)]
    pub leds: Vec<ExpectedLed>,
    #[serde(default)]
    pub displays: Vec<ExpectedDisplay>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExpectedLed {
    pub name: String,
    pub on: bool,
    #[serde(default)]
    pub blink_hz: Option<f64>,
    #[serde(default = "default_blink_tolerance")]
    pub blink_tolerance_hz: f64,
}

fn default_blink_tolerance() -> f64 {
    0.1
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExpectedDisplay {
    pub name: String,
    pub text: String,
    #[serde(default)]
    pub changed: Option<bool>,
}

impl FixtureExpectations {
    pub fn verify(&self, observation: &Observation) -> std::result::Result<(), ExpectationDiff> {
        let mut failures = Vec::new();

        for expected in &self.leds {
            let Some(actual) = observation.led(&expected.name) else {
                failures.push(ExpectationFailure::missing(&expected.name));
                continue;
            };
            if actual.on != expected.on {
                failures.push(ExpectationFailure::new(
                    &expected.name,
                    "on",
                    expected.on.to_string(),
                    actual.on.to_string(),
                ));
            }
            if let Some(blink_hz) = expected.blink_hz {
                if (actual.blink_hz - blink_hz).abs() > expected.blink_tolerance_hz {
                    failures.push(ExpectationFailure::new(
                        &expected.name,
                        "blink_hz",
                        format!("{:.2}", blink_hz),
                        format!("{:.2}", actual.blink_hz),
                    ));
                }
            }
        }

        for expected in &self.displays {
            let Some(actual) = observation.display(&expected.name) else {
                failures.push(ExpectationFailure::missing(&expected.name));
                continue;
            };
            if actual.text != expected.text {
                failures.push(ExpectationFailure::new(
                    &expected.name,
                    "text",
                    expected.text.clone(),
                    actual.text.clone(),
                ));
            }
            if let Some(changed) = expected.changed {
                if actual.changed != changed {
                    failures.push(ExpectationFailure::new(
                        &expected.name,
                        "changed",
                        changed.to_string(),
                        actual.changed.to_string(),
                    ));
                }
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(ExpectationDiff { failures })
        }
    }
}

/// Outcome of comparing an observation with expectations.
#[derive(Debug)]
pub struct ExpectationDiff {
    pub failures: Vec<ExpectationFailure>,
}

impl ExpectationDiff {
    pub fn to_json(&self) -> Value {
        serde_json::json!({
            "failures": self.failures.iter().map(|failure| {
                serde_json::json!({
                    "signal": failure.signal,
                    "field": failure.field,
                    "expected": failure.expected,
                    "actual": failure.actual,
                })
            }).collect::<Vec<_>>()
        })
    }
}

/// Detailed diff entry for a single mismatch.
#[derive(Debug, Clone, PartialEq)]
pub struct ExpectationFailure {
    pub signal: String,
    pub field: &'static str,
    pub expected: String,
    pub actual: Option<String>,
}

impl ExpectationFailure {
    fn new(signal: &str, field: &'static str, expected: String, actual: String) -> Self {
        Self {
            signal: signal.to_string(),
            field,
            expected,
            actual: Some(actual),
        }
    }

    fn missing(signal: &str) -> Self {
        Self {
            signal: signal.to_string(),
            field: "presence",
            expected: "present".to_string(),
            actual: None,
        }
    }
}

/// Catalog responsible for discovering fixtures on disk.
pub struct FixtureCatalog {
    root: PathBuf,
}

impl FixtureCatalog {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Fixture names (file stems) sorted alphabetically.
    pub fn discover(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        if !self.root.exists() {
            return Ok(names);
        }

        for entry in fs::read_dir(&self.root)? {
            let path = entry?.path();
            if path.is_file() && path.extension().and_then(|ext| ext.to_str()) == Some("json") {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    names.push(stem.to_string());
                }
            }
        }

        names.sort();
        Ok(names)
    }

    /// Load a fixture by file path or by name under the catalog root.
    pub fn load(&self, fixture: &str) -> Result<Fixture> {
        let as_path = Path::new(fixture);
        if as_path.exists() {
            return Fixture::load(as_path);
        }

        let candidate = self.root.join(format!("{fixture}.json"));
        if candidate.exists() {
            Fixture::load(candidate)
        } else {
            Err(anyhow!(
                "Fixture '{fixture}' not found in {}",
                self.root.display()
            ))
        }
    }
}

impl Default for FixtureCatalog {
    fn default() -> Self {
        Self::new(DEFAULT_FIXTURE_ROOT)
    }
}
