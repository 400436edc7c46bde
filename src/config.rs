//! Configuration management for capture, fusion and smoothing parameters
//!
//! This module provides runtime configuration loading from JSON files so
//! capture windows and smoothing tolerances can be tuned per rig without
//! recompilation. Missing keys fall back to the defaults below.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::error::CaptureError;

/// Complete engine configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub capture: CaptureConfig,
    pub fusion: FusionConfig,
    pub smoothing: SmoothingConfig,
}

/// Multi-frame capture parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Number of frames captured per session
    pub frame_count: usize,
    /// Wait between consecutive frames in milliseconds
    pub interval_ms: u64,
}

impl CaptureConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            // 5 frames x 200ms spans roughly one second of LED behavior
            frame_count: 5,
            interval_ms: 200,
        }
    }
}

/// How LED transition counts are converted into a blink frequency
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlinkNormalization {
    /// `transitions / 2`, assumes the capture window spans ~1 second
    #[default]
    AssumedWindow,
    /// `transitions / 2 / elapsed_seconds` between first and last frame
    ElapsedTime,
}

/// Signal fusion parameters
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FusionConfig {
    pub blink_normalization: BlinkNormalization,
}

/// Temporal smoothing parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SmoothingConfig {
    /// Only history newer than this is considered
    pub window_ms: u64,
    /// Historical entries needed before voting, and votes needed to keep a reading
    pub min_agreement: usize,
    /// Maximum observations fetched from the store
    pub history_limit: usize,
    /// Relative blink frequency difference still counted as agreement
    pub blink_tolerance: f64,
}

impl SmoothingConfig {
    pub fn window(&self) -> Duration {
        Duration::from_millis(self.window_ms)
    }
}

impl Default for SmoothingConfig {
    fn default() -> Self {
        Self {
            window_ms: 5_000,
            min_agreement: 2,
            history_limit: 10,
            blink_tolerance: 0.10,
        }
    }
}

impl AppConfig {
    /// Load configuration from JSON file
    ///
    /// # Arguments
    /// * `path` - Path to JSON config file
    ///
    /// # Returns
    /// The parsed configuration, or defaults if the file is missing or invalid
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Self {
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(config) => {
                    log::info!("[Config] Loaded configuration from {:?}", path.as_ref());
                    config
                }
                Err(err) => {
                    log::warn!(
                        "[Config] Failed to parse JSON from {:?}: {}. Using defaults.",
                        path.as_ref(),
                        err
                    );
                    Self::default()
                }
            },
            Err(err) => {
                log::warn!(
                    "[Config] Failed to read config file {:?}: {}. Using defaults.",
                    path.as_ref(),
                    err
                );
                Self::default()
            }
        }
    }

    /// Reject values the engine cannot run with
    pub fn validate(&self) -> Result<(), CaptureError> {
        if self.capture.frame_count == 0 {
            return Err(CaptureError::InvalidConfig {
                reason: "capture.frame_count must be at least 1".to_string(),
            });
        }
        if self.smoothing.min_agreement == 0 {
            return Err(CaptureError::InvalidConfig {
                reason: "smoothing.min_agreement must be at least 1".to_string(),
            });
        }
        if self.smoothing.history_limit == 0 {
            return Err(CaptureError::InvalidConfig {
                reason: "smoothing.history_limit must be at least 1".to_string(),
            });
        }
        let tolerance = self.smoothing.blink_tolerance;
        if !tolerance.is_finite() || tolerance < 0.0 {
            return Err(CaptureError::InvalidConfig {
                reason: format!(
                    "smoothing.blink_tolerance must be a non-negative number (got {})",
                    tolerance
                ),
            });
        }
        Ok(())
    }
}
