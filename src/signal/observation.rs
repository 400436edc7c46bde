//! Observation snapshot, per-frame results, and versioned JSON decoding.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::types::{BootTimingSignal, DisplaySignal, LedSignal, Signal};
use crate::error::StorageError;

/// Current observation schema version
pub const SCHEMA_VERSION: &str = "1.0.0";

/// Signals parsed from one captured frame.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameResult {
    pub signals: Vec<Signal>,
    pub captured_at: DateTime<Utc>,
}

/// One fused, timestamped snapshot of a device's observable signals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub schema_version: String,
    pub id: String,
    pub device_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub firmware_hash: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub signals: Vec<Signal>,
}

impl Observation {
    /// Fresh observation with the current schema version and a random ID.
    pub fn new(device_id: impl Into<String>, signals: Vec<Signal>, timestamp: DateTime<Utc>) -> Self {
        Self {
            schema_version: SCHEMA_VERSION.to_string(),
            id: generate_id(),
            device_id: device_id.into(),
            firmware_hash: None,
            timestamp,
            signals,
        }
    }

    pub fn with_firmware(mut self, firmware_hash: Option<String>) -> Self {
        self.firmware_hash = firmware_hash;
        self
    }

    pub fn leds(&self) -> impl Iterator<Item = &LedSignal> {
        self.signals.iter().filter_map(Signal::as_led)
    }

    pub fn displays(&self) -> impl Iterator<Item = &DisplaySignal> {
        self.signals.iter().filter_map(Signal::as_display)
    }

    pub fn led(&self, name: &str) -> Option<&LedSignal> {
        self.leds().find(|led| led.name == name)
    }

    pub fn display(&self, name: &str) -> Option<&DisplaySignal> {
        self.displays().find(|display| display.name == name)
    }

    /// Decode a persisted or exported observation.
    ///
    /// Payloads without `schema_version` are treated as the current
    /// version; any other version is rejected since no migrations exist.
    pub fn from_json(data: &str) -> Result<Self, StorageError> {
        let mut raw: Value = serde_json::from_str(data)?;
        let obj = raw.as_object_mut().ok_or_else(|| StorageError::Serialization {
            reason: "observation must be a JSON object".to_string(),
        })?;

        match obj.get("schema_version").and_then(Value::as_str) {
            None | Some("") => {
                obj.insert(
                    "schema_version".to_string(),
                    Value::String(SCHEMA_VERSION.to_string()),
                );
            }
            Some(SCHEMA_VERSION) => {}
            Some(other) => {
                return Err(StorageError::Serialization {
                    reason: format!(
                        "unsupported schema version: {} (current: {}, no migration available)",
                        other, SCHEMA_VERSION
                    ),
                });
            }
        }

        let signals = match obj.remove("signals") {
            Some(value) => decode_signals(&value)?,
            None => Vec::new(),
        };
        obj.insert("signals".to_string(), Value::Array(Vec::new()));

        let mut observation: Observation = serde_json::from_value(raw)?;
        observation.signals = signals;
        Ok(observation)
    }

    pub fn to_json(&self) -> Result<String, StorageError> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Decode a JSON array of signals, tolerating untagged legacy entries.
///
/// Entries without a `type` tag are inferred from their fields
/// (`on` → LED, `text` → display, `duration_ms` → boot timing).
/// Entries of unknown type are skipped.
pub fn decode_signals(value: &Value) -> Result<Vec<Signal>, StorageError> {
    let entries = match value {
        Value::Array(entries) => entries,
        Value::Null => return Ok(Vec::new()),
        _ => {
            return Err(StorageError::Serialization {
                reason: "signals must be a JSON array".to_string(),
            })
        }
    };

    let mut signals = Vec::with_capacity(entries.len());
    for entry in entries {
        let Some(map) = entry.as_object() else {
            continue;
        };

        let kind = match map.get("type").and_then(Value::as_str) {
            Some(kind) => kind,
            None if map.contains_key("on") => "led",
            None if map.contains_key("text") => "display",
            None if map.contains_key("duration_ms") => "boot_timing",
            None => continue,
        };

        let mut fields = map.clone();
        fields.remove("type");
        let fields = Value::Object(fields);

        let signal = match kind {
            "led" => Signal::Led(serde_json::from_value::<LedSignal>(fields)?),
            "display" => Signal::Display(serde_json::from_value::<DisplaySignal>(fields)?),
            "boot_timing" => {
                Signal::BootTiming(serde_json::from_value::<BootTimingSignal>(fields)?)
            }
            _ => continue,
        };
        signals.push(signal);
    }

    Ok(signals)
}

/// Random 128-bit identifier as 32 lowercase hex characters.
pub fn generate_id() -> String {
    format!("{:032x}", rand::random::<u128>())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signal::Rgb;

    #[test]
    fn test_new_observation_has_schema_and_id() {
        let obs = Observation::new("esp32", Vec::new(), Utc::now());
        assert_eq!(obs.schema_version, SCHEMA_VERSION);
        assert_eq!(obs.id.len(), 32);
        assert!(obs.id.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(obs.id, generate_id());
    }

    #[test]
    fn test_json_roundtrip_preserves_signals() {
        let obs = Observation::new(
            "esp32",
            vec![
                LedSignal::new("PWR", true, 0.9)
                    .with_color(Rgb::new(255, 0, 0))
                    .into(),
                DisplaySignal::new("LCD", "Ready", 0.8).into(),
            ],
            Utc::now(),
        )
        .with_firmware(Some("v1.2.0".to_string()));

        let json = obs.to_json().unwrap();
        let parsed = Observation::from_json(&json).unwrap();

        assert_eq!(parsed, obs);
    }

    #[test]
    fn test_legacy_payload_without_version_or_tags() {
        let legacy = r#"{
            "id": "abc",
            "device_id": "esp32",
            "timestamp": "2025-01-01T00:00:00Z",
            "signals": [
                {"name": "LED1", "on": true, "confidence": 0.9},
                {"name": "LCD", "text": "Ready", "confidence": 0.8},
                {"duration_ms": 1500, "confidence": 0.7},
                {"mystery": 1}
            ]
        }"#;

        let obs = Observation::from_json(legacy).unwrap();

        assert_eq!(obs.schema_version, SCHEMA_VERSION);
        assert_eq!(obs.signals.len(), 3);
        assert!(obs.led("LED1").unwrap().on);
        assert_eq!(obs.display("LCD").unwrap().text, "Ready");
        assert!(matches!(obs.signals[2], Signal::BootTiming(_)));
    }

    #[test]
    fn test_unsupported_schema_version_rejected() {
        let payload = r#"{
            "schema_version": "0.9.0",
            "id": "abc",
            "device_id": "esp32",
            "timestamp": "2025-01-01T00:00:00Z",
            "signals": []
        }"#;

        let err = Observation::from_json(payload).unwrap_err();
        match err {
            StorageError::Serialization { reason } => {
                assert!(reason.contains("unsupported schema version"));
            }
            other => panic!("Expected Serialization error, got {:?}", other),
        }
    }
}
