// Display aggregation - fuse per-frame display readings with change tracking
//
// Each display name keeps a deduplicated list of text transitions: a
// reading is recorded only when its text differs from the previous
// recorded one. Offsets are relative to the first frame of the session.

use chrono::{DateTime, Utc};

use crate::debug::pipeline_tracer;
use crate::fusion::confidence::calibrate_display;
use crate::fusion::group_by_name;
use crate::signal::{DisplaySignal, DisplayTextEntry, FrameResult, Signal};

/// Combine display readings across frames into one calibrated signal per name
///
/// Output order follows the first appearance of each name.
pub fn aggregate_displays(frames: &[FrameResult]) -> Vec<DisplaySignal> {
    let Some(base_time) = frames.iter().map(|frame| frame.captured_at).min() else {
        return Vec::new();
    };

    let groups = group_by_name(frames, |signal| match signal {
        Signal::Display(display) => Some(display),
        Signal::Led(_) | Signal::BootTiming(_) => None,
    });

    let mut displays = Vec::with_capacity(groups.len());
    for mut group in groups {
        // Stable: readings from the same frame keep their order
        group.observations.sort_by_key(|(captured_at, _)| *captured_at);

        let Some(fused) = fuse_display(&group.name, &group.observations, base_time) else {
            continue;
        };
        displays.push(calibrate_display(fused));
    }

    displays
}

fn fuse_display(
    name: &str,
    observations: &[(DateTime<Utc>, &DisplaySignal)],
    base_time: DateTime<Utc>,
) -> Option<DisplaySignal> {
    let (_, latest) = observations.last()?;

    let mut transitions: Vec<DisplayTextEntry> = Vec::new();
    for (captured_at, reading) in observations {
        let repeated = transitions
            .last()
            .map(|prev| prev.text == reading.text)
            .unwrap_or(false);
        if repeated {
            continue;
        }
        transitions.push(DisplayTextEntry {
            offset_ms: offset_ms(base_time, *captured_at),
            text: reading.text.clone(),
            confidence: reading.confidence,
        });
    }

    let total: f64 = observations.iter().map(|(_, obs)| obs.confidence).sum();
    let confidence = total / observations.len() as f64;

    pipeline_tracer::trace_display_fusion(name, observations.len(), transitions.len());

    let changed = transitions.len() > 1;
    Some(DisplaySignal {
        name: name.to_string(),
        // Latest raw reading is authoritative for the current value
        text: latest.text.clone(),
        confidence,
        changed,
        history: if changed { transitions } else { Vec::new() },
    })
}

fn offset_ms(base: DateTime<Utc>, at: DateTime<Utc>) -> u64 {
    (at - base).num_milliseconds().max(0) as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn display_frames(texts: &[&str], interval_ms: i64) -> Vec<FrameResult> {
        let base = Utc.with_ymd_and_hms(2025, 1, 1, 12, 0, 0).unwrap();
        texts
            .iter()
            .enumerate()
            .map(|(i, text)| FrameResult {
                signals: vec![Signal::Display(DisplaySignal::new("LCD", *text, 0.9))],
                captured_at: base + Duration::milliseconds(i as i64 * interval_ms),
            })
            .collect()
    }

    #[test]
    fn test_static_text() {
        let frames = display_frames(&["Ready", "Ready", "Ready"], 200);
        let displays = aggregate_displays(&frames);

        assert_eq!(displays.len(), 1);
        let display = &displays[0];
        assert_eq!(display.name, "LCD");
        assert_eq!(display.text, "Ready");
        assert!(!display.changed);
        assert!(display.history.is_empty());
    }

    #[test]
    fn test_dedup_transitions() {
        let frames = display_frames(&["A", "A", "B", "B", "C"], 200);
        let displays = aggregate_displays(&frames);

        let display = &displays[0];
        assert!(display.changed);
        assert_eq!(display.text, "C");

        let texts: Vec<&str> = display.history.iter().map(|e| e.text.as_str()).collect();
        assert_eq!(texts, vec!["A", "B", "C"]);

        let offsets: Vec<u64> = display.history.iter().map(|e| e.offset_ms).collect();
        assert_eq!(offsets, vec![0, 400, 800]);
    }

    #[test]
    fn test_return_to_earlier_text_is_a_transition() {
        let frames = display_frames(&["Boot", "Init...", "Boot"], 400);
        let display = &aggregate_displays(&frames)[0];

        assert_eq!(display.history.len(), 3);
        assert_eq!(display.text, "Boot");
    }

    #[test]
    fn test_offsets_relative_to_session_start() {
        // Display first appears in the second frame
        let base = Utc.with_ymd_and_hms(2025, 1, 1, 12, 0, 0).unwrap();
        let frames = vec![
            FrameResult {
                signals: Vec::new(),
                captured_at: base,
            },
            FrameResult {
                signals: vec![Signal::Display(DisplaySignal::new("LCD", "Boot", 0.9))],
                captured_at: base + Duration::milliseconds(200),
            },
            FrameResult {
                signals: vec![Signal::Display(DisplaySignal::new("LCD", "Ready", 0.9))],
                captured_at: base + Duration::milliseconds(400),
            },
        ];

        let display = &aggregate_displays(&frames)[0];
        assert_eq!(display.history[0].offset_ms, 200);
        assert_eq!(display.history[1].offset_ms, 400);
    }

    #[test]
    fn test_confidence_is_mean_of_raw_readings_then_calibrated() {
        let base = Utc.with_ymd_and_hms(2025, 1, 1, 12, 0, 0).unwrap();
        let frames: Vec<FrameResult> = [0.7, 0.8, 0.9]
            .iter()
            .enumerate()
            .map(|(i, &conf)| FrameResult {
                signals: vec![Signal::Display(DisplaySignal::new("LCD", "Ready", conf))],
                captured_at: base + Duration::milliseconds(i as i64 * 200),
            })
            .collect();

        let display = &aggregate_displays(&frames)[0];
        // mean 0.8 + 0.05 for typical length
        assert!((display.confidence - 0.85).abs() < 1e-9);
    }

    #[test]
    fn test_multiple_displays_keep_first_seen_order() {
        let base = Utc.with_ymd_and_hms(2025, 1, 1, 12, 0, 0).unwrap();
        let frames = vec![FrameResult {
            signals: vec![
                Signal::Display(DisplaySignal::new("OLED", "12:00", 0.9)),
                Signal::Display(DisplaySignal::new("LCD", "Ready", 0.9)),
            ],
            captured_at: base,
        }];

        let displays = aggregate_displays(&frames);
        let names: Vec<&str> = displays.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["OLED", "LCD"]);
    }

    #[test]
    fn test_no_frames() {
        assert!(aggregate_displays(&[]).is_empty());
    }
}
