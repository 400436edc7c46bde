// Confidence calibration - signal-specific quality heuristics
//
// Pure functions applied once per fused signal. The raw confidence coming
// out of aggregation is a mean of per-frame classifier scores; these
// adjustments fold in how consistently and how cleanly the signal was seen.

use crate::debug::pipeline_tracer;
use crate::signal::{DisplaySignal, LedSignal};

/// Agreement boost slope applied above a 50% detection rate
const AGREEMENT_SLOPE: f64 = 0.2;
/// Boost when a color was detected
const COLOR_BOOST: f64 = 0.05;
/// Boost for steady (non-blinking) LEDs
const STEADY_BOOST: f64 = 0.05;

/// Display texts shorter than this are penalized
const SHORT_TEXT_LEN: usize = 5;
/// Display texts longer than this get the long-text boost
const LONG_TEXT_LEN: usize = 50;
/// Fraction of special characters above which text is treated as OCR noise
const SPECIAL_CHAR_RATIO: f64 = 0.3;
const SPECIAL_CHAR_PENALTY: f64 = -0.15;
/// Lowest confidence a calibrated display can report
pub const DISPLAY_CONFIDENCE_FLOOR: f64 = 0.5;

/// Adjust a fused LED's confidence
///
/// `confidence = base + agreement + color + steady`, clamped to [0, 1].
///
/// # Arguments
/// * `led` - Fused LED signal
/// * `detection_rate` - Fraction of captured frames in which the LED appeared
pub fn calibrate_led(mut led: LedSignal, detection_rate: f64) -> LedSignal {
    let base = led.confidence;

    // 1.0 detection rate → +0.1, 0.5 or below → nothing
    let agreement_boost = ((detection_rate - 0.5) * AGREEMENT_SLOPE).max(0.0);
    let color_boost = if led.color.is_unset() { 0.0 } else { COLOR_BOOST };
    let blink_boost = if led.blink_hz == 0.0 { STEADY_BOOST } else { 0.0 };

    led.confidence = (base + agreement_boost + color_boost + blink_boost).clamp(0.0, 1.0);
    pipeline_tracer::trace_calibrate(&led.name, base, led.confidence);
    led
}

/// Adjust a fused display's confidence
///
/// `confidence = base + length_factor + special_char_penalty`, clamped to
/// [0.5, 1.0].
pub fn calibrate_display(mut display: DisplaySignal) -> DisplaySignal {
    let base = display.confidence;
    // Byte length; multi-byte characters count once per byte
    let text_len = display.text.len();

    let length_factor = if text_len < SHORT_TEXT_LEN {
        -0.1
    } else if text_len <= LONG_TEXT_LEN {
        0.05
    } else {
        0.1
    };

    let special_chars = display
        .text
        .chars()
        .filter(|&ch| !is_plain_text_char(ch))
        .count();
    let special_penalty =
        if text_len > 0 && special_chars as f64 / text_len as f64 > SPECIAL_CHAR_RATIO {
            SPECIAL_CHAR_PENALTY
        } else {
            0.0
        };

    display.confidence =
        (base + length_factor + special_penalty).clamp(DISPLAY_CONFIDENCE_FLOOR, 1.0);
    pipeline_tracer::trace_calibrate(&display.name, base, display.confidence);
    display
}

/// ASCII alphanumerics, space, '.' and ':' are expected on device displays
fn is_plain_text_char(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || ch == ' ' || ch == '.' || ch == ':'
}
