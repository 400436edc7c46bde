// Frame-level trace points for capture, fusion and smoothing
//
// Off unless PERCEPTA_TRACE is "1" or "true", or enable() is called.
// Each line carries the stage tag, a sequence number and microseconds
// since the first trace, e.g.
//
//   [TRACE]    CAPTURE #000003 @      1840us | frame=2/5 bytes=97

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Instant;

static TRACING_ENABLED: AtomicBool = AtomicBool::new(false);

/// Sequence number shared by every stage
static TRACE_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Turn tracing on if PERCEPTA_TRACE asks for it
///
/// Never turns tracing off; a runtime `enable()` survives a later `init()`.
pub fn init() {
    let requested = std::env::var("PERCEPTA_TRACE")
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(false);
    if requested {
        TRACING_ENABLED.store(true, Ordering::SeqCst);
        tracing::info!("[TRACE] Frame tracing on (PERCEPTA_TRACE)");
    }
}

#[inline]
pub fn is_enabled() -> bool {
    TRACING_ENABLED.load(Ordering::Relaxed)
}

pub fn enable() {
    TRACING_ENABLED.store(true, Ordering::SeqCst);
    tracing::info!("[TRACE] Frame tracing on");
}

pub fn disable() {
    TRACING_ENABLED.store(false, Ordering::SeqCst);
    tracing::info!("[TRACE] Frame tracing off");
}

/// Serializes tests that flip the process-wide tracing flag
#[cfg(test)]
pub(crate) static FLAG_LOCK: std::sync::Mutex<()> = std::sync::Mutex::new(());

/// Where in the pipeline a trace line was emitted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
    /// Camera returned a frame
    Capture,
    /// Parser produced signals for a frame
    Parse,
    /// Parser rejected a frame, frame dropped
    ParseDrop,
    /// LED observations fused for one name
    LedFusion,
    /// Display observations fused for one name
    DisplayFusion,
    /// Confidence adjusted for a fused signal
    Calibrate,
    /// Temporal smoothing decision
    Smooth,
}

impl PipelineStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineStage::Capture => "CAPTURE",
            PipelineStage::Parse => "PARSE",
            PipelineStage::ParseDrop => "PARSE_DROP",
            PipelineStage::LedFusion => "LED_FUSE",
            PipelineStage::DisplayFusion => "DISP_FUSE",
            PipelineStage::Calibrate => "CALIBRATE",
            PipelineStage::Smooth => "SMOOTH",
        }
    }
}

static START_TIME: std::sync::OnceLock<Instant> = std::sync::OnceLock::new();

fn get_timestamp_us() -> u64 {
    let start = START_TIME.get_or_init(Instant::now);
    start.elapsed().as_micros() as u64
}

/// Emit one trace line; a no-op while tracing is off
#[inline]
pub fn trace(stage: PipelineStage, message: &str) {
    if !is_enabled() {
        return;
    }

    let id = TRACE_COUNTER.fetch_add(1, Ordering::Relaxed);
    let ts = get_timestamp_us();

    tracing::info!(
        "[TRACE] {:>10} #{:06} @{:>10}us | {}",
        stage.as_str(),
        id,
        ts,
        message
    );
}

/// Trace a captured frame
pub fn trace_capture(frame: usize, total: usize, bytes: usize) {
    trace(
        PipelineStage::Capture,
        &format!("frame={}/{} bytes={}", frame + 1, total, bytes),
    );
}

/// Trace a parsed frame
pub fn trace_parse(frame: usize, signals: usize) {
    trace(
        PipelineStage::Parse,
        &format!("frame={} signals={}", frame + 1, signals),
    );
}

/// Trace a dropped frame
pub fn trace_parse_drop(frame: usize, reason: &str) {
    trace(
        PipelineStage::ParseDrop,
        &format!("frame={} reason={}", frame + 1, reason),
    );
}

/// Trace LED fusion result
pub fn trace_led_fusion(name: &str, observations: usize, on: bool, blink_hz: f64) {
    trace(
        PipelineStage::LedFusion,
        &format!(
            "name={} observations={} on={} blink_hz={:.2}",
            name, observations, on, blink_hz
        ),
    );
}

/// Trace display fusion result
pub fn trace_display_fusion(name: &str, observations: usize, transitions: usize) {
    trace(
        PipelineStage::DisplayFusion,
        &format!(
            "name={} observations={} transitions={}",
            name, observations, transitions
        ),
    );
}

/// Trace confidence calibration
pub fn trace_calibrate(name: &str, before: f64, after: f64) {
    trace(
        PipelineStage::Calibrate,
        &format!("name={} confidence={:.3}->{:.3}", name, before, after),
    );
}

/// Trace a smoothing decision
pub fn trace_smooth(name: &str, agreement: usize, history: usize, kept: bool) {
    trace(
        PipelineStage::Smooth,
        &format!(
            "name={} agreement={}/{} {}",
            name,
            agreement,
            history,
            if kept { "KEPT" } else { "SUBSTITUTED" }
        ),
    );
}
