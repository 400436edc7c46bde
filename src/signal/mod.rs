// Signal module - data model shared by capture, fusion and smoothing
//
// Signals are a closed set of variants (LED, display, boot timing). Every
// fusion and smoothing site matches on them exhaustively.

pub mod observation;
pub mod types;

pub use observation::{decode_signals, generate_id, FrameResult, Observation, SCHEMA_VERSION};
pub use types::{
    BootTimingSignal, DisplaySignal, DisplayTextEntry, LedSignal, Rgb, Signal, SignalKind,
};
