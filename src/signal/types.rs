//! Signal variants reported by the vision classifier and produced by fusion.

use serde::{Deserialize, Serialize};

/// RGB color of an LED.
///
/// The all-zero value means "no color detected", not black.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// True when no color was observed.
    pub fn is_unset(&self) -> bool {
        *self == Rgb::default()
    }
}

/// LED state observation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedSignal {
    pub name: String,
    pub on: bool,
    #[serde(default, skip_serializing_if = "Rgb::is_unset")]
    pub color: Rgb,
    #[serde(default)]
    pub brightness: u8,
    /// Blink frequency in Hz; 0 means steady (on or off)
    #[serde(default)]
    pub blink_hz: f64,
    pub confidence: f64,
}

impl LedSignal {
    /// Steady LED with no color/brightness information.
    pub fn new(name: impl Into<String>, on: bool, confidence: f64) -> Self {
        Self {
            name: name.into(),
            on,
            color: Rgb::default(),
            brightness: 0,
            blink_hz: 0.0,
            confidence,
        }
    }

    pub fn with_blink_hz(mut self, blink_hz: f64) -> Self {
        self.blink_hz = blink_hz;
        self
    }

    pub fn with_color(mut self, color: Rgb) -> Self {
        self.color = color;
        self
    }

    pub fn is_blinking(&self) -> bool {
        self.blink_hz > 0.0
    }
}

/// One deduplicated display text transition within a capture window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisplayTextEntry {
    /// Milliseconds since the first frame of the capture session
    pub offset_ms: u64,
    pub text: String,
    pub confidence: f64,
}

/// Display content observation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisplaySignal {
    pub name: String,
    pub text: String,
    pub confidence: f64,
    /// Text changed during the capture window
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub changed: bool,
    /// Populated only when `changed` is true
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub history: Vec<DisplayTextEntry>,
}

impl DisplaySignal {
    pub fn new(name: impl Into<String>, text: impl Into<String>, confidence: f64) -> Self {
        Self {
            name: name.into(),
            text: text.into(),
            confidence,
            changed: false,
            history: Vec::new(),
        }
    }
}

/// Boot sequence timing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BootTimingSignal {
    pub duration_ms: u64,
    pub confidence: f64,
}

/// Discriminant of [`Signal`], used for grouping and reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalKind {
    Led,
    Display,
    BootTiming,
}

impl SignalKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SignalKind::Led => "led",
            SignalKind::Display => "display",
            SignalKind::BootTiming => "boot_timing",
        }
    }
}

/// A single typed measurement within a frame or observation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Signal {
    Led(LedSignal),
    Display(DisplaySignal),
    BootTiming(BootTimingSignal),
}

impl Signal {
    pub fn kind(&self) -> SignalKind {
        match self {
            Signal::Led(_) => SignalKind::Led,
            Signal::Display(_) => SignalKind::Display,
            Signal::BootTiming(_) => SignalKind::BootTiming,
        }
    }

    /// Signal name; boot timing is unnamed.
    pub fn name(&self) -> Option<&str> {
        match self {
            Signal::Led(led) => Some(&led.name),
            Signal::Display(display) => Some(&display.name),
            Signal::BootTiming(_) => None,
        }
    }

    pub fn confidence(&self) -> f64 {
        match self {
            Signal::Led(led) => led.confidence,
            Signal::Display(display) => display.confidence,
            Signal::BootTiming(boot) => boot.confidence,
        }
    }

    pub fn as_led(&self) -> Option<&LedSignal> {
        match self {
            Signal::Led(led) => Some(led),
            _ => None,
        }
    }

    pub fn as_display(&self) -> Option<&DisplaySignal> {
        match self {
            Signal::Display(display) => Some(display),
            _ => None,
        }
    }
}

impl From<LedSignal> for Signal {
    fn from(led: LedSignal) -> Self {
        Signal::Led(led)
    }
}

impl From<DisplaySignal> for Signal {
    fn from(display: DisplaySignal) -> Self {
        Signal::Display(display)
    }
}

impl From<BootTimingSignal> for Signal {
    fn from(boot: BootTimingSignal) -> Self {
        Signal::BootTiming(boot)
    }
}
