//! Signal parsers for classifier output.

pub mod json;

pub use json::{color_from_name, JsonSignalParser};
