//! Conversion of raw deployment output into client events

pub mod ansi;
pub mod classifier;

pub use ansi::{clean_line, is_noise, strip_ansi};
pub use classifier::classify;
