//! Terminal escape handling for script output

use std::sync::LazyLock;

use regex::Regex;

static ANSI_ESCAPE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\x1b\[[0-9;?]*[A-Za-z]|\x1b\][^\x07]*\x07").expect("static regex")
});

/// Markers of harmless tool chatter that is dropped before it reaches a client
const NOISE_MARKERS: &[&str] = &["screen size is bogus"];

/// Remove terminal color and cursor escape sequences
pub fn strip_ansi(text: &str) -> String {
    ANSI_ESCAPE.replace_all(text, "").into_owned()
}

/// Whether a line is benign noise
pub fn is_noise(line: &str) -> bool {
    NOISE_MARKERS.iter().any(|marker| line.contains(marker))
}

/// Prepare one raw output line for delivery.
///
/// Returns `None` for noise lines, otherwise the line without escape
/// sequences or a trailing carriage return.
pub fn clean_line(raw: &str) -> Option<String> {
    let stripped = strip_ansi(raw.trim_end_matches(['\r', '\n']));
    if is_noise(&stripped) {
        return None;
    }
    Some(stripped)
}
