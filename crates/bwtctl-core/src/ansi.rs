//! ANSI escape code handling
//!
//! The daemon colors its log output when it believes it writes to a terminal.
//! Color codes must be removed before a line is classified.

use regex::Regex;
use std::sync::LazyLock;

/// Regex pattern for ANSI escape sequences (CSI, OSC and simple escapes).
static ANSI_ESCAPE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?x)
        \x1b\[[0-9;?]*[A-Za-z]               # CSI sequences
        | \x1b\][^\x07\x1b]*(?:\x07|\x1b\\)  # OSC sequences
        | \x1b[A-Za-z]                       # Simple escapes
        ",
    )
    .expect("ANSI regex pattern is valid")
});

/// Strip all ANSI escape sequences from a string.
///
/// Returns the input unchanged (borrowed) when it contains no escape byte.
pub fn strip_ansi_codes(s: &str) -> std::borrow::Cow<'_, str> {
    if !contains_ansi_codes(s) {
        return std::borrow::Cow::Borrowed(s);
    }
    ANSI_ESCAPE_PATTERN.replace_all(s, "")
}

/// Quick check for an ESC byte
pub fn contains_ansi_codes(s: &str) -> bool {
    s.contains('\x1b')
}
