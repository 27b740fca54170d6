//! Classification of daemon output lines
//!
//! The daemon logs through `pretty_env_logger`-style records:
//!
//! ```text
//! [<RFC3339 timestamp> ]<LEVEL> <TAG> > <MESSAGE>
//! ```
//!
//! Anything else (panics, clap usage errors, banners) falls back to a
//! generic `daemon` tag.

use std::sync::LazyLock;

use chrono::{DateTime, NaiveDateTime, Utc};
use regex::Regex;

use bwtctl_core::{strip_ansi_codes, LogLevel, LogRecord};

/// Tag used for lines that are not structured log records
pub const FALLBACK_TAG: &str = "daemon";

/// Message prefix printed once the Electrum RPC listener is bound
pub const READINESS_PHRASE: &str = "Electrum RPC server running";

/// Prefix of unstructured error lines (compared case-insensitively)
const ERROR_PREFIX: &str = "error: ";

static STRUCTURED_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?:(?P<ts>\d{4}-\d{2}-\d{2}T\S+)\s+)?(?P<level>ERROR|WARN|INFO|DEBUG|TRACE)\s+(?P<tag>[^\s>]+)\s*>\s?(?P<msg>.*)$",
    )
    .expect("Invalid STRUCTURED_LINE regex")
});

/// Classify one line of daemon output.
///
/// Tried in order:
/// 1. structured record: `(level, tag, message)`
/// 2. `error: ...` prefix (any case): `(ERROR, daemon, rest)`
/// 3. anything else: `(INFO, daemon, line)`
pub fn parse_log_line(raw: &str) -> LogRecord {
    let stripped = strip_ansi_codes(raw);
    let line = stripped.trim();

    if let Some(caps) = STRUCTURED_LINE.captures(line) {
        let level = caps
            .name("level")
            .and_then(|m| LogLevel::from_token(m.as_str()));
        if let (Some(level), Some(tag), Some(msg)) = (level, caps.name("tag"), caps.name("msg")) {
            let timestamp = caps.name("ts").and_then(|m| parse_timestamp(m.as_str()));
            return LogRecord::new(level, tag.as_str(), msg.as_str().trim())
                .with_timestamp(timestamp);
        }
    }

    if let Some(rest) = strip_error_prefix(line) {
        return LogRecord::new(LogLevel::Error, FALLBACK_TAG, rest);
    }

    LogRecord::new(LogLevel::Info, FALLBACK_TAG, line)
}

/// Whether a record announces that the daemon's RPC server is listening
pub fn is_readiness(record: &LogRecord) -> bool {
    record.message.starts_with(READINESS_PHRASE)
}

fn strip_error_prefix(line: &str) -> Option<&str> {
    let head = line.get(..ERROR_PREFIX.len())?;
    if head.eq_ignore_ascii_case(ERROR_PREFIX) {
        Some(&line[ERROR_PREFIX.len()..])
    } else {
        None
    }
}

fn parse_timestamp(ts: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(ts) {
        return Some(dt.with_timezone(&Utc));
    }
    // env_logger prints naive timestamps when no offset is configured
    NaiveDateTime::parse_from_str(ts, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}
