//! Datetime parsing for tool arguments
//!
//! The model is told the current local time without an offset, so it often
//! answers in kind. Offset-less values are interpreted in the user's timezone.

use chrono::{DateTime, FixedOffset, NaiveDateTime, SecondsFormat, TimeZone};
use chrono_tz::Tz;

const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
];

/// Parse an RFC 3339 timestamp, or a local one interpreted in `tz`
pub fn parse_instant(raw: &str, tz: Tz) -> Result<DateTime<FixedOffset>, String> {
    let raw = raw.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Ok(parsed);
    }

    let naive = NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .ok_or_else(|| {
            format!("'{raw}' is not a datetime; use ISO 8601 like 2026-10-16T16:00:00")
        })?;

    tz.from_local_datetime(&naive)
        .earliest()
        .map(|local| local.fixed_offset())
        .ok_or_else(|| format!("'{raw}' does not exist in timezone {tz}"))
}

/// Canonical wire form sent to the provider
pub fn to_wire(instant: &DateTime<FixedOffset>) -> String {
    instant.to_rfc3339_opts(SecondsFormat::Secs, false)
}
