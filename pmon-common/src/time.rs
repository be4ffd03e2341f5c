//! Timestamp utilities
//!
//! Timestamps are stored as fixed-width RFC 3339 UTC strings
//! (`2024-05-01T12:00:00.000000Z`) so that string comparison in SQL
//! orders the same way as the instants themselves.

use chrono::{DateTime, Duration, SecondsFormat, SubsecRound, Utc};

use crate::{Error, Result};

/// Current UTC time at storage precision (microseconds)
pub fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

/// Format a timestamp for storage
pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Parse a stored timestamp
pub fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::InvalidInput(format!("Invalid timestamp '{}': {}", value, e)))
}

/// Trailing window `[end - days, end]`
pub fn trailing_window(end: DateTime<Utc>, days: i64) -> (DateTime<Utc>, DateTime<Utc>) {
    (end - Duration::days(days), end)
}
