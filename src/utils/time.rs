//! Time helpers: feed date parsing and the timestamp formats we emit

use chrono::{DateTime, SecondsFormat, Utc};

/// Row timestamp format of the record log (dygraphs-compatible)
pub const RECORD_TIMESTAMP_FORMAT: &str = "%Y/%m/%d %H:%M:%S";

/// Human-readable time used in status output
pub const STATUS_TIMESTAMP_FORMAT: &str = "%d/%m/%Y at %H:%M:%S";

/// Parse a feed entry date (RFC 3339 for Atom, RFC 2822 for RSS)
pub fn parse_feed_date(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }

    if let Ok(dt) = DateTime::parse_from_rfc2822(value) {
        return Some(dt.with_timezone(&Utc));
    }

    None
}

/// Seconds since the epoch with sub-second precision
pub fn epoch_seconds(time: DateTime<Utc>) -> f64 {
    time.timestamp() as f64 + f64::from(time.timestamp_subsec_nanos()) / 1_000_000_000.0
}

/// Format a timestamp for a record log row
pub fn format_record_timestamp(time: DateTime<Utc>) -> String {
    time.format(RECORD_TIMESTAMP_FORMAT).to_string()
}

/// Format a timestamp for status output
pub fn format_status_timestamp(time: DateTime<Utc>) -> String {
    time.format(STATUS_TIMESTAMP_FORMAT).to_string()
}

/// ISO 8601 timestamp with a `Z` suffix, second precision
pub fn format_iso8601(time: DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Secs, true)
}
