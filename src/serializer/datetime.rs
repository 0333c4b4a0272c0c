//! DateTime wire format
//!
//! Encoded as `YYYY-MM-DDTHH:mm:ss.SSS` followed by `Z` (zero offset) or
//! `±HH:mm`. Strict parsing requires an explicit offset; lenient parsing also
//! accepts naive date-times and plain dates, applying a default offset.

use std::sync::LazyLock;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, Offset, TimeZone, Utc};
use regex::Regex;

static QUALIFIED_DATE_TIME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\d{4}-\d{2}-\d{2}T\d{2}:\d{2}:\d{2}(\.\d+)?(Z|[+-]\d{2}:\d{2})$")
        .expect("valid date-time pattern")
});

const NAIVE_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// Offset `minutes` east of UTC, or UTC when out of range
pub fn offset(minutes: i32) -> FixedOffset {
    FixedOffset::east_opt(minutes.saturating_mul(60)).unwrap_or_else(|| Utc.fix())
}

/// Render in the given UTC offset (minutes)
pub fn format_datetime(value: &DateTime<FixedOffset>, utc_offset: i32) -> String {
    let zone = offset(utc_offset);
    let shifted = value.with_timezone(&zone);
    let base = shifted.format("%Y-%m-%dT%H:%M:%S%.3f").to_string();
    if zone.local_minus_utc() == 0 {
        format!("{}Z", base)
    } else {
        format!("{}{}", base, shifted.format("%:z"))
    }
}

/// Parse a wire date-time.
///
/// `strict` requires `Z` or an explicit offset; otherwise values without an
/// offset are interpreted at `default_offset` minutes east of UTC.
pub fn parse_datetime(text: &str, strict: bool, default_offset: i32) -> Option<DateTime<FixedOffset>> {
    if strict {
        if !QUALIFIED_DATE_TIME.is_match(text) {
            return None;
        }
        return DateTime::parse_from_rfc3339(text).ok();
    }

    if let Ok(parsed) = DateTime::parse_from_rfc3339(text) {
        return Some(parsed);
    }

    let zone = offset(default_offset);
    let naive = NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(text, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })?;
    zone.from_local_datetime(&naive).single()
}
