//! Fail-soft field parsing shared by the write path (record mapping) and the
//! read path (stored-document decoding).
//!
//! A malformed value never aborts anything: it collapses to a fixed default
//! (`0`, `0.0`, or [`sentinel_date`]).

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use std::str::FromStr;

/// Day-resolution encoding used for the indexed release date.
pub const DAY_FORMAT: &str = "%Y%m%d";

/// Lowest encodable date (0001-01-01); stands in for missing or unparsable
/// release dates.
pub fn sentinel_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(1, 1, 1).unwrap_or(NaiveDate::MIN)
}

/// Highest encodable date (9999-12-31); the open upper end of a release date range.
pub fn max_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(9999, 12, 31).unwrap_or(NaiveDate::MAX)
}

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y", "%Y%m%d"];
const DATETIME_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"];

/// Parse a trimmed value, falling back to `T::default()`.
pub fn parse_or_default<T: FromStr + Default>(raw: &str) -> T {
    raw.trim().parse().unwrap_or_default()
}

/// Vote averages additionally reject NaN and infinities.
pub fn parse_vote_average(raw: &str) -> f64 {
    finite_or_zero(parse_or_default(raw))
}

pub fn finite_or_zero(value: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        0.0
    }
}

/// Stored runtimes are i64; anything outside the i32 range decodes to 0.
pub fn narrow_runtime(value: i64) -> i32 {
    i32::try_from(value).unwrap_or_default()
}

/// Parse a date in any of the accepted layouts, or `None`.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(raw, format).ok())
        .or_else(|| {
            DATETIME_FORMATS
                .iter()
                .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
                .map(|dt| dt.date())
        })
        .or_else(|| {
            DateTime::parse_from_rfc3339(raw)
                .ok()
                .map(|dt| dt.date_naive())
        })
}

/// Parse a catalog release date; anything unparsable or outside the
/// encodable range becomes [`sentinel_date`].
pub fn parse_release_date(raw: &str) -> NaiveDate {
    match parse_date(raw) {
        Some(date) if (sentinel_date()..=max_date()).contains(&date) => date,
        _ => sentinel_date(),
    }
}

/// Pull a date into the encodable range so range bounds keep their order.
pub fn clamp_date(date: NaiveDate) -> NaiveDate {
    date.clamp(sentinel_date(), max_date())
}

/// `YYYYMMDD`; lexicographic order equals chronological order.
pub fn encode_day(date: NaiveDate) -> String {
    date.format(DAY_FORMAT).to_string()
}

pub fn decode_day(encoded: &str) -> NaiveDate {
    NaiveDate::parse_from_str(encoded.trim(), DAY_FORMAT).unwrap_or_else(|_| sentinel_date())
}
