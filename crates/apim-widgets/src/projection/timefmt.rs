//! Time parsing, formatting and bucketing. All times are UTC.

use apim_widgets_api::Value;
use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, TimeZone, Timelike, Utc};
use serde::{Deserialize, Serialize};

/// `2024-Jan-01 10:15:00 AM`, used for creation times in tables.
pub const CREATED_TIME_FORMAT: &str = "%Y-%b-%d %I:%M:%S %p";
/// `2024-01-01 10:15:00`, the form relational queries expect.
pub const QUERY_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
/// `2024/01/01 10:15`, used on the error analysis chart axis.
pub const AXIS_TIME_FORMAT: &str = "%Y/%m/%d %H:%M";

const NAIVE_DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M",
    "%Y-%b-%d %I:%M:%S %p",
    "%Y-%b-%d %H:%M:%S",
    "%Y-%b-%d %H:%M",
];

const NAIVE_DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%Y-%b-%d"];

/// Aggregation granularity published by the date-time range picker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    #[default]
    Second,
    Minute,
    Hour,
    Day,
    Month,
    Year,
}

impl Granularity {
    /// Parse a granularity name; anything unrecognised means seconds.
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "minute" | "minutes" => Granularity::Minute,
            "hour" | "hours" => Granularity::Hour,
            "day" | "days" => Granularity::Day,
            "month" | "months" => Granularity::Month,
            "year" | "years" => Granularity::Year,
            _ => Granularity::Second,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Granularity::Second => "second",
            Granularity::Minute => "minute",
            Granularity::Hour => "hour",
            Granularity::Day => "day",
            Granularity::Month => "month",
            Granularity::Year => "year",
        }
    }

    /// Format of the bucket key for this granularity.
    pub fn key_format(&self) -> &'static str {
        match self {
            Granularity::Second => "%Y-%b-%d %H:%M:%S",
            Granularity::Minute => "%Y-%b-%d %H:%M",
            Granularity::Hour => "%Y-%b-%d %H",
            Granularity::Day => "%Y-%b-%d",
            Granularity::Month => "%Y-%b",
            Granularity::Year => "%Y",
        }
    }

    /// Start of the bucket containing `t`.
    pub fn truncate(&self, t: DateTime<Utc>) -> DateTime<Utc> {
        let (year, month, day) = (t.year(), t.month(), t.day());
        let (hour, minute, second) = (t.hour(), t.minute(), t.second());
        let start = match self {
            Granularity::Second => Utc.with_ymd_and_hms(year, month, day, hour, minute, second),
            Granularity::Minute => Utc.with_ymd_and_hms(year, month, day, hour, minute, 0),
            Granularity::Hour => Utc.with_ymd_and_hms(year, month, day, hour, 0, 0),
            Granularity::Day => Utc.with_ymd_and_hms(year, month, day, 0, 0, 0),
            Granularity::Month => Utc.with_ymd_and_hms(year, month, 1, 0, 0, 0),
            Granularity::Year => Utc.with_ymd_and_hms(year, 1, 1, 0, 0, 0),
        };
        start.single().unwrap_or(t)
    }

    pub fn bucket_key(&self, t: DateTime<Utc>) -> String {
        t.format(self.key_format()).to_string()
    }
}

/// Interpret a result cell as a point in time.
///
/// Numbers (and all-digit strings) are epoch milliseconds. Strings may be
/// RFC 3339 or one of the naive forms emitted by the query engines and by
/// this crate's own formatters; naive forms are read as UTC.
pub fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::Integer(ms) => DateTime::from_timestamp_millis(*ms),
        Value::Float(ms) if ms.is_finite() => DateTime::from_timestamp_millis(*ms as i64),
        Value::String(s) => parse_timestamp_str(s),
        _ => None,
    }
}

pub fn parse_timestamp_str(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    if s.bytes().all(|b| b.is_ascii_digit()) {
        return s.parse::<i64>().ok().and_then(DateTime::from_timestamp_millis);
    }
    if let Ok(t) = DateTime::parse_from_rfc3339(s) {
        return Some(t.with_timezone(&Utc));
    }
    for fmt in NAIVE_DATETIME_FORMATS {
        if let Ok(t) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(t.and_utc());
        }
    }
    for fmt in NAIVE_DATE_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return d.and_hms_opt(0, 0, 0).map(|t| t.and_utc());
        }
    }
    None
}

/// Format epoch milliseconds with a chrono pattern.
pub fn format_millis(ms: i64, pattern: &str) -> Option<String> {
    DateTime::from_timestamp_millis(ms).map(|t| t.format(pattern).to_string())
}
