use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

/// Epoch values above this are already milliseconds.
const MILLIS_EPOCH_CUTOFF: f64 = 1e11;

static NON_NUMERIC_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^0-9.+\-]+").expect("Invalid regex: non numeric chars"));

static LEADING_NUMBER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[+-]?(?:\d+(?:\.\d*)?|\.\d+)").expect("Invalid regex: leading number")
});

static LEADING_FLOAT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[+-]?(?:\d+(?:\.\d*)?|\.\d+)(?:[eE][+-]?\d+)?")
        .expect("Invalid regex: leading float")
});

static YEAR_ONLY: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{4}$").expect("Invalid regex: year"));
static YEAR_MONTH: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d{4}-\d{2}$").expect("Invalid regex: year month"));

const DATETIME_FORMATS: [&str; 6] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%m/%d/%Y %H:%M:%S",
    "%d/%m/%Y %H:%M:%S",
];

// Month-first before day-first: "01/02/2024" reads as January 2nd.
const DATE_FORMATS: [&str; 5] = ["%Y-%m-%d", "%m/%d/%Y", "%d/%m/%Y", "%Y/%m/%d", "%d-%m-%Y"];

/// Lossy numeric parse. Everything but digits, signs and dots is stripped,
/// then the longest numeric prefix is read. Anything unreadable is `0`.
pub fn parse_number(raw: &Value) -> f64 {
    match raw {
        Value::Null => 0.0,
        Value::Number(n) => n.as_f64().unwrap_or(0.0),
        Value::String(s) => parse_number_str(s),
        other => parse_number_str(&other.to_string()),
    }
}

pub fn parse_number_str(raw: &str) -> f64 {
    let cleaned = NON_NUMERIC_CHARS.replace_all(raw, "");
    LEADING_NUMBER
        .find(&cleaned)
        .and_then(|m| m.as_str().parse::<f64>().ok())
        .filter(|n| n.is_finite())
        .unwrap_or(0.0)
}

/// Strict float read of a raw value: leading whitespace is skipped and the
/// numeric prefix must be present. No character stripping.
pub fn parse_float(raw: &Value) -> Option<f64> {
    let parsed = match raw {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => LEADING_FLOAT
            .find(s.trim_start())
            .and_then(|m| m.as_str().parse::<f64>().ok()),
        _ => None,
    };
    parsed.filter(|n| n.is_finite())
}

/// Reads a timestamp from an ISO-8601 / common date string or an epoch number.
pub fn parse_timestamp(raw: &Value) -> Option<DateTime<Utc>> {
    match raw {
        Value::Number(n) => n.as_f64().and_then(from_epoch),
        Value::String(s) => parse_timestamp_str(s),
        _ => None,
    }
}

pub fn parse_timestamp_str(raw: &str) -> Option<DateTime<Utc>> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }

    if YEAR_ONLY.is_match(s) {
        return NaiveDate::parse_from_str(&format!("{}-01-01", s), "%Y-%m-%d")
            .ok()
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(|d| Utc.from_utc_datetime(&d));
    }

    if YEAR_MONTH.is_match(s) {
        return NaiveDate::parse_from_str(&format!("{}-01", s), "%Y-%m-%d")
            .ok()
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(|d| Utc.from_utc_datetime(&d));
    }

    for format in DATETIME_FORMATS.iter() {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, format) {
            return Some(Utc.from_utc_datetime(&dt));
        }
    }

    for format in DATE_FORMATS.iter() {
        if let Ok(date) = NaiveDate::parse_from_str(s, format) {
            return date.and_hms_opt(0, 0, 0).map(|d| Utc.from_utc_datetime(&d));
        }
    }

    s.parse::<f64>().ok().and_then(from_epoch)
}

fn from_epoch(n: f64) -> Option<DateTime<Utc>> {
    if !n.is_finite() {
        return None;
    }
    let millis = if n > MILLIS_EPOCH_CUTOFF { n } else { n * 1000.0 };
    Utc.timestamp_millis_opt(millis as i64).single()
}

/// Sort key for an optional timestamp; unparsable sorts at epoch 0.
pub fn sort_key(ts: Option<&DateTime<Utc>>) -> i64 {
    ts.map(|d| d.timestamp_millis()).unwrap_or(0)
}

pub fn format_date(ts: &DateTime<Utc>) -> String {
    ts.format("%Y-%m-%d").to_string()
}

/// A missing key and a JSON null are both "no value".
pub fn is_missing(value: Option<&Value>) -> bool {
    matches!(value, None | Some(Value::Null))
}

/// Missing, JSON null, empty or the literal string "null".
pub fn is_null_like(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.trim().is_empty() || s == "null",
        _ => false,
    }
}

pub fn value_as_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
