// src/utils/time.rs

//! Timestamp parsing for feed and page metadata.
//!
//! Feeds are sloppy about dates. Accepted, in order:
//! RFC 3339, RFC 2822, ISO-like date-times with or without an offset,
//! and bare dates (`2020-01-01`, `2020/01/01`, `January 1, 2020`,
//! `1 January 2020`). Values without an offset are taken as UTC.
//!
//! When none of these match, a leading weekday name is dropped, a trailing
//! `UTC`/`GMT`/`UT`/`Z` becomes `+0000`, and the value is tried again.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

const OFFSET_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f%z",
    "%Y-%m-%dT%H:%M:%S%z",
    "%Y-%m-%d %H:%M:%S%.f%z",
    "%Y-%m-%d %H:%M:%S%z",
    "%Y-%m-%dT%H:%M%z",
    "%Y-%m-%d %H:%M:%S %z",
    "%d %b %Y %H:%M:%S %z",
    "%d %b %Y %H:%M %z",
];

const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%Y/%m/%d %H:%M",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%B %d, %Y", "%d %B %Y"];

const WEEKDAYS: &[&str] = &["mon", "tue", "wed", "thu", "fri", "sat", "sun"];

const UTC_NAMES: &[&str] = &[" UTC", " GMT", " UT", " Z"];

/// Parse a timestamp string to epoch seconds.
pub fn to_epoch(value: &str) -> Option<i64> {
    parse_timestamp(value).map(|dt| dt.timestamp())
}

/// Parse a timestamp string to a UTC date-time.
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    parse_strict(value).or_else(|| {
        let normalized = normalize(value);
        if normalized == value {
            None
        } else {
            parse_strict(&normalized)
        }
    })
}

fn parse_strict(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(value) {
        return Some(dt.with_timezone(&Utc));
    }
    for format in OFFSET_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(value, format) {
            return Some(dt.with_timezone(&Utc));
        }
    }
    for format in NAIVE_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(value, format) {
            return Some(dt.and_utc());
        }
    }
    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(value, format).ok())
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}

/// Drop a leading `Weekday,` and spell UTC zone names as `+0000`.
fn normalize(value: &str) -> String {
    let rest = match value.split_once(',') {
        Some((head, tail)) if is_weekday(head.trim()) => tail.trim(),
        _ => value,
    };

    for zone in UTC_NAMES {
        if let Some(body) = rest.strip_suffix(zone) {
            return format!("{} +0000", body.trim_end());
        }
    }
    rest.to_string()
}

fn is_weekday(word: &str) -> bool {
    let lower = word.to_ascii_lowercase();
    word.len() >= 3
        && word.chars().all(|c| c.is_ascii_alphabetic())
        && WEEKDAYS.iter().any(|day| lower.starts_with(day))
}
