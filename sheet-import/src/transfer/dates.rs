//! Date parsing for mixed-convention spreadsheet input
//!
//! Uploads mix day-first and month-first text, ISO dates and native
//! spreadsheet serials. Every entry point here is total: input that
//! cannot be read as a calendar date yields `None`.

use std::str::FromStr;

use chrono::{Datelike, Days, NaiveDate, NaiveDateTime};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::Value;

static SLASHED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{1,2})/(\d{1,2})/(\d{4})$").unwrap());
static DASHED_YMD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{4})-(\d{1,2})-(\d{1,2})$").unwrap());
static SERIAL: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d+$").unwrap());

/// Formats accepted by the generic fallback, tried in order
const GENERIC_DATETIME_FORMATS: &[&str] =
    &["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M"];
const GENERIC_DATE_FORMATS: &[&str] = &[
    "%Y/%m/%d",
    "%d-%m-%Y",
    "%d.%m.%Y",
    "%d %B %Y",
    "%d %b %Y",
    "%B %d, %Y",
    "%b %d, %Y",
];

/// Generic parses outside this range are treated as misreads
const MIN_YEAR: i32 = 1900;
const MAX_YEAR: i32 = 2100;

/// Day-order convention the uploader says the file uses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DateHint {
    /// Try day-first, then month-first, then ISO
    #[default]
    Auto,
    Dmy,
    Mdy,
    Ymd,
}

impl DateHint {
    fn conventions(&self) -> &'static [DateHint] {
        match self {
            DateHint::Auto => &[DateHint::Dmy, DateHint::Mdy, DateHint::Ymd],
            DateHint::Dmy => &[DateHint::Dmy, DateHint::Ymd],
            DateHint::Mdy => &[DateHint::Mdy, DateHint::Ymd],
            DateHint::Ymd => &[DateHint::Ymd],
        }
    }
}

impl FromStr for DateHint {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "auto" => Ok(DateHint::Auto),
            "dmy" | "dd/mm/yyyy" => Ok(DateHint::Dmy),
            "mdy" | "mm/dd/yyyy" => Ok(DateHint::Mdy),
            "ymd" | "yyyy-mm-dd" => Ok(DateHint::Ymd),
            other => Err(format!(
                "unknown date format '{}' (expected auto, dmy, mdy or ymd)",
                other
            )),
        }
    }
}

impl std::fmt::Display for DateHint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            DateHint::Auto => "auto",
            DateHint::Dmy => "dmy",
            DateHint::Mdy => "mdy",
            DateHint::Ymd => "ymd",
        };
        write!(f, "{}", s)
    }
}

/// Parse date text into canonical `YYYY-MM-DD`
pub fn parse_date(text: &str, hint: DateHint) -> Option<String> {
    parse_naive_date(text, hint).map(|d| d.format("%Y-%m-%d").to_string())
}

/// Parse date text, first success wins:
/// hinted conventions, spreadsheet serial, then generic calendar formats
pub fn parse_naive_date(text: &str, hint: DateHint) -> Option<NaiveDate> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    for convention in hint.conventions() {
        if let Some(date) = parse_convention(text, *convention) {
            return Some(date);
        }
    }

    if SERIAL.is_match(text) {
        return text.parse::<u64>().ok().and_then(serial_days_to_date);
    }

    parse_generic(text)
}

/// Read a typed cell as a date.
/// Date cells pass through; whole non-negative numbers are serials.
pub fn parse_date_value(value: &Value, hint: DateHint) -> Option<NaiveDate> {
    match value {
        Value::Date(d) => Some(*d),
        Value::String(s) => parse_naive_date(s, hint),
        Value::Int(i) => u64::try_from(*i).ok().and_then(serial_days_to_date),
        Value::Float(f) if f.fract() == 0.0 => serial_to_date(*f),
        _ => None,
    }
}

/// Convert a spreadsheet serial (days since 1899-12-30) to a date.
/// Any time-of-day fraction is dropped.
pub fn serial_to_date(serial: f64) -> Option<NaiveDate> {
    if !serial.is_finite() || serial < 0.0 {
        return None;
    }
    serial_days_to_date(serial.floor() as u64)
}

fn serial_days_to_date(days: u64) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(1899, 12, 30)?.checked_add_days(Days::new(days))
}

fn parse_convention(text: &str, convention: DateHint) -> Option<NaiveDate> {
    let (year, month, day) = match convention {
        DateHint::Dmy | DateHint::Mdy => {
            let caps = SLASHED.captures(text)?;
            let first: u32 = caps[1].parse().ok()?;
            let second: u32 = caps[2].parse().ok()?;
            let year: i32 = caps[3].parse().ok()?;
            if convention == DateHint::Dmy {
                (year, second, first)
            } else {
                (year, first, second)
            }
        }
        DateHint::Ymd => {
            let caps = DASHED_YMD.captures(text)?;
            (
                caps[1].parse().ok()?,
                caps[2].parse().ok()?,
                caps[3].parse().ok()?,
            )
        }
        DateHint::Auto => return None,
    };

    if !(1..=12).contains(&month) || !(1..=31).contains(&day) {
        return None;
    }

    let date = NaiveDate::from_ymd_opt(year, month, day)?;
    (date.year() == year && date.month() == month && date.day() == day).then_some(date)
}

fn parse_generic(text: &str) -> Option<NaiveDate> {
    let parsed = chrono::DateTime::parse_from_rfc3339(text)
        .map(|dt| dt.date_naive())
        .ok()
        .or_else(|| {
            GENERIC_DATETIME_FORMATS
                .iter()
                .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
                .map(|dt| dt.date())
        })
        .or_else(|| {
            GENERIC_DATE_FORMATS
                .iter()
                .find_map(|fmt| NaiveDate::parse_from_str(text, fmt).ok())
        })?;

    (MIN_YEAR..=MAX_YEAR)
        .contains(&parsed.year())
        .then_some(parsed)
}
