use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime};
use once_cell::sync::Lazy;
use regex::Regex;

use super::{utils::clean_str, utils::is_na, Value};

const EARLIEST_YEAR: i32 = 1000;
const LATEST_YEAR: i32 = 9999;

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y/%m/%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%m/%d/%Y %H:%M:%S",
];

const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%m/%d/%Y",
    "%Y %b %d",
    "%Y %B %d",
    "%b %d %Y",
    "%B %d %Y",
    "%d %b %Y",
    "%d %B %Y",
];

/// `YYYY-MM`, `YYYY/MM`, `YYYY Mon`
static YEAR_MONTH: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{4})[-/ ](\d{1,2}|[A-Za-z]{3,9})$").expect("valid regex"));

/// `Mar 2020`, `March 2020`, `03/2020`
static MONTH_YEAR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{1,2}|[A-Za-z]{3,9})[-/ ](\d{4})$").expect("valid regex"));

/// Tolerant parse of a free-form date cell. `None` means unparseable.
pub fn parse_datetime(raw: &str) -> Option<NaiveDateTime> {
    let s = clean_str(raw);
    if is_na(&s) {
        return None;
    }
    // "Mar 27, 2020" -> "Mar 27 2020"
    let s = s.replace(',', "");
    let s = s.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return in_range(dt.naive_utc());
    }
    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return in_range(dt);
        }
    }
    for fmt in DATE_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return in_range(d.and_hms_opt(0, 0, 0)?);
        }
    }
    if let Some(caps) = YEAR_MONTH.captures(s) {
        return first_of_month(&caps[1], &caps[2]);
    }
    if let Some(caps) = MONTH_YEAR.captures(s) {
        return first_of_month(&caps[2], &caps[1]);
    }
    if s.len() == 4 && s.chars().all(|c| c.is_ascii_digit()) {
        let year: i32 = s.parse().ok()?;
        return in_range(NaiveDate::from_ymd_opt(year, 1, 1)?.and_hms_opt(0, 0, 0)?);
    }
    None
}

/// Parse a typed cell. Integers are read from their decimal text; floats only
/// when they are whole years (`2020.0` from a float-typed export).
pub fn parse_value(value: &Value) -> Option<NaiveDateTime> {
    match value {
        Value::Null => None,
        Value::Text(s) => parse_datetime(s),
        Value::Integer(i) => parse_datetime(&i.to_string()),
        Value::Float(f) if f.fract() == 0.0 && (1000.0..=9999.0).contains(f) => {
            parse_datetime(&format!("{}", *f as i64))
        }
        Value::Float(_) => None,
    }
}

fn first_of_month(year: &str, month: &str) -> Option<NaiveDateTime> {
    let year: i32 = year.parse().ok()?;
    let month = month_number(month)?;
    in_range(NaiveDate::from_ymd_opt(year, month, 1)?.and_hms_opt(0, 0, 0)?)
}

fn month_number(token: &str) -> Option<u32> {
    if let Ok(m) = token.parse::<u32>() {
        return (1..=12).contains(&m).then_some(m);
    }
    let probe = format!("2000 {} 01", token);
    NaiveDate::parse_from_str(&probe, "%Y %b %d")
        .or_else(|_| NaiveDate::parse_from_str(&probe, "%Y %B %d"))
        .ok()
        .map(|d| d.month())
}

fn in_range(dt: NaiveDateTime) -> Option<NaiveDateTime> {
    (EARLIEST_YEAR..=LATEST_YEAR)
        .contains(&dt.year())
        .then_some(dt)
}
