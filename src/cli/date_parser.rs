//! Date parsing for the `--from` / `--to` report bounds
//!
//! Accepts absolute ISO 8601 dates and a small set of relative forms:
//! - Absolute: "2024-01-01", "2024-01-01T10:30:00", "2024-01-01T10:30:00+02:00"
//! - Relative: "now", "today", "yesterday", "3 days ago", "2 months ago"
//!
//! Dates without a timezone are taken as UTC so reports are reproducible
//! regardless of where they are generated.

use chrono::{DateTime, Duration, Months, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum DateParseError {
    #[error("Invalid date format: {input}. Expected ISO 8601 (YYYY-MM-DD) or relative format (e.g. '2 weeks ago')")]
    InvalidFormat { input: String },

    #[error("Unsupported time unit: {unit}. Supported units: minutes, hours, days, weeks, months, years")]
    UnsupportedUnit { unit: String },

    #[error("Invalid number in relative date: {input}")]
    InvalidNumber { input: String },

    #[error("Date is out of range: {input}")]
    OutOfRange { input: String },

    #[error("Date range validation failed: start date {start} is after end date {end}")]
    InvalidRange { start: String, end: String },
}

/// Parse a date relative to `now`
///
/// ```
/// use chrono::{TimeZone, Utc};
/// use compliance_report::cli::date_parser::parse_date;
///
/// let now = Utc.with_ymd_and_hms(2024, 3, 15, 12, 0, 0).unwrap();
/// assert_eq!(parse_date("2024-01-01", now).unwrap(), Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
/// assert_eq!(parse_date("1 month ago", now).unwrap(), Utc.with_ymd_and_hms(2024, 2, 15, 12, 0, 0).unwrap());
/// ```
pub fn parse_date(input: &str, now: DateTime<Utc>) -> Result<DateTime<Utc>, DateParseError> {
    let trimmed = input.trim();

    if let Some(parsed) = parse_absolute_date(trimmed) {
        return Ok(parsed);
    }

    parse_relative_date(trimmed, now)
}

fn parse_absolute_date(input: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(input) {
        return Some(dt.with_timezone(&Utc));
    }

    for format in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(input, format) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }

    NaiveDate::parse_from_str(input, "%Y-%m-%d")
        .ok()
        .map(|date| Utc.from_utc_datetime(&date.and_time(NaiveTime::MIN)))
}

fn parse_relative_date(input: &str, now: DateTime<Utc>) -> Result<DateTime<Utc>, DateParseError> {
    let lower = input.to_lowercase();
    let midnight = |ts: DateTime<Utc>| Utc.from_utc_datetime(&ts.date_naive().and_time(NaiveTime::MIN));

    match lower.as_str() {
        "now" => return Ok(now),
        "today" => return Ok(midnight(now)),
        "yesterday" => return Ok(midnight(now - Duration::days(1))),
        _ => {}
    }

    let parts: Vec<&str> = lower.split_whitespace().collect();
    let [number, unit, "ago"] = parts.as_slice() else {
        return Err(DateParseError::InvalidFormat { input: input.to_string() });
    };

    let amount = number
        .parse::<u32>()
        .map_err(|_| DateParseError::InvalidNumber { input: input.to_string() })?;
    let out_of_range = || DateParseError::OutOfRange { input: input.to_string() };

    let result = match *unit {
        "minute" | "minutes" => now.checked_sub_signed(Duration::minutes(amount.into())),
        "hour" | "hours" => now.checked_sub_signed(Duration::hours(amount.into())),
        "day" | "days" => now.checked_sub_signed(Duration::days(amount.into())),
        "week" | "weeks" => now.checked_sub_signed(Duration::weeks(amount.into())),
        "month" | "months" => now.checked_sub_months(Months::new(amount)),
        "year" | "years" => amount
            .checked_mul(12)
            .and_then(|months| now.checked_sub_months(Months::new(months))),
        other => return Err(DateParseError::UnsupportedUnit { unit: other.to_string() }),
    };

    result.ok_or_else(out_of_range)
}

/// Validate that a start/end pair is ordered
pub fn validate_date_range(start: Option<&str>, end: Option<&str>, now: DateTime<Utc>) -> Result<(), DateParseError> {
    if let (Some(start_str), Some(end_str)) = (start, end) {
        if parse_date(start_str, now)? > parse_date(end_str, now)? {
            return Err(DateParseError::InvalidRange {
                start: start_str.to_string(),
                end: end_str.to_string(),
            });
        }
    }
    Ok(())
}
