//! Absolute timestamps from RMC sentences
//!
//! RMC is the only widely available sentence type that carries both the
//! time of day and the calendar date, so every other type yields `None`.

use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};

use crate::core::sentence::type_code;

/// Sentence types that carry a full date and time
const TIME_BEARING_TYPES: &[&str] = &["RMC"];

const TIME_FIELD: usize = 1;
const DATE_FIELD: usize = 9;

/// Extract the UTC timestamp of a validated sentence, if it carries one
pub fn extract_timestamp(line: &str) -> Option<DateTime<Utc>> {
    let code = type_code(line)?;
    if !TIME_BEARING_TYPES.contains(&code) {
        return None;
    }

    // Checksum suffix must not leak into the last field
    let body = line.split_once('*').map_or(line, |(body, _)| body);
    let fields: Vec<&str> = body.split(',').collect();

    let time = parse_time(fields.get(TIME_FIELD)?)?;
    let date = parse_date(fields.get(DATE_FIELD)?)?;
    Some(Utc.from_utc_datetime(&date.and_time(time)))
}

/// Parse `HHMMSS[.f+]`
fn parse_time(field: &str) -> Option<NaiveTime> {
    let (whole, frac) = match field.split_once('.') {
        Some((whole, frac)) => (whole, Some(frac)),
        None => (field, None),
    };
    if whole.len() != 6 {
        return None;
    }

    let hours = parse_digits(whole.get(0..2)?)?;
    let minutes = parse_digits(whole.get(2..4)?)?;
    let seconds = parse_digits(whole.get(4..6)?)?;
    let millis = match frac {
        Some(frac) => parse_fraction_millis(frac)?,
        None => 0,
    };

    NaiveTime::from_hms_milli_opt(hours, minutes, seconds, millis)
}

/// Parse `DDMMYY`, years taken as 2000 + YY
fn parse_date(field: &str) -> Option<NaiveDate> {
    if field.len() != 6 {
        return None;
    }
    let day = parse_digits(field.get(0..2)?)?;
    let month = parse_digits(field.get(2..4)?)?;
    let year = parse_digits(field.get(4..6)?)?;

    NaiveDate::from_ymd_opt(2000 + year as i32, month, day)
}

/// Fractional seconds to milliseconds; ".5" is 500 ms, ".25" is 250 ms
fn parse_fraction_millis(frac: &str) -> Option<u32> {
    if frac.is_empty() {
        return Some(0);
    }
    let digits = frac.get(..frac.len().min(3))?;
    let value = parse_digits(digits)?;
    Some(value * 10u32.pow(3 - digits.len() as u32))
}

fn parse_digits(s: &str) -> Option<u32> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}
