//! Date and time parsing for report fields.
//!
//! Dates are written month/day/year and are supposed to use slashes, but
//! dashes show up too. Years are frequently truncated by hand entry, so
//! [`normalize_year`] applies a lossy, best-effort repair: it is a heuristic
//! for this document family, not a general date parser.

use chrono::{NaiveDate, NaiveTime};

use super::patterns::{COMPACT_TIME, DATE_SEPARATOR};
use crate::error::ConversionError;

/// Parse a `M/D/Y` or `M-D-Y` date.
pub fn parse_date(text: &str) -> Result<NaiveDate, ConversionError> {
    let text = text.trim();
    let parts: Vec<&str> = DATE_SEPARATOR.split(text).map(str::trim).collect();
    let [month, day, year] = parts.as_slice() else {
        return Err(ConversionError::new(
            "Date",
            text,
            format!("expected 3 date components, found {}", parts.len()),
        ));
    };

    let month: u32 = month
        .parse()
        .map_err(|e| ConversionError::new("Date", text, format!("bad month: {e}")))?;
    let day: u32 = day
        .parse()
        .map_err(|e| ConversionError::new("Date", text, format!("bad day: {e}")))?;
    let year: i32 = year
        .parse()
        .map_err(|e| ConversionError::new("Date", text, format!("bad year: {e}")))?;

    let year = normalize_year(year)
        .ok_or_else(|| ConversionError::new("Date", text, format!("year {year} before 1900")))?;

    NaiveDate::from_ymd_opt(year, month, day)
        .ok_or_else(|| ConversionError::new("Date", text, "no such calendar date"))
}

/// Repair truncated years.
///
/// - `0..=99` is a two-digit year in the 1900s.
/// - `191..=219` is a four-digit year missing a digit (`195` for 1995,
///   `213` for 2013) and gets 1800 added.
/// - anything still before 1900 cannot be interpreted and is rejected.
pub fn normalize_year(year: i32) -> Option<i32> {
    let year = if (0..100).contains(&year) {
        year + 1900
    } else if year > 190 && year < 220 {
        year + 1800
    } else {
        year
    };
    (year >= 1900).then_some(year)
}

/// Parse `HH:MM` or compact `HHMM` times.
pub fn parse_time(text: &str) -> Result<NaiveTime, ConversionError> {
    let text = text.trim();
    let (hours, minutes) = if let Some((hours, minutes)) = text.split_once(':') {
        (hours.trim(), minutes.trim())
    } else if let Some(caps) = COMPACT_TIME.captures(text) {
        (caps.get(1).map_or("", |m| m.as_str()), caps.get(2).map_or("", |m| m.as_str()))
    } else {
        return Err(ConversionError::new("Time", text, "expected HH:MM or HHMM"));
    };

    let hours: u32 = hours
        .parse()
        .map_err(|e| ConversionError::new("Time", text, format!("bad hours: {e}")))?;
    let minutes: u32 = minutes
        .parse()
        .map_err(|e| ConversionError::new("Time", text, format!("bad minutes: {e}")))?;

    NaiveTime::from_hms_opt(hours, minutes, 0)
        .ok_or_else(|| ConversionError::new("Time", text, "time out of range"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_parse_date_separators() {
        assert_eq!(parse_date("03-04-2019").unwrap(), date(2019, 3, 4));
        assert_eq!(parse_date("03/04/2019").unwrap(), date(2019, 3, 4));
        assert_eq!(parse_date("3/4-2019\n").unwrap(), date(2019, 3, 4));
    }

    #[test]
    fn test_two_digit_year() {
        assert_eq!(parse_date("12/31/99").unwrap(), date(1999, 12, 31));
        assert_eq!(parse_date("1/2/05").unwrap(), date(1905, 1, 2));
    }

    #[test]
    fn test_truncated_four_digit_year() {
        assert_eq!(parse_date("06/15/195").unwrap(), date(1995, 6, 15));
        assert_eq!(parse_date("06/15/213").unwrap(), date(2013, 6, 15));
    }

    #[test]
    fn test_unrepairable_years_rejected() {
        assert!(parse_date("06/15/150").is_err());
        assert!(parse_date("06/15/190").is_err());
        assert!(parse_date("06/15/1850").is_err());
        assert_eq!(normalize_year(220), None);
    }

    #[test]
    fn test_malformed_dates() {
        assert!(parse_date("2019").is_err());
        assert!(parse_date("13/01/2019").is_err());
        assert!(parse_date("02/30/2019").is_err());
        assert!(parse_date("aa/bb/cc").is_err());
        assert!(parse_date("1/2/3/4").is_err());
    }

    #[test]
    fn test_parse_time() {
        assert_eq!(parse_time("14:05").unwrap(), NaiveTime::from_hms_opt(14, 5, 0).unwrap());
        assert_eq!(parse_time("0930").unwrap(), NaiveTime::from_hms_opt(9, 30, 0).unwrap());
        assert_eq!(parse_time(" 7:45 ").unwrap(), NaiveTime::from_hms_opt(7, 45, 0).unwrap());
    }

    #[test]
    fn test_parse_time_rejects_garbage() {
        assert!(parse_time("2561").is_err());
        assert!(parse_time("930").is_err());
        assert!(parse_time("noon").is_err());
        assert!(parse_time("12:75").is_err());
    }
}
