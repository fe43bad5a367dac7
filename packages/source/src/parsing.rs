//! Shared cell parsing helpers for crash and street inputs.

use chrono::{NaiveDate, NaiveDateTime};

const DATE_FORMATS: &[&str] = &["%m/%d/%Y", "%Y-%m-%d"];
const DATETIME_FORMATS: &[&str] = &["%m/%d/%Y %H:%M", "%m/%d/%Y %H:%M:%S", "%Y-%m-%dT%H:%M:%S"];

/// Parses a crash date cell. Accepts plain dates and date-times (the time
/// part is dropped). Returns `None` for blank or unrecognized values.
#[must_use]
pub fn parse_crash_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    for fmt in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(s, fmt) {
            return Some(date);
        }
    }
    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt.date());
        }
    }
    None
}

/// Parses a severity cell: blank means zero people.
///
/// # Errors
///
/// Returns the offending text if the cell is neither blank nor an
/// unsigned integer.
pub fn parse_severity(s: &str) -> Result<u32, String> {
    let s = s.trim();
    if s.is_empty() {
        return Ok(0);
    }
    s.parse::<u32>().map_err(|_| s.to_string())
}

/// Parses an integer identifier cell, tolerating a trailing `.0` that
/// spreadsheet exports like to add.
#[must_use]
pub fn parse_id(s: &str) -> Option<u64> {
    let s = s.trim();
    if let Ok(v) = s.parse::<u64>() {
        return Some(v);
    }
    let f = s.parse::<f64>().ok()?;
    if f.is_finite() && f >= 0.0 && f.fract() == 0.0 {
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        return Some(f as u64);
    }
    None
}

/// Parses a distance-from-intersection cell in whole feet.
#[must_use]
pub fn parse_distance(s: &str) -> Option<u32> {
    let s = s.trim();
    if let Ok(v) = s.parse::<u32>() {
        return Some(v);
    }
    let f = s.parse::<f64>().ok()?;
    if f.is_finite() && f >= 0.0 && f <= f64::from(u32::MAX) {
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        return Some(f.round() as u32);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_us_date() {
        let d = parse_crash_date("03/14/2019").unwrap();
        assert_eq!(d.to_string(), "2019-03-14");
    }

    #[test]
    fn parses_iso_date_and_datetime() {
        assert_eq!(
            parse_crash_date("2019-03-14").unwrap().to_string(),
            "2019-03-14"
        );
        assert_eq!(
            parse_crash_date("2019-03-14T08:15:00").unwrap().to_string(),
            "2019-03-14"
        );
        assert_eq!(
            parse_crash_date("3/4/2019 17:05").unwrap().to_string(),
            "2019-03-04"
        );
    }

    #[test]
    fn rejects_invalid_date() {
        assert!(parse_crash_date("yesterday").is_none());
        assert!(parse_crash_date("  ").is_none());
    }

    #[test]
    fn blank_severity_is_zero() {
        assert_eq!(parse_severity(""), Ok(0));
        assert_eq!(parse_severity(" 2 "), Ok(2));
        assert_eq!(parse_severity("two"), Err("two".to_string()));
    }

    #[test]
    fn parses_ids_with_float_suffix() {
        assert_eq!(parse_id("1234"), Some(1234));
        assert_eq!(parse_id("1234.0"), Some(1234));
        assert_eq!(parse_id("12.5"), None);
        assert_eq!(parse_id(""), None);
    }

    #[test]
    fn parses_distances() {
        assert_eq!(parse_distance("150"), Some(150));
        assert_eq!(parse_distance("99.6"), Some(100));
        assert_eq!(parse_distance("-5"), None);
        assert_eq!(parse_distance("far"), None);
    }
}
