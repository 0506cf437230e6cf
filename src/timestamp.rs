//! Lenient timestamp parsing for spreadsheet exports.

use chrono::{DateTime, NaiveDate, NaiveDateTime};

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
    "%m/%d/%Y %I:%M:%S %p",
    "%m/%d/%Y %I:%M %p",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%m/%d/%Y"];

/// Parses a timestamp cell, returning `None` if no known format matches.
///
/// Offsets are dropped: `2024-01-01T08:00:00+02:00` becomes the wall-clock
/// `2024-01-01 08:00:00`. Bare dates parse as midnight.
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_local());
    }

    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

/// Parses a calendar date cell (`YYYY-MM-DD` or `MM/DD/YYYY`), or the date part of a timestamp.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    parse_timestamp(raw).map(|dt| dt.date())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Timelike};

    fn ymd_hm(y: i32, m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, min, 0)
            .unwrap()
    }

    #[test]
    fn test_iso_without_seconds() {
        assert_eq!(
            parse_timestamp("2024-01-01T08:00"),
            Some(ymd_hm(2024, 1, 1, 8, 0))
        );
    }

    #[test]
    fn test_space_separated_with_fraction() {
        let dt = parse_timestamp("2024-03-05 13:45:10.250").unwrap();
        assert_eq!(dt.hour(), 13);
        assert_eq!(dt.nanosecond(), 250_000_000);
    }

    #[test]
    fn test_us_style_with_meridiem() {
        assert_eq!(
            parse_timestamp("1/5/2024 02:30:00 PM"),
            Some(ymd_hm(2024, 1, 5, 14, 30))
        );
    }

    #[test]
    fn test_rfc3339_keeps_wall_clock() {
        assert_eq!(
            parse_timestamp("2024-01-01T08:00:00+02:00"),
            Some(ymd_hm(2024, 1, 1, 8, 0))
        );
    }

    #[test]
    fn test_bare_date_is_midnight() {
        assert_eq!(parse_timestamp("2024-02-29"), Some(ymd_hm(2024, 2, 29, 0, 0)));
        assert_eq!(
            parse_date("02/29/2024"),
            NaiveDate::from_ymd_opt(2024, 2, 29)
        );
    }

    #[test]
    fn test_garbage_and_blank() {
        assert_eq!(parse_timestamp("not a time"), None);
        assert_eq!(parse_timestamp("   "), None);
        assert_eq!(parse_timestamp("2024-13-01 00:00"), None);
    }
}
