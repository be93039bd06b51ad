//! Date decoding for spreadsheet cells
//!
//! Cells hold dates either as text in one of a handful of layouts or as a
//! spreadsheet serial number (days since 1899-12-30, fractional part = time).

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime};

use super::grid::is_absent;

/// Textual layouts tried in order. Day-first wins over month-first for
/// ambiguous values such as 03/04/2024.
///
/// chrono's `%Y` also accepts one or two digits, so a four-digit layout can
/// match `15/01/24` as year 24. Such matches are skipped (see [`MIN_TEXT_YEAR`])
/// and the two-digit layouts at the end pick the value up instead.
const DATE_FORMATS: &[&str] = &[
    "%d/%m/%Y", // 15/01/2024
    "%Y-%m-%d", // 2024-01-15
    "%d-%m-%Y", // 15-01-2024
    "%d.%m.%Y", // 15.01.2024
    "%m/%d/%Y", // 01/15/2024
    "%d %b %Y", // 15 Jan 2024
    "%d %B %Y", // 15 January 2024
    "%d-%b-%Y", // 15-Jan-2024
    "%Y/%m/%d", // 2024/01/15
    "%d/%m/%y", // 15/01/24
    "%d-%m-%y", // 15-01-24
    "%d.%m.%y", // 15.01.24
    "%m/%d/%y", // 01/15/24
    "%d %b %y", // 15 Jan 24
    "%d-%b-%y", // 15-Jan-24
];

/// Years below this come from a short year token read by `%Y`
const MIN_TEXT_YEAR: i32 = 1000;

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f", // 2024-01-15T10:30:00.000
    "%Y-%m-%dT%H:%M:%S",    // 2024-01-15T10:30:00
    "%Y-%m-%d %H:%M:%S",    // 2024-01-15 10:30:00
    "%d/%m/%Y %H:%M:%S",    // 15/01/2024 10:30:00
    "%d/%m/%Y %H:%M",       // 15/01/2024 10:30
];

/// Largest serial a spreadsheet engine can represent (9999-12-31)
const MAX_SERIAL: f64 = 2_958_465.0;

/// Day zero of the serial-number scheme
pub fn serial_epoch() -> NaiveDate {
    NaiveDate::from_ymd_opt(1899, 12, 30).unwrap_or_default()
}

/// How a date cell was understood
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateDecode {
    /// Matched one of the textual layouts
    Text(NaiveDate),
    /// Interpreted as a serial number
    Serial(NaiveDate),
    /// Cell was empty
    Absent,
    /// Cell had content that is not a date
    Unrecognized,
}

impl DateDecode {
    pub fn date(self) -> Option<NaiveDate> {
        match self {
            DateDecode::Text(d) | DateDecode::Serial(d) => Some(d),
            DateDecode::Absent | DateDecode::Unrecognized => None,
        }
    }
}

/// Decode a raw cell string: textual layouts first, then serial numbers
pub fn decode_date(raw: &str) -> DateDecode {
    if is_absent(raw) {
        return DateDecode::Absent;
    }
    let text = raw.trim();

    if let Some(date) = parse_text_date(text) {
        return DateDecode::Text(date);
    }

    match parse_serial_date(text) {
        Some(date) => DateDecode::Serial(date),
        None => DateDecode::Unrecognized,
    }
}

fn parse_text_date(text: &str) -> Option<NaiveDate> {
    let plausible = |date: &NaiveDate| date.year() >= MIN_TEXT_YEAR;

    if let Some(date) = DATE_FORMATS
        .iter()
        .filter_map(|format| NaiveDate::parse_from_str(text, format).ok())
        .find(plausible)
    {
        return Some(date);
    }

    if let Some(date) = DATETIME_FORMATS
        .iter()
        .filter_map(|format| NaiveDateTime::parse_from_str(text, format).ok())
        .map(|dt| dt.date())
        .find(plausible)
    {
        return Some(date);
    }

    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(text) {
        return Some(dt.date_naive());
    }

    None
}

/// Serial number -> date, truncated to whole days
pub fn parse_serial_date(text: &str) -> Option<NaiveDate> {
    let serial: f64 = text.parse().ok()?;
    if !serial.is_finite() || !(0.0..=MAX_SERIAL).contains(&serial) {
        return None;
    }

    serial_epoch().checked_add_signed(Duration::days(serial.trunc() as i64))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_text_formats() {
        assert_eq!(decode_date("15/01/2024"), DateDecode::Text(ymd(2024, 1, 15)));
        assert_eq!(decode_date("2024-01-15"), DateDecode::Text(ymd(2024, 1, 15)));
        assert_eq!(decode_date("15.01.2024"), DateDecode::Text(ymd(2024, 1, 15)));
        assert_eq!(decode_date("01/15/2024"), DateDecode::Text(ymd(2024, 1, 15)));
        assert_eq!(decode_date("15 Jan 2024"), DateDecode::Text(ymd(2024, 1, 15)));
        assert_eq!(decode_date("2024-01-15T10:30:00"), DateDecode::Text(ymd(2024, 1, 15)));
        assert_eq!(decode_date(" 2024-01-15 10:30:00 "), DateDecode::Text(ymd(2024, 1, 15)));
    }

    #[test]
    fn test_day_first_for_ambiguous_dates() {
        assert_eq!(decode_date("03/04/2024"), DateDecode::Text(ymd(2024, 4, 3)));
    }

    #[test]
    fn test_two_digit_years() {
        assert_eq!(decode_date("15/01/24"), DateDecode::Text(ymd(2024, 1, 15)));
        assert_eq!(decode_date("1/2/24"), DateDecode::Text(ymd(2024, 2, 1)));
        assert_eq!(decode_date("03/04/24"), DateDecode::Text(ymd(2024, 4, 3)));
        assert_eq!(decode_date("15.01.99"), DateDecode::Text(ymd(1999, 1, 15)));
        assert_eq!(decode_date("15 Jan 24"), DateDecode::Text(ymd(2024, 1, 15)));
        assert_eq!(decode_date("12/31/24"), DateDecode::Text(ymd(2024, 12, 31)));
    }

    #[test]
    fn test_short_years_never_decode_to_antiquity() {
        assert_eq!(decode_date("15/01/202"), DateDecode::Unrecognized);
        assert_eq!(decode_date("15/01/0024"), DateDecode::Unrecognized);
        assert_eq!(decode_date("24-01-15 10:30:00"), DateDecode::Unrecognized);
    }

    #[test]
    fn test_serial_dates() {
        assert_eq!(decode_date("45"), DateDecode::Serial(ymd(1900, 2, 13)));
        assert_eq!(decode_date("45306"), DateDecode::Serial(ymd(2024, 1, 15)));
        // Time of day is dropped
        assert_eq!(decode_date("45306.75"), DateDecode::Serial(ymd(2024, 1, 15)));
        assert_eq!(decode_date("0"), DateDecode::Serial(ymd(1899, 12, 30)));
    }

    #[test]
    fn test_serial_and_text_agree() {
        assert_eq!(decode_date("45").date(), decode_date("1900-02-13").date());
        assert_eq!(decode_date("45").date(), decode_date("13/02/1900").date());
    }

    #[test]
    fn test_unrecognized_and_absent() {
        assert_eq!(decode_date("next sprint"), DateDecode::Unrecognized);
        assert_eq!(decode_date("-3"), DateDecode::Unrecognized);
        assert_eq!(decode_date("99999999"), DateDecode::Unrecognized);
        assert_eq!(decode_date("NaN"), DateDecode::Unrecognized);
        assert_eq!(decode_date(""), DateDecode::Absent);
        assert_eq!(decode_date("N/A"), DateDecode::Absent);
        assert_eq!(decode_date("next sprint").date(), None);
    }
}
