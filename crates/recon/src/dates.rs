//! Flexible date parsing, month names and ordinal labels.

use chrono::{Datelike, NaiveDate, NaiveDateTime};

use crate::error::ReconError;
use crate::model::RawValue;

/// Working year assumed when a source carries only a day number.
pub const DEFAULT_WORKING_YEAR: i32 = 2025;

const DATE_FORMATS: [&str; 6] = ["%d/%m/%Y", "%d-%m-%Y", "%Y-%m-%d", "%d %B %Y", "%d %b %Y", "%d.%m.%Y"];

const DATETIME_FORMATS: [&str; 7] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%d/%m/%Y %H:%M:%S",
    "%d/%m/%Y %H:%M",
    "%d-%m-%Y %H:%M:%S",
    "%d-%m-%Y %H:%M",
];

const MONTHS: [&str; 12] = [
    "january", "february", "march", "april", "may", "june", "july", "august", "september",
    "october", "november", "december",
];

/// Parse a date cell using [`DEFAULT_WORKING_YEAR`] for bare day numbers.
pub fn parse_flexible_date(input: &RawValue) -> Result<NaiveDate, ReconError> {
    parse_flexible_date_in(input, DEFAULT_WORKING_YEAR)
}

/// Parse a date cell. Bare day numbers land in January of `working_year`.
pub fn parse_flexible_date_in(input: &RawValue, working_year: i32) -> Result<NaiveDate, ReconError> {
    match input {
        RawValue::Date(d) => Ok(*d),
        RawValue::Number(n) => bare_day(*n as i64, working_year, &n.to_string()),
        RawValue::Text(s) => parse_date_text(s, working_year),
        RawValue::Empty | RawValue::Bool(_) => Err(ReconError::DateParse {
            value: input.as_text().into_owned(),
        }),
    }
}

fn parse_date_text(raw: &str, working_year: i32) -> Result<NaiveDate, ReconError> {
    let s = clean_date_text(raw);

    if !s.is_empty() && s.chars().all(|c| c.is_ascii_digit()) {
        let day: i64 = s.parse().map_err(|_| ReconError::DateParse { value: raw.into() })?;
        return bare_day(day, working_year, raw);
    }

    for fmt in DATE_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return Ok(d);
        }
    }

    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Ok(dt.date());
        }
    }

    // Timestamps with fractional seconds or zones: retry on the leading token.
    if let Some(head) = s.split(['T', ' ']).next() {
        if head.len() < s.len() && head.len() >= 8 {
            for fmt in DATE_FORMATS {
                if let Ok(d) = NaiveDate::parse_from_str(head, fmt) {
                    return Ok(d);
                }
            }
        }
    }

    let digits: String = s
        .chars()
        .skip_while(|c| !c.is_ascii_digit())
        .take_while(|c| c.is_ascii_digit())
        .collect();
    if digits.is_empty() {
        return Err(ReconError::DateParse { value: raw.into() });
    }
    let day: i64 = digits.parse().map_err(|_| ReconError::DateParse { value: raw.into() })?;
    bare_day(day, working_year, raw)
}

/// Strip whitespace and the quote artifacts spreadsheets leave on text dates.
fn clean_date_text(s: &str) -> &str {
    s.trim().trim_matches(|c| c == '\'' || c == '"' || c == '`').trim()
}

fn bare_day(day: i64, working_year: i32, raw: &str) -> Result<NaiveDate, ReconError> {
    u32::try_from(day)
        .ok()
        .and_then(|d| NaiveDate::from_ymd_opt(working_year, 1, d))
        .ok_or_else(|| ReconError::DateParse { value: raw.into() })
}

/// Resolve a month name (full or three-letter, any case) to 1..=12.
pub fn month_from_name(name: &str) -> Option<u32> {
    let name = name.trim().to_lowercase();
    if name.len() < 3 {
        return None;
    }
    MONTHS
        .iter()
        .position(|m| *m == name || (name.len() == 3 && m.starts_with(name.as_str())))
        .map(|i| i as u32 + 1)
}

/// Resolve the three-letter prefix of a token ("Oct", "october", "OCT.") to 1..=12.
pub fn month_from_abbrev(token: &str) -> Option<u32> {
    let prefix: String = token.chars().take(3).collect::<String>().to_lowercase();
    if prefix.len() != 3 {
        return None;
    }
    MONTHS
        .iter()
        .position(|m| m.starts_with(prefix.as_str()))
        .map(|i| i as u32 + 1)
}

/// English month name for 1..=12, capitalized.
pub fn month_name(month: u32) -> &'static str {
    const NAMES: [&str; 12] = [
        "January", "February", "March", "April", "May", "June", "July", "August", "September",
        "October", "November", "December",
    ];
    NAMES[(month.clamp(1, 12) - 1) as usize]
}

/// Number of days in `month` of `year`.
pub fn days_in_month(year: i32, month: u32) -> u32 {
    let (ny, nm) = if month == 12 { (year + 1, 1) } else { (year, month + 1) };
    NaiveDate::from_ymd_opt(ny, nm, 1)
        .and_then(|d| d.pred_opt())
        .map(|d| d.day())
        .unwrap_or(31)
}

/// (year, month) key used to order dates by calendar month.
pub fn month_key(date: NaiveDate) -> (i32, u32) {
    (date.year(), date.month())
}

/// Render 1 → "1st", 12 → "12th", 22 → "22nd".
pub fn ordinal(n: u32) -> String {
    let suffix = if (11..=13).contains(&(n % 100)) {
        "th"
    } else {
        match n % 10 {
            1 => "st",
            2 => "nd",
            3 => "rd",
            _ => "th",
        }
    };
    format!("{n}{suffix}")
}

/// "1st to 7th"
pub fn range_label(start_day: u32, end_day: u32) -> String {
    format!("{} to {}", ordinal(start_day), ordinal(end_day))
}

/// Excel 1900-system serial for a date (1899-12-30 epoch).
pub fn excel_serial(date: NaiveDate) -> f64 {
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30).unwrap_or_default();
    (date - epoch).num_days() as f64
}

/// Date for an Excel 1900-system serial; the fractional time part is dropped.
pub fn from_excel_serial(serial: f64) -> Option<NaiveDate> {
    if !serial.is_finite() || serial < 1.0 {
        return None;
    }
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)?;
    epoch.checked_add_signed(chrono::Duration::days(serial.floor() as i64))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn text(s: &str) -> RawValue {
        RawValue::Text(s.into())
    }

    #[test]
    fn ordinals() {
        assert_eq!(ordinal(1), "1st");
        assert_eq!(ordinal(2), "2nd");
        assert_eq!(ordinal(3), "3rd");
        assert_eq!(ordinal(4), "4th");
        assert_eq!(ordinal(11), "11th");
        assert_eq!(ordinal(12), "12th");
        assert_eq!(ordinal(13), "13th");
        assert_eq!(ordinal(21), "21st");
        assert_eq!(ordinal(22), "22nd");
        assert_eq!(ordinal(101), "101st");
        assert_eq!(ordinal(111), "111th");
    }

    #[test]
    fn fixed_formats_in_order() {
        assert_eq!(parse_flexible_date(&text("28/10/2025")).unwrap(), ymd(2025, 10, 28));
        assert_eq!(parse_flexible_date(&text("28-10-2025")).unwrap(), ymd(2025, 10, 28));
        assert_eq!(parse_flexible_date(&text("2025-10-28")).unwrap(), ymd(2025, 10, 28));
        assert_eq!(parse_flexible_date(&text("28 October 2025")).unwrap(), ymd(2025, 10, 28));
        assert_eq!(parse_flexible_date(&text("28 Oct 2025")).unwrap(), ymd(2025, 10, 28));
        assert_eq!(parse_flexible_date(&text("28.10.2025")).unwrap(), ymd(2025, 10, 28));
    }

    #[test]
    fn stray_quote_is_stripped() {
        assert_eq!(parse_flexible_date(&text("'28/10/2025")).unwrap(), ymd(2025, 10, 28));
        assert_eq!(parse_flexible_date(&text("  '2025-10-03'  ")).unwrap(), ymd(2025, 10, 3));
    }

    #[test]
    fn timestamps_keep_the_date() {
        assert_eq!(parse_flexible_date(&text("2025-10-28 14:05:00")).unwrap(), ymd(2025, 10, 28));
        assert_eq!(parse_flexible_date(&text("28/10/2025 09:15")).unwrap(), ymd(2025, 10, 28));
        assert_eq!(
            parse_flexible_date(&text("2025-10-28T14:05:00.123Z")).unwrap(),
            ymd(2025, 10, 28)
        );
    }

    #[test]
    fn bare_days_use_working_year_january() {
        assert_eq!(parse_flexible_date(&RawValue::Number(27.0)).unwrap(), ymd(2025, 1, 27));
        assert_eq!(parse_flexible_date(&text("2")).unwrap(), ymd(2025, 1, 2));
        assert_eq!(parse_flexible_date_in(&text("9"), 2026).unwrap(), ymd(2026, 1, 9));
        assert_eq!(parse_flexible_date(&text("day 14 of cycle")).unwrap(), ymd(2025, 1, 14));
    }

    #[test]
    fn no_digits_is_an_error() {
        assert!(parse_flexible_date(&text("#REF!")).is_err());
        assert!(parse_flexible_date(&text("")).is_err());
        assert!(parse_flexible_date(&RawValue::Empty).is_err());
        // Digits present but not a day.
        assert!(parse_flexible_date(&text("ref 4500")).is_err());
    }

    #[test]
    fn date_cells_pass_through() {
        let d = ymd(2025, 9, 27);
        assert_eq!(parse_flexible_date(&RawValue::Date(d)).unwrap(), d);
    }

    #[test]
    fn month_names() {
        assert_eq!(month_from_name("October"), Some(10));
        assert_eq!(month_from_name("oct"), Some(10));
        assert_eq!(month_from_name(" DECEMBER "), Some(12));
        assert_eq!(month_from_name("Octo"), None);
        assert_eq!(month_from_name("Smarch"), None);
        assert_eq!(month_from_abbrev("Sept"), Some(9));
        assert_eq!(month_from_abbrev("nov."), Some(11));
        assert_eq!(month_from_abbrev("xy"), None);
        assert_eq!(month_name(2), "February");
    }

    #[test]
    fn month_lengths() {
        assert_eq!(days_in_month(2025, 2), 28);
        assert_eq!(days_in_month(2024, 2), 29);
        assert_eq!(days_in_month(2025, 12), 31);
        assert_eq!(days_in_month(2025, 9), 30);
    }

    #[test]
    fn excel_serials() {
        assert_eq!(excel_serial(ymd(2025, 10, 28)), 45958.0);
        assert_eq!(from_excel_serial(45958.75), Some(ymd(2025, 10, 28)));
        assert_eq!(from_excel_serial(-3.0), None);
    }
}
