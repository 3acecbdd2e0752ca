use std::path::Path;
use std::sync::OnceLock;

use chrono::NaiveDate;
use regex::Regex;
use serde::Serialize;

use crate::cellref::SheetCell;
use crate::dates::month_from_abbrev;
use crate::weeks::WeekStructure;

/// Read access to an invoice's own cells, used by the in-sheet fallback.
pub trait SummaryCellSource {
    /// Display text of `cell`, or `None` when the sheet or cell is absent.
    fn cell_text(&self, cell: &SheetCell) -> Option<String>;
}

/// How an invoice's date range was discovered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RangeSource {
    Filename,
    SummaryCell,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "status")]
pub enum MatchOutcome {
    Matched {
        week_number: u32,
        source: RangeSource,
    },
    /// A range was found but equals no week exactly.
    NoSuchWeek {
        start: NaiveDate,
        end: NaiveDate,
    },
    /// Neither the filename nor the summary cells carried a range.
    NoRange,
}

impl MatchOutcome {
    pub fn week_number(&self) -> Option<u32> {
        match self {
            Self::Matched { week_number, .. } => Some(*week_number),
            _ => None,
        }
    }

    pub fn describe(&self) -> String {
        match self {
            Self::Matched { week_number, .. } => format!("week {week_number}"),
            Self::NoSuchWeek { start, end } => format!("range {start} to {end} matches no week"),
            Self::NoRange => "no date range in filename or summary cells".to_string(),
        }
    }
}

/// Match an invoice to a week: filename pattern first, then summary cells in order.
pub fn match_invoice(
    path: &Path,
    summary: &dyn SummaryCellSource,
    summary_cells: &[SheetCell],
    weeks: &WeekStructure,
) -> MatchOutcome {
    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    let mut first_miss = None;

    if let Some((start, end)) = parse_filename_range(&filename, weeks.year) {
        if let Some(w) = weeks.exact(start, end) {
            tracing::debug!(file = %filename, week = w.week_number, "matched by filename");
            return MatchOutcome::Matched {
                week_number: w.week_number,
                source: RangeSource::Filename,
            };
        }
        first_miss = Some((start, end));
    }

    for cell in summary_cells {
        let Some(text) = summary.cell_text(cell) else {
            continue;
        };
        if let Some((start, end)) = parse_summary_range(&text, weeks.year) {
            if let Some(w) = weeks.exact(start, end) {
                tracing::debug!(file = %filename, cell = %cell, week = w.week_number, "matched by summary cell");
                return MatchOutcome::Matched {
                    week_number: w.week_number,
                    source: RangeSource::SummaryCell,
                };
            }
            first_miss.get_or_insert((start, end));
            // Only the first readable summary cell is consulted.
            break;
        }
    }

    match first_miss {
        Some((start, end)) => MatchOutcome::NoSuchWeek { start, end },
        None => MatchOutcome::NoRange,
    }
}

/// Find `DD_Mon[_YYYY]` … `DD_Mon[_YYYY]` among underscore-separated tokens.
///
/// Missing years default to `fallback_year`; the end year follows the start
/// year and rolls forward when the end month wraps past December.
pub fn parse_filename_range(filename: &str, fallback_year: i32) -> Option<(NaiveDate, NaiveDate)> {
    let stem = Path::new(filename)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| filename.to_string());
    let parts: Vec<&str> = stem.split(['_', ' ']).filter(|p| !p.is_empty()).collect();

    let start = find_day_month(&parts, 0)?;
    let end = find_day_month(&parts, start.next)?;

    let start_year = start.year.unwrap_or(fallback_year);
    let start_date = NaiveDate::from_ymd_opt(start_year, start.month, start.day)?;

    let mut end_year = end.year.unwrap_or(start_year);
    let mut end_date = NaiveDate::from_ymd_opt(end_year, end.month, end.day)?;
    if end.year.is_none() && end_date < start_date {
        end_year += 1;
        end_date = NaiveDate::from_ymd_opt(end_year, end.month, end.day)?;
    }
    Some((start_date, end_date))
}

struct DayMonth {
    day: u32,
    month: u32,
    year: Option<i32>,
    next: usize,
}

fn find_day_month(parts: &[&str], from: usize) -> Option<DayMonth> {
    let mut i = from;
    while i + 1 < parts.len() {
        let tok = parts[i];
        if tok.len() <= 2 && tok.chars().all(|c| c.is_ascii_digit()) {
            let month_tok = parts[i + 1];
            if month_tok.chars().all(|c| c.is_ascii_alphabetic()) {
                if let Some(month) = month_from_abbrev(month_tok) {
                    let day: u32 = tok.parse().ok()?;
                    let year = parts
                        .get(i + 2)
                        .filter(|y| y.len() == 4 && y.chars().all(|c| c.is_ascii_digit()))
                        .and_then(|y| y.parse::<i32>().ok());
                    let next = i + if year.is_some() { 3 } else { 2 };
                    return Some(DayMonth { day, month, year, next });
                }
            }
        }
        i += 1;
    }
    None
}

fn range_two_months() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)(\d{1,2})\s*([a-z]{3})[a-z]*\.?,?\s*(?:\d{4}\s*)?(?:-|–|to)\s*(\d{1,2})\s*([a-z]{3})")
            .expect("static regex")
    })
}

fn range_one_month() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)(\d{1,2})\s*(?:-|–|to)\s*(\d{1,2})\s*([a-z]{3})")
            .expect("static regex")
    })
}

/// Parse summary-cell text such as `27 Sep - 2 Oct` or `3 - 9 Oct`.
pub fn parse_summary_range(text: &str, year: i32) -> Option<(NaiveDate, NaiveDate)> {
    if let Some(c) = range_two_months().captures(text) {
        let sd: u32 = c[1].parse().ok()?;
        let sm = month_from_abbrev(&c[2])?;
        let ed: u32 = c[3].parse().ok()?;
        let em = month_from_abbrev(&c[4])?;
        let start = NaiveDate::from_ymd_opt(year, sm, sd)?;
        let end_year = if em < sm { year + 1 } else { year };
        let end = NaiveDate::from_ymd_opt(end_year, em, ed)?;
        return Some((start, end));
    }
    if let Some(c) = range_one_month().captures(text) {
        let sd: u32 = c[1].parse().ok()?;
        let ed: u32 = c[2].parse().ok()?;
        let m = month_from_abbrev(&c[3])?;
        let start = NaiveDate::from_ymd_opt(year, m, sd)?;
        let end = NaiveDate::from_ymd_opt(year, m, ed)?;
        return Some((start, end));
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::weeks::{build_week_structure, WeekBoundaries};
    use std::collections::HashMap;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    struct Cells(HashMap<String, String>);

    impl SummaryCellSource for Cells {
        fn cell_text(&self, cell: &SheetCell) -> Option<String> {
            self.0.get(&cell.to_string()).cloned()
        }
    }

    fn no_cells() -> Cells {
        Cells(HashMap::new())
    }

    fn default_cells() -> Vec<SheetCell> {
        vec!["HSummary!E2".parse().unwrap(), "Summary!C4".parse().unwrap()]
    }

    #[test]
    fn filename_with_years() {
        assert_eq!(
            parse_filename_range("Restaurant_27_Oct_2025_02_Nov_2025.xlsx", 2025),
            Some((ymd(2025, 10, 27), ymd(2025, 11, 2)))
        );
    }

    #[test]
    fn filename_year_rolls_at_december() {
        assert_eq!(
            parse_filename_range("Cafe_29_Dec_to_4_Jan.xlsx", 2025),
            Some((ymd(2025, 12, 29), ymd(2026, 1, 4)))
        );
        assert_eq!(parse_filename_range("invoice_final.xlsx", 2025), None);
        assert_eq!(parse_filename_range("Cafe_31_Feb_2025_07_Mar_2025.xlsx", 2025), None);
    }

    #[test]
    fn summary_text_patterns() {
        assert_eq!(
            parse_summary_range("Payout for 27 Sep - 2 Oct", 2025),
            Some((ymd(2025, 9, 27), ymd(2025, 10, 2)))
        );
        assert_eq!(
            parse_summary_range("3 - 9 Oct", 2025),
            Some((ymd(2025, 10, 3), ymd(2025, 10, 9)))
        );
        assert_eq!(
            parse_summary_range("10 October to 16 October", 2025),
            Some((ymd(2025, 10, 10), ymd(2025, 10, 16)))
        );
        assert_eq!(parse_summary_range("Weekly payout", 2025), None);
    }

    #[test]
    fn exact_range_matches_by_filename() {
        let weeks = build_week_structure("October", WeekBoundaries::new((1, 5), (27, 2)), 2025).unwrap();
        let path = Path::new("/in/Restaurant_27_Oct_2025_02_Nov_2025.xlsx");
        let got = match_invoice(path, &no_cells(), &default_cells(), &weeks);
        assert_eq!(
            got,
            MatchOutcome::Matched {
                week_number: weeks.len() as u32,
                source: RangeSource::Filename
            }
        );
    }

    #[test]
    fn off_by_one_does_not_match() {
        let weeks = build_week_structure("October", WeekBoundaries::new((1, 5), (27, 2)), 2025).unwrap();
        let path = Path::new("Restaurant_27_Oct_2025_03_Nov_2025.xlsx");
        let got = match_invoice(path, &no_cells(), &default_cells(), &weeks);
        assert_eq!(
            got,
            MatchOutcome::NoSuchWeek {
                start: ymd(2025, 10, 27),
                end: ymd(2025, 11, 3)
            }
        );
        assert_eq!(got.week_number(), None);
    }

    #[test]
    fn falls_back_to_summary_cells_in_order() {
        let weeks = build_week_structure("October", WeekBoundaries::new((1, 5), (27, 2)), 2025).unwrap();
        let cells = Cells(HashMap::from([(
            "'Summary'!C4".to_string(),
            "6 Oct - 12 Oct".to_string(),
        )]));
        let got = match_invoice(Path::new("invoice.xlsx"), &cells, &default_cells(), &weeks);
        assert_eq!(
            got,
            MatchOutcome::Matched {
                week_number: 2,
                source: RangeSource::SummaryCell
            }
        );

        let got = match_invoice(Path::new("invoice.xlsx"), &no_cells(), &default_cells(), &weeks);
        assert_eq!(got, MatchOutcome::NoRange);
    }
}
