//! Additions and deductions: the per-week `D2W{n}` copy with lookup rules,
//! and ads segregation for consolidated statements.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use chrono::NaiveDate;
use regex::Regex;
use serde::Deserialize;

use crate::aggregate::coerce_amount;
use crate::cellref::{quote_sheet, CellRef, Column};
use crate::dates::{month_from_abbrev, parse_flexible_date_in};
use crate::mapping::CellWrite;
use crate::model::{normalize_header, RawValue};
use crate::source::RawSheet;
use crate::workbook::{GridSheet, LabelIndex, LabelMatch};
use crate::weeks::WeekStructure;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdditionsMode {
    #[default]
    Copy,
    Ads,
}

/// Find a label in a copied additions sheet and reference the value beside it.
#[derive(Debug, Clone, Deserialize)]
pub struct LookupRule {
    /// Report label receiving the formula.
    pub label: String,
    /// Texts searched for in the search column, in order.
    pub search: Vec<String>,
    #[serde(default = "default_search_column")]
    pub search_column: Column,
    #[serde(default = "default_value_column")]
    pub value_column: Column,
    #[serde(default, rename = "match")]
    pub match_mode: LabelMatch,
    #[serde(default)]
    pub negate: bool,
}

fn default_search_column() -> Column {
    Column(1)
}

fn default_value_column() -> Column {
    Column(6)
}

#[derive(Debug, Clone, Deserialize)]
pub struct AdditionsSpec {
    #[serde(default)]
    pub mode: AdditionsMode,
    #[serde(default = "default_prefix")]
    pub prefix: String,
    /// Source sheet candidates, first present wins.
    pub sheets: Vec<String>,
    /// 1-based source row the copy starts from.
    #[serde(default = "default_start_row")]
    pub start_row: usize,
    #[serde(default)]
    pub lookups: Vec<LookupRule>,
    /// Report label receiving the weekly ads total.
    #[serde(default = "default_ads_label")]
    pub ads_label: String,
    /// Detail header whose computed total is added to the weekly ads.
    #[serde(default)]
    pub ads_detail_column: Option<String>,
    #[serde(default = "default_ads_detail_row")]
    pub ads_detail_row: u32,
}

fn default_prefix() -> String {
    "D2W".into()
}

fn default_start_row() -> usize {
    1
}

fn default_ads_label() -> String {
    "High Priority".into()
}

fn default_ads_detail_row() -> u32 {
    4
}

impl AdditionsSpec {
    pub fn sheet_name(&self, week_number: u32) -> String {
        format!("{}{}", self.prefix, week_number)
    }

    pub fn find_sheet<'a>(&self, sheets: &'a [RawSheet]) -> Option<&'a RawSheet> {
        self.sheets
            .iter()
            .find_map(|name| sheets.iter().find(|s| &s.name == name))
    }
}

// ---------------------------------------------------------------------------
// Copy mode
// ---------------------------------------------------------------------------

/// Copy `source` from its 1-based `start_row` into `target` at row 1.
pub fn copy_additions(source: &RawSheet, start_row: usize, target: &mut GridSheet) -> usize {
    let skip = start_row.saturating_sub(1);
    let mut copied = 0;
    for (i, row) in source.rows.iter().skip(skip).enumerate() {
        target.write_row(i, row);
        copied += 1;
    }
    copied
}

/// Formula for one lookup rule against a copied additions sheet.
pub fn lookup_formula(sheet: &GridSheet, rule: &LookupRule) -> Option<CellWrite> {
    let labels = LabelIndex::scan(sheet, rule.search_column.index());
    let row = rule
        .search
        .iter()
        .find_map(|s| labels.find(s, rule.match_mode))?;
    let sign = if rule.negate { "-" } else { "" };
    Some(CellWrite::Formula(format!(
        "={sign}{}!{}",
        quote_sheet(&sheet.name),
        CellRef::new(row, rule.value_column.index()).a1()
    )))
}

// ---------------------------------------------------------------------------
// Ads segregation
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Addition,
    Deduction,
    Other,
}

/// Weekly ads totals plus the rows no week accepted.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AdsTotals {
    pub per_week: BTreeMap<u32, f64>,
    pub unmatched: Vec<String>,
}

impl AdsTotals {
    pub fn new(weeks: &WeekStructure) -> Self {
        Self {
            per_week: weeks.weeks.iter().map(|w| (w.week_number, 0.0)).collect(),
            unmatched: Vec::new(),
        }
    }

    pub fn add(&mut self, week_number: u32, amount: f64) {
        *self.per_week.entry(week_number).or_insert(0.0) += amount;
    }
}

/// Column positions of the ads table.
#[derive(Debug, Clone, Copy, Default)]
struct AdsColumns {
    kind: usize,
    period: Option<usize>,
    total: Option<usize>,
}

fn detect_ads_columns(row: &[RawValue]) -> Option<AdsColumns> {
    let headers: Vec<String> = row.iter().map(|v| normalize_header(&v.as_text())).collect();
    let kind = headers.iter().position(|h| h == "type")?;
    Some(AdsColumns {
        kind,
        period: headers
            .iter()
            .position(|h| h.contains("deduction time period") || h.contains("order date")),
        total: headers.iter().position(|h| h.contains("total amount")),
    })
}

/// Scan the additions sheet section by section and total the `ADS` rows per week.
///
/// Ads listed under additions reduce the week's total; ads under deductions
/// increase it.
pub fn segregate_ads(sheet: &RawSheet, weeks: &WeekStructure) -> AdsTotals {
    let mut totals = AdsTotals::new(weeks);
    let mut section = None;
    let mut columns: Option<AdsColumns> = None;

    for row in &sheet.rows {
        let marker = row.get(1).map(|v| v.as_text().trim().to_lowercase()).unwrap_or_default();
        if marker.contains("addition type") {
            section = Some(Section::Addition);
            continue;
        }
        if marker.contains("deduction type") {
            section = Some(Section::Deduction);
            continue;
        }
        if marker.contains("investments in hyperpure") || marker.contains("other deductions") {
            section = Some(Section::Other);
            continue;
        }

        let Some(cols) = columns else {
            columns = detect_ads_columns(row);
            continue;
        };
        let sign = match section {
            Some(Section::Addition) => -1.0,
            Some(Section::Deduction) => 1.0,
            _ => continue,
        };
        let kind = row.get(cols.kind).map(|v| v.as_text().trim().to_uppercase());
        if kind.as_deref() != Some("ADS") {
            continue;
        }

        let period = cols.period.and_then(|c| row.get(c)).unwrap_or(&RawValue::Empty);
        let amount = cols.total.and_then(|c| row.get(c)).map(coerce_amount).unwrap_or(0.0);
        let range = parse_deduction_period(&period.as_text())
            .or_else(|| parse_flexible_date_in(period, weeks.year).ok().map(|d| (d, d)));

        let week = range.and_then(|(start, end)| {
            weeks
                .weeks
                .iter()
                .find(|w| w.contains(start) || (start <= w.start_date && end >= w.end_date))
        });
        match week {
            Some(w) => {
                tracing::debug!(week = w.week_number, amount = sign * amount, "ads row");
                totals.add(w.week_number, sign * amount);
            }
            None => {
                let text = period.as_text().into_owned();
                tracing::warn!(period = %text, "ads period matches no week");
                totals.unmatched.push(text);
            }
        }
    }
    totals
}

/// `01 December 25 - 07 December 25` → both dates. Two-digit years are 20xx.
pub fn parse_deduction_period(text: &str) -> Option<(NaiveDate, NaiveDate)> {
    static PART: OnceLock<Regex> = OnceLock::new();
    let re = PART.get_or_init(|| Regex::new(r"(\d{1,2})\s+([A-Za-z]+)\s+(\d{2,4})").expect("static regex"));
    let mut dates = re.captures_iter(text).filter_map(|c| {
        let day: u32 = c[1].parse().ok()?;
        let month = month_from_abbrev(&c[2])?;
        let mut year: i32 = c[3].parse().ok()?;
        if year < 100 {
            year += 2000;
        }
        NaiveDate::from_ymd_opt(year, month, day)
    });
    let start = dates.next()?;
    let end = dates.next()?;
    Some((start, end))
}
