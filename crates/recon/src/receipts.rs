//! Bank statement matching for the "Actual Receipts" row.

use std::collections::{BTreeMap, BTreeSet};

use serde::Deserialize;

use crate::aggregate::parse_amount_text;
use crate::cellref::SheetCell;
use crate::dates::ordinal;
use crate::model::RawValue;
use crate::source::RawSheet;
use crate::workbook::LabelMatch;

pub const NO_BANK_NOTE: &str = "1. Due to absence of Bank, actual receipts could not be mapped.";

#[derive(Debug, Clone, Deserialize)]
pub struct ReceiptsSpec {
    /// Invoice cell holding the week's expected receipt.
    pub expected_cell: SheetCell,
    #[serde(default = "default_label")]
    pub label: String,
    #[serde(default = "default_label_match")]
    pub label_match: LabelMatch,
    #[serde(default = "default_tolerance")]
    pub tolerance: f64,
    /// Name of the copied bank sheet in the report.
    #[serde(default = "default_bank_sheet")]
    pub bank_sheet: String,
    #[serde(default = "default_deposit_keywords")]
    pub deposit_keywords: Vec<String>,
    /// 1-based header row of the bank statement.
    #[serde(default = "default_header_row")]
    pub header_row: usize,
    #[serde(default)]
    pub note_cells: Vec<SheetCell>,
}

fn default_label() -> String {
    "Actual Receipts".into()
}

fn default_label_match() -> LabelMatch {
    LabelMatch::Contains
}

fn default_tolerance() -> f64 {
    10.0
}

fn default_bank_sheet() -> String {
    "BANK".into()
}

fn default_deposit_keywords() -> Vec<String> {
    ["deposit amt.", "credit amount(inr)", "credit", "deposit", "amount"]
        .map(String::from)
        .to_vec()
}

fn default_header_row() -> usize {
    1
}

/// First header (left to right) containing any deposit keyword.
pub fn find_deposit_column(sheet: &RawSheet, header_row: usize, keywords: &[String]) -> Option<usize> {
    let row = sheet.rows.get(header_row.saturating_sub(1))?;
    row.iter().position(|cell| {
        let header = cell.as_text().trim().to_lowercase();
        !header.is_empty() && keywords.iter().any(|k| header.contains(&k.to_lowercase()))
    })
}

/// Non-zero deposits below the header row.
pub fn deposits(sheet: &RawSheet, header_row: usize, column: usize) -> Vec<f64> {
    sheet
        .rows
        .iter()
        .skip(header_row)
        .filter_map(|r| match r.get(column)? {
            RawValue::Number(n) => Some(*n),
            RawValue::Text(s) => parse_amount_text(s),
            _ => None,
        })
        .filter(|v| *v != 0.0)
        .collect()
}

/// Deposit closest to `expected`, within `tolerance` inclusive. Ties keep the earlier deposit.
pub fn closest_deposit(expected: f64, deposits: &[f64], tolerance: f64) -> Option<f64> {
    let mut best: Option<(f64, f64)> = None;
    for &d in deposits {
        let diff = (d - expected).abs();
        if diff <= tolerance && best.map_or(true, |(_, b)| diff < b) {
            best = Some((d, diff));
        }
    }
    best.map(|(d, _)| d)
}

/// Per-week matched deposit for every week with an expected receipt.
pub fn map_receipts(expected: &BTreeMap<u32, f64>, deposits: &[f64], tolerance: f64) -> BTreeMap<u32, Option<f64>> {
    expected
        .iter()
        .map(|(&week, &exp)| {
            let hit = closest_deposit(exp, deposits, tolerance);
            match hit {
                Some(d) => tracing::debug!(week, expected = exp, deposit = d, "receipt mapped"),
                None => tracing::debug!(week, expected = exp, tolerance, "no deposit within tolerance"),
            }
            (week, hit)
        })
        .collect()
}

/// `2nd week`, `2nd week and 4th week`, `1st week, 2nd week and 4th week`.
pub fn join_weeks(weeks: &[u32]) -> String {
    let names: Vec<String> = weeks.iter().map(|w| format!("{} week", ordinal(*w))).collect();
    match names.as_slice() {
        [] => String::new(),
        [one] => one.clone(),
        [init @ .., last] => format!("{} and {last}", init.join(", ")),
    }
}

/// Note for the receipts section; `None` when every week was mapped.
pub fn receipts_note(week_count: u32, mapped: &BTreeSet<u32>, bank_present: bool) -> Option<String> {
    if !bank_present {
        return Some(NO_BANK_NOTE.to_string());
    }
    let unmapped: Vec<u32> = (1..=week_count).filter(|w| !mapped.contains(w)).collect();
    if unmapped.is_empty() {
        return None;
    }
    Some(format!(
        "1. Bank credits of {} will be credited in the next month.",
        join_weeks(&unmapped)
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bank() -> RawSheet {
        RawSheet::new(
            "Statement",
            vec![
                vec!["Date".into(), "Narration".into(), "Withdrawal Amt.".into(), "Deposit Amt.".into()],
                vec!["01/10/25".into(), "NEFT SWIGGY".into(), RawValue::Empty, RawValue::Number(10_250.0)],
                vec!["02/10/25".into(), "ATM".into(), RawValue::Number(500.0), RawValue::Empty],
                vec!["08/10/25".into(), "NEFT SWIGGY".into(), RawValue::Empty, "₹ 9,995.00".into()],
                vec!["09/10/25".into(), "NEFT".into(), RawValue::Empty, RawValue::Number(0.0)],
            ],
        )
    }

    #[test]
    fn deposit_column_by_keyword() {
        let sheet = bank();
        // "Withdrawal Amt." does not contain "amount"; "Deposit Amt." does contain "deposit amt.".
        assert_eq!(find_deposit_column(&sheet, 1, &default_deposit_keywords()), Some(3));
        assert_eq!(deposits(&sheet, 1, 3), vec![10_250.0, 9_995.0]);
    }

    #[test]
    fn closest_within_tolerance() {
        let d = [10_250.0, 9_995.0, 10_004.0];
        assert_eq!(closest_deposit(10_000.0, &d, 10.0), Some(10_004.0));
        assert_eq!(closest_deposit(10_240.0, &d, 10.0), Some(10_250.0));
        assert_eq!(closest_deposit(20_000.0, &d, 10.0), None);
    }

    #[test]
    fn notes_list_unmapped_weeks() {
        let mapped = BTreeSet::from([1, 3]);
        assert_eq!(
            receipts_note(4, &mapped, true).as_deref(),
            Some("1. Bank credits of 2nd week and 4th week will be credited in the next month.")
        );
        assert_eq!(receipts_note(2, &BTreeSet::from([1, 2]), true), None);
        assert_eq!(receipts_note(2, &BTreeSet::new(), false).as_deref(), Some(NO_BANK_NOTE));
        assert_eq!(join_weeks(&[1, 2, 5]), "1st week, 2nd week and 5th week");
    }
}
