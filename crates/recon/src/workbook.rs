//! In-memory report workbook: the template's sheets as sparse cell grids.

use std::collections::{BTreeMap, HashMap};

use chrono::NaiveDate;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::cellref::{CellRef, SheetCell};
use crate::error::ReconError;
use crate::model::{normalize_header, RawValue};

/// A cell the engine reads or writes.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Text(String),
    Number(f64),
    Bool(bool),
    Date(NaiveDate),
    /// Formula text including the leading `=`.
    Formula(String),
}

impl CellValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// `None` for an empty source cell.
    pub fn from_raw(v: &RawValue) -> Option<Self> {
        match v {
            RawValue::Empty => None,
            RawValue::Text(s) => Some(Self::Text(s.clone())),
            RawValue::Number(n) => Some(Self::Number(*n)),
            RawValue::Date(d) => Some(Self::Date(*d)),
            RawValue::Bool(b) => Some(Self::Bool(*b)),
        }
    }
}

/// One named sheet.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GridSheet {
    pub name: String,
    cells: BTreeMap<CellRef, CellValue>,
}

impl GridSheet {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            cells: BTreeMap::new(),
        }
    }

    pub fn get(&self, cell: CellRef) -> Option<&CellValue> {
        self.cells.get(&cell)
    }

    pub fn set(&mut self, cell: CellRef, value: CellValue) {
        self.cells.insert(cell, value);
    }

    pub fn set_raw(&mut self, cell: CellRef, value: &RawValue) {
        match CellValue::from_raw(value) {
            Some(v) => self.set(cell, v),
            None => self.clear(cell),
        }
    }

    pub fn clear(&mut self, cell: CellRef) {
        self.cells.remove(&cell);
    }

    pub fn clear_all(&mut self) {
        self.cells.clear();
    }

    pub fn text(&self, cell: CellRef) -> Option<&str> {
        self.get(cell).and_then(CellValue::as_text)
    }

    pub fn number(&self, cell: CellRef) -> Option<f64> {
        self.get(cell).and_then(CellValue::as_number)
    }

    pub fn cells(&self) -> impl Iterator<Item = (&CellRef, &CellValue)> {
        self.cells.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Last used row (0-indexed), if any.
    pub fn max_row(&self) -> Option<usize> {
        self.cells.keys().map(|c| c.row).max()
    }

    /// Write a row of source values starting at `(row, 0)`.
    pub fn write_row(&mut self, row: usize, values: &[RawValue]) {
        for (col, v) in values.iter().enumerate() {
            self.set_raw(CellRef::new(row, col), v);
        }
    }

    /// Replace `from` as a whole word with `to` inside every text cell.
    /// Returns the number of cells changed.
    pub fn replace_text(&mut self, from: &str, to: &str) -> usize {
        if from.is_empty() {
            return 0;
        }
        let Ok(word) = Regex::new(&format!(r"\b{}\b", regex::escape(from))) else {
            return 0;
        };
        let mut changed = 0;
        for v in self.cells.values_mut() {
            if let CellValue::Text(s) = v {
                if word.is_match(s) {
                    *s = word.replace_all(s, regex::NoExpand(to)).into_owned();
                    changed += 1;
                }
            }
        }
        changed
    }
}

/// Template sheets plus the sheets the engine adds.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReportWorkbook {
    sheets: Vec<GridSheet>,
}

impl ReportWorkbook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_sheets(sheets: Vec<GridSheet>) -> Self {
        Self { sheets }
    }

    pub fn sheets(&self) -> &[GridSheet] {
        &self.sheets
    }

    pub fn sheet_names(&self) -> Vec<&str> {
        self.sheets.iter().map(|s| s.name.as_str()).collect()
    }

    pub fn has_sheet(&self, name: &str) -> bool {
        self.sheet(name).is_some()
    }

    pub fn sheet(&self, name: &str) -> Option<&GridSheet> {
        self.sheets.iter().find(|s| s.name == name)
    }

    pub fn sheet_mut(&mut self, name: &str) -> Option<&mut GridSheet> {
        self.sheets.iter_mut().find(|s| s.name == name)
    }

    /// Sheet the template must provide.
    pub fn require_sheet(&mut self, name: &str) -> Result<&mut GridSheet, ReconError> {
        self.sheet_mut(name)
            .ok_or_else(|| ReconError::MissingTemplateSheet(name.to_string()))
    }

    /// Existing sheet, or a new empty one appended at the end.
    pub fn ensure_sheet(&mut self, name: &str) -> &mut GridSheet {
        let idx = match self.sheets.iter().position(|s| s.name == name) {
            Some(i) => i,
            None => {
                self.sheets.push(GridSheet::new(name));
                self.sheets.len() - 1
            }
        };
        &mut self.sheets[idx]
    }

    /// Drop any existing sheet of this name and append a fresh one.
    pub fn recreate_sheet(&mut self, name: &str) -> &mut GridSheet {
        self.sheets.retain(|s| s.name != name);
        self.sheets.push(GridSheet::new(name));
        let last = self.sheets.len() - 1;
        &mut self.sheets[last]
    }

    /// Remove generated sheets (e.g. `D1W3`) left from a previous run.
    pub fn remove_generated(&mut self, prefixes: &[&str]) -> usize {
        let before = self.sheets.len();
        self.sheets.retain(|s| !prefixes.iter().any(|p| is_generated_name(&s.name, p)));
        before - self.sheets.len()
    }

    pub fn text_at(&self, at: &SheetCell) -> Option<&str> {
        self.sheet(&at.sheet).and_then(|s| s.text(at.cell))
    }

    /// Write `value` at `at`; the sheet must exist.
    pub fn set_at(&mut self, at: &SheetCell, value: CellValue) -> Result<(), ReconError> {
        self.require_sheet(&at.sheet)?.set(at.cell, value);
        Ok(())
    }

    /// Replace the month placeholder in the named sheets (missing sheets are ignored).
    pub fn replace_month(&mut self, token: &str, month: &str, sheets: &[String]) -> usize {
        let variants = token_variants(token);
        let mut changed = 0;
        for name in sheets {
            if let Some(sheet) = self.sheet_mut(name) {
                for v in &variants {
                    changed += sheet.replace_text(v, month);
                }
            }
        }
        changed
    }
}

/// `prefix` followed by one or more digits.
fn is_generated_name(name: &str, prefix: &str) -> bool {
    name.strip_prefix(prefix)
        .is_some_and(|rest| !rest.is_empty() && rest.chars().all(|c| c.is_ascii_digit()))
}

/// The token as written plus its capitalized and lowercase spellings.
fn token_variants(token: &str) -> Vec<String> {
    let mut out = vec![token.to_string()];
    let mut chars = token.chars();
    if let Some(first) = chars.next() {
        let capitalized: String = first.to_uppercase().chain(chars).collect();
        if !out.contains(&capitalized) {
            out.push(capitalized);
        }
    }
    let lower = token.to_lowercase();
    if !out.contains(&lower) {
        out.push(lower);
    }
    out
}

// ---------------------------------------------------------------------------
// Named regions
// ---------------------------------------------------------------------------

/// How a configured label is compared with the text in a label column.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LabelMatch {
    #[default]
    Exact,
    Contains,
}

/// Rows of a sheet keyed by the text in one label column, scanned once.
#[derive(Debug, Clone, Default)]
pub struct LabelIndex {
    rows: Vec<(String, usize)>,
    exact: HashMap<String, usize>,
}

impl LabelIndex {
    pub fn scan(sheet: &GridSheet, label_col: usize) -> Self {
        let mut rows = Vec::new();
        let mut exact = HashMap::new();
        for (cell, value) in sheet.cells() {
            if cell.col != label_col {
                continue;
            }
            if let CellValue::Text(s) = value {
                let key = normalize_header(s);
                if key.is_empty() {
                    continue;
                }
                exact.entry(key.clone()).or_insert(cell.row);
                rows.push((key, cell.row));
            }
        }
        Self { rows, exact }
    }

    /// First row (top-down) whose label matches.
    pub fn find(&self, label: &str, mode: LabelMatch) -> Option<usize> {
        let key = normalize_header(label);
        match mode {
            LabelMatch::Exact => self.exact.get(&key).copied(),
            LabelMatch::Contains => self
                .rows
                .iter()
                .find(|(text, _)| text.contains(key.as_str()))
                .map(|(_, row)| *row),
        }
    }
}
