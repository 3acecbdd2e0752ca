//! Source workbooks as loaded grids, and header detection over them.

use std::io::Read;
use std::path::{Path, PathBuf};

use crate::aggregate::{parse_amount_text, resolve_columns, ColumnMatch};
use crate::cellref::SheetCell;
use crate::error::ReconError;
use crate::matcher::SummaryCellSource;
use crate::model::{HeaderIndex, RawValue, TransactionRow};

/// Rows scanned when looking for a header row.
pub const HEADER_SCAN_ROWS: usize = 30;

/// A whole sheet of raw values, row-major, 0-indexed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawSheet {
    pub name: String,
    pub rows: Vec<Vec<RawValue>>,
}

impl RawSheet {
    pub fn new(name: impl Into<String>, rows: Vec<Vec<RawValue>>) -> Self {
        Self {
            name: name.into(),
            rows,
        }
    }

    /// Parse comma-separated text into a sheet. Numeric-looking fields become numbers.
    pub fn from_csv_reader<R: Read>(name: &str, reader: R) -> Result<Self, ReconError> {
        Self::from_delimited_reader(name, reader, b',')
    }

    pub fn from_delimited_reader<R: Read>(name: &str, reader: R, delimiter: u8) -> Result<Self, ReconError> {
        let mut rdr = csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .has_headers(false)
            .flexible(true)
            .from_reader(reader);
        let mut rows = Vec::new();
        for record in rdr.records() {
            let record = record?;
            rows.push(record.iter().map(csv_field).collect());
        }
        Ok(Self::new(name, rows))
    }

    pub fn cell(&self, row: usize, col: usize) -> &RawValue {
        self.rows
            .get(row)
            .and_then(|r| r.get(col))
            .unwrap_or(&RawValue::Empty)
    }

    pub fn width(&self) -> usize {
        self.rows.iter().map(Vec::len).max().unwrap_or(0)
    }

    /// Find the header row: the configured 1-based row, or the first row
    /// within [`HEADER_SCAN_ROWS`] holding one of the date headers.
    pub fn table(
        &self,
        header_row: Option<usize>,
        date_columns: &[String],
        date_match: ColumnMatch,
    ) -> Result<SourceTable<'_>, ReconError> {
        let missing = || ReconError::MissingRequiredColumn {
            sheet: self.name.clone(),
            column: date_columns.first().cloned().unwrap_or_default(),
        };

        let row_idx = match header_row {
            Some(r) if r >= 1 => r - 1,
            _ => (0..self.rows.len().min(HEADER_SCAN_ROWS))
                .find(|&r| {
                    let headers = self.header_index(r);
                    !resolve_columns(&headers, date_columns, date_match).is_empty()
                })
                .ok_or_else(missing)?,
        };

        if row_idx >= self.rows.len() {
            return Err(missing());
        }
        Ok(SourceTable {
            sheet: self,
            header_row: row_idx,
            headers: self.header_index(row_idx),
        })
    }

    fn header_index(&self, row: usize) -> HeaderIndex {
        HeaderIndex::new(
            self.rows
                .get(row)
                .map(|r| r.iter().map(|v| v.as_text().trim().to_string()).collect::<Vec<_>>())
                .unwrap_or_default(),
        )
    }
}

fn csv_field(field: &str) -> RawValue {
    let trimmed = field.trim();
    if trimmed.is_empty() {
        return RawValue::Empty;
    }
    // Plain numbers only; currency text stays text and is coerced later.
    if trimmed.chars().all(|c| c.is_ascii_digit() || matches!(c, '.' | '-' | '+' | 'e' | 'E'))
        && trimmed.chars().any(|c| c.is_ascii_digit())
    {
        if let Ok(n) = trimmed.parse::<f64>() {
            return RawValue::Number(n);
        }
    }
    RawValue::Text(field.to_string())
}

/// A located header row over a [`RawSheet`].
#[derive(Debug, Clone)]
pub struct SourceTable<'a> {
    pub sheet: &'a RawSheet,
    /// 0-indexed header row.
    pub header_row: usize,
    pub headers: HeaderIndex,
}

impl<'a> SourceTable<'a> {
    pub fn name(&self) -> &'a str {
        &self.sheet.name
    }

    /// Data rows below the header, skipping rows with no content.
    pub fn rows(&self) -> impl Iterator<Item = TransactionRow<'_>> + '_ {
        self.sheet.rows[self.header_row + 1..]
            .iter()
            .filter(|r| r.iter().any(|v| !v.is_blank()))
            .map(|r| TransactionRow::new(&self.headers, r))
    }

    pub fn header_cells(&self) -> &'a [RawValue] {
        &self.sheet.rows[self.header_row]
    }
}

/// One source file: its sheets in workbook order.
#[derive(Debug, Clone, Default)]
pub struct SourceBook {
    pub path: PathBuf,
    pub sheets: Vec<RawSheet>,
}

impl SourceBook {
    pub fn new(path: impl Into<PathBuf>, sheets: Vec<RawSheet>) -> Self {
        Self {
            path: path.into(),
            sheets,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    pub fn sheet(&self, name: &str) -> Option<&RawSheet> {
        self.sheets.iter().find(|s| s.name == name)
    }

    /// First sheet whose name equals one of `candidates` (tried in order).
    /// `*` stands for the book's first sheet; a CSV book answers any request.
    pub fn sheet_any(&self, candidates: &[String]) -> Option<&RawSheet> {
        candidates
            .iter()
            .find_map(|c| match c.as_str() {
                "*" => self.sheets.first(),
                name => self.sheet(name),
            })
            .or_else(|| match self.sheets.as_slice() {
                [only] if self.is_csv() => Some(only),
                _ => None,
            })
    }

    pub fn is_csv(&self) -> bool {
        self.path
            .extension()
            .is_some_and(|e| e.eq_ignore_ascii_case("csv"))
    }

    pub fn value_at(&self, at: &SheetCell) -> Option<&RawValue> {
        let v = self.sheet(&at.sheet)?.cell(at.cell.row, at.cell.col);
        (!v.is_blank()).then_some(v)
    }

    /// Numeric value of a cell; currency text is accepted.
    pub fn number_at(&self, at: &SheetCell) -> Option<f64> {
        match self.value_at(at)? {
            RawValue::Number(n) => Some(*n),
            RawValue::Text(s) => parse_amount_text(s),
            _ => None,
        }
    }
}

impl SummaryCellSource for SourceBook {
    fn cell_text(&self, cell: &SheetCell) -> Option<String> {
        self.value_at(cell).map(|v| v.as_text().into_owned())
    }
}
