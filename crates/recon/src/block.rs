//! Label blocks: invoices that carry a single statement block of labelled
//! amounts instead of an order table (Swiggy Dineout).
//!
//! The block runs from the first row whose label holds every `start` text to
//! the next row holding every `end` text. It is copied into a per-week
//! `SD{n}` sheet, and each configured item becomes a named value that report
//! rules can map like a calculation-sheet bucket.

use serde::Deserialize;

use crate::aggregate::{coerce_amount, BucketTransform};
use crate::cellref::{CellRef, Column};
use crate::error::ReconError;
use crate::mapping::MappingSource;
use crate::model::{normalize_header, HeaderIndex, RawValue};
use crate::source::{RawSheet, SourceBook};
use crate::workbook::{CellValue, GridSheet, LabelMatch};

#[derive(Debug, Clone, Deserialize)]
pub struct BlockSpec {
    /// Sheets searched for the block, in order; empty searches every sheet.
    #[serde(default)]
    pub sheets: Vec<String>,
    #[serde(default = "default_label_column")]
    pub label_column: Column,
    /// Texts that must all appear in the block's first label (case-sensitive).
    pub start: Vec<String>,
    /// Texts that must all appear in the block's last label (case-sensitive).
    pub end: Vec<String>,
    /// Columns copied, counted from the label column.
    #[serde(default = "default_width")]
    pub width: usize,
    #[serde(default = "default_prefix")]
    pub prefix: String,
    /// Column of the copy receiving each matched row's computed amount.
    pub result_column: Column,
    pub items: Vec<BlockItem>,
}

/// A named amount read from the rows whose label matches.
#[derive(Debug, Clone, Deserialize)]
pub struct BlockItem {
    pub name: String,
    pub labels: Vec<String>,
    #[serde(default, rename = "match")]
    pub match_mode: LabelMatch,
    /// Source column holding the amount.
    pub column: Column,
    #[serde(default)]
    pub transform: BucketTransform,
    /// Drop the sign before the transform.
    #[serde(default)]
    pub absolute: bool,
    /// Add every matching row instead of taking the first.
    #[serde(default)]
    pub sum: bool,
    /// Cell of the copy receiving the item total.
    #[serde(default)]
    pub total_cell: Option<CellRef>,
}

fn default_label_column() -> Column {
    Column(1)
}

fn default_width() -> usize {
    4
}

fn default_prefix() -> String {
    "SD".into()
}

impl BlockSpec {
    pub fn sheet_name(&self, week_number: u32) -> String {
        format!("{}{}", self.prefix, week_number)
    }

    /// Locate the block in `book`.
    pub fn find<'b>(&self, book: &'b SourceBook) -> Result<Block<'b>, ReconError> {
        let candidates: Vec<&RawSheet> = if self.sheets.is_empty() {
            book.sheets.iter().collect()
        } else {
            self.sheets.iter().filter_map(|s| book.sheet_any(std::slice::from_ref(s))).collect()
        };
        let col = self.label_column.index();
        for sheet in candidates {
            let Some(first) = (0..sheet.rows.len()).find(|&r| holds_all(&sheet.cell(r, col).as_text(), &self.start))
            else {
                continue;
            };
            if let Some(last) = (first..sheet.rows.len()).find(|&r| holds_all(&sheet.cell(r, col).as_text(), &self.end)) {
                tracing::debug!(sheet = %sheet.name, first, last, "label block found");
                return Ok(Block { sheet, first, last });
            }
        }
        Err(ReconError::MissingBlock {
            file: book.file_name(),
            marker: self.start.join(" "),
        })
    }

    fn item_for(&self, label: &str) -> Option<usize> {
        let key = normalize_header(label);
        if key.is_empty() {
            return None;
        }
        self.items.iter().position(|item| {
            item.labels.iter().any(|l| {
                let l = normalize_header(l);
                match item.match_mode {
                    LabelMatch::Exact => key == l,
                    LabelMatch::Contains => key.contains(l.as_str()),
                }
            })
        })
    }

    /// Amounts of every item. Each row counts toward the first item its label matches.
    pub fn read(&self, block: &Block<'_>) -> BlockValues {
        let mut items: Vec<Option<ItemAmount>> = vec![None; self.items.len()];
        let col = self.label_column.index();
        for offset in 0..block.len() {
            let row = block.first + offset;
            let Some(i) = self.item_for(&block.sheet.cell(row, col).as_text()) else {
                continue;
            };
            let item = &self.items[i];
            if !item.sum && items[i].is_some() {
                continue;
            }
            let mut raw = coerce_amount(block.sheet.cell(row, item.column.index()));
            if item.absolute {
                raw = raw.abs();
            }
            let value = item.transform.apply(raw);
            let slot = items[i].get_or_insert_with(ItemAmount::default);
            slot.rows.push((offset, value));
            slot.total += value;
        }
        BlockValues { items }
    }
}

fn holds_all(label: &str, texts: &[String]) -> bool {
    !texts.is_empty() && texts.iter().all(|t| label.contains(t.as_str()))
}

/// The located block: rows `first..=last` of one source sheet.
#[derive(Debug, Clone, Copy)]
pub struct Block<'b> {
    pub sheet: &'b RawSheet,
    pub first: usize,
    pub last: usize,
}

impl Block<'_> {
    pub fn len(&self) -> usize {
        self.last - self.first + 1
    }

    pub fn is_empty(&self) -> bool {
        self.last < self.first
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ItemAmount {
    /// Block-relative row and computed amount of each matched row.
    pub rows: Vec<(usize, f64)>,
    pub total: f64,
}

/// Item amounts in declaration order; `None` when no row matched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BlockValues {
    pub items: Vec<Option<ItemAmount>>,
}

impl BlockValues {
    pub fn total(&self, item: usize) -> Option<f64> {
        self.items.get(item)?.as_ref().map(|a| a.total)
    }
}

/// Copy the block into `target` at row 1, then write computed amounts beside it.
pub fn write_block_copy(spec: &BlockSpec, block: &Block<'_>, values: &BlockValues, target: &mut GridSheet) {
    let from = spec.label_column.index();
    for offset in 0..block.len() {
        let cells = block.sheet.rows.get(block.first + offset).map_or(&[][..], Vec::as_slice);
        let slice: Vec<RawValue> = (from..from + spec.width)
            .map(|c| cells.get(c).cloned().unwrap_or(RawValue::Empty))
            .collect();
        target.write_row(offset, &slice);
    }
    let result_col = spec.result_column.index();
    for (item, amount) in spec.items.iter().zip(&values.items) {
        let Some(amount) = amount else {
            continue;
        };
        for &(row, v) in &amount.rows {
            target.set(CellRef::new(row, result_col), CellValue::Number(v));
        }
        if let Some(cell) = item.total_cell {
            target.set(cell, CellValue::Number(amount.total));
        }
    }
}

/// One week's block copy, seen as a mapping source keyed by item name.
#[derive(Debug, Clone)]
pub struct BlockWeek {
    name: String,
    headers: HeaderIndex,
    cells: Vec<CellRef>,
    values: Vec<f64>,
}

impl BlockWeek {
    pub fn new(spec: &BlockSpec, week_number: u32, values: &BlockValues) -> Self {
        let result_col = spec.result_column.index();
        let mut names = Vec::new();
        let mut cells = Vec::new();
        let mut totals = Vec::new();
        for (item, amount) in spec.items.iter().zip(&values.items) {
            match amount {
                Some(a) => {
                    let first_row = a.rows.first().map_or(0, |(r, _)| *r);
                    names.push(item.name.clone());
                    cells.push(item.total_cell.unwrap_or(CellRef::new(first_row, result_col)));
                    totals.push(a.total);
                }
                // Unmatched items stay out of the header so their rules leave cells untouched.
                None => {
                    names.push(String::new());
                    cells.push(CellRef::new(0, result_col));
                    totals.push(0.0);
                }
            }
        }
        Self {
            name: spec.sheet_name(week_number),
            headers: HeaderIndex::new(names),
            cells,
            values: totals,
        }
    }
}

impl MappingSource for BlockWeek {
    fn sheet_name(&self) -> &str {
        &self.name
    }

    fn headers(&self) -> &HeaderIndex {
        &self.headers
    }

    fn cell_for(&self, column: usize, _row: u32) -> CellRef {
        self.cells.get(column).copied().unwrap_or(CellRef::new(0, 0))
    }

    fn value_at(&self, column: usize, _row: u32) -> f64 {
        self.values.get(column).copied().unwrap_or(0.0)
    }
}
