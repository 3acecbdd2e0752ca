//! Per-week detail sheets (`D1W{n}`): four computed total rows above the
//! copied source rows.

use serde::Deserialize;

use crate::aggregate::coerce_amount;
use crate::cellref::CellRef;
use crate::error::ReconError;
use crate::model::{HeaderIndex, RawValue};
use crate::workbook::{CellValue, GridSheet};

/// 1-based row of the copied header in a detail sheet.
pub const DETAIL_HEADER_ROW: u32 = 5;
/// 1-based computed rows.
pub const CANCELLED_ROW: u32 = 1;
pub const DELIVERED_ROW: u32 = 2;
pub const TAXED_ROW: u32 = 3;
pub const TOTAL_ROW: u32 = 4;

/// Which sum the tax overlay row is computed from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaxBase {
    #[default]
    Delivered,
    Total,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DetailSpec {
    #[serde(default = "default_prefix")]
    pub prefix: String,
    /// Sums run from this column to the last column.
    pub first_summed_column: String,
    pub status_column: String,
    #[serde(default = "default_delivered")]
    pub delivered: Vec<String>,
    #[serde(default = "default_cancelled")]
    pub cancelled: Vec<String>,
    #[serde(default)]
    pub tax_overlay_on: TaxBase,
    #[serde(default = "default_tax_rate")]
    pub tax_rate: f64,
}

fn default_prefix() -> String {
    "D1W".into()
}

fn default_delivered() -> Vec<String> {
    vec!["DELIVERED".into()]
}

fn default_cancelled() -> Vec<String> {
    ["CANCELLED", "TIMEDOUT", "TIMEOUT", "REJECTED"].map(String::from).to_vec()
}

fn default_tax_rate() -> f64 {
    1.18
}

impl DetailSpec {
    pub fn sheet_name(&self, week_number: u32) -> String {
        format!("{}{}", self.prefix, week_number)
    }

    fn status_of(&self, value: &RawValue) -> Option<OrderStatus> {
        let text = value.as_text();
        let s = text.trim();
        if self.delivered.iter().any(|d| d.eq_ignore_ascii_case(s)) {
            Some(OrderStatus::Delivered)
        } else if self.cancelled.iter().any(|c| c.eq_ignore_ascii_case(s)) {
            Some(OrderStatus::Cancelled)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OrderStatus {
    Delivered,
    Cancelled,
}

/// A built detail sheet, ready to be written into the report.
#[derive(Debug, Clone)]
pub struct DetailSheet {
    pub name: String,
    pub week_number: u32,
    pub header: Vec<RawValue>,
    pub headers: HeaderIndex,
    pub rows: Vec<Vec<RawValue>>,
    first_summed: usize,
    cancelled: Vec<f64>,
    delivered: Vec<f64>,
    tax_base: TaxBase,
    tax_rate: f64,
    /// Rows whose status was neither delivered nor cancelled.
    pub unsummed_rows: usize,
}

impl DetailSheet {
    /// Total the in-month rows of one week by order status.
    pub fn build(
        spec: &DetailSpec,
        week_number: u32,
        header: Vec<RawValue>,
        rows: Vec<Vec<RawValue>>,
    ) -> Result<Self, ReconError> {
        let name = spec.sheet_name(week_number);
        let headers = HeaderIndex::new(header.iter().map(|v| v.as_text().trim().to_string()));
        let missing = |column: &str| ReconError::MissingRequiredColumn {
            sheet: name.clone(),
            column: column.to_string(),
        };
        let first_summed = headers
            .exact(&spec.first_summed_column)
            .ok_or_else(|| missing(&spec.first_summed_column))?;
        let status_col = headers
            .exact(&spec.status_column)
            .ok_or_else(|| missing(&spec.status_column))?;

        let width = header.len().max(rows.iter().map(Vec::len).max().unwrap_or(0));
        let span = width.saturating_sub(first_summed);
        let mut cancelled = vec![0.0; span];
        let mut delivered = vec![0.0; span];
        let mut unsummed_rows = 0;

        for row in &rows {
            let status = row.get(status_col).unwrap_or(&RawValue::Empty);
            let target = match spec.status_of(status) {
                Some(OrderStatus::Delivered) => &mut delivered,
                Some(OrderStatus::Cancelled) => &mut cancelled,
                None => {
                    unsummed_rows += 1;
                    continue;
                }
            };
            for (i, slot) in target.iter_mut().enumerate() {
                *slot += coerce_amount(row.get(first_summed + i).unwrap_or(&RawValue::Empty));
            }
        }

        if unsummed_rows > 0 {
            tracing::debug!(sheet = %name, rows = unsummed_rows, "rows with other statuses left out of totals");
        }

        Ok(Self {
            name,
            week_number,
            header,
            headers,
            rows,
            first_summed,
            cancelled,
            delivered,
            tax_base: spec.tax_overlay_on,
            tax_rate: spec.tax_rate,
            unsummed_rows,
        })
    }

    /// Computed value at a 1-based computed row (1..=4) for a 0-indexed column.
    pub fn computed(&self, row: u32, col: usize) -> Option<f64> {
        let i = col.checked_sub(self.first_summed)?;
        let c = *self.cancelled.get(i)?;
        let d = *self.delivered.get(i)?;
        match row {
            CANCELLED_ROW => Some(c),
            DELIVERED_ROW => Some(d),
            TAXED_ROW => Some(match self.tax_base {
                TaxBase::Delivered => d * self.tax_rate,
                TaxBase::Total => (d + c) * self.tax_rate,
            }),
            TOTAL_ROW => Some(d + c),
            _ => None,
        }
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Count of data rows with a non-zero number in `col`.
    pub fn nonzero_count(&self, col: usize) -> usize {
        self.rows
            .iter()
            .filter(|r| r.get(col).is_some_and(|v| coerce_amount(v) != 0.0))
            .count()
    }

    /// Write computed rows, header and data into `sheet`.
    pub fn write_into(&self, sheet: &mut GridSheet) {
        for col in self.first_summed..self.first_summed + self.cancelled.len() {
            for row in CANCELLED_ROW..=TOTAL_ROW {
                if let Some(v) = self.computed(row, col) {
                    sheet.set(CellRef::new(row as usize - 1, col), CellValue::Number(v));
                }
            }
        }
        let header_idx = DETAIL_HEADER_ROW as usize - 1;
        sheet.write_row(header_idx, &self.header);
        for (i, row) in self.rows.iter().enumerate() {
            sheet.write_row(header_idx + 1 + i, row);
        }
    }
}
