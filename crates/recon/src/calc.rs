//! Calculation sheet for the aggregate flow: one row per bucket, one column per week.

use crate::aggregate::AggregationOutput;
use crate::cellref::CellRef;
use crate::config::CalcSpec;
use crate::mapping::MappingSource;
use crate::model::HeaderIndex;
use crate::weeks::WeekStructure;
use crate::workbook::{CellValue, GridSheet};

/// Write week headers and bucket sums as literals.
pub fn write_calc_sheet(sheet: &mut GridSheet, spec: &CalcSpec, weeks: &WeekStructure, out: &AggregationOutput) {
    let header_row = spec.header_row.saturating_sub(1);
    for w in &weeks.weeks {
        let col = spec.week_col(w.week_number);
        sheet.set(CellRef::new(header_row, col), CellValue::Text(spec.header_for(w.week_number)));
        let Some(agg) = out.week(w.week_number) else {
            continue;
        };
        for (i, bucket) in spec.buckets.iter().enumerate() {
            sheet.set(CellRef::new(spec.bucket_row(i), col), CellValue::Number(agg.get(bucket)));
        }
    }
}

/// One week's column of the calculation sheet, seen as a mapping source.
#[derive(Debug, Clone)]
pub struct CalcWeek<'a> {
    spec: &'a CalcSpec,
    headers: HeaderIndex,
    week_number: u32,
    values: Vec<f64>,
}

impl<'a> CalcWeek<'a> {
    pub fn new(spec: &'a CalcSpec, week_number: u32, out: &AggregationOutput) -> Self {
        let values = spec
            .buckets
            .iter()
            .map(|b| out.week(week_number).map_or(0.0, |w| w.get(b)))
            .collect();
        Self {
            spec,
            headers: HeaderIndex::new(spec.buckets.iter().cloned()),
            week_number,
            values,
        }
    }
}

impl MappingSource for CalcWeek<'_> {
    fn sheet_name(&self) -> &str {
        &self.spec.sheet
    }

    fn headers(&self) -> &HeaderIndex {
        &self.headers
    }

    fn cell_for(&self, column: usize, _row: u32) -> CellRef {
        CellRef::new(self.spec.bucket_row(column), self.spec.week_col(self.week_number))
    }

    fn value_at(&self, column: usize, _row: u32) -> f64 {
        self.values.get(column).copied().unwrap_or(0.0)
    }
}
