// Excel import (xlsx, xlsm, xls, xlsb, ods) and report export (xlsx only)
//
// Import reads cached values; the template import also keeps formulas so
// they survive the round trip. Export writes values and formulas without
// styling.

use std::path::Path;

use calamine::{open_workbook_auto, Data, Range, Reader, Sheets};
use chrono::NaiveDate;
use rust_xlsxwriter::{Format, Workbook as XlsxWorkbook, Worksheet};
use tally_recon::dates::{excel_serial, from_excel_serial};
use tally_recon::{CellRef, CellValue, GridSheet, RawSheet, RawValue, ReportWorkbook, SourceBook};

use crate::error::WorkbookError;

const DATE_FORMAT: &str = "dd/mm/yyyy";

/// Counts from one export.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExportStats {
    pub sheets: usize,
    pub cells: usize,
    pub formulas: usize,
}

// ============================================================================
// Import
// ============================================================================

fn open(path: &Path) -> Result<Sheets<std::io::BufReader<std::fs::File>>, WorkbookError> {
    let workbook = open_workbook_auto(path).map_err(|e| WorkbookError::open(path, e))?;
    if workbook.sheet_names().is_empty() {
        return Err(WorkbookError::NoSheets {
            path: path.to_path_buf(),
        });
    }
    Ok(workbook)
}

/// Load every sheet of a statement or invoice as raw values.
pub fn import_book(path: &Path) -> Result<SourceBook, WorkbookError> {
    let mut workbook = open(path)?;
    let mut sheets = Vec::new();

    for name in workbook.sheet_names() {
        let range = workbook
            .worksheet_range(&name)
            .map_err(|e| WorkbookError::open(path, format!("sheet '{name}': {e}")))?;
        sheets.push(RawSheet::new(name, dense_rows(&range)));
    }

    tracing::debug!(file = %path.display(), sheets = sheets.len(), "workbook loaded");
    Ok(SourceBook::new(path, sheets))
}

/// Load the report template: values plus formulas, sheet order kept.
pub fn import_template(path: &Path) -> Result<ReportWorkbook, WorkbookError> {
    let mut workbook = open(path)?;
    let mut sheets = Vec::new();

    for name in workbook.sheet_names() {
        let mut sheet = GridSheet::new(name.clone());

        let values = workbook
            .worksheet_range(&name)
            .map_err(|e| WorkbookError::open(path, format!("sheet '{name}': {e}")))?;
        let (r0, c0) = values.start().unwrap_or((0, 0));
        for (row, col, data) in values.used_cells() {
            sheet.set_raw(CellRef::new(r0 as usize + row, c0 as usize + col), &raw_value(data));
        }

        // Formula ranges are optional for xls/ods readers; values alone still work.
        match workbook.worksheet_formula(&name) {
            Ok(formulas) => {
                let (r0, c0) = formulas.start().unwrap_or((0, 0));
                for (row, col, f) in formulas.used_cells() {
                    if f.is_empty() {
                        continue;
                    }
                    let at = CellRef::new(r0 as usize + row, c0 as usize + col);
                    sheet.set(at, CellValue::Formula(format!("={}", f.trim_start_matches('='))));
                }
            }
            Err(e) => tracing::debug!(sheet = %name, error = %e, "no formulas read"),
        }

        sheets.push(sheet);
    }

    tracing::debug!(file = %path.display(), sheets = sheets.len(), "template loaded");
    Ok(ReportWorkbook::from_sheets(sheets))
}

/// Rows from A1, padding the range's start offset with empty cells.
fn dense_rows(range: &Range<Data>) -> Vec<Vec<RawValue>> {
    let Some((r0, c0)) = range.start() else {
        return Vec::new();
    };
    let mut rows = vec![Vec::new(); r0 as usize];
    for row in range.rows() {
        let mut out = vec![RawValue::Empty; c0 as usize];
        out.extend(row.iter().map(raw_value));
        while matches!(out.last(), Some(RawValue::Empty)) {
            out.pop();
        }
        rows.push(out);
    }
    rows
}

fn raw_value(cell: &Data) -> RawValue {
    match cell {
        Data::Empty => RawValue::Empty,
        Data::String(s) => RawValue::from(s.as_str()),
        Data::Float(n) => RawValue::Number(*n),
        Data::Int(n) => RawValue::Number(*n as f64),
        Data::Bool(b) => RawValue::Bool(*b),
        Data::DateTime(dt) => {
            let serial = dt.as_f64();
            from_excel_serial(serial).map_or(RawValue::Number(serial), RawValue::Date)
        }
        Data::DateTimeIso(s) => s
            .get(..10)
            .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok())
            .map_or_else(|| RawValue::Text(s.clone()), RawValue::Date),
        Data::DurationIso(s) => RawValue::Text(s.clone()),
        Data::Error(e) => RawValue::Text(e.to_string()),
    }
}

// ============================================================================
// Export
// ============================================================================

/// Write the report as a fresh xlsx file.
pub fn export_report(report: &ReportWorkbook, path: &Path) -> Result<ExportStats, WorkbookError> {
    let mut workbook = XlsxWorkbook::new();
    let mut stats = ExportStats::default();

    for sheet in report.sheets() {
        let worksheet = workbook
            .add_worksheet()
            .set_name(&sheet.name)
            .map_err(|e| WorkbookError::write(path, format!("sheet '{}': {e}", sheet.name)))?;
        let (cells, formulas) = export_sheet_cells(sheet, worksheet)
            .map_err(|e| WorkbookError::write(path, format!("sheet '{}': {e}", sheet.name)))?;
        stats.cells += cells;
        stats.formulas += formulas;
        stats.sheets += 1;
    }

    workbook.save(path).map_err(|e| WorkbookError::write(path, e))?;
    tracing::info!(file = %path.display(), sheets = stats.sheets, cells = stats.cells, "report saved");
    Ok(stats)
}

/// Returns (cells_written, formulas_written).
fn export_sheet_cells(sheet: &GridSheet, worksheet: &mut Worksheet) -> Result<(usize, usize), rust_xlsxwriter::XlsxError> {
    let date_format = Format::new().set_num_format(DATE_FORMAT);
    let mut cells = 0;
    let mut formulas = 0;

    for (at, value) in sheet.cells() {
        let row = at.row as u32;
        let col = at.col as u16;
        match value {
            CellValue::Text(s) => {
                worksheet.write_string(row, col, s)?;
            }
            CellValue::Number(n) => {
                worksheet.write_number(row, col, *n)?;
            }
            CellValue::Bool(b) => {
                worksheet.write_boolean(row, col, *b)?;
            }
            CellValue::Date(d) => {
                worksheet.write_number_with_format(row, col, excel_serial(*d), &date_format)?;
            }
            CellValue::Formula(f) => {
                worksheet.write_formula(row, col, f.strip_prefix('=').unwrap_or(f))?;
                formulas += 1;
            }
        }
        cells += 1;
    }

    Ok((cells, formulas))
}
