//! File I/O for reconciliation jobs: statements, invoices and bank files
//! in, the report template in and out.

pub mod csv;
pub mod error;
pub mod xlsx;

use std::path::Path;

use tally_recon::SourceBook;

pub use error::WorkbookError;
pub use xlsx::{export_report, import_template, ExportStats};

const EXCEL_EXTENSIONS: [&str; 5] = ["xlsx", "xlsm", "xls", "xlsb", "ods"];

/// Load an input file by extension.
pub fn load_source(path: &Path) -> Result<SourceBook, WorkbookError> {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "csv" => csv::import(path),
        e if EXCEL_EXTENSIONS.contains(&e) => xlsx::import_book(path),
        _ => Err(WorkbookError::UnsupportedFormat {
            path: path.to_path_buf(),
        }),
    }
}
