use std::io::Write;

use chrono::NaiveDate;
use tally_io::{export_report, import_template, load_source, WorkbookError};
use tally_recon::{CellRef, CellValue, GridSheet, RawValue, ReportWorkbook};

#[test]
fn report_survives_save_and_reload() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("report.xlsx");

    let mut cashflow = GridSheet::new("Cashflow");
    cashflow.set(CellRef::new(0, 1), CellValue::Text("Item sales (Delivered orders)".into()));
    cashflow.set(CellRef::new(0, 2), CellValue::Formula("='D1W1'!D2".into()));
    cashflow.set(CellRef::new(1, 2), CellValue::Number(1495.5));
    let mut detail = GridSheet::new("D1W1");
    detail.set(CellRef::new(1, 3), CellValue::Number(180.0));
    detail.set(CellRef::new(5, 1), CellValue::Date(NaiveDate::from_ymd_opt(2025, 10, 7).unwrap()));
    let report = ReportWorkbook::from_sheets(vec![cashflow, detail]);

    let stats = export_report(&report, &path).unwrap();
    assert_eq!(stats.sheets, 2);
    assert_eq!(stats.formulas, 1);
    assert_eq!(stats.cells, 5);

    let back = import_template(&path).unwrap();
    assert_eq!(back.sheet_names(), vec!["Cashflow", "D1W1"]);
    let cashflow = back.sheet("Cashflow").unwrap();
    assert_eq!(cashflow.text(CellRef::new(0, 1)), Some("Item sales (Delivered orders)"));
    assert_eq!(
        cashflow.get(CellRef::new(0, 2)),
        Some(&CellValue::Formula("='D1W1'!D2".into()))
    );
    assert_eq!(cashflow.number(CellRef::new(1, 2)), Some(1495.5));
    assert_eq!(back.sheet("D1W1").unwrap().number(CellRef::new(1, 3)), Some(180.0));
}

#[test]
fn statement_sheets_load_as_raw_rows() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("invoice.xlsx");

    let mut orders = GridSheet::new("Order Level");
    orders.set(CellRef::new(2, 0), CellValue::Text("Order Date".into()));
    orders.set(CellRef::new(3, 0), CellValue::Text("07/10/2025".into()));
    orders.set(CellRef::new(3, 2), CellValue::Number(120.0));
    export_report(&ReportWorkbook::from_sheets(vec![orders]), &path).unwrap();

    let book = load_source(&path).unwrap();
    let sheet = book.sheet("Order Level").unwrap();
    assert_eq!(sheet.cell(2, 0), &RawValue::Text("Order Date".into()));
    assert_eq!(sheet.cell(3, 2), &RawValue::Number(120.0));
    assert_eq!(sheet.cell(0, 0), &RawValue::Empty);
    assert!(!book.is_csv());
}

#[test]
fn csv_with_semicolons_and_legacy_encoding() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("paytm.csv");
    let mut f = std::fs::File::create(&path).unwrap();
    // 0xE9 is 'é' in Windows-1252 and invalid UTF-8 on its own.
    f.write_all(b"transaction_date;status;amount;merchant\n03/10/2025;SUCCESS;1050;Caf\xe9\n").unwrap();
    drop(f);

    let book = load_source(&path).unwrap();
    assert!(book.is_csv());
    let sheet = &book.sheets[0];
    assert_eq!(sheet.name, "paytm");
    assert_eq!(sheet.cell(1, 2), &RawValue::Number(1050.0));
    assert_eq!(sheet.cell(1, 3), &RawValue::Text("Café".into()));
}

#[test]
fn unknown_extension_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("statement.pdf");
    std::fs::write(&path, b"%PDF").unwrap();
    assert!(matches!(load_source(&path), Err(WorkbookError::UnsupportedFormat { .. })));
}

#[test]
fn missing_file_reports_its_path() {
    let err = import_template(std::path::Path::new("/nonexistent/template.xlsx")).unwrap_err();
    assert!(err.to_string().contains("template.xlsx"), "{err}");
}
