use tally_recon::profiles;
use tally_recon::{
    run, CellRef, CellValue, GridSheet, JobInputs, JobParams, RawSheet, RawValue, ReportWorkbook,
    RunReport, SourceBook, WeekBoundaries,
};

fn t(s: &str) -> RawValue {
    RawValue::from(s)
}

fn n(v: f64) -> RawValue {
    RawValue::Number(v)
}

fn labelled(name: &str, col: usize, labels: &[(usize, &str)]) -> GridSheet {
    let mut sheet = GridSheet::new(name);
    for (row, label) in labels {
        sheet.set(CellRef::new(*row, col), CellValue::Text(label.to_string()));
    }
    sheet
}

fn october() -> JobParams {
    JobParams {
        month: "October".into(),
        boundaries: WeekBoundaries::new((1, 5), (27, 31)),
        working_year: 2025,
        client: Some("Spice Route".into()),
    }
}

fn run_profile(name: &str, inputs: &JobInputs, report: &mut ReportWorkbook) -> (RunReport, Vec<u8>) {
    let profile = profiles::builtin(name).unwrap();
    let mut seen = Vec::new();
    let result = run(&profile, &october(), inputs, report, &mut |p| seen.push(p)).unwrap();
    (result, seen)
}

fn formula(sheet: &GridSheet, row: usize, col: usize) -> Option<&str> {
    match sheet.get(CellRef::new(row, col)) {
        Some(CellValue::Formula(f)) => Some(f.as_str()),
        _ => None,
    }
}

// -------------------------------------------------------------------------
// Invoice flow
// -------------------------------------------------------------------------

fn swiggy_template() -> ReportWorkbook {
    let mut summary = labelled("Summary", 1, &[(1, "Payout summary for July")]);
    summary.set(CellRef::new(0, 0), CellValue::Text("Client".into()));
    ReportWorkbook::from_sheets(vec![
        summary,
        labelled(
            "Cashflow",
            1,
            &[
                (5, "Item sales (Delivered orders)"),
                (6, "Add:- Compensation paid for cancelled orders"),
                (7, "High Priority"),
                (8, "Actual Receipts"),
            ],
        ),
        GridSheet::new("Discrepancies"),
    ])
}

fn swiggy_invoice(file: &str) -> SourceBook {
    let orders = RawSheet::new(
        "Order Level",
        vec![
            vec![t("Swiggy weekly invoice")],
            vec![],
            vec![
                t("Order ID"),
                t("Order Date"),
                t("Order Status"),
                t("Item Total"),
                t("Total Customer Paid"),
                t("Complaint & Cancellation Charges"),
                t("Customer Complaints"),
            ],
            vec![t("S1"), t("07/10/2025"), t("Delivered"), n(100.0), n(120.0), n(0.0), n(0.0)],
            vec![t("S2"), t("08/10/2025"), t("Cancelled"), n(50.0), n(50.0), n(10.0), n(5.0)],
            vec![t("S3"), t("09/10/2025"), t("Delivered"), n(80.0), n(90.0), n(0.0), n(0.0)],
        ],
    );
    let mut summary_rows = vec![Vec::new(); 15];
    summary_rows[13] = vec![RawValue::Empty, RawValue::Empty, n(1500.0)];
    summary_rows[14] = vec![RawValue::Empty, RawValue::Empty, n(42.0)];
    let summary = RawSheet::new("Summary", summary_rows);
    let other = RawSheet::new(
        "Other charges and deductions",
        vec![
            vec![t("Other charges")],
            vec![],
            vec![],
            vec![t("Description"), t("Amount")],
            vec![t("Ads"), n(300.0)],
            vec![t("Total Adjustments"), n(300.0)],
        ],
    );
    SourceBook::new(file, vec![orders, summary, other])
}

fn bank_statement() -> SourceBook {
    SourceBook::new(
        "bank.xlsx",
        vec![RawSheet::new(
            "Statement",
            vec![
                vec![t("Date"), t("Narration"), t("Deposit Amt.")],
                vec![t("14/10/2025"), t("NEFT SWIGGY"), n(1495.0)],
                vec![t("15/10/2025"), t("NEFT OTHER"), n(9000.0)],
            ],
        )],
    )
}

#[test]
fn invoice_flow_builds_detail_and_maps_report() {
    let inputs = JobInputs {
        sources: vec![
            swiggy_invoice("Outlet_06_Oct_2025_12_Oct_2025.xlsx"),
            swiggy_invoice("Outlet_13_Sep_2025_19_Sep_2025.xlsx"),
        ],
        bank: Some(bank_statement()),
    };
    let mut report = swiggy_template();
    let (result, progress) = run_profile("swiggy", &inputs, &mut report);

    assert_eq!(progress, vec![10, 40, 70]);
    assert_eq!(result.weeks.len(), 5);
    assert_eq!(result.weeks_processed, 1);
    assert_eq!(result.diagnostics.invoices_matched, 1);
    assert_eq!(result.diagnostics.unmatched_invoices.len(), 1);
    assert!(result.diagnostics.is_partial());

    let detail = report.sheet("D1W2").expect("detail sheet for week 2");
    assert_eq!(detail.number(CellRef::new(0, 3)), Some(50.0));
    assert_eq!(detail.number(CellRef::new(1, 3)), Some(180.0));
    assert_eq!(detail.number(CellRef::new(3, 3)), Some(230.0));
    assert_eq!(detail.text(CellRef::new(4, 3)), Some("Item Total"));
    assert!(report.sheet("D1W1").is_none());

    let cashflow = report.sheet("Cashflow").unwrap();
    // Week 2 sits one column right of the base column C.
    assert_eq!(formula(cashflow, 5, 3), Some("='D1W2'!D2"));
    assert_eq!(formula(cashflow, 6, 3), Some("='D1W2'!E1-'D1W2'!F1"));
    assert_eq!(formula(cashflow, 7, 3), Some("=-'D2W2'!B3"));
    assert_eq!(cashflow.number(CellRef::new(8, 3)), Some(1495.0));

    let additions = report.sheet("D2W2").unwrap();
    assert_eq!(additions.text(CellRef::new(2, 0)), Some("Total Adjustments"));

    let summary = report.sheet("Summary").unwrap();
    assert_eq!(summary.text(CellRef::new(0, 1)), Some("Spice Route"));
    assert_eq!(summary.text(CellRef::new(3, 3)), Some(result.weeks.weeks[1].label.as_str()));
    assert_eq!(summary.number(CellRef::new(5, 3)), Some(42.0));
    assert_eq!(summary.number(CellRef::new(11, 3)), Some(1.0));
    assert_eq!(summary.text(CellRef::new(1, 1)), Some("Payout summary for October"));

    assert!(report.has_sheet("BANK"));
    let note = report.sheet("Discrepancies").unwrap().text(CellRef::new(22, 1));
    assert!(note.unwrap().contains("1st week"), "{note:?}");
}

#[test]
fn invoice_flow_without_bank_leaves_a_note() {
    let inputs = JobInputs {
        sources: vec![swiggy_invoice("Outlet_06_Oct_2025_12_Oct_2025.xlsx")],
        bank: None,
    };
    let mut report = swiggy_template();
    run_profile("swiggy", &inputs, &mut report);

    let note = report.sheet("Discrepancies").unwrap().text(CellRef::new(22, 1));
    assert_eq!(note, Some(tally_recon::receipts::NO_BANK_NOTE));
    assert!(!report.has_sheet("BANK"));
}

#[test]
fn invoice_without_dated_filename_matches_by_summary_period() {
    let mut book = swiggy_invoice("swiggy_invoice_week2.xlsx");
    book.sheets[1].rows[11] = vec![RawValue::Empty, RawValue::Empty, t("6 Oct - 12 Oct")];
    let inputs = JobInputs {
        sources: vec![book],
        bank: None,
    };
    let mut report = swiggy_template();
    let (result, _) = run_profile("swiggy", &inputs, &mut report);

    assert_eq!(result.diagnostics.invoices_matched, 1);
    assert!(result.diagnostics.unmatched_invoices.is_empty());
    assert!(report.has_sheet("D1W2"));
    assert_eq!(formula(report.sheet("Cashflow").unwrap(), 5, 3), Some("='D1W2'!D2"));
}

// -------------------------------------------------------------------------
// Zomato weekly invoices
// -------------------------------------------------------------------------

fn zomato_invoice(file: &str, orders: Vec<Vec<RawValue>>, ads: f64) -> SourceBook {
    let mut rows = vec![Vec::new(); 6];
    rows[0] = vec![t("Zomato weekly payout")];
    rows.push(vec![
        t("Order ID"),
        t("Order Date"),
        t("Order status (Delivered/ Cancelled/ Rejected)"),
        t("Subtotal (items total)"),
        t("Packaging Charge"),
        t("Long distance enablement fee"),
        t("Discount on long distance enablement fee"),
        t("Order level Payout"),
    ]);
    rows.extend(orders);

    let blank = || RawValue::Empty;
    let additions = RawSheet::new(
        "Addition Deductions Details",
        vec![
            vec![t("Additions and deductions")],
            vec![],
            vec![blank(), t("Type"), blank(), blank(), blank(), blank(), t("Amount")],
            vec![blank(), t("Total Ads & miscellaneous services"), blank(), blank(), blank(), blank(), n(ads)],
        ],
    );
    SourceBook::new(file, vec![RawSheet::new("Order Level", rows), additions])
}

fn zomato_order(id: &str, date: &str, status: &str, amounts: [f64; 5]) -> Vec<RawValue> {
    let mut row = vec![t(id), t(date), t(status)];
    row.extend(amounts.map(n));
    row
}

fn zomato_template() -> ReportWorkbook {
    ReportWorkbook::from_sheets(vec![
        labelled("Summary", 1, &[(1, "Payout summary for July")]),
        labelled(
            "Cashflow",
            1,
            &[
                (3, "Opening Week Adjustments"),
                (4, "Item sales (Delivered orders)"),
                (5, "Add:- Packing charges"),
                (6, "Less:- Discount"),
                (7, "Long Distance Fee"),
                (8, "High Priority"),
                (12, "Closing Week Adjustments"),
            ],
        ),
        GridSheet::new("D2W4"),
    ])
}

#[test]
fn weekly_invoices_fill_cashflow_with_spillover() {
    let week1 = zomato_invoice(
        "Outlet_01_Oct_2025_05_Oct_2025.xlsx",
        vec![
            zomato_order("Z0", "30/09/2025", "DELIVERED", [100.0, 5.0, 0.0, 0.0, 80.0]),
            zomato_order("Z1", "03/10/2025", "DELIVERED", [200.0, 10.0, 30.0, 5.0, 150.0]),
            zomato_order("Z2", "04/10/2025", "CANCELLED", [50.0, 0.0, 0.0, 0.0, 40.0]),
        ],
        250.0,
    );
    let week5 = zomato_invoice(
        "Outlet_27_Oct_2025_31_Oct_2025.xlsx",
        vec![
            zomato_order("Z5", "28/10/2025", "DELIVERED", [300.0, 15.0, 0.0, 0.0, 240.0]),
            zomato_order("Z6", "01/11/2025", "DELIVERED", [70.0, 0.0, 0.0, 0.0, 60.0]),
        ],
        0.0,
    );
    let inputs = JobInputs {
        sources: vec![week1, week5],
        bank: None,
    };
    let mut report = zomato_template();
    let (result, _) = run_profile("zomato", &inputs, &mut report);

    let d = &result.diagnostics;
    assert_eq!(d.invoices_matched, 2);
    assert_eq!(result.weeks_processed, 2);
    assert_eq!(d.rows.opening, 1);
    assert_eq!(d.rows.closing, 1);
    assert_eq!(d.opening_spillover, 80.0);
    assert_eq!(d.closing_spillover, 60.0);

    let detail = report.sheet("D1W1").unwrap();
    assert_eq!(detail.number(CellRef::new(1, 3)), Some(200.0));
    assert_eq!(detail.number(CellRef::new(0, 3)), Some(50.0));
    assert_eq!(detail.text(CellRef::new(4, 0)), Some("Order ID"));
    assert!(report.has_sheet("D1W5"));
    assert!(!report.has_sheet("D2W4"));
    let additions = report.sheet("D2W1").unwrap();
    assert_eq!(additions.name, "D2W1");
    assert_eq!(additions.text(CellRef::new(3, 1)), Some("Total Ads & miscellaneous services"));
    assert_eq!(additions.number(CellRef::new(3, 6)), Some(250.0));
    assert!(report.has_sheet("D2W5"));

    let cashflow = report.sheet("Cashflow").unwrap();
    assert_eq!(cashflow.number(CellRef::new(3, 2)), Some(80.0));
    assert_eq!(cashflow.number(CellRef::new(12, 6)), Some(60.0));
    assert_eq!(formula(cashflow, 4, 2), Some("='D1W1'!D2"));
    assert_eq!(formula(cashflow, 5, 2), Some("='D1W1'!E2"));
    assert_eq!(formula(cashflow, 7, 2), Some("='D1W1'!F3-'D1W1'!G3"));
    assert_eq!(formula(cashflow, 8, 2), Some("='D2W1'!G4"));
    assert_eq!(formula(cashflow, 4, 6), Some("='D1W5'!D2"));
    // No discount column in these invoices: the cell is left alone.
    assert_eq!(cashflow.get(CellRef::new(6, 2)), None);

    let summary = report.sheet("Summary").unwrap();
    assert_eq!(summary.text(CellRef::new(0, 1)), Some("Spice Route"));
    assert_eq!(summary.text(CellRef::new(3, 2)), Some("1st to 5th"));
    assert_eq!(summary.number(CellRef::new(5, 2)), Some(2.0));
    assert_eq!(summary.number(CellRef::new(5, 6)), Some(1.0));
    assert_eq!(summary.text(CellRef::new(1, 1)), Some("Payout summary for October"));
}

// -------------------------------------------------------------------------
// Swiggy Dineout statement blocks
// -------------------------------------------------------------------------

fn dineout_statement(file: &str, period: &str) -> SourceBook {
    let blank = || RawValue::Empty;
    let mut summary = vec![Vec::new(); 17];
    summary.push(vec![blank(), t(period)]);
    let line = |label: &str, c: RawValue, e: RawValue| vec![blank(), t(label), c, blank(), e];
    let payout = RawSheet::new(
        "Payout Invoice",
        vec![
            vec![blank(), t("Swiggy Dineout payout")],
            line("Payout Invoice", blank(), blank()),
            line("Order Total (A)", blank(), n(21000.0)),
            line("Total merchant discount", n(1050.0), blank()),
            line("Tip", blank(), n(80.0)),
            line("Swiggy Platform Service Fee", blank(), n(500.0)),
            line("TOP CAROUSEL - Oct", blank(), n(300.0)),
            line("Ad Campaign", blank(), n(200.0)),
            line("Net Payout (D - E)", blank(), n(19000.0)),
        ],
    );
    SourceBook::new(file, vec![RawSheet::new("Summary", summary), payout])
}

fn dineout_template() -> ReportWorkbook {
    let mut sheet = labelled(
        "Swiggy Dineout",
        1,
        &[
            (5, "Sales (Exclusive of GST)"),
            (6, "less: Discounts"),
            (7, "Swiggy Platform Service Fee"),
            (8, "add: Tips"),
            (9, "Carousel, High Priority, Banner"),
        ],
    );
    sheet.set(CellRef::new(1, 0), CellValue::Text("Dineout payout for November 2025".into()));
    ReportWorkbook::from_sheets(vec![sheet, GridSheet::new("SD4")])
}

#[test]
fn dineout_statements_fill_weekly_columns() {
    let inputs = JobInputs {
        sources: vec![
            dineout_statement("dineout_week.xlsx", "06 October - 12 October"),
            dineout_statement("dineout_partial.xlsx", "07 October - 12 October"),
            dineout_statement("dineout_again.xlsx", "06 October - 12 October"),
        ],
        bank: None,
    };
    let mut report = dineout_template();
    let (result, _) = run_profile("swiggy-dineout", &inputs, &mut report);

    let d = &result.diagnostics;
    assert_eq!(result.weeks_processed, 1);
    assert_eq!(d.invoices_matched, 2);
    assert_eq!(d.unmatched_invoices.len(), 1);
    assert_eq!(d.unmatched_invoices[0].file, "dineout_partial.xlsx");
    assert!(d.warnings.iter().any(|w| w.contains("dineout_again.xlsx")));

    assert!(!report.has_sheet("SD4"));
    let copy = report.sheet("SD2").unwrap();
    assert_eq!(copy.text(CellRef::new(0, 0)), Some("Payout Invoice"));
    assert_eq!(copy.number(CellRef::new(1, 3)), Some(21000.0));
    assert_eq!(copy.number(CellRef::new(1, 4)), Some(20000.0));
    assert_eq!(copy.number(CellRef::new(0, 5)), Some(-500.0));

    let sheet = report.sheet("Swiggy Dineout").unwrap();
    assert_eq!(sheet.number(CellRef::new(5, 3)), Some(20000.0));
    assert_eq!(sheet.number(CellRef::new(6, 3)), Some(-1000.0));
    let fee = sheet.number(CellRef::new(7, 3)).unwrap();
    assert!((fee - 590.0).abs() < 1e-9, "{fee}");
    assert_eq!(sheet.number(CellRef::new(8, 3)), Some(80.0));
    assert_eq!(sheet.number(CellRef::new(9, 3)), Some(-500.0));
    assert_eq!(sheet.get(CellRef::new(5, 2)), None);

    assert_eq!(sheet.text(CellRef::new(0, 0)), Some("Spice Route"));
    assert_eq!(sheet.text(CellRef::new(4, 2)), Some("1st to 5th"));
    assert_eq!(sheet.text(CellRef::new(1, 0)), Some("Dineout payout for October 2025"));
}

#[test]
fn missing_report_sheet_fails_the_job() {
    let profile = profiles::builtin("swiggy").unwrap();
    let mut report = ReportWorkbook::from_sheets(vec![GridSheet::new("Summary")]);
    let err = run(&profile, &october(), &JobInputs::default(), &mut report, &mut |_| {}).unwrap_err();
    assert!(err.to_string().contains("Cashflow"), "{err}");
}

// -------------------------------------------------------------------------
// Consolidated input and spillover
// -------------------------------------------------------------------------

#[test]
fn consolidated_rows_route_by_date_and_spill_over() {
    let mut rows = vec![Vec::new(); 6];
    rows[0] = vec![t("Zomato monthly statement")];
    rows.push(vec![
        t("Order ID"),
        t("Order Date"),
        t("Order status (Delivered/ Cancelled/ Rejected)"),
        t("Subtotal (items total)"),
        t("Order level Payout"),
    ]);
    rows.push(vec![t("Z0"), t("30/09/2025"), t("DELIVERED"), n(100.0), n(80.0)]);
    rows.push(vec![t("Z1"), t("03/10/2025"), t("DELIVERED"), n(200.0), n(160.0)]);
    rows.push(vec![t("Z2"), t("07/10/2025"), t("CANCELLED"), n(50.0), n(40.0)]);
    rows.push(vec![t("Z3"), t("01/11/2025"), t("DELIVERED"), n(300.0), n(240.0)]);
    rows.push(vec![t("Z4"), t("#REF!"), t("DELIVERED"), n(1.0), n(1.0)]);
    let book = SourceBook::new("Outlet_Oct_2025.xlsx", vec![RawSheet::new("Order Level", rows)]);

    let mut report = ReportWorkbook::from_sheets(vec![
        labelled("Summary", 1, &[]),
        labelled(
            "Cashflow",
            1,
            &[
                (3, "Opening Week Adjustments"),
                (4, "Item sales (Delivered orders)"),
                (9, "Closing Week Adjustments"),
            ],
        ),
        GridSheet::new("D1W9"),
    ]);
    let inputs = JobInputs {
        sources: vec![book],
        bank: None,
    };
    let (result, _) = run_profile("zomato-consolidated", &inputs, &mut report);

    let d = &result.diagnostics;
    assert_eq!(d.rows.classified, 2);
    assert_eq!(d.rows.opening, 1);
    assert_eq!(d.rows.closing, 1);
    assert_eq!(d.rows.skipped, 1);
    assert_eq!(d.opening_spillover, 80.0);
    assert_eq!(d.closing_spillover, 240.0);
    assert_eq!(result.weeks_processed, 2);

    assert!(report.has_sheet("D1W1"));
    assert!(report.has_sheet("D1W2"));
    assert!(!report.has_sheet("D1W9"));

    let cashflow = report.sheet("Cashflow").unwrap();
    assert_eq!(cashflow.number(CellRef::new(3, 2)), Some(80.0));
    assert_eq!(cashflow.number(CellRef::new(9, 6)), Some(240.0));
    assert_eq!(formula(cashflow, 4, 2), Some("='D1W1'!D2"));
    assert_eq!(formula(cashflow, 4, 3), Some("='D1W2'!D2"));

    let summary = report.sheet("Summary").unwrap();
    assert_eq!(summary.number(CellRef::new(5, 2)), Some(1.0));
    assert_eq!(summary.number(CellRef::new(5, 3)), Some(1.0));
}

// -------------------------------------------------------------------------
// Statement flow
// -------------------------------------------------------------------------

const PAYTM_CSV: &str = "\
transaction_date,status,amount,commission
03/10/2025,SUCCESS,1050,10
07/10/2025,SUCCESS,2100,20
08/10/2025,FAILED,999,9
29/09/2025,SUCCESS,525,5
";

#[test]
fn statement_flow_fills_calculation_sheet() {
    let sheet = RawSheet::from_csv_reader("paytm", PAYTM_CSV.as_bytes()).unwrap();
    let inputs = JobInputs {
        sources: vec![SourceBook::new("paytm.csv", vec![sheet])],
        bank: None,
    };
    let mut recon = labelled(
        "Paytm Reconciliation",
        1,
        &[
            (5, "Sales (exclusive of GST) before failed transactions"),
            (6, "Commission (inclusive of GST)"),
        ],
    );
    recon.set(CellRef::new(1, 0), CellValue::Text("Month 2025".into()));
    let mut report = ReportWorkbook::from_sheets(vec![GridSheet::new("Paytm Calculations"), recon]);

    let (result, _) = run_profile("paytm", &inputs, &mut report);
    assert_eq!(result.weeks_processed, 2);
    assert_eq!(result.diagnostics.rows.opening, 1);
    assert_eq!(result.diagnostics.rows.skipped, 1);

    let calc = report.sheet("Paytm Calculations").unwrap();
    assert_eq!(calc.text(CellRef::new(0, 6)), Some("Week 1"));
    assert_eq!(calc.text(CellRef::new(0, 10)), Some("Week 5"));
    let amount = calc.number(CellRef::new(1, 6)).unwrap();
    assert!((amount - 1000.0).abs() < 1e-9, "{amount}");
    let commission = calc.number(CellRef::new(2, 7)).unwrap();
    assert!((commission - 23.6).abs() < 1e-9, "{commission}");
    assert_eq!(calc.text(CellRef::new(9, 0)), Some("transaction_date"));
    assert_eq!(calc.max_row(), Some(13));

    let recon = report.sheet("Paytm Reconciliation").unwrap();
    assert_eq!(formula(recon, 5, 2), Some("='Paytm Calculations'!G2"));
    assert_eq!(formula(recon, 6, 3), Some("='Paytm Calculations'!H3"));
    assert_eq!(recon.text(CellRef::new(1, 0)), Some("October 2025"));
    assert_eq!(recon.text(CellRef::new(0, 0)), Some("Spice Route"));
}
