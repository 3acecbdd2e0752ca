use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use crate::additions::{copy_additions, lookup_formula, segregate_ads, AdditionsMode, AdditionsSpec, AdsTotals};
use crate::aggregate::{AggregationOutput, Aggregator};
use crate::block::{write_block_copy, BlockWeek};
use crate::calc::{write_calc_sheet, CalcWeek};
use crate::cellref::CellRef;
use crate::config::{Flow, InputKind, MetricKind, Profile, SourceSpec, SummaryMetric};
use crate::detail::DetailSheet;
use crate::diagnostics::{Diagnostics, SheetError, UnmatchedInvoice};
use crate::error::ReconError;
use crate::mapping::apply_rules;
use crate::matcher::match_invoice;
use crate::model::{Placement, RawValue};
use crate::receipts::{deposits, find_deposit_column, map_receipts, receipts_note};
use crate::source::{RawSheet, SourceBook};
use crate::weeks::{build_week_structure, WeekBoundaries, WeekStructure};
use crate::workbook::{CellValue, GridSheet, LabelIndex, ReportWorkbook};

/// What the caller asks for.
#[derive(Debug, Clone)]
pub struct JobParams {
    pub month: String,
    pub boundaries: WeekBoundaries,
    pub working_year: i32,
    pub client: Option<String>,
}

/// Loaded input files.
#[derive(Debug, Clone, Default)]
pub struct JobInputs {
    pub sources: Vec<SourceBook>,
    pub bank: Option<SourceBook>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub weeks: WeekStructure,
    pub weeks_processed: usize,
    pub diagnostics: Diagnostics,
}

/// Run one reconciliation job into `report`.
///
/// `progress` receives 10, 40 and 70; the caller reports 100 once the
/// workbook is saved.
pub fn run(
    profile: &Profile,
    params: &JobParams,
    inputs: &JobInputs,
    report: &mut ReportWorkbook,
    progress: &mut dyn FnMut(u8),
) -> Result<RunReport, ReconError> {
    let weeks = build_week_structure(&params.month, params.boundaries, params.working_year)?;
    tracing::info!(
        profile = %profile.name,
        month = weeks.month_name(),
        weeks = weeks.len(),
        "week structure built"
    );
    progress(10);

    report.require_sheet(&profile.report.sheet)?;
    if let Some(s) = &profile.summary {
        report.require_sheet(&s.sheet)?;
    }
    if let Some(c) = &profile.calc {
        report.require_sheet(&c.sheet)?;
    }
    let removed = report.remove_generated(&profile.generated_prefixes());
    if removed > 0 {
        tracing::debug!(removed, "dropped generated sheets from a previous run");
    }

    let mut job = Job {
        profile,
        weeks: &weeks,
        working_year: params.working_year,
        report,
        diag: Diagnostics::default(),
        expected_receipts: BTreeMap::new(),
    };
    job.write_summary_header(params.client.as_deref())?;

    let (totals, weeks_processed) = match profile.flow {
        Flow::Detail => job.detail_flow(inputs, progress)?,
        Flow::Aggregate => job.aggregate_flow(inputs, progress)?,
        Flow::Block => job.block_flow(inputs, progress)?,
    };
    progress(70);

    job.write_spillover(&totals)?;
    job.write_receipts(inputs.bank.as_ref())?;
    if let Some(m) = &profile.month {
        for token in m.tokens() {
            let changed = job.report.replace_month(token, weeks.month_name(), &m.sheets);
            tracing::debug!(token, changed, "month placeholder replaced");
        }
    }

    let mut diagnostics = job.diag;
    diagnostics.rows = totals.counts;
    tracing::info!(weeks_processed, "{}", diagnostics.summary_line());

    Ok(RunReport {
        weeks,
        weeks_processed,
        diagnostics,
    })
}

/// Rows collected for one week's detail sheet.
#[derive(Debug, Default)]
struct WeekRows<'s> {
    header: Vec<RawValue>,
    rows: Vec<Vec<RawValue>>,
    additions: Option<&'s RawSheet>,
}

struct Job<'a> {
    profile: &'a Profile,
    weeks: &'a WeekStructure,
    working_year: i32,
    report: &'a mut ReportWorkbook,
    diag: Diagnostics,
    expected_receipts: BTreeMap<u32, f64>,
}

impl<'a> Job<'a> {
    fn sheet_failed(&mut self, file: &str, err: ReconError) {
        tracing::warn!(file, error = %err, "source sheet skipped");
        self.diag.sheet_errors.push(SheetError {
            file: file.to_string(),
            message: err.to_string(),
        });
    }

    fn write_summary_header(&mut self, client: Option<&str>) -> Result<(), ReconError> {
        let Some(spec) = &self.profile.summary else {
            return Ok(());
        };
        let sheet = self.report.require_sheet(&spec.sheet)?;
        if let (Some(cell), Some(client)) = (spec.client_cell, client) {
            sheet.set(cell, CellValue::Text(client.to_string()));
        }
        let row = spec.week_label_row - 1;
        for w in &self.weeks.weeks {
            let col = spec.base_column.index() + w.week_number as usize - 1;
            sheet.set(CellRef::new(row, col), CellValue::Text(w.label.clone()));
        }
        Ok(())
    }

    fn write_metric(&mut self, metric: &SummaryMetric, week_number: u32, value: f64) -> Result<(), ReconError> {
        let Some(spec) = &self.profile.summary else {
            return Ok(());
        };
        let col = spec.base_column.index() + week_number as usize - 1;
        self.report
            .require_sheet(&spec.sheet)?
            .set(CellRef::new(metric.row - 1, col), CellValue::Number(value));
        Ok(())
    }

    fn metrics(&self) -> &'a [SummaryMetric] {
        self.profile.summary.as_ref().map_or(&[], |s| s.metrics.as_slice())
    }

    // -----------------------------------------------------------------------
    // Detail flow
    // -----------------------------------------------------------------------

    fn detail_flow(
        &mut self,
        inputs: &'a JobInputs,
        progress: &mut dyn FnMut(u8),
    ) -> Result<(AggregationOutput, usize), ReconError> {
        let profile = self.profile;
        let weeks = self.weeks;
        let source = first_source(profile)?;
        let mut agg = Aggregator::new(weeks, source.buckets.clone(), source.filter.clone(), self.working_year);
        let mut week_rows: BTreeMap<u32, WeekRows<'a>> = BTreeMap::new();
        let mut ads = None;

        for book in &inputs.sources {
            let file = book.file_name();
            let anchor = match profile.input {
                InputKind::Invoices => {
                    let outcome = match_invoice(book.path(), book, &profile.summary_cells, weeks);
                    let Some(n) = outcome.week_number() else {
                        tracing::warn!(file = %file, reason = %outcome.describe(), "invoice unmatched");
                        self.diag.unmatched_invoices.push(UnmatchedInvoice {
                            file,
                            reason: outcome.describe(),
                        });
                        continue;
                    };
                    tracing::info!(file = %file, week = n, "invoice matched");
                    self.diag.invoices_matched += 1;
                    self.invoice_extras(book, n)?;
                    Some(n)
                }
                InputKind::Consolidated | InputKind::Statement => None,
            };

            if let Err(e) = read_detail_rows(book, source, anchor, &mut agg, &mut week_rows) {
                if !e.is_sheet_level() {
                    return Err(e);
                }
                self.sheet_failed(&file, e);
            }

            if let Some(spec) = &profile.additions {
                match (spec.mode, anchor) {
                    (AdditionsMode::Copy, Some(n)) => match spec.find_sheet(&book.sheets) {
                        Some(sheet) => {
                            let slot = week_rows.entry(n).or_default();
                            if slot.additions.is_some() {
                                self.diag.warn(format!("week {n}: additions already taken from an earlier invoice"));
                            } else {
                                slot.additions = Some(sheet);
                            }
                        }
                        None => self.diag.warn(format!("{file}: no additions sheet")),
                    },
                    (AdditionsMode::Ads, _) => match spec.find_sheet(&book.sheets) {
                        Some(sheet) => {
                            let found = segregate_ads(sheet, weeks);
                            for period in &found.unmatched {
                                self.diag.warn(format!("ads period '{period}' matches no week"));
                            }
                            let totals = ads.get_or_insert_with(|| AdsTotals::new(weeks));
                            for (w, v) in found.per_week {
                                totals.add(w, v);
                            }
                        }
                        None => self.diag.warn(format!("{file}: no additions sheet for ads")),
                    },
                    (AdditionsMode::Copy, None) => {}
                }
            }
        }
        progress(40);

        let mut written = 0;
        for (n, collected) in week_rows {
            if !collected.rows.is_empty() || !collected.header.is_empty() {
                if let Some(detail) = self.build_detail(n, collected.header, collected.rows)? {
                    if let Some(spec) = profile.additions.as_ref().filter(|a| a.mode == AdditionsMode::Ads) {
                        add_detail_ads(spec, &detail, ads.get_or_insert_with(|| AdsTotals::new(weeks)));
                    }
                    written += 1;
                }
            }
            if let (Some(spec), Some(sheet)) = (&profile.additions, collected.additions) {
                self.copy_week_additions(spec, n, sheet)?;
            }
        }

        if let (Some(spec), Some(totals)) = (&profile.additions, &ads) {
            self.write_ads(spec, totals)?;
        }

        Ok((agg.finish(), written))
    }

    /// Per-invoice values read straight from the invoice: expected receipt and summary cells.
    fn invoice_extras(&mut self, book: &SourceBook, week_number: u32) -> Result<(), ReconError> {
        if let Some(r) = &self.profile.receipts {
            match book.number_at(&r.expected_cell) {
                Some(v) => {
                    self.expected_receipts.insert(week_number, v);
                }
                None => tracing::debug!(cell = %r.expected_cell, "no expected receipt in invoice"),
            }
        }
        for metric in self.metrics() {
            if metric.kind != MetricKind::InvoiceCell {
                continue;
            }
            if let Some(v) = metric.cell.as_ref().and_then(|c| book.number_at(c)) {
                self.write_metric(metric, week_number, v)?;
            }
        }
        Ok(())
    }

    /// Build, write and map one `D1W{n}` sheet. `None` when the week's columns are unusable.
    fn build_detail(
        &mut self,
        week_number: u32,
        header: Vec<RawValue>,
        rows: Vec<Vec<RawValue>>,
    ) -> Result<Option<DetailSheet>, ReconError> {
        let profile = self.profile;
        let Some(spec) = &profile.detail else {
            return Ok(None);
        };
        let detail = match DetailSheet::build(spec, week_number, header, rows) {
            Ok(d) => d,
            Err(e) if e.is_sheet_level() => {
                self.sheet_failed(&spec.sheet_name(week_number), e);
                return Ok(None);
            }
            Err(e) => return Err(e),
        };

        let mut sheet = GridSheet::new(detail.name.clone());
        detail.write_into(&mut sheet);
        *self.report.recreate_sheet(&detail.name) = sheet;
        tracing::info!(sheet = %detail.name, rows = detail.row_count(), "detail sheet written");

        let target = self.report.require_sheet(&profile.report.sheet)?;
        let outcome = apply_rules(
            target,
            profile.report.layout(),
            week_number,
            &profile.report.rules,
            &detail,
            &profile.report.partial,
        );
        self.diag.absorb_rules(week_number, outcome);

        for metric in self.metrics() {
            let value = match metric.kind {
                MetricKind::RowCount => Some(detail.row_count() as f64),
                MetricKind::NonzeroCount => Some(
                    detail
                        .headers
                        .containing_all(&metric.keywords)
                        .map_or(0, |c| detail.nonzero_count(c)) as f64,
                ),
                MetricKind::ColumnTotal => detail
                    .headers
                    .containing_all(&metric.keywords)
                    .and_then(|c| detail.computed(metric.detail_row, c)),
                MetricKind::InvoiceCell => None,
            };
            if let Some(v) = value {
                self.write_metric(metric, week_number, v)?;
            }
        }
        Ok(Some(detail))
    }

    fn copy_week_additions(&mut self, spec: &AdditionsSpec, week_number: u32, source: &RawSheet) -> Result<(), ReconError> {
        let mut sheet = GridSheet::new(spec.sheet_name(week_number));
        let copied = copy_additions(source, spec.start_row, &mut sheet);
        tracing::debug!(sheet = %sheet.name, rows = copied, "additions copied");

        let writes: Vec<_> = spec
            .lookups
            .iter()
            .map(|rule| (rule, lookup_formula(&sheet, rule)))
            .collect();
        let name = sheet.name.clone();
        *self.report.recreate_sheet(&name) = sheet;

        let layout = self.profile.report.layout();
        let target = self.report.require_sheet(&self.profile.report.sheet)?;
        let labels = LabelIndex::scan(target, layout.label_col);
        for (rule, write) in writes {
            let Some(write) = write else {
                tracing::debug!(label = %rule.label, week = week_number, "lookup text not found");
                self.diag.rules_unmatched += 1;
                continue;
            };
            match labels.find(&rule.label, layout.label_match) {
                Some(row) => {
                    target.set(CellRef::new(row, layout.week_col(week_number)), write.into());
                    self.diag.rules_written += 1;
                }
                None => {
                    if !self.diag.missing_labels.contains(&rule.label) {
                        self.diag.missing_labels.push(rule.label.clone());
                    }
                }
            }
        }
        Ok(())
    }

    fn write_ads(&mut self, spec: &AdditionsSpec, totals: &AdsTotals) -> Result<(), ReconError> {
        let layout = self.profile.report.layout();
        let target = self.report.require_sheet(&self.profile.report.sheet)?;
        let Some(row) = LabelIndex::scan(target, layout.label_col).find(&spec.ads_label, layout.label_match) else {
            self.diag.warn(format!("ads label '{}' not in report sheet", spec.ads_label));
            return Ok(());
        };
        for (&week, &total) in &totals.per_week {
            target.set(CellRef::new(row, layout.week_col(week)), CellValue::Number(total));
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Aggregate flow
    // -----------------------------------------------------------------------

    fn aggregate_flow(
        &mut self,
        inputs: &JobInputs,
        progress: &mut dyn FnMut(u8),
    ) -> Result<(AggregationOutput, usize), ReconError> {
        let profile = self.profile;
        let calc = profile
            .calc
            .as_ref()
            .ok_or_else(|| ReconError::ConfigValidation("flow 'aggregate' needs a [calc] section".into()))?;

        let mut totals = AggregationOutput {
            weeks: self
                .weeks
                .weeks
                .iter()
                .map(|w| crate::model::WeekAggregate::new(w.week_number))
                .collect(),
            ..Default::default()
        };
        let mut copy_rows: BTreeMap<String, usize> = BTreeMap::new();

        for book in &inputs.sources {
            for source in &profile.sources {
                match self.aggregate_source(book, source, &mut copy_rows) {
                    Ok(Some(out)) => totals.merge(out),
                    Ok(None) => {}
                    Err(e) if e.is_sheet_level() => self.sheet_failed(&book.file_name(), e),
                    Err(e) => return Err(e),
                }
            }
        }
        progress(40);

        write_calc_sheet(self.report.require_sheet(&calc.sheet)?, calc, self.weeks, &totals);

        let layout = profile.report.layout();
        for w in &self.weeks.weeks {
            let view = CalcWeek::new(calc, w.week_number, &totals);
            let target = self.report.require_sheet(&profile.report.sheet)?;
            let outcome = apply_rules(target, layout, w.week_number, &profile.report.rules, &view, &profile.report.partial);
            self.diag.absorb_rules(w.week_number, outcome);

            let rows = totals.week(w.week_number).map_or(0, |a| a.rows);
            for metric in self.metrics() {
                if metric.kind == MetricKind::RowCount {
                    self.write_metric(metric, w.week_number, rows as f64)?;
                }
            }
        }

        let processed = totals.weeks.iter().filter(|w| w.rows > 0).count();
        Ok((totals, processed))
    }

    /// Aggregate one source sheet of one file. `None` when an optional sheet is absent.
    fn aggregate_source(
        &mut self,
        book: &SourceBook,
        source: &SourceSpec,
        copy_rows: &mut BTreeMap<String, usize>,
    ) -> Result<Option<AggregationOutput>, ReconError> {
        let Some(sheet) = book.sheet_any(&source.sheets) else {
            if source.optional {
                tracing::warn!(file = %book.file_name(), sheets = ?source.sheets, "optional source sheet absent");
                return Ok(None);
            }
            return Err(missing_source_sheet(book, source));
        };
        let table = sheet.table(source.header_row, &source.date_columns, source.date_match)?;
        let mut agg = Aggregator::new(self.weeks, source.buckets.clone(), source.filter.clone(), self.working_year);
        let bound = agg.bind(table.name(), &table.headers, &source.date_columns, source.date_match)?;
        for row in table.rows() {
            agg.push(&bound, &row);
        }
        tracing::info!(file = %book.file_name(), sheet = table.name(), rows = agg.counts().total(), "source aggregated");

        if let Some(copy) = &source.copy_to {
            let target = self.report.ensure_sheet(&copy.sheet);
            let next = copy_rows.entry(copy.sheet.clone()).or_insert_with(|| {
                let start = copy.row.saturating_sub(1);
                target.write_row(start, table.header_cells());
                start + 1
            });
            for row in table.rows() {
                target.write_row(*next, row.cells());
                *next += 1;
            }
        }
        Ok(Some(agg.finish()))
    }

    // -----------------------------------------------------------------------
    // Block flow
    // -----------------------------------------------------------------------

    fn block_flow(
        &mut self,
        inputs: &JobInputs,
        progress: &mut dyn FnMut(u8),
    ) -> Result<(AggregationOutput, usize), ReconError> {
        let profile = self.profile;
        let spec = profile
            .block
            .as_ref()
            .ok_or_else(|| ReconError::ConfigValidation("flow 'block' needs a [block] section".into()))?;
        let mut written = BTreeSet::new();

        for book in &inputs.sources {
            let file = book.file_name();
            let outcome = match_invoice(book.path(), book, &profile.summary_cells, self.weeks);
            let Some(n) = outcome.week_number() else {
                tracing::warn!(file = %file, reason = %outcome.describe(), "invoice unmatched");
                self.diag.unmatched_invoices.push(UnmatchedInvoice {
                    file,
                    reason: outcome.describe(),
                });
                continue;
            };
            tracing::info!(file = %file, week = n, "invoice matched");
            self.diag.invoices_matched += 1;
            if written.contains(&n) {
                self.diag.warn(format!("week {n}: {file} skipped, block already taken from an earlier invoice"));
                continue;
            }
            self.invoice_extras(book, n)?;

            let block = match spec.find(book) {
                Ok(b) => b,
                Err(e) if e.is_sheet_level() => {
                    self.sheet_failed(&file, e);
                    continue;
                }
                Err(e) => return Err(e),
            };
            let values = spec.read(&block);
            let mut sheet = GridSheet::new(spec.sheet_name(n));
            write_block_copy(spec, &block, &values, &mut sheet);
            let name = sheet.name.clone();
            *self.report.recreate_sheet(&name) = sheet;
            tracing::info!(sheet = %name, rows = block.len(), "block sheet written");

            let view = BlockWeek::new(spec, n, &values);
            let target = self.report.require_sheet(&profile.report.sheet)?;
            let outcome = apply_rules(target, profile.report.layout(), n, &profile.report.rules, &view, &profile.report.partial);
            self.diag.absorb_rules(n, outcome);
            for metric in self.metrics() {
                if metric.kind == MetricKind::RowCount {
                    self.write_metric(metric, n, block.len() as f64)?;
                }
            }
            written.insert(n);
        }
        progress(40);

        Ok((AggregationOutput::default(), written.len()))
    }

    // -----------------------------------------------------------------------
    // Spillover and receipts
    // -----------------------------------------------------------------------

    fn write_spillover(&mut self, totals: &AggregationOutput) -> Result<(), ReconError> {
        let Some(spec) = &self.profile.spillover else {
            return Ok(());
        };
        let opening = totals.opening.get(&spec.bucket);
        let closing = totals.closing.get(&spec.bucket);
        self.diag.opening_spillover = opening;
        self.diag.closing_spillover = closing;
        let last = self.weeks.last().map_or(1, |w| w.week_number);

        let targets = [
            ("opening", opening, 1, &spec.opening_label, &spec.opening_cell),
            ("closing", closing, last, &spec.closing_label, &spec.closing_cell),
        ];
        for (kind, value, week, label, cell) in targets {
            if value == 0.0 {
                continue;
            }
            if let Some(cell) = cell {
                self.report.set_at(cell, CellValue::Number(value))?;
                tracing::info!(kind, value, cell = %cell, "spillover written");
                continue;
            }
            let Some(label) = label else {
                continue;
            };
            let layout = self.profile.report.layout();
            let target = self.report.require_sheet(&self.profile.report.sheet)?;
            match LabelIndex::scan(target, layout.label_col).find(label, layout.label_match) {
                Some(row) => {
                    target.set(CellRef::new(row, layout.week_col(week)), CellValue::Number(value));
                    tracing::info!(kind, value, week, "spillover written");
                }
                None => self.diag.warn(format!("{kind} spillover label '{label}' not in report sheet")),
            }
        }
        Ok(())
    }

    fn write_receipts(&mut self, bank: Option<&SourceBook>) -> Result<(), ReconError> {
        let Some(spec) = &self.profile.receipts else {
            return Ok(());
        };
        let mut mapped = BTreeSet::new();

        if let Some(raw) = bank.and_then(|b| b.sheets.first()) {
            let copy = self.report.recreate_sheet(&spec.bank_sheet);
            for (i, row) in raw.rows.iter().enumerate() {
                copy.write_row(i, row);
            }

            match find_deposit_column(raw, spec.header_row, &spec.deposit_keywords) {
                Some(col) => {
                    let found = deposits(raw, spec.header_row, col);
                    let matched = map_receipts(&self.expected_receipts, &found, spec.tolerance);
                    let layout = self.profile.report.layout();
                    let target = self.report.require_sheet(&self.profile.report.sheet)?;
                    match LabelIndex::scan(target, layout.label_col).find(&spec.label, spec.label_match) {
                        Some(row) => {
                            for (week, hit) in matched {
                                let value = hit.unwrap_or(0.0);
                                target.set(CellRef::new(row, layout.week_col(week)), CellValue::Number(value));
                                if value != 0.0 {
                                    mapped.insert(week);
                                }
                            }
                        }
                        None => self.diag.warn(format!("receipts label '{}' not in report sheet", spec.label)),
                    }
                }
                None => self.diag.warn("bank statement has no deposit column"),
            }
        }

        let note = receipts_note(self.weeks.len() as u32, &mapped, bank.is_some());
        for cell in &spec.note_cells {
            let Some(sheet) = self.report.sheet_mut(&cell.sheet) else {
                continue;
            };
            match &note {
                Some(text) => sheet.set(cell.cell, CellValue::Text(text.clone())),
                None => sheet.clear(cell.cell),
            }
        }
        Ok(())
    }
}

fn first_source(profile: &Profile) -> Result<&SourceSpec, ReconError> {
    profile
        .sources
        .first()
        .ok_or_else(|| ReconError::ConfigValidation("at least one source is required".into()))
}

fn missing_source_sheet(book: &SourceBook, source: &SourceSpec) -> ReconError {
    ReconError::MissingSourceSheet {
        file: book.file_name(),
        candidates: source
            .sheets
            .iter()
            .map(|s| format!("'{s}'"))
            .collect::<Vec<_>>()
            .join(", "),
    }
}

/// Route one file's rows: in-month rows to a week's detail rows, the rest to spillover sums.
///
/// With an `anchor` (a matched invoice) every in-month row belongs to that week.
fn read_detail_rows<'s>(
    book: &'s SourceBook,
    source: &SourceSpec,
    anchor: Option<u32>,
    agg: &mut Aggregator<'_>,
    week_rows: &mut BTreeMap<u32, WeekRows<'s>>,
) -> Result<(), ReconError> {
    let sheet = book
        .sheet_any(&source.sheets)
        .ok_or_else(|| missing_source_sheet(book, source))?;
    let table = sheet.table(source.header_row, &source.date_columns, source.date_match)?;
    let bound = agg.bind(table.name(), &table.headers, &source.date_columns, source.date_match)?;

    for row in table.rows() {
        let placement = match (agg.placement_of(&bound, &row), anchor) {
            (Placement::Week(_), Some(n)) => Placement::Week(n),
            (p, _) => p,
        };
        agg.record(&bound, &row, placement);
        if let Placement::Week(n) = placement {
            let slot = week_rows.entry(n).or_default();
            if slot.header.is_empty() {
                slot.header = table.header_cells().to_vec();
            }
            slot.rows.push(row.cells().to_vec());
        }
    }

    // A matched invoice with no in-month rows still gets its (empty) detail sheet.
    if let Some(n) = anchor {
        let slot = week_rows.entry(n).or_default();
        if slot.header.is_empty() {
            slot.header = table.header_cells().to_vec();
        }
    }
    Ok(())
}

fn add_detail_ads(spec: &AdditionsSpec, detail: &DetailSheet, totals: &mut AdsTotals) {
    let Some(column) = &spec.ads_detail_column else {
        return;
    };
    let col = detail.headers.containing_all(std::slice::from_ref(column));
    if let Some(v) = col.and_then(|c| detail.computed(spec.ads_detail_row, c)) {
        tracing::debug!(week = detail.week_number, value = v, "detail ads added");
        totals.add(detail.week_number, v);
    }
}
