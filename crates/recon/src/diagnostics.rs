//! Row- and rule-level findings returned alongside a run.

use serde::Serialize;

use crate::mapping::RuleReport;
use crate::model::RowCounts;

/// An invoice no week accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnmatchedInvoice {
    pub file: String,
    pub reason: String,
}

/// A source sheet that failed while the rest of the job went on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SheetError {
    pub file: String,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Diagnostics {
    pub rows: RowCounts,
    pub invoices_matched: usize,
    pub unmatched_invoices: Vec<UnmatchedInvoice>,
    pub rules_written: usize,
    /// Rules whose columns matched nothing; the cell was left as is.
    pub rules_unmatched: usize,
    pub missing_labels: Vec<String>,
    pub rule_mismatches: Vec<String>,
    pub sheet_errors: Vec<SheetError>,
    pub opening_spillover: f64,
    pub closing_spillover: f64,
    pub warnings: Vec<String>,
}

impl Diagnostics {
    pub fn absorb_rules(&mut self, week_number: u32, report: RuleReport) {
        self.rules_written += report.written;
        self.rules_unmatched += report.unmatched.len();
        for label in report.missing_labels {
            if !self.missing_labels.contains(&label) {
                self.missing_labels.push(label);
            }
        }
        for (label, message) in report.mismatched {
            self.rule_mismatches.push(format!("week {week_number}, {label}: {message}"));
        }
    }

    pub fn warn(&mut self, message: impl Into<String>) {
        let message = message.into();
        tracing::warn!("{message}");
        self.warnings.push(message);
    }

    /// Anything short of a clean run: unmatched invoices or failed sheets.
    pub fn is_partial(&self) -> bool {
        !self.unmatched_invoices.is_empty() || !self.sheet_errors.is_empty()
    }

    /// One-line human summary.
    pub fn summary_line(&self) -> String {
        format!(
            "{} rows classified, {} opening, {} closing, {} unclassified, {} skipped; {} cells written",
            self.rows.classified,
            self.rows.opening,
            self.rows.closing,
            self.rows.unclassified,
            self.rows.skipped,
            self.rules_written,
        )
    }
}
