use std::collections::BTreeSet;

use serde::Deserialize;

use crate::additions::{AdditionsMode, AdditionsSpec};
use crate::aggregate::{BucketSpec, ColumnMatch, RowFilter};
use crate::block::BlockSpec;
use crate::cellref::{CellRef, Column, SheetCell};
use crate::detail::DetailSpec;
use crate::error::ReconError;
use crate::mapping::{CellMappingRule, MappingOp, PartialKeywords, ReportLayout};
use crate::receipts::ReceiptsSpec;
use crate::workbook::LabelMatch;

// ---------------------------------------------------------------------------
// Top-level profile
// ---------------------------------------------------------------------------

/// One platform's statement layout and report dictionary.
#[derive(Debug, Clone, Deserialize)]
pub struct Profile {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub input: InputKind,
    pub flow: Flow,
    /// Cells holding the invoice's date range, tried in order.
    #[serde(default = "default_summary_cells")]
    pub summary_cells: Vec<SheetCell>,
    #[serde(default)]
    pub sources: Vec<SourceSpec>,
    #[serde(default)]
    pub block: Option<BlockSpec>,
    #[serde(default)]
    pub detail: Option<DetailSpec>,
    #[serde(default)]
    pub additions: Option<AdditionsSpec>,
    pub report: ReportSpec,
    #[serde(default)]
    pub summary: Option<SummarySpec>,
    #[serde(default)]
    pub spillover: Option<SpilloverSpec>,
    #[serde(default)]
    pub calc: Option<CalcSpec>,
    #[serde(default)]
    pub month: Option<MonthSpec>,
    #[serde(default)]
    pub receipts: Option<ReceiptsSpec>,
}

fn default_summary_cells() -> Vec<SheetCell> {
    vec![
        SheetCell::new("HSummary", CellRef::new(1, 4)),
        SheetCell::new("Summary", CellRef::new(3, 2)),
    ]
}

/// How input files relate to weeks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputKind {
    /// One invoice per week, matched by filename or summary cells.
    Invoices,
    /// One file covering the month; rows are routed by date.
    Consolidated,
    /// Transaction statements aggregated by date.
    Statement,
}

impl std::fmt::Display for InputKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Invoices => write!(f, "invoices"),
            Self::Consolidated => write!(f, "consolidated"),
            Self::Statement => write!(f, "statement"),
        }
    }
}

/// What the engine builds per week.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Flow {
    /// `D1W{n}` detail sheets with computed total rows.
    Detail,
    /// Bucket sums in a calculation sheet.
    Aggregate,
    /// One labelled statement block per invoice, copied to `SD{n}` sheets.
    Block,
}

// ---------------------------------------------------------------------------
// Sources
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct SourceSpec {
    /// Sheet name candidates, first present wins.
    pub sheets: Vec<String>,
    /// 1-based header row; auto-detected when absent.
    #[serde(default)]
    pub header_row: Option<usize>,
    pub date_columns: Vec<String>,
    #[serde(default)]
    pub date_match: ColumnMatch,
    #[serde(default)]
    pub filter: Option<RowFilter>,
    #[serde(default)]
    pub buckets: Vec<BucketSpec>,
    /// Copy the raw table (header included) into a report sheet.
    #[serde(default)]
    pub copy_to: Option<CopyTarget>,
    /// A missing sheet is logged instead of failing the file.
    #[serde(default)]
    pub optional: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CopyTarget {
    pub sheet: String,
    /// 1-based row receiving the header.
    pub row: usize,
}

// ---------------------------------------------------------------------------
// Report, summary, spillover, calculation sheet
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct ReportSpec {
    pub sheet: String,
    pub label_column: Column,
    pub base_column: Column,
    #[serde(default)]
    pub label_match: LabelMatch,
    #[serde(default)]
    pub partial: PartialKeywords,
    #[serde(default)]
    pub rules: Vec<CellMappingRule>,
}

impl ReportSpec {
    pub fn layout(&self) -> ReportLayout {
        ReportLayout {
            label_col: self.label_column.index(),
            base_col: self.base_column.index(),
            label_match: self.label_match,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SummarySpec {
    pub sheet: String,
    #[serde(default)]
    pub client_cell: Option<CellRef>,
    /// 1-based row receiving week labels.
    pub week_label_row: usize,
    pub base_column: Column,
    #[serde(default)]
    pub metrics: Vec<SummaryMetric>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKind {
    /// Detail data rows.
    RowCount,
    /// Data rows with a non-zero value in the keyword-matched column.
    NonzeroCount,
    /// Computed total of the keyword-matched column.
    ColumnTotal,
    /// Value of a cell in the week's invoice.
    InvoiceCell,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SummaryMetric {
    /// 1-based summary row.
    pub row: usize,
    pub kind: MetricKind,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default = "default_metric_row")]
    pub detail_row: u32,
    #[serde(default)]
    pub cell: Option<SheetCell>,
}

fn default_metric_row() -> u32 {
    4
}

#[derive(Debug, Clone, Deserialize)]
pub struct SpilloverSpec {
    pub bucket: String,
    /// Report label receiving the opening sum at week 1's column.
    #[serde(default)]
    pub opening_label: Option<String>,
    /// Report label receiving the closing sum at the final week's column.
    #[serde(default)]
    pub closing_label: Option<String>,
    #[serde(default)]
    pub opening_cell: Option<SheetCell>,
    #[serde(default)]
    pub closing_cell: Option<SheetCell>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CalcSpec {
    pub sheet: String,
    #[serde(default = "default_calc_header_row")]
    pub header_row: usize,
    #[serde(default = "default_calc_first_row")]
    pub first_row: usize,
    pub base_column: Column,
    /// Week header template; `{n}` is the week number.
    #[serde(default = "default_calc_header")]
    pub header: String,
    /// Bucket per row, starting at `first_row`.
    pub buckets: Vec<String>,
}

fn default_calc_header_row() -> usize {
    1
}

fn default_calc_first_row() -> usize {
    2
}

fn default_calc_header() -> String {
    "Week {n}".into()
}

impl CalcSpec {
    pub fn header_for(&self, week_number: u32) -> String {
        self.header.replace("{n}", &week_number.to_string())
    }

    /// 0-indexed row of a bucket.
    pub fn bucket_row(&self, bucket: usize) -> usize {
        self.first_row.saturating_sub(1) + bucket
    }

    pub fn week_col(&self, week_number: u32) -> usize {
        self.base_column.index() + week_number.saturating_sub(1) as usize
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MonthSpec {
    pub token: String,
    /// Further placeholders replaced the same way.
    #[serde(default)]
    pub aliases: Vec<String>,
    pub sheets: Vec<String>,
}

impl MonthSpec {
    pub fn tokens(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.token.as_str()).chain(self.aliases.iter().map(String::as_str))
    }
}

// ---------------------------------------------------------------------------
// Parse + Validate
// ---------------------------------------------------------------------------

impl Profile {
    pub fn from_toml(input: &str) -> Result<Self, ReconError> {
        let profile: Profile =
            toml::from_str(input).map_err(|e| ReconError::ConfigParse(e.to_string()))?;
        profile.validate()?;
        Ok(profile)
    }

    /// Every bucket name declared across sources.
    pub fn bucket_names(&self) -> BTreeSet<&str> {
        self.sources
            .iter()
            .flat_map(|s| s.buckets.iter().map(|b| b.name.as_str()))
            .collect()
    }

    /// Sheet prefixes the engine regenerates on each run.
    pub fn generated_prefixes(&self) -> Vec<&str> {
        let mut out = Vec::new();
        if let Some(d) = &self.detail {
            out.push(d.prefix.as_str());
        }
        if let Some(b) = &self.block {
            out.push(b.prefix.as_str());
        }
        if let Some(a) = &self.additions {
            if a.mode == AdditionsMode::Copy {
                out.push(a.prefix.as_str());
            }
        }
        out
    }

    pub fn validate(&self) -> Result<(), ReconError> {
        let invalid = |msg: String| Err(ReconError::ConfigValidation(msg));

        if self.sources.is_empty() && self.flow != Flow::Block {
            return invalid("at least one source is required".into());
        }
        for (i, s) in self.sources.iter().enumerate() {
            if s.sheets.is_empty() {
                return invalid(format!("source {}: no sheet names", i + 1));
            }
            if s.date_columns.is_empty() {
                return invalid(format!("source {}: no date columns", i + 1));
            }
            if s.header_row == Some(0) {
                return invalid(format!("source {}: header_row is 1-based", i + 1));
            }
        }

        match self.flow {
            Flow::Detail => {
                if self.detail.is_none() {
                    return invalid("flow 'detail' needs a [detail] section".into());
                }
                if self.input == InputKind::Statement {
                    return invalid("flow 'detail' reads invoices or a consolidated file".into());
                }
            }
            Flow::Aggregate => {
                let Some(calc) = &self.calc else {
                    return invalid("flow 'aggregate' needs a [calc] section".into());
                };
                if calc.first_row == 0 || calc.header_row == 0 {
                    return invalid("calc rows are 1-based".into());
                }
                let names = self.bucket_names();
                for b in &calc.buckets {
                    if !names.contains(b.as_str()) {
                        return invalid(format!("calc bucket '{b}' is not declared by any source"));
                    }
                }
            }
            Flow::Block => {
                let Some(block) = &self.block else {
                    return invalid("flow 'block' needs a [block] section".into());
                };
                if self.input != InputKind::Invoices {
                    return invalid("flow 'block' reads one invoice per week".into());
                }
                if block.start.is_empty() || block.end.is_empty() {
                    return invalid("block start and end markers are required".into());
                }
                if block.width == 0 || block.items.is_empty() {
                    return invalid("block needs a width and at least one item".into());
                }
                let mut seen = BTreeSet::new();
                for item in &block.items {
                    if item.labels.is_empty() {
                        return invalid(format!("block item '{}': no labels", item.name));
                    }
                    if item.name.trim().is_empty() || !seen.insert(item.name.as_str()) {
                        return invalid(format!("block item names must be unique and non-empty: '{}'", item.name));
                    }
                }
            }
        }

        for rule in &self.report.rules {
            if rule.columns.is_empty() {
                return invalid(format!("rule '{}': no source columns", rule.label));
            }
            if rule.row == 0 {
                return invalid(format!("rule '{}': row is 1-based", rule.label));
            }
            if self.flow == Flow::Detail && rule.row > crate::detail::TOTAL_ROW {
                return invalid(format!("rule '{}': detail rows are 1 to 4", rule.label));
            }
            if rule.op == MappingOp::Subtract && rule.columns.len() != 2 {
                return invalid(format!(
                    "rule '{}': subtract needs two candidates, got {}",
                    rule.label,
                    rule.columns.len()
                ));
            }
        }

        let prefixes = self.generated_prefixes();
        let unique: BTreeSet<&str> = prefixes.iter().copied().collect();
        if unique.len() != prefixes.len() || prefixes.iter().any(|p| p.is_empty()) {
            return invalid("generated sheet prefixes must be unique and non-empty".into());
        }

        if let Some(sp) = &self.spillover {
            if !self.bucket_names().contains(sp.bucket.as_str()) {
                return invalid(format!("spillover bucket '{}' is not declared by any source", sp.bucket));
            }
            if sp.opening_label.is_some() && sp.opening_cell.is_some()
                || sp.closing_label.is_some() && sp.closing_cell.is_some()
            {
                return invalid("spillover targets take a label or a cell, not both".into());
            }
        }

        if let Some(s) = &self.summary {
            if s.week_label_row == 0 || s.metrics.iter().any(|m| m.row == 0) {
                return invalid("summary rows are 1-based".into());
            }
            for m in &s.metrics {
                let needs_keywords = matches!(m.kind, MetricKind::NonzeroCount | MetricKind::ColumnTotal);
                if needs_keywords && m.keywords.is_empty() {
                    return invalid(format!("summary row {}: metric needs keywords", m.row));
                }
                if m.kind == MetricKind::InvoiceCell && m.cell.is_none() {
                    return invalid(format!("summary row {}: invoice_cell metric needs a cell", m.row));
                }
            }
        }

        if self.receipts.is_some() && self.input != InputKind::Invoices {
            return invalid("[receipts] reads expected amounts from invoices".into());
        }

        if let Some(m) = &self.month {
            if m.tokens().any(|t| t.trim().is_empty()) {
                return invalid("month token is empty".into());
            }
        }

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
name = "demo"
input = "invoices"
flow = "detail"

[[sources]]
sheets = ["Order Level"]
header_row = 3
date_columns = ["Order Date"]

[[sources.buckets]]
name = "payout"
columns = ["Net Payout"]

[detail]
first_summed_column = "Item Total"
status_column = "Order Status"

[report]
sheet = "Cashflow"
label_column = "B"
base_column = "C"

[[report.rules]]
label = "Item sales (Delivered orders)"
columns = ["Item Total"]
row = 2
op = "single"

[spillover]
bucket = "payout"
opening_label = "Opening Week Adjustments"
"#;

    #[test]
    fn parse_minimal() {
        let p = Profile::from_toml(MINIMAL).unwrap();
        assert_eq!(p.name, "demo");
        assert_eq!(p.flow, Flow::Detail);
        assert_eq!(p.summary_cells.len(), 2);
        assert_eq!(p.summary_cells[1].to_string(), "'Summary'!C4");
        assert_eq!(p.report.layout().base_col, 2);
        assert_eq!(p.sources[0].header_row, Some(3));
        assert_eq!(p.detail.as_ref().unwrap().prefix, "D1W");
        assert_eq!(p.generated_prefixes(), vec!["D1W"]);
    }

    #[test]
    fn reject_bad_column_letter() {
        let input = MINIMAL.replace(r#"base_column = "C""#, r#"base_column = "C1""#);
        assert!(matches!(Profile::from_toml(&input), Err(ReconError::ConfigParse(_))));
    }

    #[test]
    fn reject_subtract_with_one_candidate() {
        let input = format!(
            r#"{MINIMAL}
[[report.rules]]
label = "Compensation"
columns = ["Total Customer Paid"]
row = 1
op = "subtract"
"#
        );
        let err = Profile::from_toml(&input).unwrap_err();
        assert!(err.to_string().contains("subtract needs two candidates"), "{err}");
    }

    #[test]
    fn reject_unknown_spillover_bucket() {
        let input = MINIMAL.replace(r#"bucket = "payout""#, r#"bucket = "net""#);
        let err = Profile::from_toml(&input).unwrap_err();
        assert!(matches!(err, ReconError::ConfigValidation(_)));
    }

    #[test]
    fn reject_detail_flow_without_detail_section() {
        let start = MINIMAL.find("[detail]").unwrap();
        let end = MINIMAL.find("[report]").unwrap();
        let input = format!("{}{}", &MINIMAL[..start], &MINIMAL[end..]);
        let err = Profile::from_toml(&input).unwrap_err();
        assert!(err.to_string().contains("[detail]"), "{err}");
    }

    #[test]
    fn reject_duplicate_prefixes() {
        let input = format!(
            "{}\n[additions]\nprefix = \"D1W\"\nsheets = [\"Deductions\"]\n",
            MINIMAL
        );
        let err = Profile::from_toml(&input).unwrap_err();
        assert!(err.to_string().contains("prefixes"), "{err}");
    }

    #[test]
    fn block_flow_needs_a_block_section() {
        let input = r#"
name = "dineout"
input = "invoices"
flow = "block"

[report]
sheet = "Swiggy Dineout"
label_column = "B"
base_column = "C"
"#;
        let err = Profile::from_toml(input).unwrap_err();
        assert!(err.to_string().contains("[block]"));

        let with_block = format!(
            r#"{input}
[block]
start = ["Payout Invoice"]
end = ["Net Payout"]
result_column = "E"

[[block.items]]
name = "tip"
labels = ["Tip"]
column = "E"
"#
        );
        let p = Profile::from_toml(&with_block).unwrap();
        assert_eq!(p.block.unwrap().prefix, "SD");

        let statement = with_block.replace(r#"input = "invoices""#, r#"input = "statement""#);
        assert!(Profile::from_toml(&statement).is_err());
    }
}
