use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::cellref::{quote_sheet, CellRef};
use crate::detail::DetailSheet;
use crate::error::ReconError;
use crate::model::HeaderIndex;
use crate::workbook::{CellValue, GridSheet, LabelIndex, LabelMatch};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MappingOp {
    /// Formula referencing the first matched cell.
    Single,
    /// Formula adding every matched cell.
    Sum,
    /// Formula `first - second`; needs exactly two matches.
    Subtract,
    /// Literal sum of the matched cells, sign flipped.
    Negate,
    /// Literal sum of the matched cells.
    Value,
}

impl MappingOp {
    pub fn name(self) -> &'static str {
        match self {
            Self::Single => "single",
            Self::Sum => "sum",
            Self::Subtract => "subtract",
            Self::Negate => "negate",
            Self::Value => "value",
        }
    }
}

/// Report label → source columns at a given source row.
#[derive(Debug, Clone, Deserialize)]
pub struct CellMappingRule {
    pub label: String,
    /// Ordered candidates; detail headers or bucket names.
    pub columns: Vec<String>,
    /// 1-based computed row of the detail sheet; ignored for calculation sheets.
    #[serde(default = "default_row")]
    pub row: u32,
    pub op: MappingOp,
    /// Deduction candidates; the first match is subtracted.
    #[serde(default)]
    pub less: Vec<String>,
}

fn default_row() -> u32 {
    1
}

/// Candidate name → keywords that must all appear in a header.
pub type PartialKeywords = BTreeMap<String, Vec<String>>;

/// Where mapped values come from.
pub trait MappingSource {
    fn sheet_name(&self) -> &str;
    fn headers(&self) -> &HeaderIndex;
    /// Cell holding the value for a resolved column at a rule row.
    fn cell_for(&self, column: usize, row: u32) -> CellRef;
    fn value_at(&self, column: usize, row: u32) -> f64;
}

impl MappingSource for DetailSheet {
    fn sheet_name(&self) -> &str {
        &self.name
    }

    fn headers(&self) -> &HeaderIndex {
        &self.headers
    }

    fn cell_for(&self, column: usize, row: u32) -> CellRef {
        CellRef::new(row.saturating_sub(1) as usize, column)
    }

    fn value_at(&self, column: usize, row: u32) -> f64 {
        self.computed(row, column).unwrap_or(0.0)
    }
}

/// Resolve candidates: exact header first, then the candidate's keyword group.
pub fn match_columns(headers: &HeaderIndex, candidates: &[String], partial: &PartialKeywords) -> Vec<usize> {
    let mut found = Vec::new();
    for c in candidates {
        let hit = headers.exact(c).or_else(|| {
            partial
                .iter()
                .find(|(name, _)| name.trim().eq_ignore_ascii_case(c.trim()))
                .and_then(|(_, keywords)| headers.containing_all(keywords))
        });
        match hit {
            Some(idx) if !found.contains(&idx) => found.push(idx),
            Some(_) => {}
            None => tracing::trace!(candidate = %c, "no header"),
        }
    }
    found
}

/// What a rule writes into its report cell.
#[derive(Debug, Clone, PartialEq)]
pub enum CellWrite {
    Formula(String),
    Value(f64),
}

impl From<CellWrite> for CellValue {
    fn from(w: CellWrite) -> Self {
        match w {
            CellWrite::Formula(f) => CellValue::Formula(f),
            CellWrite::Value(v) => CellValue::Number(v),
        }
    }
}

/// Build the cell content for one rule against one source.
///
/// `Ok(None)` when nothing matched: the report cell stays untouched.
pub fn build_write(
    rule: &CellMappingRule,
    source: &dyn MappingSource,
    partial: &PartialKeywords,
) -> Result<Option<CellWrite>, ReconError> {
    let cols = match_columns(source.headers(), &rule.columns, partial);
    if cols.is_empty() {
        return Ok(None);
    }
    let less = match_columns(source.headers(), &rule.less, partial).into_iter().next();

    let sheet = quote_sheet(source.sheet_name());
    let r = |col: usize| format!("{sheet}!{}", source.cell_for(col, rule.row).a1());

    let body = match rule.op {
        MappingOp::Single => r(cols[0]),
        MappingOp::Sum => cols.iter().map(|&c| r(c)).collect::<Vec<_>>().join("+"),
        MappingOp::Subtract => {
            if cols.len() != 2 {
                return Err(ReconError::ConfigurationMismatch {
                    label: rule.label.clone(),
                    operation: rule.op.name(),
                    expected: 2,
                    found: cols.len(),
                });
            }
            format!("{}-{}", r(cols[0]), r(cols[1]))
        }
        MappingOp::Value | MappingOp::Negate => {
            let mut v: f64 = cols.iter().map(|&c| source.value_at(c, rule.row)).sum();
            if let Some(l) = less {
                v -= source.value_at(l, rule.row);
            }
            if rule.op == MappingOp::Negate {
                v = -v;
            }
            return Ok(Some(CellWrite::Value(v)));
        }
    };

    let formula = match less {
        Some(l) => format!("={body}-{}", r(l)),
        None => format!("={body}"),
    };
    Ok(Some(CellWrite::Formula(formula)))
}

/// Outcome of applying a rule set for one week.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RuleReport {
    pub written: usize,
    /// Rules whose columns matched nothing.
    pub unmatched: Vec<String>,
    /// Rules whose label is not in the report sheet.
    pub missing_labels: Vec<String>,
    /// Rules skipped for a column-count mismatch, with the message.
    pub mismatched: Vec<(String, String)>,
}

/// Report sheet geometry: label column, first week column and label comparison.
#[derive(Debug, Clone, Copy)]
pub struct ReportLayout {
    pub label_col: usize,
    pub base_col: usize,
    pub label_match: LabelMatch,
}

impl ReportLayout {
    pub fn week_col(&self, week_number: u32) -> usize {
        self.base_col + week_number.saturating_sub(1) as usize
    }
}

/// Apply every rule for one week into the report sheet.
pub fn apply_rules(
    sheet: &mut GridSheet,
    layout: ReportLayout,
    week_number: u32,
    rules: &[CellMappingRule],
    source: &dyn MappingSource,
    partial: &PartialKeywords,
) -> RuleReport {
    let labels = LabelIndex::scan(sheet, layout.label_col);
    let col = layout.week_col(week_number);
    let mut report = RuleReport::default();

    for rule in rules {
        let Some(row) = labels.find(&rule.label, layout.label_match) else {
            tracing::debug!(label = %rule.label, "label not in report sheet");
            report.missing_labels.push(rule.label.clone());
            continue;
        };
        match build_write(rule, source, partial) {
            Ok(Some(write)) => {
                tracing::debug!(label = %rule.label, week = week_number, ?write, "mapped");
                sheet.set(CellRef::new(row, col), write.into());
                report.written += 1;
            }
            Ok(None) => {
                tracing::debug!(label = %rule.label, week = week_number, "no matching columns; cell left as is");
                report.unmatched.push(rule.label.clone());
            }
            Err(e) => {
                tracing::warn!(label = %rule.label, week = week_number, error = %e, "rule skipped");
                report.mismatched.push((rule.label.clone(), e.to_string()));
            }
        }
    }
    report
}
