use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::classify::classify_date;
use crate::dates::parse_flexible_date_in;
use crate::error::ReconError;
use crate::model::{
    HeaderIndex, Placement, RawValue, RowCounts, SpilloverAggregate, TransactionRow, WeekAggregate,
};
use crate::weeks::WeekStructure;

// ---------------------------------------------------------------------------
// Specs
// ---------------------------------------------------------------------------

/// How a configured header name is compared with a sheet header.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnMatch {
    #[default]
    Exact,
    Contains,
}

/// Resolve `candidates` against `headers`, keeping first-seen order and dropping duplicates.
pub fn resolve_columns(headers: &HeaderIndex, candidates: &[String], mode: ColumnMatch) -> Vec<usize> {
    let mut found = Vec::new();
    for c in candidates {
        let hit = match mode {
            ColumnMatch::Exact => headers.exact(c),
            ColumnMatch::Contains => headers.containing_all(std::slice::from_ref(c)),
        };
        if let Some(idx) = hit {
            if !found.contains(&idx) {
                found.push(idx);
            }
        }
    }
    found
}

/// Scaling applied to a bucket's sums once streaming is done.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BucketTransform {
    #[default]
    None,
    /// GST-inclusive amount to pre-tax: × 100/105.
    PreTax,
    /// Add 18% GST: × 1.18.
    TaxOverlay,
    Negate,
}

impl BucketTransform {
    pub fn apply(self, v: f64) -> f64 {
        match self {
            Self::None => v,
            Self::PreTax => v * 100.0 / 105.0,
            Self::TaxOverlay => v * 1.18,
            Self::Negate => -v,
        }
    }
}

/// A named sum over one or more source columns.
#[derive(Debug, Clone, Deserialize)]
pub struct BucketSpec {
    pub name: String,
    /// Header names; every one present in the sheet is summed.
    pub columns: Vec<String>,
    #[serde(default, rename = "match")]
    pub match_mode: ColumnMatch,
    #[serde(default)]
    pub transform: BucketTransform,
}

/// Keep only rows whose `column` holds one of `allowed` (case-insensitive).
#[derive(Debug, Clone, Deserialize)]
pub struct RowFilter {
    pub column: String,
    pub allowed: Vec<String>,
}

impl RowFilter {
    pub fn accepts(&self, value: &RawValue) -> bool {
        let text = value.as_text();
        let v = text.trim().trim_matches('\'').trim();
        self.allowed.iter().any(|a| a.eq_ignore_ascii_case(v))
    }
}

// ---------------------------------------------------------------------------
// Numeric coercion
// ---------------------------------------------------------------------------

/// Best-effort numeric value of a cell; anything unreadable is 0.
///
/// Currency markers (`₹`, `Rs.`, `$`), thousands separators, stray quotes
/// and whitespace are stripped; a lone `-` is zero; `(x)` is negative.
pub fn coerce_amount(value: &RawValue) -> f64 {
    match value {
        RawValue::Number(n) if n.is_finite() => *n,
        RawValue::Text(s) => parse_amount_text(s).unwrap_or(0.0),
        _ => 0.0,
    }
}

/// Parse currency-formatted text; `None` when no number remains.
pub fn parse_amount_text(s: &str) -> Option<f64> {
    let mut t = s.trim().trim_matches(|c| c == '\'' || c == '"').trim().to_string();
    for marker in ["₹", "Rs.", "Rs", "INR", "$", ",", "\u{200c}", " "] {
        t = t.replace(marker, "");
    }
    if t == "-" {
        return Some(0.0);
    }
    if t.is_empty() {
        return None;
    }
    let negative = t.starts_with('(') && t.ends_with(')');
    if negative {
        t = t[1..t.len() - 1].to_string();
    }
    let v: f64 = t.parse().ok()?;
    if !v.is_finite() {
        return None;
    }
    Some(if negative { -v } else { v })
}

// ---------------------------------------------------------------------------
// Aggregator
// ---------------------------------------------------------------------------

/// Column positions of one source sheet, resolved once per sheet.
#[derive(Debug, Clone)]
pub struct BoundColumns {
    pub sheet: String,
    pub date: usize,
    pub filter: Option<usize>,
    /// Resolved columns per bucket, parallel to the aggregator's specs.
    pub buckets: Vec<Vec<usize>>,
}

/// Everything the aggregator accumulated.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AggregationOutput {
    pub weeks: Vec<WeekAggregate>,
    pub opening: SpilloverAggregate,
    pub closing: SpilloverAggregate,
    pub counts: RowCounts,
}

impl AggregationOutput {
    pub fn week(&self, week_number: u32) -> Option<&WeekAggregate> {
        self.weeks.iter().find(|w| w.week_number == week_number)
    }

    /// Fold another output (same week structure) into this one.
    pub fn merge(&mut self, other: AggregationOutput) {
        for w in other.weeks {
            match self.weeks.iter_mut().find(|x| x.week_number == w.week_number) {
                Some(mine) => {
                    add_sums(&mut mine.sums, &w.sums);
                    mine.rows += w.rows;
                }
                None => self.weeks.push(w),
            }
        }
        self.weeks.sort_by_key(|w| w.week_number);
        add_sums(&mut self.opening.sums, &other.opening.sums);
        self.opening.rows += other.opening.rows;
        add_sums(&mut self.closing.sums, &other.closing.sums);
        self.closing.rows += other.closing.rows;
        self.counts.merge(&other.counts);
    }
}

fn add_sums(into: &mut BTreeMap<String, f64>, from: &BTreeMap<String, f64>) {
    for (k, v) in from {
        *into.entry(k.clone()).or_insert(0.0) += v;
    }
}

/// Streams rows, classifies their dates and sums buckets per week and spillover.
pub struct Aggregator<'w> {
    weeks: &'w WeekStructure,
    buckets: Vec<BucketSpec>,
    filter: Option<RowFilter>,
    working_year: i32,
    week_sums: Vec<WeekAggregate>,
    opening: SpilloverAggregate,
    closing: SpilloverAggregate,
    counts: RowCounts,
}

impl<'w> Aggregator<'w> {
    pub fn new(
        weeks: &'w WeekStructure,
        buckets: Vec<BucketSpec>,
        filter: Option<RowFilter>,
        working_year: i32,
    ) -> Self {
        let week_sums = weeks.weeks.iter().map(|w| WeekAggregate::new(w.week_number)).collect();
        Self {
            weeks,
            buckets,
            filter,
            working_year,
            week_sums,
            opening: SpilloverAggregate::default(),
            closing: SpilloverAggregate::default(),
            counts: RowCounts::default(),
        }
    }

    /// Resolve the date, filter and bucket columns of a sheet.
    ///
    /// A missing date or filter column fails the sheet; a bucket with no
    /// matching column simply sums to zero.
    pub fn bind(
        &self,
        sheet: &str,
        headers: &HeaderIndex,
        date_columns: &[String],
        date_match: ColumnMatch,
    ) -> Result<BoundColumns, ReconError> {
        let date = resolve_columns(headers, date_columns, date_match)
            .first()
            .copied()
            .ok_or_else(|| ReconError::MissingRequiredColumn {
                sheet: sheet.to_string(),
                column: date_columns.first().cloned().unwrap_or_default(),
            })?;

        let filter = match &self.filter {
            Some(f) => Some(headers.exact(&f.column).ok_or_else(|| {
                ReconError::MissingRequiredColumn {
                    sheet: sheet.to_string(),
                    column: f.column.clone(),
                }
            })?),
            None => None,
        };

        let buckets = self
            .buckets
            .iter()
            .map(|b| {
                let cols = resolve_columns(headers, &b.columns, b.match_mode);
                if cols.is_empty() {
                    tracing::debug!(sheet, bucket = %b.name, "no column for bucket");
                }
                cols
            })
            .collect();

        Ok(BoundColumns {
            sheet: sheet.to_string(),
            date,
            filter,
            buckets,
        })
    }

    /// Classify one row's date without accumulating it.
    pub fn placement_of(&self, bound: &BoundColumns, row: &TransactionRow<'_>) -> Placement {
        if let (Some(f), Some(idx)) = (&self.filter, bound.filter) {
            if !f.accepts(row.cell(idx)) {
                return Placement::Skipped;
            }
        }
        match self.row_date(bound, row) {
            Some(date) => classify_date(self.weeks, date),
            None => Placement::Skipped,
        }
    }

    fn row_date(&self, bound: &BoundColumns, row: &TransactionRow<'_>) -> Option<NaiveDate> {
        let cell = row.cell(bound.date);
        if cell.is_blank() || cell.as_text().trim() == "#REF!" {
            return None;
        }
        parse_flexible_date_in(cell, self.working_year).ok()
    }

    /// Classify and accumulate one row.
    pub fn push(&mut self, bound: &BoundColumns, row: &TransactionRow<'_>) -> Placement {
        let placement = self.placement_of(bound, row);
        self.record(bound, row, placement);
        placement
    }

    /// Accumulate a row whose placement the caller already decided.
    pub fn record(&mut self, bound: &BoundColumns, row: &TransactionRow<'_>, placement: Placement) {
        let sums = match placement {
            Placement::Skipped => {
                self.counts.skipped += 1;
                return;
            }
            Placement::Unclassified => {
                self.counts.unclassified += 1;
                return;
            }
            Placement::OpeningSpillover => {
                self.counts.opening += 1;
                self.opening.rows += 1;
                &mut self.opening.sums
            }
            Placement::ClosingSpillover => {
                self.counts.closing += 1;
                self.closing.rows += 1;
                &mut self.closing.sums
            }
            Placement::Week(n) => {
                let Some(agg) = self.week_sums.iter_mut().find(|w| w.week_number == n) else {
                    self.counts.unclassified += 1;
                    return;
                };
                self.counts.classified += 1;
                agg.rows += 1;
                &mut agg.sums
            }
        };

        for (spec, cols) in self.buckets.iter().zip(&bound.buckets) {
            let v: f64 = cols.iter().map(|&c| coerce_amount(row.cell(c))).sum();
            *sums.entry(spec.name.clone()).or_insert(0.0) += v;
        }
    }

    pub fn counts(&self) -> RowCounts {
        self.counts
    }

    /// Apply bucket transforms and hand back the sums.
    pub fn finish(self) -> AggregationOutput {
        let transforms: BTreeMap<&str, BucketTransform> = self
            .buckets
            .iter()
            .map(|b| (b.name.as_str(), b.transform))
            .collect();
        let scale = |sums: &mut BTreeMap<String, f64>| {
            for (name, v) in sums.iter_mut() {
                if let Some(t) = transforms.get(name.as_str()) {
                    *v = t.apply(*v);
                }
            }
        };

        let mut weeks = self.week_sums;
        let mut opening = self.opening;
        let mut closing = self.closing;
        for w in &mut weeks {
            for b in &self.buckets {
                w.sums.entry(b.name.clone()).or_insert(0.0);
            }
            scale(&mut w.sums);
        }
        scale(&mut opening.sums);
        scale(&mut closing.sums);

        AggregationOutput {
            weeks,
            opening,
            closing,
            counts: self.counts,
        }
    }
}
