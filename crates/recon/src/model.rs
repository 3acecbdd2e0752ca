use std::borrow::Cow;
use std::collections::{BTreeMap, HashMap};

use chrono::NaiveDate;
use serde::Serialize;

// ---------------------------------------------------------------------------
// Input
// ---------------------------------------------------------------------------

/// A single scalar read from a source sheet cell.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum RawValue {
    Empty,
    Text(String),
    Number(f64),
    Date(NaiveDate),
    Bool(bool),
}

impl RawValue {
    pub fn is_blank(&self) -> bool {
        match self {
            Self::Empty => true,
            Self::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }

    /// Text rendering used for header matching and status comparison.
    pub fn as_text(&self) -> Cow<'_, str> {
        match self {
            Self::Empty => Cow::Borrowed(""),
            Self::Text(s) => Cow::Borrowed(s.as_str()),
            Self::Number(n) => {
                if n.fract() == 0.0 && n.abs() < 1e15 {
                    Cow::Owned(format!("{}", *n as i64))
                } else {
                    Cow::Owned(n.to_string())
                }
            }
            Self::Date(d) => Cow::Owned(d.format("%Y-%m-%d").to_string()),
            Self::Bool(b) => Cow::Borrowed(if *b { "TRUE" } else { "FALSE" }),
        }
    }
}

impl From<&str> for RawValue {
    fn from(s: &str) -> Self {
        if s.is_empty() {
            Self::Empty
        } else {
            Self::Text(s.to_string())
        }
    }
}

impl From<f64> for RawValue {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

impl From<NaiveDate> for RawValue {
    fn from(d: NaiveDate) -> Self {
        Self::Date(d)
    }
}

/// Header row of a source table, with case-insensitive lookups.
#[derive(Debug, Clone, Default)]
pub struct HeaderIndex {
    headers: Vec<String>,
    by_name: HashMap<String, usize>,
}

impl HeaderIndex {
    pub fn new<I, S>(headers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let headers: Vec<String> = headers.into_iter().map(Into::into).collect();
        let mut by_name = HashMap::new();
        for (idx, h) in headers.iter().enumerate() {
            let key = normalize_header(h);
            if !key.is_empty() {
                // First occurrence wins on duplicate headers.
                by_name.entry(key).or_insert(idx);
            }
        }
        Self { headers, by_name }
    }

    pub fn len(&self) -> usize {
        self.headers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.headers.is_empty()
    }

    pub fn name(&self, idx: usize) -> Option<&str> {
        self.headers.get(idx).map(String::as_str)
    }

    pub fn names(&self) -> &[String] {
        &self.headers
    }

    /// Case-insensitive, whitespace-trimmed exact lookup.
    pub fn exact(&self, name: &str) -> Option<usize> {
        self.by_name.get(&normalize_header(name)).copied()
    }

    /// First header containing every keyword (case-insensitive).
    pub fn containing_all(&self, keywords: &[String]) -> Option<usize> {
        if keywords.is_empty() {
            return None;
        }
        let wanted: Vec<String> = keywords.iter().map(|k| k.to_lowercase()).collect();
        self.headers.iter().position(|h| {
            let h = h.to_lowercase();
            wanted.iter().all(|k| h.contains(k.as_str()))
        })
    }

    /// First candidate that matches exactly.
    pub fn first_of(&self, candidates: &[String]) -> Option<usize> {
        candidates.iter().find_map(|c| self.exact(c))
    }
}

/// Collapse internal whitespace (headers often carry embedded newlines) and lowercase.
pub fn normalize_header(s: &str) -> String {
    s.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// A borrowed view over one streamed source row.
#[derive(Debug, Clone, Copy)]
pub struct TransactionRow<'a> {
    headers: &'a HeaderIndex,
    cells: &'a [RawValue],
}

impl<'a> TransactionRow<'a> {
    pub fn new(headers: &'a HeaderIndex, cells: &'a [RawValue]) -> Self {
        Self { headers, cells }
    }

    pub fn cell(&self, idx: usize) -> &'a RawValue {
        self.cells.get(idx).unwrap_or(&RawValue::Empty)
    }

    pub fn get(&self, column: &str) -> Option<&'a RawValue> {
        self.headers.exact(column).map(|idx| self.cell(idx))
    }

    pub fn cells(&self) -> &'a [RawValue] {
        self.cells
    }

    pub fn headers(&self) -> &'a HeaderIndex {
        self.headers
    }
}

// ---------------------------------------------------------------------------
// Classification output
// ---------------------------------------------------------------------------

/// Where a classified row ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "week")]
pub enum Placement {
    OpeningSpillover,
    Week(u32),
    ClosingSpillover,
    Unclassified,
    /// Empty, `#REF!` or unparseable date, or dropped by a row filter.
    Skipped,
}

/// Bucket sums for one week.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct WeekAggregate {
    pub week_number: u32,
    pub sums: BTreeMap<String, f64>,
    pub rows: usize,
}

impl WeekAggregate {
    pub fn new(week_number: u32) -> Self {
        Self {
            week_number,
            ..Default::default()
        }
    }

    pub fn get(&self, bucket: &str) -> f64 {
        self.sums.get(bucket).copied().unwrap_or(0.0)
    }
}

/// Bucket sums for rows dated outside the target month.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SpilloverAggregate {
    pub sums: BTreeMap<String, f64>,
    pub rows: usize,
}

impl SpilloverAggregate {
    pub fn get(&self, bucket: &str) -> f64 {
        self.sums.get(bucket).copied().unwrap_or(0.0)
    }
}

/// Row counts per classification outcome.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RowCounts {
    pub classified: usize,
    pub opening: usize,
    pub closing: usize,
    pub unclassified: usize,
    pub skipped: usize,
}

impl RowCounts {
    pub fn total(&self) -> usize {
        self.classified + self.opening + self.closing + self.unclassified + self.skipped
    }

    pub fn merge(&mut self, other: &RowCounts) {
        self.classified += other.classified;
        self.opening += other.opening;
        self.closing += other.closing;
        self.unclassified += other.unclassified;
        self.skipped += other.skipped;
    }
}
