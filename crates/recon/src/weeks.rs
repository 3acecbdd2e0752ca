use chrono::{Datelike, Duration, NaiveDate};
use serde::Serialize;

use crate::dates::{days_in_month, month_from_name, month_key, month_name, range_label};
use crate::error::ReconError;

/// The four user-declared boundary days.
///
/// `first_start > first_end` puts the first start in the previous month;
/// `last_end < last_start` puts the last end in the next month.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WeekBoundaries {
    pub first_start: u32,
    pub first_end: u32,
    pub last_start: u32,
    pub last_end: u32,
}

impl WeekBoundaries {
    pub fn new(first: (u32, u32), last: (u32, u32)) -> Self {
        Self {
            first_start: first.0,
            first_end: first.1,
            last_start: last.0,
            last_end: last.1,
        }
    }
}

/// One week of the partition.
///
/// `start_date`/`end_date` are the true dates used for matching; `label`
/// shows the range clipped to the target month.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WeekDescriptor {
    pub week_number: u32,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub label: String,
    pub is_opening_spillover: bool,
    pub is_closing_spillover: bool,
}

impl WeekDescriptor {
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start_date <= date && date <= self.end_date
    }

    pub fn days(&self) -> i64 {
        (self.end_date - self.start_date).num_days() + 1
    }
}

/// Ordered, contiguous week partition of a target month.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WeekStructure {
    pub year: i32,
    pub month: u32,
    pub weeks: Vec<WeekDescriptor>,
}

impl WeekStructure {
    pub fn month_name(&self) -> &'static str {
        month_name(self.month)
    }

    pub fn month_key(&self) -> (i32, u32) {
        (self.year, self.month)
    }

    pub fn len(&self) -> usize {
        self.weeks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.weeks.is_empty()
    }

    pub fn week(&self, week_number: u32) -> Option<&WeekDescriptor> {
        self.weeks.iter().find(|w| w.week_number == week_number)
    }

    pub fn last(&self) -> Option<&WeekDescriptor> {
        self.weeks.last()
    }

    /// First week (ascending) whose inclusive range holds `date`.
    pub fn week_for(&self, date: NaiveDate) -> Option<&WeekDescriptor> {
        self.weeks.iter().find(|w| w.contains(date))
    }

    /// Week whose true range equals `start..=end` exactly.
    pub fn exact(&self, start: NaiveDate, end: NaiveDate) -> Option<&WeekDescriptor> {
        self.weeks
            .iter()
            .find(|w| w.start_date == start && w.end_date == end)
    }
}

/// Build the week partition for `month` of `working_year`.
pub fn build_week_structure(
    month: &str,
    bounds: WeekBoundaries,
    working_year: i32,
) -> Result<WeekStructure, ReconError> {
    let m = month_from_name(month)
        .ok_or_else(|| ReconError::InvalidWeekBoundary(format!("unknown month '{month}'")))?;
    let y = working_year;

    let first_start = if bounds.first_start > bounds.first_end {
        let (py, pm) = if m == 1 { (y - 1, 12) } else { (y, m - 1) };
        day_in(py, pm, bounds.first_start, "first week start")?
    } else {
        day_in(y, m, bounds.first_start, "first week start")?
    };
    let first_end = day_in(y, m, bounds.first_end, "first week end")?;

    let last_start = day_in(y, m, bounds.last_start, "last week start")?;
    let last_end = if bounds.last_end < bounds.last_start {
        let (ny, nm) = if m == 12 { (y + 1, 1) } else { (y, m + 1) };
        day_in(ny, nm, bounds.last_end, "last week end")?
    } else {
        day_in(y, m, bounds.last_end, "last week end")?
    };

    if last_start <= first_end {
        return Err(ReconError::InvalidWeekBoundary(format!(
            "last week starts {last_start} but first week ends {first_end}"
        )));
    }

    let target = (y, m);
    let mut ranges = vec![(first_start, first_end)];

    let mut cursor = first_end + Duration::days(1);
    while cursor < last_start {
        let end = (cursor + Duration::days(6)).min(last_start - Duration::days(1));
        ranges.push((cursor, end));
        cursor = end + Duration::days(1);
    }
    ranges.push((last_start, last_end));

    let count = ranges.len();
    let weeks = ranges
        .into_iter()
        .enumerate()
        .map(|(i, (start, end))| {
            let label_start = if month_key(start) == target { start.day() } else { 1 };
            let label_end = if month_key(end) == target {
                end.day()
            } else {
                days_in_month(y, m)
            };
            WeekDescriptor {
                week_number: i as u32 + 1,
                start_date: start,
                end_date: end,
                label: range_label(label_start, label_end),
                is_opening_spillover: i == 0 && month_key(start) < target,
                is_closing_spillover: i + 1 == count && month_key(end) > target,
            }
        })
        .collect::<Vec<_>>();

    tracing::debug!(
        month = month_name(m),
        year = y,
        weeks = weeks.len(),
        "built week structure"
    );

    Ok(WeekStructure {
        year: y,
        month: m,
        weeks,
    })
}

fn day_in(year: i32, month: u32, day: u32, what: &str) -> Result<NaiveDate, ReconError> {
    NaiveDate::from_ymd_opt(year, month, day).ok_or_else(|| {
        ReconError::InvalidWeekBoundary(format!(
            "{what}: day {day} is not valid in {} {year}",
            month_name(month)
        ))
    })
}

/// Parse a "27-2" style boundary pair.
pub fn parse_day_pair(s: &str) -> Result<(u32, u32), ReconError> {
    let bad = || ReconError::InvalidWeekBoundary(format!("expected START-END days, got '{s}'"));
    let (a, b) = s.trim().split_once(['-', ',', ':']).ok_or_else(bad)?;
    let a = a.trim().parse::<u32>().map_err(|_| bad())?;
    let b = b.trim().parse::<u32>().map_err(|_| bad())?;
    Ok((a, b))
}
