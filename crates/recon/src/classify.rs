use chrono::NaiveDate;

use crate::dates::month_key;
use crate::model::Placement;
use crate::weeks::WeekStructure;

/// Place a date relative to the target month and its weeks.
///
/// Months are compared with their year, so December of the previous year
/// is an opening spillover for a January target.
pub fn classify_date(weeks: &WeekStructure, date: NaiveDate) -> Placement {
    let row = month_key(date);
    let target = weeks.month_key();
    if row < target {
        Placement::OpeningSpillover
    } else if row > target {
        Placement::ClosingSpillover
    } else {
        match weeks.week_for(date) {
            Some(w) => Placement::Week(w.week_number),
            None => Placement::Unclassified,
        }
    }
}
