use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// A calendar month in UTC, the granularity of revenue reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ReportPeriod {
    year: i32,
    month: u32,
}

impl ReportPeriod {
    pub const MIN_YEAR: i32 = 1;
    pub const MAX_YEAR: i32 = 9999;

    /// Returns `None` unless `month` is in `1..=12` and `year` in `1..=9999`.
    pub fn new(year: i32, month: u32) -> Option<Self> {
        if !(Self::MIN_YEAR..=Self::MAX_YEAR).contains(&year) || !(1..=12).contains(&month) {
            return None;
        }
        Some(Self { year, month })
    }

    /// Canonical identifier, e.g. `2024-06`.
    pub fn id(&self) -> String {
        format!("{:04}-{:02}", self.year, self.month)
    }

    /// Half-open range `[first of month, first of next month)`.
    pub fn bounds(&self) -> (DateTime<Utc>, DateTime<Utc>) {
        let (next_year, next_month) = if self.month == 12 {
            (self.year + 1, 1)
        } else {
            (self.year, self.month + 1)
        };
        (
            first_instant(self.year, self.month),
            first_instant(next_year, next_month),
        )
    }
}

impl std::fmt::Display for ReportPeriod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.id())
    }
}

// Callers only pass months validated by `ReportPeriod::new` (or the month
// after one), and chrono covers years well beyond 10000.
fn first_instant(year: i32, month: u32) -> DateTime<Utc> {
    NaiveDate::from_ymd_opt(year, month, 1)
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}
