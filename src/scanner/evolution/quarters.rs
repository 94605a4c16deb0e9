//! Quarter boundary arithmetic
//!
//! Checkpoint instants start one quarter before the quarter containing "now"
//! and step back a quarter at a time. The walk ends with the first instant
//! at or before the day the repository began, so the origin quarter itself is
//! always the last candidate.

use chrono::{DateTime, Datelike, NaiveDate, Utc};

fn first_of_month(year: i32, month: u32) -> Option<DateTime<Utc>> {
    NaiveDate::from_ymd_opt(year, month, 1)
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Midnight of the day containing `at`
pub fn truncate_to_day(at: DateTime<Utc>) -> DateTime<Utc> {
    at.date_naive()
        .and_hms_opt(0, 0, 0)
        .map(|naive| naive.and_utc())
        .unwrap_or(at)
}

/// First day of the quarter containing `at`
pub fn quarter_start(at: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let month = (at.month() - 1) / 3 * 3 + 1;
    first_of_month(at.year(), month)
}

/// The quarter boundary immediately before `boundary`
pub fn previous_quarter(boundary: DateTime<Utc>) -> Option<DateTime<Utc>> {
    if boundary.month() <= 3 {
        first_of_month(boundary.year() - 1, 10)
    } else {
        first_of_month(boundary.year(), (boundary.month() - 1) / 3 * 3 - 2)
    }
}

/// Strictly decreasing checkpoint instants between `now` and `origin`
#[derive(Debug, Clone)]
pub struct Quarters {
    next: Option<DateTime<Utc>>,
    floor: DateTime<Utc>,
}

impl Quarters {
    pub fn new(origin: DateTime<Utc>, now: DateTime<Utc>) -> Self {
        Self {
            next: quarter_start(now).and_then(previous_quarter),
            floor: truncate_to_day(origin),
        }
    }

    /// The day-truncated origin the walk stops at
    pub fn floor(&self) -> DateTime<Utc> {
        self.floor
    }
}

impl Iterator for Quarters {
    type Item = DateTime<Utc>;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next?;
        self.next = if current > self.floor {
            previous_quarter(current)
        } else {
            None
        };
        Some(current)
    }
}

/// Collect the checkpoint instants for a repository
pub fn checkpoint_instants(origin: DateTime<Utc>, now: DateTime<Utc>) -> Vec<DateTime<Utc>> {
    Quarters::new(origin, now).collect()
}
