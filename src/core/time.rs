//! Clock abstraction for testable time-dependent logic

use chrono::{DateTime, Utc};
use std::sync::{Arc, Mutex};

/// Abstraction over wall-clock time
pub trait Clock: Send + Sync {
    /// Current time in UTC
    fn now(&self) -> DateTime<Utc>;

    /// Current time as whole seconds since the epoch
    fn epoch_seconds(&self) -> i64 {
        self.now().timestamp()
    }
}

/// Production clock using actual system time
#[derive(Debug, Default, Clone)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock pinned to a settable instant, for deterministic scans in tests
#[derive(Debug, Clone)]
pub struct FixedClock {
    current: Arc<Mutex<DateTime<Utc>>>,
}

impl FixedClock {
    pub fn new(at: DateTime<Utc>) -> Self {
        Self {
            current: Arc::new(Mutex::new(at)),
        }
    }

    /// Move the clock to another instant
    pub fn set(&self, at: DateTime<Utc>) {
        if let Ok(mut current) = self.current.lock() {
            *current = at;
        }
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        match self.current.lock() {
            Ok(current) => *current,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }
}

/// Format an instant the way step messages print it
pub fn format_rfc2822_utc(at: DateTime<Utc>) -> String {
    at.format("%a, %d %b %Y %H:%M:%S +0000").to_string()
}

/// Format an instant the way stored documents print dates
pub fn format_document_date(at: DateTime<Utc>) -> String {
    at.format("%Y/%m/%d %H:%M:%S").to_string()
}
