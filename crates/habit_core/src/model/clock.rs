//! Current-date providers.
//!
//! # Responsibility
//! - Give model and store code one seam for "what day is it".
//! - Let tests pin the calendar day instead of depending on wall-clock time.

use chrono::{Local, NaiveDate, Utc};

/// Source of the current calendar day and creation timestamps.
pub trait Clock: Send + Sync {
    /// Returns the current calendar day in the user's local time zone.
    fn today(&self) -> NaiveDate;

    /// Returns the current instant as Unix epoch milliseconds.
    fn now_epoch_ms(&self) -> i64;
}

/// Wall-clock backed provider used by the application.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn today(&self) -> NaiveDate {
        Local::now().date_naive()
    }

    fn now_epoch_ms(&self) -> i64 {
        Utc::now().timestamp_millis()
    }
}

/// Provider pinned to one day and one instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedClock {
    today: NaiveDate,
    now_epoch_ms: i64,
}

impl FixedClock {
    pub fn new(today: NaiveDate, now_epoch_ms: i64) -> Self {
        Self {
            today,
            now_epoch_ms,
        }
    }

    /// Pins only the day; the instant is midnight UTC of that day.
    pub fn on(today: NaiveDate) -> Self {
        let now_epoch_ms = today
            .and_hms_opt(0, 0, 0)
            .map_or(0, |at| at.and_utc().timestamp_millis());
        Self::new(today, now_epoch_ms)
    }
}

impl Clock for FixedClock {
    fn today(&self) -> NaiveDate {
        self.today
    }

    fn now_epoch_ms(&self) -> i64 {
        self.now_epoch_ms
    }
}
