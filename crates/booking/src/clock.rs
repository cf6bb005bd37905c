//! Source of "today" for date validation and upcoming listings.

use chrono::{NaiveDate, Utc};

pub trait Clock: Send + Sync + 'static {
    fn today(&self) -> NaiveDate;
}

/// Today's UTC date.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn today(&self) -> NaiveDate {
        Utc::now().date_naive()
    }
}

/// A clock pinned to one date, for tests.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub NaiveDate);

impl Clock for FixedClock {
    fn today(&self) -> NaiveDate {
        self.0
    }
}
