//! Wall-clock provider
//!
//! Relative periods ("today", "last week", "3 days ago") are resolved against
//! an injected clock so that answers are reproducible for a pinned "now".

use chrono::{Local, NaiveDate, NaiveDateTime, NaiveTime};

pub trait Clock: Send + Sync {
    fn now(&self) -> NaiveDateTime;

    fn today(&self) -> NaiveDate {
        self.now().date()
    }
}

/// Local system time
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}

/// Clock pinned to a single instant
#[derive(Debug, Clone, Copy)]
pub struct FixedClock {
    instant: NaiveDateTime,
}

impl FixedClock {
    pub fn new(instant: NaiveDateTime) -> Self {
        Self { instant }
    }

    /// Pin the clock to midnight of `date`
    pub fn at_date(date: NaiveDate) -> Self {
        Self {
            instant: NaiveDateTime::new(date, NaiveTime::default()),
        }
    }
}

impl Clock for FixedClock {
    fn now(&self) -> NaiveDateTime {
        self.instant
    }
}
