//! Calendar day rollover detection

use crate::aggregator::DailyAggregator;
use chrono::{Local, NaiveDate};
use tracing::info;

/// Source of the current local calendar date
pub trait Clock {
    fn today(&self) -> NaiveDate;
}

/// Clock backed by the system's local time zone
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalClock;

impl Clock for LocalClock {
    fn today(&self) -> NaiveDate {
        Local::now().date_naive()
    }
}

/// Format a date as a day key (`YYYY-MM-DD`, zero padded)
pub fn day_key(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// Outcome of a rollover check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rollover {
    Unchanged,
    Rolled { from: String, to: String },
}

/// Decides once per tick whether the tracked day has changed
pub struct DateRolloverPolicy<C: Clock> {
    clock: C,
}

impl<C: Clock> DateRolloverPolicy<C> {
    pub fn new(clock: C) -> Self {
        Self { clock }
    }

    /// Day key for the clock's current date
    pub fn today_key(&self) -> String {
        day_key(self.clock.today())
    }

    /// Advance the aggregator's day if the calendar date has changed.
    ///
    /// Per-file snapshots are not cleared here; the aggregator resets them on
    /// the first edit of the new day.
    pub fn tick(&self, aggregator: &mut DailyAggregator) -> Rollover {
        let now = self.today_key();
        if now == aggregator.today() {
            return Rollover::Unchanged;
        }

        let from = aggregator.today().to_string();
        info!(from = %from, to = %now, "day rolled over");
        aggregator.set_today(now.clone());
        Rollover::Rolled { from, to: now }
    }
}
