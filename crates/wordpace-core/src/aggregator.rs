//! Daily word-count aggregation
//!
//! Tracks, for the current day, the word count each file had when it was first
//! touched and its latest count. The day's total is the sum of the per-file
//! growth, each file floored at zero.

use crate::counter::count_words;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// Day totals keyed by `YYYY-MM-DD`
pub type DayCounts = BTreeMap<String, u64>;

/// Per-file snapshots for the current day, keyed by vault-relative path
pub type TodaysWordCount = BTreeMap<String, WordCount>;

/// Word count snapshot of one file on one day
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WordCount {
    pub initial: u64,
    pub current: u64,
}

impl WordCount {
    /// Snapshot for a file seen for the first time today
    pub fn baseline(count: u64) -> Self {
        Self {
            initial: count,
            current: count,
        }
    }

    /// Words added since the baseline; a shrunken file contributes zero
    pub fn delta(&self) -> u64 {
        self.current.saturating_sub(self.initial)
    }
}

/// Owns the per-file snapshots and the day history for the current day
#[derive(Debug, Clone)]
pub struct DailyAggregator {
    today: String,
    todays_word_count: TodaysWordCount,
    day_counts: DayCounts,
    current_word_count: u64,
}

impl DailyAggregator {
    pub fn new(today: impl Into<String>) -> Self {
        Self::from_parts(today, DayCounts::new(), TodaysWordCount::new())
    }

    /// Rebuild an aggregator from persisted state
    pub fn from_parts(
        today: impl Into<String>,
        day_counts: DayCounts,
        todays_word_count: TodaysWordCount,
    ) -> Self {
        let today = today.into();
        let current_word_count = day_counts.get(&today).copied().unwrap_or(0);
        Self {
            today,
            todays_word_count,
            day_counts,
            current_word_count,
        }
    }

    pub fn today(&self) -> &str {
        &self.today
    }

    pub fn day_counts(&self) -> &DayCounts {
        &self.day_counts
    }

    pub fn todays_word_count(&self) -> &TodaysWordCount {
        &self.todays_word_count
    }

    /// Move to a new day. Snapshots are left in place and discarded lazily on
    /// the first edit of the new day.
    pub(crate) fn set_today(&mut self, today: String) {
        self.today = today;
    }

    /// The total shown in the status display.
    ///
    /// After a rollover with no edits yet this is still the previous day's
    /// last total.
    pub fn current_word_count(&self) -> u64 {
        self.current_word_count
    }

    /// Handle a document change and return the new day total
    pub fn on_document_changed(&mut self, path: &str, text: &str) -> u64 {
        self.record_count(path, count_words(text))
    }

    /// Record an already-computed word count for a file and return the new day total
    pub fn record_count(&mut self, path: &str, count: u64) -> u64 {
        if self.day_counts.contains_key(&self.today) {
            self.todays_word_count
                .entry(path.to_string())
                .and_modify(|wc| wc.current = count)
                .or_insert_with(|| WordCount::baseline(count));
        } else {
            debug!(today = %self.today, "first edit of the day, resetting file snapshots");
            self.todays_word_count.clear();
            self.todays_word_count
                .insert(path.to_string(), WordCount::baseline(count));
        }

        self.recompute()
    }

    /// Recompute and store the day total from the current snapshots.
    ///
    /// Idempotent: calling it again without new edits yields the same total.
    pub fn recompute(&mut self) -> u64 {
        let total = self.todays_word_count.values().map(WordCount::delta).sum();
        self.day_counts.insert(self.today.clone(), total);
        self.current_word_count = total;
        total
    }
}
