//! Metrics over the day history and time range utilities

use crate::aggregator::DayCounts;
use chrono::{Datelike, Duration, NaiveDate};
use serde::Serialize;

/// Time range for querying the day history
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeRange {
    Today,
    Yesterday,
    ThisWeek,
    ThisMonth,
    ThisYear,
    Last7Days,
    Last30Days,
    Last90Days,
    AllTime,
    Custom { start: NaiveDate, end: NaiveDate },
}

impl TimeRange {
    /// Inclusive first and last day of the range, relative to `today`
    pub fn to_range(&self, today: NaiveDate) -> (NaiveDate, NaiveDate) {
        match self {
            TimeRange::Today => (today, today),

            TimeRange::Yesterday => {
                let yesterday = today - Duration::days(1);
                (yesterday, yesterday)
            }

            TimeRange::ThisWeek => {
                let days_since_monday = today.weekday().num_days_from_monday() as i64;
                (today - Duration::days(days_since_monday), today)
            }

            TimeRange::ThisMonth => (today.with_day(1).unwrap_or(today), today),

            TimeRange::ThisYear => (
                NaiveDate::from_ymd_opt(today.year(), 1, 1).unwrap_or(today),
                today,
            ),

            // Ranges include today
            TimeRange::Last7Days => (today - Duration::days(6), today),
            TimeRange::Last30Days => (today - Duration::days(29), today),
            TimeRange::Last90Days => (today - Duration::days(89), today),

            TimeRange::AllTime => (NaiveDate::MIN, today),

            TimeRange::Custom { start, end } => (*start, *end),
        }
    }

    /// Parse from string
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "today" => Some(TimeRange::Today),
            "yesterday" => Some(TimeRange::Yesterday),
            "week" | "this-week" | "thisweek" => Some(TimeRange::ThisWeek),
            "month" | "this-month" | "thismonth" => Some(TimeRange::ThisMonth),
            "year" | "this-year" | "thisyear" => Some(TimeRange::ThisYear),
            "7d" | "7days" | "last7days" => Some(TimeRange::Last7Days),
            "30d" | "30days" | "last30days" => Some(TimeRange::Last30Days),
            "90d" | "90days" | "last90days" | "3months" => Some(TimeRange::Last90Days),
            "all" | "alltime" | "all-time" => Some(TimeRange::AllTime),
            _ => None,
        }
    }
}

/// Summary of the day history over a range
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistorySummary {
    pub total_words: u64,
    pub active_days: u32,
    pub average_per_active_day: Option<f64>,
    pub best_day: Option<(NaiveDate, u64)>,
}

/// High-level queries over a day history
pub struct History<'a> {
    day_counts: &'a DayCounts,
}

impl<'a> History<'a> {
    pub fn new(day_counts: &'a DayCounts) -> Self {
        Self { day_counts }
    }

    /// Days in the range in ascending order. Keys that are not dates are skipped.
    pub fn daily(&self, range: TimeRange, today: NaiveDate) -> Vec<(NaiveDate, u64)> {
        let (start, end) = range.to_range(today);
        self.days()
            .filter(|(date, _)| *date >= start && *date <= end)
            .collect()
    }

    pub fn summary(&self, range: TimeRange, today: NaiveDate) -> HistorySummary {
        let days = self.daily(range, today);

        let total_words: u64 = days.iter().map(|(_, words)| words).sum();
        let active_days = days.iter().filter(|(_, words)| *words > 0).count() as u32;
        let average_per_active_day =
            (active_days > 0).then(|| total_words as f64 / active_days as f64);
        let best_day = days
            .iter()
            .filter(|(_, words)| *words > 0)
            .max_by_key(|(date, words)| (*words, std::cmp::Reverse(*date)))
            .copied();

        HistorySummary {
            total_words,
            active_days,
            average_per_active_day,
            best_day,
        }
    }

    /// Consecutive days with words written, ending today or yesterday
    pub fn current_streak(&self, today: NaiveDate) -> u32 {
        let written = |date: NaiveDate| {
            self.day_counts
                .get(&crate::rollover::day_key(date))
                .is_some_and(|words| *words > 0)
        };

        let mut day = if written(today) {
            today
        } else {
            today - Duration::days(1)
        };

        let mut streak = 0;
        while written(day) {
            streak += 1;
            day -= Duration::days(1);
        }
        streak
    }

    fn days(&self) -> impl Iterator<Item = (NaiveDate, u64)> + '_ {
        self.day_counts.iter().filter_map(|(key, words)| {
            NaiveDate::parse_from_str(key, "%Y-%m-%d")
                .ok()
                .map(|date| (date, *words))
        })
    }

    /// Format word count for display
    pub fn format_words(count: u64) -> String {
        if count >= 1_000_000 {
            format!("{:.1}M", count as f64 / 1_000_000.0)
        } else if count >= 1_000 {
            format!("{:.1}K", count as f64 / 1_000.0)
        } else {
            count.to_string()
        }
    }
}
