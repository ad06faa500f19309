//! Export functionality for CSV and JSON formats

use crate::aggregator::DayCounts;
use crate::history::{History, HistorySummary, TimeRange};
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use std::io::Write;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ExportError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Csv,
    Json,
}

impl ExportFormat {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "csv" => Some(ExportFormat::Csv),
            "json" => Some(ExportFormat::Json),
            _ => None,
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Json => "json",
        }
    }
}

#[derive(Debug, Serialize)]
struct DayRecord {
    date: NaiveDate,
    words: u64,
}

/// Export data structure for JSON
#[derive(Debug, Serialize)]
struct ExportData {
    exported_at: DateTime<Utc>,
    period_start: NaiveDate,
    period_end: NaiveDate,
    summary: HistorySummary,
    days: Vec<DayRecord>,
}

pub struct Exporter<'a> {
    history: History<'a>,
    today: NaiveDate,
}

impl<'a> Exporter<'a> {
    pub fn new(day_counts: &'a DayCounts, today: NaiveDate) -> Self {
        Self {
            history: History::new(day_counts),
            today,
        }
    }

    /// Export the day history for a time range to a writer
    pub fn export<W: Write>(
        &self,
        writer: W,
        range: TimeRange,
        format: ExportFormat,
    ) -> Result<()> {
        match format {
            ExportFormat::Csv => self.export_csv(writer, range),
            ExportFormat::Json => self.export_json(writer, range),
        }
    }

    fn export_csv<W: Write>(&self, writer: W, range: TimeRange) -> Result<()> {
        let mut csv_writer = csv::Writer::from_writer(writer);
        csv_writer.write_record(["date", "words"])?;

        for (date, words) in self.history.daily(range, self.today) {
            csv_writer.write_record([date.format("%Y-%m-%d").to_string(), words.to_string()])?;
        }

        csv_writer.flush()?;
        Ok(())
    }

    fn export_json<W: Write>(&self, mut writer: W, range: TimeRange) -> Result<()> {
        let days = self.history.daily(range, self.today);
        let (range_start, period_end) = range.to_range(self.today);
        // Open-ended ranges start at the first recorded day
        let period_start = days
            .first()
            .map(|(date, _)| *date)
            .filter(|first| *first > range_start)
            .unwrap_or(range_start);

        let export_data = ExportData {
            exported_at: Utc::now(),
            period_start,
            period_end,
            summary: self.history.summary(range, self.today),
            days: days
                .into_iter()
                .map(|(date, words)| DayRecord { date, words })
                .collect(),
        };

        let json = serde_json::to_string_pretty(&export_data)?;
        writer.write_all(json.as_bytes())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn history() -> DayCounts {
        [("2024-03-12", 300), ("2024-03-14", 100)]
            .iter()
            .map(|(k, v)| (k.to_string(), *v))
            .collect()
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 14).unwrap()
    }

    #[test]
    fn test_csv_export() {
        let counts = history();
        let mut out = Vec::new();
        Exporter::new(&counts, today())
            .export(&mut out, TimeRange::AllTime, ExportFormat::Csv)
            .unwrap();

        let text = String::from_utf8(out).unwrap();
        assert_eq!(text, "date,words\n2024-03-12,300\n2024-03-14,100\n");
    }

    #[test]
    fn test_json_export() {
        let counts = history();
        let mut out = Vec::new();
        Exporter::new(&counts, today())
            .export(&mut out, TimeRange::AllTime, ExportFormat::Json)
            .unwrap();

        let json: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(json["period_start"], "2024-03-12");
        assert_eq!(json["period_end"], "2024-03-14");
        assert_eq!(json["summary"]["total_words"], 400);
        assert_eq!(json["days"][1]["words"], 100);
    }

    #[test]
    fn test_format_parse() {
        assert_eq!(ExportFormat::parse("CSV"), Some(ExportFormat::Csv));
        assert_eq!(ExportFormat::parse("xml"), None);
        assert_eq!(ExportFormat::Json.extension(), "json");
    }
}
