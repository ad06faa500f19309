//! Wordpace Core Library
//!
//! Provides word counting, daily word-count aggregation, settings persistence,
//! license decoding and telemetry for the wordpace vault tracker.

pub mod aggregator;
pub mod config;
pub mod counter;
pub mod debounce;
pub mod export;
pub mod history;
pub mod license;
pub mod rollover;
pub mod settings;
pub mod telemetry;
pub mod tracker;
pub mod vault;

pub use aggregator::{DailyAggregator, DayCounts, TodaysWordCount, WordCount};
pub use config::TrackerConfig;
pub use counter::count_words;
pub use export::{ExportFormat, Exporter};
pub use history::{History, TimeRange};
pub use license::{License, LicenseCodec};
pub use rollover::{Clock, DateRolloverPolicy, LocalClock, Rollover};
pub use settings::{JsonSettingsStore, SaveOutcome, Settings, SettingsStore};
pub use telemetry::{
    TelemetryDispatcher, TelemetryKey, TelemetryPayload, TelemetrySink, WebhookSink,
};
pub use tracker::{DocumentUpdate, Tracker};
pub use vault::Vault;

/// Get the data directory for wordpace
pub fn data_dir() -> std::path::PathBuf {
    directories::ProjectDirs::from("com", "wordpace", "wordpace")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .unwrap_or_else(|| {
            directories::BaseDirs::new()
                .map(|d| d.home_dir().join(".wordpace"))
                .unwrap_or_else(|| std::path::PathBuf::from(".wordpace"))
        })
}

/// Get the settings file path for a vault
pub fn settings_path(vault_name: &str) -> std::path::PathBuf {
    data_dir().join(vault_name).join("data.json")
}
