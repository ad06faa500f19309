//! Durable settings and the JSON settings store
//!
//! The persisted blob looks like
//! `{ "dayCounts": {..}, "todaysWordCount": {..}, "userId": .., "key": .. }`.

use crate::aggregator::{DayCounts, TodaysWordCount};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, SettingsError>;

/// Everything the tracker persists between runs.
///
/// Each field defaults on its own, so a partial or older file still loads.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    #[serde(default)]
    pub day_counts: DayCounts,
    #[serde(default)]
    pub todays_word_count: TodaysWordCount,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default, rename = "key")]
    pub license_key: Option<String>,
}

/// Result of a guarded save
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    Saved,
    /// The day history was empty, so nothing was written
    SkippedEmpty,
}

/// Key-value store the tracker's settings live in
pub trait SettingsStore {
    fn load(&self) -> Result<Settings>;

    /// Unconditionally replace the stored settings
    fn write(&self, settings: &Settings) -> Result<()>;

    /// Save unless the day history is empty. An empty history never replaces
    /// what is stored.
    fn save(&self, settings: &Settings) -> Result<SaveOutcome> {
        if settings.day_counts.is_empty() {
            debug!("refusing to persist an empty day history");
            return Ok(SaveOutcome::SkippedEmpty);
        }
        self.write(settings)?;
        Ok(SaveOutcome::Saved)
    }
}

/// Settings stored as a JSON file
#[derive(Debug, Clone)]
pub struct JsonSettingsStore {
    path: PathBuf,
}

impl JsonSettingsStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Store for a vault in the default data directory
    pub fn for_vault(vault_name: &str) -> Self {
        Self::new(crate::settings_path(vault_name))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SettingsStore for JsonSettingsStore {
    fn load(&self) -> Result<Settings> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "no settings file yet, using defaults");
                return Ok(Settings::default());
            }
            Err(e) => return Err(e.into()),
        };

        if raw.trim().is_empty() {
            warn!(path = %self.path.display(), "settings file is empty, using defaults");
            return Ok(Settings::default());
        }

        Ok(serde_json::from_str(&raw)?)
    }

    fn write(&self, settings: &Settings) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        // Write to a sibling file first so a crash never leaves a truncated blob
        let tmp = self.path.with_extension("json.tmp");
        let json = serde_json::to_string_pretty(settings)?;
        fs::write(&tmp, json)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

/// In-memory store, used by tests and embedders without a filesystem
#[derive(Debug, Default)]
pub struct MemorySettingsStore {
    inner: Mutex<Settings>,
}

impl MemorySettingsStore {
    pub fn new(settings: Settings) -> Self {
        Self {
            inner: Mutex::new(settings),
        }
    }

    pub fn snapshot(&self) -> Settings {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

impl SettingsStore for MemorySettingsStore {
    fn load(&self) -> Result<Settings> {
        Ok(self.snapshot())
    }

    fn write(&self, settings: &Settings) -> Result<()> {
        *self
            .inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = settings.clone();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregator::WordCount;

    fn sample() -> Settings {
        let mut settings = Settings::default();
        settings.day_counts.insert("2024-01-01".to_string(), 50);
        settings.todays_word_count.insert(
            "daily/2024-01-01.md".to_string(),
            WordCount {
                initial: 100,
                current: 150,
            },
        );
        settings.user_id = Some("user-1".to_string());
        settings.license_key = Some("abc".to_string());
        settings
    }

    #[test]
    fn test_missing_file_loads_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonSettingsStore::new(dir.path().join("data.json"));
        assert_eq!(store.load().unwrap(), Settings::default());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonSettingsStore::new(dir.path().join("nested").join("data.json"));

        assert_eq!(store.save(&sample()).unwrap(), SaveOutcome::Saved);
        assert_eq!(store.load().unwrap(), sample());
    }

    #[test]
    fn test_persisted_field_names() {
        let json = serde_json::to_value(sample()).unwrap();
        assert_eq!(json["dayCounts"]["2024-01-01"], 50);
        assert_eq!(json["todaysWordCount"]["daily/2024-01-01.md"]["initial"], 100);
        assert_eq!(json["userId"], "user-1");
        assert_eq!(json["key"], "abc");
    }

    #[test]
    fn test_partial_file_defaults_missing_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.json");
        fs::write(&path, r#"{"dayCounts": {"2024-01-01": 7}}"#).unwrap();

        let settings = JsonSettingsStore::new(&path).load().unwrap();
        assert_eq!(settings.day_counts["2024-01-01"], 7);
        assert!(settings.todays_word_count.is_empty());
        assert_eq!(settings.user_id, None);
        assert_eq!(settings.license_key, None);
    }

    #[test]
    fn test_empty_history_never_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonSettingsStore::new(dir.path().join("data.json"));
        let mut persisted = Settings::default();
        persisted.day_counts.insert("2024-01-01".to_string(), 50);
        store.save(&persisted).unwrap();

        let outcome = store.save(&Settings::default()).unwrap();
        assert_eq!(outcome, SaveOutcome::SkippedEmpty);
        assert_eq!(store.load().unwrap().day_counts["2024-01-01"], 50);
    }

    #[test]
    fn test_memory_store_guard() {
        let store = MemorySettingsStore::new(sample());
        assert_eq!(
            store.save(&Settings::default()).unwrap(),
            SaveOutcome::SkippedEmpty
        );
        assert_eq!(store.snapshot(), sample());
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.json");
        fs::write(&path, "{not json").unwrap();

        let err = JsonSettingsStore::new(&path).load().unwrap_err();
        assert!(matches!(err, SettingsError::Json(_)));
    }
}
