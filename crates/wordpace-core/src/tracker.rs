//! Tracker: the explicit state owner
//!
//! Ties the aggregator, the rollover policy, the settings store and the
//! license state together. A host drives it from one task: document changes,
//! rollover ticks and save ticks all go through `&mut self`, so no locking is
//! needed.

use crate::aggregator::{DailyAggregator, DayCounts};
use crate::license::{License, LicenseCodec, LicenseError};
use crate::rollover::{Clock, DateRolloverPolicy, Rollover};
use crate::settings::{SaveOutcome, Settings, SettingsError, SettingsStore};
use crate::telemetry::{TelemetryKey, TelemetryPayload};
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Error, Debug)]
pub enum TrackerError {
    #[error("settings error: {0}")]
    Settings(#[from] SettingsError),
    #[error("invalid license: {0}")]
    License(#[from] LicenseError),
}

pub type Result<T> = std::result::Result<T, TrackerError>;

/// Result of feeding one document change into the tracker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentUpdate {
    /// The day total after the change
    pub total: u64,
    /// Day history to post, when a user id is known
    pub telemetry: Option<TelemetryPayload>,
}

pub struct Tracker<S: SettingsStore, C: Clock> {
    store: S,
    policy: DateRolloverPolicy<C>,
    aggregator: DailyAggregator,
    user_id: Option<String>,
    license_key: Option<String>,
    vault_name: String,
}

impl<S: SettingsStore, C: Clock> Tracker<S, C> {
    /// Load persisted settings and start tracking the clock's current day
    pub fn load(store: S, clock: C, vault_name: impl Into<String>) -> Result<Self> {
        let settings = store.load()?;
        let policy = DateRolloverPolicy::new(clock);
        let today = policy.today_key();

        info!(
            today = %today,
            days = settings.day_counts.len(),
            files = settings.todays_word_count.len(),
            "loaded settings"
        );

        let aggregator =
            DailyAggregator::from_parts(today, settings.day_counts, settings.todays_word_count);

        Ok(Self {
            store,
            policy,
            aggregator,
            user_id: settings.user_id,
            license_key: settings.license_key,
            vault_name: vault_name.into(),
        })
    }

    pub fn aggregator(&self) -> &DailyAggregator {
        &self.aggregator
    }

    pub fn day_counts(&self) -> &DayCounts {
        self.aggregator.day_counts()
    }

    pub fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }

    pub fn vault_name(&self) -> &str {
        &self.vault_name
    }

    pub fn current_word_count(&self) -> u64 {
        self.aggregator.current_word_count()
    }

    /// Status bar text
    pub fn status_text(&self) -> String {
        format!("{} words today", self.current_word_count())
    }

    /// Count a document's new text and update the day total
    pub fn on_document_changed(&mut self, path: &str, text: &str) -> DocumentUpdate {
        let total = self.aggregator.on_document_changed(path, text);
        debug!(path = %path, total, "document changed");

        let telemetry = self.user_id.as_deref().and_then(|user_id| {
            let key = TelemetryKey::daily_counts(user_id, &self.vault_name);
            TelemetryPayload::daily_counts(key, self.aggregator.day_counts())
                .map_err(|e| warn!(error = %e, "could not build daily counts payload"))
                .ok()
        });

        DocumentUpdate { total, telemetry }
    }

    /// Check for a day rollover, then save.
    ///
    /// The rollover is reported even when the save fails; the day has moved on
    /// in memory either way.
    pub fn tick(&mut self) -> (Rollover, Result<SaveOutcome>) {
        let rollover = self.policy.tick(&mut self.aggregator);
        (rollover, self.save())
    }

    /// Persist the current state. An empty day history is never written.
    pub fn save(&self) -> Result<SaveOutcome> {
        Ok(self.store.save(&self.snapshot())?)
    }

    /// Durable view of the current state
    pub fn snapshot(&self) -> Settings {
        Settings {
            day_counts: self.aggregator.day_counts().clone(),
            todays_word_count: self.aggregator.todays_word_count().clone(),
            user_id: self.user_id.clone(),
            license_key: self.license_key.clone(),
        }
    }

    /// Decode a license and adopt its user id.
    ///
    /// On failure nothing changes: word counting keeps working locally and
    /// telemetry stays off until a valid license is entered.
    pub fn activate_license(&mut self, codec: &LicenseCodec, license: &str) -> Result<License> {
        let decoded = codec.decrypt(license)?;
        info!(user_id = %decoded.user_id, "license activated");
        self.user_id = Some(decoded.user_id.clone());
        self.license_key = Some(license.trim().to_string());
        Ok(decoded)
    }

    pub fn clear_license(&mut self) {
        self.user_id = None;
        self.license_key = None;
    }

    /// Enabled plugin list to post, when a user id is known
    pub fn plugins_payload(&self, plugins: &[String]) -> Option<TelemetryPayload> {
        let user_id = self.user_id.as_deref()?;
        let key = TelemetryKey::plugins(user_id, &self.vault_name);
        TelemetryPayload::plugins(key, plugins)
            .map_err(|e| warn!(error = %e, "could not build plugins payload"))
            .ok()
    }
}
