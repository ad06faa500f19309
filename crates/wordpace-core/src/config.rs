//! Tracker configuration

use std::time::Duration;

/// Tunables for the tracker host
#[derive(Debug, Clone)]
pub struct TrackerConfig {
    /// How often the calendar date is checked for rollover
    pub rollover_interval: Duration,
    /// How often settings are saved
    pub save_interval: Duration,
    /// Quiet period before a burst of document changes is counted
    pub edit_debounce: Duration,
    /// Quiet period before a telemetry payload is posted
    pub telemetry_debounce: Duration,
    /// Telemetry is disabled without a webhook
    pub webhook_url: Option<String>,
    /// Shared secret licenses are encrypted with
    pub license_secret: Option<String>,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            rollover_interval: Duration::from_secs(5),
            save_interval: Duration::from_secs(30),
            edit_debounce: Duration::from_secs(1),
            telemetry_debounce: Duration::from_secs(30),
            webhook_url: None,
            license_secret: None,
        }
    }
}

impl TrackerConfig {
    pub fn telemetry_enabled(&self) -> bool {
        self.webhook_url.as_deref().is_some_and(|url| !url.trim().is_empty())
    }
}
