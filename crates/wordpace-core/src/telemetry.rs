//! Webhook telemetry
//!
//! Day totals and the enabled plugin list are posted to a remote webhook as
//! `{ "key": "user/{id}/vault/{vault}/{kind}", "value": "<json>" }`. Posts are
//! debounced per key and fire-and-forget: failures are logged, never retried.

use crate::aggregator::DayCounts;
use crate::debounce::{debounce, DebounceHandle};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

#[derive(Error, Debug)]
pub enum TelemetryError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("webhook returned {0}")]
    Status(reqwest::StatusCode),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, TelemetryError>;

/// Path-like key a payload is stored under on the remote side
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct TelemetryKey(String);

impl TelemetryKey {
    pub fn daily_counts(user_id: &str, vault_name: &str) -> Self {
        Self(format!("user/{user_id}/vault/{vault_name}/daily-counts"))
    }

    pub fn plugins(user_id: &str, vault_name: &str) -> Self {
        Self(format!("user/{user_id}/vault/{vault_name}/plugins"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TelemetryKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Body of a webhook POST. `value` is itself serialized JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TelemetryPayload {
    pub key: String,
    pub value: String,
}

impl TelemetryPayload {
    pub fn daily_counts(key: TelemetryKey, day_counts: &DayCounts) -> Result<Self> {
        Ok(Self {
            key: key.0,
            value: serde_json::to_string(day_counts)?,
        })
    }

    pub fn plugins(key: TelemetryKey, plugins: &[String]) -> Result<Self> {
        Ok(Self {
            key: key.0,
            value: serde_json::to_string(plugins)?,
        })
    }
}

/// Destination for telemetry payloads
#[async_trait]
pub trait TelemetrySink: Send + Sync {
    async fn post(&self, payload: &TelemetryPayload) -> Result<()>;
}

/// Posts payloads as JSON to a fixed webhook URL
#[derive(Debug, Clone)]
pub struct WebhookSink {
    client: reqwest::Client,
    url: String,
}

impl WebhookSink {
    pub fn new(url: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl TelemetrySink for WebhookSink {
    async fn post(&self, payload: &TelemetryPayload) -> Result<()> {
        let response = self.client.post(&self.url).json(payload).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(TelemetryError::Status(status));
        }
        debug!(key = %payload.key, "telemetry posted");
        Ok(())
    }
}

/// Debounces payloads per key and posts each settled payload on its own task
pub struct TelemetryDispatcher {
    handle: DebounceHandle<String, TelemetryPayload>,
    task: JoinHandle<()>,
}

impl TelemetryDispatcher {
    /// Spawn the dispatch loop on the current tokio runtime
    pub fn spawn(sink: Arc<dyn TelemetrySink>, quiet: Duration) -> Self {
        let (handle, mut debouncer) = debounce::<String, TelemetryPayload>(quiet);

        let task = tokio::spawn(async move {
            let mut posts = Vec::new();
            while let Some((_, payload)) = debouncer.next().await {
                let sink = sink.clone();
                posts.retain(|p: &JoinHandle<()>| !p.is_finished());
                posts.push(tokio::spawn(async move {
                    if let Err(e) = sink.post(&payload).await {
                        warn!(key = %payload.key, error = %e, "telemetry post failed");
                    }
                }));
            }
            // Let in-flight posts finish before the dispatcher reports done
            for post in posts {
                let _ = post.await;
            }
        });

        Self { handle, task }
    }

    /// Queue a payload. A later payload with the same key replaces it.
    pub fn send(&self, payload: TelemetryPayload) {
        if !self.handle.push(payload.key.clone(), payload) {
            warn!("telemetry dispatcher has stopped, dropping payload");
        }
    }

    /// Flush pending payloads and wait for in-flight posts to finish
    pub async fn shutdown(self) {
        drop(self.handle);
        if let Err(e) = self.task.await {
            warn!(error = %e, "telemetry dispatcher task failed");
        }
    }
}
