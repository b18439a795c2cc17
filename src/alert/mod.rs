//! Threshold Alerts
//!
//! Evaluates every committed reading against a temperature threshold and,
//! when it is strictly above, makes one attempt to notify an external
//! channel. Delivery failures are logged and dropped; nothing here is
//! retried, deduplicated or reported back to the ingestion path.
//!
//! Channels implement [`AlertChannel`]; [`DiscordWebhook`] is the one wired
//! up from configuration.

mod discord;

pub use discord::DiscordWebhook;

use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::storage::Reading;

/// Outbound channel for alert text
#[async_trait]
pub trait AlertChannel: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &str;

    /// Make one delivery attempt
    async fn send(&self, text: &str) -> Result<(), AlertError>;
}

/// Alert configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AlertConfig {
    /// Discord-compatible webhook URL; alerts are disabled when unset
    #[serde(default)]
    pub webhook_url: Option<String>,

    /// Readings with temperature strictly above this trigger an alert (°C)
    #[serde(default = "default_threshold")]
    pub threshold: f64,

    /// Upper bound for a single delivery attempt
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_threshold() -> f64 {
    30.0
}

fn default_timeout_ms() -> u64 {
    5000
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            webhook_url: None,
            threshold: default_threshold(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

/// What happened when a reading was evaluated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertOutcome {
    /// At or below threshold, nothing sent
    BelowThreshold,
    /// Above threshold but no channel configured
    Disabled,
    /// Channel accepted the notification
    Sent,
    /// Delivery attempt failed and was discarded
    Failed,
}

/// Stateless threshold check plus one-shot delivery
pub struct AlertNotifier {
    threshold: f64,
    channel: Option<Arc<dyn AlertChannel>>,
}

impl AlertNotifier {
    pub fn new(threshold: f64, channel: Option<Arc<dyn AlertChannel>>) -> Self {
        Self { threshold, channel }
    }

    /// A notifier that never sends anything
    pub fn disabled(threshold: f64) -> Self {
        Self::new(threshold, None)
    }

    /// Build from configuration, wiring the webhook channel when a URL is set
    pub fn from_config(config: &AlertConfig) -> Result<Self, AlertError> {
        let channel: Option<Arc<dyn AlertChannel>> =
            match config.webhook_url.as_deref().map(str::trim) {
                Some(url) if !url.is_empty() => Some(Arc::new(DiscordWebhook::new(
                    url,
                    Duration::from_millis(config.timeout_ms),
                )?)),
                _ => None,
            };
        Ok(Self::new(config.threshold, channel))
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn is_enabled(&self) -> bool {
        self.channel.is_some()
    }

    /// Whether `reading` is strictly above the threshold
    pub fn exceeds(&self, reading: &Reading) -> bool {
        reading.temperature > self.threshold
    }

    /// Check a reading and attempt a single notification if it exceeds the threshold
    pub async fn evaluate(&self, reading: &Reading) -> AlertOutcome {
        if !self.exceeds(reading) {
            return AlertOutcome::BelowThreshold;
        }
        let Some(channel) = &self.channel else {
            return AlertOutcome::Disabled;
        };

        match channel.send(&alert_text(reading)).await {
            Ok(()) => {
                tracing::info!(
                    channel = channel.name(),
                    reading_id = reading.id,
                    temperature = reading.temperature,
                    "Temperature alert sent"
                );
                AlertOutcome::Sent
            }
            Err(e) => {
                tracing::warn!(
                    channel = channel.name(),
                    reading_id = reading.id,
                    error = %e,
                    "Temperature alert delivery failed"
                );
                AlertOutcome::Failed
            }
        }
    }
}

/// Human-readable alert body
pub fn alert_text(reading: &Reading) -> String {
    format!(
        "🔥 **HIGH TEMPERATURE ALERT!**\nCurrent reading: 🌡️ **{:.1}°C**, 💧 **{:.1}%**",
        reading.temperature, reading.humidity
    )
}

/// Errors from alert delivery
#[derive(Debug, Error)]
pub enum AlertError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Alert channel rejected the message with status {0}")]
    Rejected(reqwest::StatusCode),
}
