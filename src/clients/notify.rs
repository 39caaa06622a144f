//! Outbound ban notifications.
//!
//! Notification delivery is best-effort relative to enforcement: the webhook
//! client retries a bounded number of times, reports success as a `bool`,
//! and the caller only logs the outcome.

use crate::clients::types::BanNotification;
use crate::configuration::types::WebhookConfig;
use async_trait::async_trait;
use log::{debug, warn};
use std::time::Duration;

#[async_trait]
pub trait Notifier: Send + Sync {
    /// Delivers a ban notification. Returns whether delivery succeeded.
    async fn send_ban_notification(&self, notification: &BanNotification) -> bool;
}

/// JSON-over-HTTP notifier posting to a configured webhook URL.
pub struct WebhookNotifier {
    url: String,
    timeout: Duration,
    retry_attempts: u32,
    http: reqwest::Client,
}

impl WebhookNotifier {
    /// Builds a notifier from the webhook section, or `None` when webhooks
    /// are disabled.
    pub fn from_config(config: &WebhookConfig) -> Option<Self> {
        if !config.enabled {
            return None;
        }
        Some(Self {
            url: config.url.clone(),
            timeout: Duration::from_secs(config.timeout_seconds),
            retry_attempts: config.retry_attempts.max(1),
            http: reqwest::Client::new(),
        })
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn send_ban_notification(&self, notification: &BanNotification) -> bool {
        for attempt in 1..=self.retry_attempts {
            let result = self
                .http
                .post(&self.url)
                .timeout(self.timeout)
                .json(notification)
                .send()
                .await;
            match result {
                Ok(response) if response.status().is_success() => {
                    debug!(
                        "webhook delivered for {} on attempt {}",
                        notification.username, attempt
                    );
                    return true;
                }
                Ok(response) => warn!(
                    "webhook attempt {}/{} answered status {}",
                    attempt,
                    self.retry_attempts,
                    response.status()
                ),
                Err(e) => warn!(
                    "webhook attempt {}/{} failed: {}",
                    attempt, self.retry_attempts, e
                ),
            }
        }
        false
    }
}
