//! Enforcement of positive detections.
//!
//! The controller decides what a detection becomes: nothing (whitelisted or
//! auto-disable off), or an account disable followed by an audit record and
//! a best-effort notification. The whitelist is checked here against a
//! freshly resolved username, independently of the informational check made
//! when the session was first recorded, so a rename or whitelist edit
//! between start and trigger still protects the account.

use crate::clients::geo::GeoLocator;
use crate::clients::media_server::MediaServer;
use crate::clients::notify::Notifier;
use crate::clients::security::SecurityActions;
use crate::clients::types::BanNotification;
use crate::session_tracking::Session;
use crate::storage::types::{SecurityAction, SecurityEvent};
use crate::storage::Storage;
use chrono::Utc;
use log::{error, info, warn};
use std::sync::Arc;

pub struct EnforcementController {
    media_server: Arc<dyn MediaServer>,
    security: Arc<dyn SecurityActions>,
    geo: Arc<dyn GeoLocator>,
    notifier: Option<Arc<dyn Notifier>>,
    storage: Arc<dyn Storage>,
    /// Trimmed and lowercased at construction.
    whitelist: Vec<String>,
    auto_disable: bool,
}

impl EnforcementController {
    pub fn new(
        media_server: Arc<dyn MediaServer>,
        security: Arc<dyn SecurityActions>,
        geo: Arc<dyn GeoLocator>,
        notifier: Option<Arc<dyn Notifier>>,
        storage: Arc<dyn Storage>,
        whitelist: &[String],
        auto_disable: bool,
    ) -> Self {
        let whitelist = whitelist
            .iter()
            .map(|name| name.trim().to_lowercase())
            .filter(|name| !name.is_empty())
            .collect();
        Self {
            media_server,
            security,
            geo,
            notifier,
            storage,
            whitelist,
            auto_disable,
        }
    }

    /// Case-insensitive whitelist membership. Also used for the
    /// informational tag on session-start log lines.
    pub fn is_whitelisted(&self, username: &str) -> bool {
        let normalized = username.trim().to_lowercase();
        self.whitelist.contains(&normalized)
    }

    /// Runs the enforcement sequence for a positive detection.
    pub async fn enforce(&self, trigger: &Session, distinct_networks: u32) {
        // Re-resolve the username; the account may have been renamed since
        // the session started.
        let username = match self.media_server.get_user_info(&trigger.user_id).await {
            Ok(user) => user.name,
            Err(e) => {
                warn!(
                    "user lookup for {} failed ({}), using session-start username",
                    trigger.user_id, e
                );
                trigger.username.clone()
            }
        };

        if self.is_whitelisted(&username) {
            info!("whitelisted user {} is protected, skipping disable", username);
            return;
        }

        let location = self.geo.resolve_location(&trigger.ip_address).await;
        warn!(
            "[!] account sharing suspected: {} | trigger IP: {} ({}) | location: {} | distinct networks: {}",
            username,
            trigger.ip_address,
            trigger.address_family,
            location,
            distinct_networks
        );

        if !self.auto_disable {
            info!("auto-disable is off, detection logged only");
            return;
        }

        if !self
            .security
            .disable_user(&trigger.user_id, &username)
            .await
        {
            error!("disable call for {} failed, no audit record written", username);
            return;
        }

        let timestamp = Utc::now();
        let event = SecurityEvent {
            timestamp,
            user_id: trigger.user_id.clone(),
            username: username.clone(),
            trigger_ip: trigger.ip_address.clone(),
            active_sessions: distinct_networks,
            action: SecurityAction::Disable,
        };
        if let Err(e) = self.storage.log_security_event(&event).await {
            error!("failed to persist security event for {}: {}", username, e);
        }

        if let Some(notifier) = &self.notifier {
            let notification = BanNotification {
                username: username.clone(),
                user_id: trigger.user_id.clone(),
                ip_address: trigger.ip_address.clone(),
                ip_type: trigger.address_family.label().to_string(),
                location,
                session_count: distinct_networks,
                timestamp: timestamp.format("%Y-%m-%d %H:%M:%S").to_string(),
                reason: format!(
                    "detected {} concurrent sessions across distinct networks",
                    distinct_networks
                ),
                device: trigger.device.clone(),
                client: trigger.client.clone(),
            };
            if notifier.send_ban_notification(&notification).await {
                info!("ban notification sent for {}", username);
            } else {
                warn!("ban notification for {} failed", username);
            }
        }
    }
}
