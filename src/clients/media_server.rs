//! Media-server client.
//!
//! [`MediaServer`] is the capability the monitoring engine needs from the
//! streaming server: the active-session snapshot, user account details and a
//! human-readable description of what a session is playing. The HTTP
//! implementation speaks the Emby-compatible REST surface; tests substitute
//! their own implementations.

use crate::clients::types::{MediaItem, SessionDescriptor, UserInfo};
use crate::error_handling::types::LookupError;
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

/// Renders a now-playing item as a display string: episodes as
/// "Series S1E2", everything else by name, missing items as "unknown".
pub fn describe_media(item: Option<&MediaItem>) -> String {
    let Some(item) = item else {
        return "unknown".to_string();
    };
    if let Some(series) = item.series_name.as_deref().filter(|s| !s.is_empty()) {
        let season = item.parent_index_number.unwrap_or(0);
        let episode = item.index_number.unwrap_or(0);
        return format!("{} S{}E{}", series, season, episode);
    }
    if item.name.is_empty() {
        "unknown".to_string()
    } else {
        item.name.clone()
    }
}

#[async_trait]
pub trait MediaServer: Send + Sync {
    /// Returns the sessions currently playing something, keyed by session
    /// id. Sessions without a now-playing item are not part of the
    /// snapshot.
    async fn get_active_sessions(&self)
        -> Result<HashMap<String, SessionDescriptor>, LookupError>;

    /// Resolves a user's current account details.
    async fn get_user_info(&self, user_id: &str) -> Result<UserInfo, LookupError>;
}

/// HTTP implementation against an Emby-compatible REST API.
pub struct HttpMediaServer {
    base_url: String,
    api_key: String,
    http: reqwest::Client,
}

const SESSIONS_TIMEOUT: Duration = Duration::from_secs(5);
const USER_INFO_TIMEOUT: Duration = Duration::from_secs(3);

#[derive(Deserialize)]
struct UserWire {
    #[serde(rename = "Name", default)]
    name: String,
    #[serde(rename = "Policy", default)]
    policy: Option<UserPolicyWire>,
}

#[derive(Deserialize, Default)]
struct UserPolicyWire {
    #[serde(rename = "IsDisabled", default)]
    is_disabled: bool,
}

impl HttpMediaServer {
    pub fn new(base_url: &str, api_key: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            http: reqwest::Client::new(),
        }
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        timeout: Duration,
    ) -> Result<T, LookupError> {
        let response = self
            .http
            .get(format!("{}{}", self.base_url, path))
            .header("X-Emby-Token", &self.api_key)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| LookupError::HttpError(e.to_string()))?;
        if !response.status().is_success() {
            return Err(LookupError::StatusError(response.status().as_u16()));
        }
        response
            .json::<T>()
            .await
            .map_err(|e| LookupError::DecodeError(e.to_string()))
    }
}

#[async_trait]
impl MediaServer for HttpMediaServer {
    async fn get_active_sessions(
        &self,
    ) -> Result<HashMap<String, SessionDescriptor>, LookupError> {
        let sessions: Vec<SessionDescriptor> =
            self.get_json("/emby/Sessions", SESSIONS_TIMEOUT).await?;
        Ok(sessions
            .into_iter()
            .filter(|s| s.now_playing_item.is_some())
            .map(|s| (s.id.clone(), s))
            .collect())
    }

    async fn get_user_info(&self, user_id: &str) -> Result<UserInfo, LookupError> {
        let user: UserWire = self
            .get_json(&format!("/emby/Users/{}", user_id), USER_INFO_TIMEOUT)
            .await?;
        Ok(UserInfo {
            name: user.name.trim().to_string(),
            is_disabled: user.policy.unwrap_or_default().is_disabled,
        })
    }
}
