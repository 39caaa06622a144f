//! Security/action client.
//!
//! Account enable/disable against the media server's user-policy endpoint.
//! Both calls report success as a plain `bool`; the enforcement layer treats
//! a failed disable as "log and wait for the next trigger", so there is no
//! error type to propagate.

use async_trait::async_trait;
use log::error;
use serde_json::json;
use std::time::Duration;

#[async_trait]
pub trait SecurityActions: Send + Sync {
    /// Disables the account. Returns whether the server accepted the change.
    async fn disable_user(&self, user_id: &str, username: &str) -> bool;

    /// Re-enables the account. Counterpart of `disable_user` for the admin
    /// surface; the detection path never calls it.
    async fn enable_user(&self, user_id: &str) -> bool;
}

pub struct HttpSecurityClient {
    base_url: String,
    api_key: String,
    http: reqwest::Client,
}

const POLICY_TIMEOUT: Duration = Duration::from_secs(5);

impl HttpSecurityClient {
    pub fn new(base_url: &str, api_key: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            http: reqwest::Client::new(),
        }
    }

    async fn set_disabled(&self, user_id: &str, disabled: bool) -> bool {
        let url = format!("{}/emby/Users/{}/Policy", self.base_url, user_id);
        let result = self
            .http
            .post(&url)
            .header("X-Emby-Token", &self.api_key)
            .timeout(POLICY_TIMEOUT)
            .json(&json!({ "IsDisabled": disabled }))
            .send()
            .await;
        match result {
            Ok(response) if response.status().is_success() => true,
            Ok(response) => {
                error!(
                    "policy update for user {} rejected with status {}",
                    user_id,
                    response.status()
                );
                false
            }
            Err(e) => {
                error!("policy update for user {} failed: {}", user_id, e);
                false
            }
        }
    }
}

#[async_trait]
impl SecurityActions for HttpSecurityClient {
    async fn disable_user(&self, user_id: &str, username: &str) -> bool {
        let ok = self.set_disabled(user_id, true).await;
        if ok {
            log::info!("account disabled: {} ({})", username, user_id);
        }
        ok
    }

    async fn enable_user(&self, user_id: &str) -> bool {
        self.set_disabled(user_id, false).await
    }
}
