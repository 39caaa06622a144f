//! Geo-location client.
//!
//! Location strings are decoration on logs, audit rows and notifications,
//! so this client never fails: every error path collapses to a placeholder
//! and enforcement proceeds regardless.

use async_trait::async_trait;
use log::debug;
use serde_json::Value;
use std::time::Duration;

pub const UNKNOWN_LOCATION: &str = "unknown location";
pub const UNKNOWN_REGION: &str = "unknown region";
pub const LOOKUP_FAILED: &str = "lookup failed";

#[async_trait]
pub trait GeoLocator: Send + Sync {
    /// Resolves a human-readable location for an address. Returns a
    /// placeholder on any failure.
    async fn resolve_location(&self, ip: &str) -> String;
}

/// HTTP implementation against the vore.top IPdata API, which answers for
/// both IPv4 and IPv6 addresses.
pub struct HttpGeoLocator {
    base_url: String,
    http: reqwest::Client,
}

const GEO_TIMEOUT: Duration = Duration::from_secs(5);
const DEFAULT_GEO_API: &str = "https://api.vore.top";

impl HttpGeoLocator {
    pub fn new() -> Self {
        Self::with_base_url(DEFAULT_GEO_API)
    }

    pub fn with_base_url(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http: reqwest::Client::new(),
        }
    }

    /// Joins the `info1..info3` answer fields into "country, region, city"
    /// style text.
    fn format_answer(data: &Value) -> Option<String> {
        if data.get("code").and_then(Value::as_i64) != Some(200) {
            return None;
        }
        let ipdata = data.get("ipdata")?;
        let parts: Vec<&str> = ["info1", "info2", "info3"]
            .iter()
            .filter_map(|key| ipdata.get(*key).and_then(Value::as_str))
            .filter(|s| !s.is_empty())
            .collect();
        if parts.is_empty() {
            None
        } else {
            Some(parts.join(", "))
        }
    }
}

impl Default for HttpGeoLocator {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl GeoLocator for HttpGeoLocator {
    async fn resolve_location(&self, ip: &str) -> String {
        if ip.is_empty() {
            return UNKNOWN_LOCATION.to_string();
        }
        let url = format!("{}/api/IPdata?ip={}", self.base_url, ip);
        let response = match self.http.get(&url).timeout(GEO_TIMEOUT).send().await {
            Ok(r) if r.status().is_success() => r,
            Ok(r) => {
                debug!("geo lookup for {} answered status {}", ip, r.status());
                return LOOKUP_FAILED.to_string();
            }
            Err(e) => {
                debug!("geo lookup for {} failed: {}", ip, e);
                return LOOKUP_FAILED.to_string();
            }
        };
        match response.json::<Value>().await {
            Ok(data) => Self::format_answer(&data).unwrap_or_else(|| UNKNOWN_REGION.to_string()),
            Err(e) => {
                debug!("geo lookup for {} returned bad JSON: {}", ip, e);
                return LOOKUP_FAILED.to_string();
            }
        }
    }
}
