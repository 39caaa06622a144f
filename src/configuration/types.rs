use serde::Deserialize;
use std::path::PathBuf;

/// `[server]` — where the media server lives and how to authenticate.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub api_key: String,
}

/// `[database]` — SQLite file location.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "DatabaseConfig::default_path")]
    pub path: PathBuf,
}

impl DatabaseConfig {
    fn default_path() -> PathBuf {
        PathBuf::from("vigil.sqlite3")
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: Self::default_path(),
        }
    }
}

/// `[monitor]` — poll cadence.
#[derive(Debug, Clone, Deserialize)]
pub struct MonitorConfig {
    #[serde(default = "MonitorConfig::default_check_interval")]
    pub check_interval_seconds: u64,
}

impl MonitorConfig {
    fn default_check_interval() -> u64 {
        10
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            check_interval_seconds: Self::default_check_interval(),
        }
    }
}

/// `[alerts]` — anomaly detection switches.
#[derive(Debug, Clone, Deserialize)]
pub struct AlertConfig {
    #[serde(default = "AlertConfig::default_enable_alerts")]
    pub enable_alerts: bool,
    /// Minimum number of distinct concurrent networks (including the
    /// triggering session's own) before enforcement fires.
    #[serde(default = "AlertConfig::default_alert_threshold")]
    pub alert_threshold: u32,
}

impl AlertConfig {
    fn default_enable_alerts() -> bool {
        true
    }

    fn default_alert_threshold() -> u32 {
        2
    }
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            enable_alerts: Self::default_enable_alerts(),
            alert_threshold: Self::default_alert_threshold(),
        }
    }
}

/// `[security]` — enforcement policy.
#[derive(Debug, Clone, Deserialize)]
pub struct SecurityConfig {
    #[serde(default = "SecurityConfig::default_auto_disable")]
    pub auto_disable: bool,
    /// Usernames exempt from enforcement, matched case-insensitively.
    #[serde(default)]
    pub whitelist: Vec<String>,
    /// Prefix length in bits for IPv6 network equivalence, 0..=128.
    #[serde(default = "SecurityConfig::default_ipv6_prefix_length")]
    pub ipv6_prefix_length: u8,
}

impl SecurityConfig {
    fn default_auto_disable() -> bool {
        true
    }

    fn default_ipv6_prefix_length() -> u8 {
        64
    }
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            auto_disable: Self::default_auto_disable(),
            whitelist: Vec::new(),
            ipv6_prefix_length: Self::default_ipv6_prefix_length(),
        }
    }
}

/// `[webhook]` — outbound ban notifications.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub url: String,
    #[serde(default = "WebhookConfig::default_timeout_seconds")]
    pub timeout_seconds: u64,
    #[serde(default = "WebhookConfig::default_retry_attempts")]
    pub retry_attempts: u32,
}

impl WebhookConfig {
    fn default_timeout_seconds() -> u64 {
        10
    }

    fn default_retry_attempts() -> u32 {
        3
    }
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            url: String::new(),
            timeout_seconds: Self::default_timeout_seconds(),
            retry_attempts: Self::default_retry_attempts(),
        }
    }
}
