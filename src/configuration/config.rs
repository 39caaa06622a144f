//! Configuration loading and validation.
//!
//! The configuration lives in a single TOML file. Unset optional values fall
//! back to serde defaults; validation after deserialization rejects values
//! the monitor cannot run with. On first start the binary writes a commented
//! template for the operator to fill in (see [`Config::write_template`]).

use super::types::*;
use crate::error_handling::types::ConfigError;
use serde::Deserialize;
use std::path::Path;

/// Template written when no configuration file exists yet.
const DEFAULT_CONFIG_TEMPLATE: &str = r#"# vigil configuration

[server]
# Base URL of the media server, e.g. "https://emby.example.com"
url = ""
# API key with admin rights
api_key = ""

[database]
path = "vigil.sqlite3"

[monitor]
check_interval_seconds = 10

[alerts]
enable_alerts = true
alert_threshold = 2

[security]
auto_disable = true
whitelist = []
ipv6_prefix_length = 64

[webhook]
enabled = false
url = ""
timeout_seconds = 10
retry_attempts = 3
"#;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub monitor: MonitorConfig,
    #[serde(default)]
    pub alerts: AlertConfig,
    #[serde(default)]
    pub security: SecurityConfig,
    #[serde(default)]
    pub webhook: WebhookConfig,
}

impl Config {
    /// Reads and validates the configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Config, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_toml(&raw)
    }

    /// Parses and validates configuration from a TOML string.
    pub fn from_toml(raw: &str) -> Result<Config, ConfigError> {
        let config: Config =
            toml::from_str(raw).map_err(|e| ConfigError::TomlError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Writes the commented default template to `path`.
    pub fn write_template(path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(path, DEFAULT_CONFIG_TEMPLATE)?;
        Ok(())
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.server.url.trim().is_empty() {
            return Err(ConfigError::MissingField("server.url".into()));
        }
        if self.server.api_key.trim().is_empty() {
            return Err(ConfigError::MissingField("server.api_key".into()));
        }
        if self.monitor.check_interval_seconds == 0 {
            return Err(ConfigError::NotInRange(
                "monitor.check_interval_seconds must be > 0".into(),
            ));
        }
        if self.alerts.alert_threshold < 1 {
            return Err(ConfigError::NotInRange(
                "alerts.alert_threshold must be >= 1".into(),
            ));
        }
        if self.security.ipv6_prefix_length > 128 {
            return Err(ConfigError::NotInRange(
                "security.ipv6_prefix_length must be in 0..=128".into(),
            ));
        }
        if self.webhook.enabled && self.webhook.url.trim().is_empty() {
            return Err(ConfigError::MissingField("webhook.url".into()));
        }
        Ok(())
    }
}
