use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use std::{fs, path::PathBuf};
use tracing::debug;

use crate::core::currency::{CurrencyCode, parse_codes};

/// Response encoding requested from the quote service.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum WireFormat {
    Json,
    #[default]
    Xml,
}

fn default_base_url() -> String {
    "https://query.yahooapis.com/v1/public/yql".to_string()
}

fn default_timeout_ms() -> u64 {
    10_000
}

fn default_retry_ceiling() -> u32 {
    3
}

fn default_retry_interval_ms() -> u64 {
    1_000
}

fn default_staleness_secs() -> u64 {
    24 * 60 * 60
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ProviderConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub format: WireFormat,
    /// Connect and read timeout for one fetch attempt.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Retries after the first attempt.
    #[serde(default = "default_retry_ceiling")]
    pub retry_ceiling: u32,
    #[serde(default = "default_retry_interval_ms")]
    pub retry_interval_ms: u64,
}

impl ProviderConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn retry_interval(&self) -> Duration {
        Duration::from_millis(self.retry_interval_ms)
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        ProviderConfig {
            base_url: default_base_url(),
            format: WireFormat::default(),
            timeout_ms: default_timeout_ms(),
            retry_ceiling: default_retry_ceiling(),
            retry_interval_ms: default_retry_interval_ms(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AppConfig {
    /// Currencies to synchronize, in display order.
    pub currencies: Vec<String>,
    #[serde(default)]
    pub provider: ProviderConfig,
    /// Age after which cached rates count as stale.
    #[serde(default = "default_staleness_secs")]
    pub staleness_secs: u64,
    pub data_path: Option<String>,
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        debug!("Loading default config");
        let config_path = Self::default_config_path()?;
        Self::load_from_path(&config_path)
    }

    pub fn default_config_path() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("org", "fxsync", "fxsync")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.config_dir().join("config.yaml"))
    }

    pub fn data_path(&self) -> Result<PathBuf> {
        if let Some(custom_path) = &self.data_path {
            return Ok(PathBuf::from(custom_path));
        }
        let proj_dirs = ProjectDirs::from("org", "fxsync", "fxsync")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.data_dir().join("rates"))
    }

    pub fn staleness(&self) -> Duration {
        Duration::from_secs(self.staleness_secs)
    }

    /// The configured currencies as validated codes.
    pub fn currency_codes(&self) -> Result<Vec<CurrencyCode>> {
        parse_codes(&self.currencies).context("Invalid currency in configuration")
    }

    pub fn load_from_path<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let config_str = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: Self = serde_yaml::from_str(&config_str)
            .with_context(|| format!("Failed to parse config file: {}", path.as_ref().display()))?;
        debug!("Successfully loaded config");
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let yaml_str = r#"
currencies: ["USD", "EUR", "jpy"]
"#;
        let config: AppConfig = serde_yaml::from_str(yaml_str).expect("Failed to deserialize");
        assert_eq!(config.currencies.len(), 3);
        assert_eq!(config.provider.format, WireFormat::Xml);
        assert_eq!(config.provider.timeout_ms, 10_000);
        assert_eq!(config.provider.retry_ceiling, 3);
        assert_eq!(config.provider.retry_interval(), Duration::from_secs(1));
        assert_eq!(config.staleness(), Duration::from_secs(86_400));
        assert!(config.data_path.is_none());

        let codes = config.currency_codes().unwrap();
        assert_eq!(codes[2].as_str(), "JPY");
    }

    #[test]
    fn test_config_overrides() {
        let yaml_str = r#"
currencies:
  - USD
  - GBP
provider:
  base_url: "http://example.com/yql"
  format: json
  timeout_ms: 2500
  retry_ceiling: 5
  retry_interval_ms: 50
staleness_secs: 600
data_path: "/tmp/fxsync-test"
"#;
        let config: AppConfig = serde_yaml::from_str(yaml_str).unwrap();
        assert_eq!(config.provider.base_url, "http://example.com/yql");
        assert_eq!(config.provider.format, WireFormat::Json);
        assert_eq!(config.provider.timeout(), Duration::from_millis(2500));
        assert_eq!(config.provider.retry_ceiling, 5);
        assert_eq!(config.staleness_secs, 600);
        assert_eq!(
            config.data_path().unwrap(),
            PathBuf::from("/tmp/fxsync-test")
        );
    }

    #[test]
    fn test_invalid_currency_is_reported() {
        let config: AppConfig = serde_yaml::from_str("currencies: [USD, EURO]").unwrap();
        let err = config.currency_codes().unwrap_err();
        assert!(err.to_string().contains("Invalid currency in configuration"));
    }

    #[test]
    fn test_load_from_missing_path_fails() {
        let result = AppConfig::load_from_path("/nonexistent/fxsync/config.yaml");
        assert!(result.is_err());
        assert!(
            result
                .unwrap_err()
                .to_string()
                .contains("Failed to read config file")
        );
    }
}
