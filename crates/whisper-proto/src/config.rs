use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use super::platform;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub device: DeviceConfig,
    #[serde(default)]
    pub polling: PollingConfig,
    #[serde(default)]
    pub stations: StationsConfig,
    #[serde(default)]
    pub shuffle: ShuffleConfig,
}

/// Where the player lives and how long we wait for it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// Base URL of the device web server, e.g. `http://192.168.1.100`.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Upper bound on a whole request/response round trip.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollingConfig {
    /// Start the status poll loop as soon as the console opens.
    #[serde(default = "default_auto_polling")]
    pub auto_polling: bool,
    #[serde(default = "default_poll_interval_secs")]
    pub interval_secs: u64,
}

/// Remote station catalog (JSON object of name -> stream URL).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StationsConfig {
    #[serde(default = "default_catalog_url")]
    pub catalog_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShuffleConfig {
    /// Folder used when a shuffle request leaves the folder blank.
    #[serde(default = "default_shuffle_folder")]
    pub default_folder: String,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            request_timeout_secs: default_request_timeout_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
        }
    }
}

impl DeviceConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs.max(1))
    }
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            auto_polling: default_auto_polling(),
            interval_secs: default_poll_interval_secs(),
        }
    }
}

impl PollingConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs.max(1))
    }
}

impl Default for StationsConfig {
    fn default() -> Self {
        Self {
            catalog_url: default_catalog_url(),
        }
    }
}

impl Default for ShuffleConfig {
    fn default() -> Self {
        Self {
            default_folder: default_shuffle_folder(),
        }
    }
}

fn default_base_url() -> String {
    "http://ghostwhisper.local".to_string()
}

fn default_request_timeout_secs() -> u64 {
    5
}

fn default_connect_timeout_secs() -> u64 {
    3
}

fn default_auto_polling() -> bool {
    true
}

fn default_poll_interval_secs() -> u64 {
    5
}

fn default_catalog_url() -> String {
    "https://kolown.net/api/ghostwhisper_playlist".to_string()
}

pub fn default_shuffle_folder() -> String {
    "/music".to_string()
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        let config_path = Self::config_path();

        if !config_path.exists() {
            let config = Self::default();
            config.save()?;
            return Ok(config);
        }

        let content = std::fs::read_to_string(&config_path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> anyhow::Result<Self> {
        let config: Self = toml::from_str(content)?;
        Ok(config)
    }

    pub fn save(&self) -> anyhow::Result<()> {
        let config_path = Self::config_path();
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(&config_path, content)?;
        tracing::info!("Wrote default config to {:?}", config_path);
        Ok(())
    }

    pub fn config_path() -> PathBuf {
        platform::config_dir().join("config.toml")
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            device: DeviceConfig::default(),
            polling: PollingConfig::default(),
            stations: StationsConfig::default(),
            shuffle: ShuffleConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.polling.interval_secs, 5);
        assert!(config.polling.auto_polling);
        assert_eq!(config.device.request_timeout(), Duration::from_secs(5));
        assert_eq!(config.shuffle.default_folder, "/music");
        assert!(config.stations.catalog_url.starts_with("https://"));
        assert!(Config::config_path().ends_with("ghostwhisper/config.toml"));
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config = Config::from_toml_str(
            r#"
[device]
base_url = "http://192.168.1.100"

[polling]
interval_secs = 0
"#,
        )
        .unwrap();
        assert_eq!(config.device.base_url, "http://192.168.1.100");
        assert_eq!(config.device.connect_timeout_secs, 3);
        // zero would spin the poll loop; clamp to one second
        assert_eq!(config.polling.interval(), Duration::from_secs(1));
        assert_eq!(config.shuffle.default_folder, "/music");
    }
}
