use crate::error::ConfigError;
use crate::models::BackendTarget;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

const DEFAULT_POLL_INTERVAL_SECS: u64 = 5;
const DEFAULT_TIMEOUT_MINUTES: u64 = 5;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Configuration {
    #[serde(rename = "dataDir")]
    pub data_dir: Option<PathBuf>,
    #[serde(rename = "integrationDir")]
    pub integration_dir: Option<PathBuf>,
    pub radarr: Option<BackendSettings>,
    pub sonarr: Option<BackendSettings>,
}

/// Settings for one backend, passed explicitly to every component that needs them.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct BackendSettings {
    pub address: Option<String>,
    #[serde(rename = "apiKey")]
    pub api_key: Option<String>,
    #[serde(rename = "rootFolder")]
    pub root_folder: Option<String>,
    /// Index into the generated profile dropdown; "0" means ask.
    #[serde(rename = "qualityProfilePolicy")]
    pub quality_profile_policy: Option<String>,
    #[serde(rename = "searchMode")]
    pub search_mode: Option<String>,
    #[serde(rename = "pollIntervalSeconds")]
    pub poll_interval_seconds: Option<u64>,
    #[serde(rename = "timeoutMinutes")]
    pub timeout_minutes: Option<u64>,
}

impl Configuration {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        let config: Configuration = serde_yaml::from_str(content)?;
        Ok(config)
    }

    pub fn backend(&self, target: BackendTarget) -> Result<&BackendSettings, ConfigError> {
        let settings = match target {
            BackendTarget::Movie => self.radarr.as_ref(),
            BackendTarget::Series => self.sonarr.as_ref(),
        };
        settings.ok_or(ConfigError::MissingBackend(target))
    }

    /// Directory holding the profile cache. Falls back to the platform data dir.
    pub fn data_dir(&self) -> PathBuf {
        self.data_dir.clone().unwrap_or_else(|| {
            dirs::data_local_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("helparr")
        })
    }

    pub fn integration_dir(&self) -> PathBuf {
        self.integration_dir
            .clone()
            .unwrap_or_else(|| self.data_dir().join("players"))
    }
}

impl BackendSettings {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(
            self.poll_interval_seconds
                .filter(|s| *s > 0)
                .unwrap_or(DEFAULT_POLL_INTERVAL_SECS),
        )
    }

    pub fn monitor_budget(&self) -> Duration {
        Duration::from_secs(
            self.timeout_minutes
                .filter(|m| *m > 0)
                .unwrap_or(DEFAULT_TIMEOUT_MINUTES)
                * 60,
        )
    }

    /// The configured root folder, rejecting blank values.
    pub fn root_folder(&self, target: BackendTarget) -> Result<&str, ConfigError> {
        self.root_folder
            .as_deref()
            .map(str::trim)
            .filter(|f| !f.is_empty())
            .ok_or(ConfigError::MissingField {
                target,
                field: "root folder",
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
dataDir: /tmp/helparr
radarr:
  address: http://localhost:7878
  apiKey: abc
  rootFolder: /movies
  qualityProfilePolicy: "2"
  searchMode: always
  pollIntervalSeconds: 10
sonarr:
  address: http://localhost:8989
  apiKey: def
  rootFolder: "  "
"#;

    #[test]
    fn parses_both_backends() {
        let config = Configuration::from_yaml(SAMPLE).unwrap();
        let radarr = config.backend(BackendTarget::Movie).unwrap();
        assert_eq!(radarr.api_key.as_deref(), Some("abc"));
        assert_eq!(radarr.quality_profile_policy.as_deref(), Some("2"));
        assert_eq!(radarr.poll_interval(), Duration::from_secs(10));
        assert_eq!(radarr.monitor_budget(), Duration::from_secs(300));
        assert_eq!(config.data_dir(), PathBuf::from("/tmp/helparr"));
        assert_eq!(config.integration_dir(), PathBuf::from("/tmp/helparr/players"));
    }

    #[test]
    fn blank_root_folder_is_a_config_error() {
        let config = Configuration::from_yaml(SAMPLE).unwrap();
        let sonarr = config.backend(BackendTarget::Series).unwrap();
        assert!(matches!(
            sonarr.root_folder(BackendTarget::Series),
            Err(ConfigError::MissingField { field: "root folder", .. })
        ));
        assert_eq!(
            config.backend(BackendTarget::Movie).unwrap().root_folder(BackendTarget::Movie).unwrap(),
            "/movies"
        );
    }

    #[test]
    fn missing_backend_is_reported() {
        let config = Configuration::from_yaml("radarr:\n  address: http://x\n").unwrap();
        assert!(matches!(
            config.backend(BackendTarget::Series),
            Err(ConfigError::MissingBackend(BackendTarget::Series))
        ));
    }

    #[test]
    fn zero_intervals_fall_back_to_defaults() {
        let settings = BackendSettings {
            poll_interval_seconds: Some(0),
            timeout_minutes: Some(0),
            ..Default::default()
        };
        assert_eq!(settings.poll_interval(), Duration::from_secs(5));
        assert_eq!(settings.monitor_budget(), Duration::from_secs(300));
    }
}
