//! Application configuration management.
//!
//! Holds the exam server address, request timeout, fallback exam duration,
//! where credentials are kept, and the last used username.
//!
//! Configuration is stored at `~/.config/papertime/config.json`. Missing
//! fields take their defaults, and `PAPERTIME_SERVER_URL` overrides the
//! stored server address.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::api::client::DEFAULT_REQUEST_TIMEOUT_SECS;
use crate::auth::{CredentialStore, FileCredentialStore, KeyringCredentialStore};
use crate::exam::ExamSettings;

/// Application name used for config/cache directory paths
const APP_NAME: &str = "papertime";

/// Config file name
const CONFIG_FILE: &str = "config.json";

pub const DEFAULT_SERVER_URL: &str = "http://localhost:8000";
pub const DEFAULT_DURATION_MINUTES: u32 = 120;

pub const ENV_SERVER_URL: &str = "PAPERTIME_SERVER_URL";
pub const ENV_USERNAME: &str = "PAPERTIME_USERNAME";
pub const ENV_PASSWORD: &str = "PAPERTIME_PASSWORD";

/// Where the signed-in session is persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CredentialBackend {
    #[default]
    Keyring,
    File,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server_url: String,
    pub request_timeout_secs: u64,
    pub default_duration_minutes: u32,
    pub credential_backend: CredentialBackend,
    pub last_username: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_url: DEFAULT_SERVER_URL.to_string(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            default_duration_minutes: DEFAULT_DURATION_MINUTES,
            credential_backend: CredentialBackend::default(),
            last_username: None,
        }
    }
}

impl Config {
    /// Load from the user config dir, then apply environment overrides.
    pub fn load() -> Result<Self> {
        let mut config = Self::load_from(&Self::config_path()?)?;
        config.apply_env();
        Ok(config)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            serde_json::from_str(&contents)
                .with_context(|| format!("Invalid config file {}", path.display()))
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(())
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    fn apply_env(&mut self) {
        if let Ok(url) = std::env::var(ENV_SERVER_URL) {
            if !url.trim().is_empty() {
                self.server_url = url.trim().to_string();
            }
        }
    }

    /// Username and password from the environment, when both are set.
    pub fn env_credentials() -> Option<(String, String)> {
        let username = std::env::var(ENV_USERNAME).ok()?;
        let password = std::env::var(ENV_PASSWORD).ok()?;
        Some((username, password))
    }

    pub fn cache_dir(&self) -> Result<PathBuf> {
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;
        Ok(cache_dir.join(APP_NAME))
    }

    pub fn documents_dir(&self) -> Result<PathBuf> {
        Ok(self.cache_dir()?.join("documents"))
    }

    pub fn logs_dir(&self) -> Result<PathBuf> {
        Ok(self.cache_dir()?.join("logs"))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    pub fn exam_settings(&self) -> ExamSettings {
        let minutes = if self.default_duration_minutes > 0 {
            self.default_duration_minutes
        } else {
            DEFAULT_DURATION_MINUTES
        };
        ExamSettings {
            default_duration: minutes.saturating_mul(60),
            ..ExamSettings::default()
        }
    }

    /// Build the credential store selected by `credential_backend`.
    pub fn credential_store(&self) -> Result<Arc<dyn CredentialStore>> {
        Ok(match self.credential_backend {
            CredentialBackend::Keyring => Arc::new(KeyringCredentialStore::new()),
            CredentialBackend::File => Arc::new(FileCredentialStore::new(&self.cache_dir()?)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_file_uses_defaults() {
        let config: Config =
            serde_json::from_str(r#"{"server_url": "https://exams.example.com"}"#).unwrap();
        assert_eq!(config.server_url, "https://exams.example.com");
        assert_eq!(config.request_timeout_secs, 30);
        assert_eq!(config.default_duration_minutes, 120);
        assert_eq!(config.credential_backend, CredentialBackend::Keyring);
        assert_eq!(config.last_username, None);
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join(CONFIG_FILE);
        let config = Config {
            credential_backend: CredentialBackend::File,
            last_username: Some("candidate".to_string()),
            ..Config::default()
        };
        config.save_to(&path).unwrap();

        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.contains(r#""credential_backend": "file""#));
        assert_eq!(Config::load_from(&path).unwrap(), config);
    }

    #[test]
    fn test_missing_file_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from(&dir.path().join(CONFIG_FILE)).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_invalid_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        std::fs::write(&path, "{ not json").unwrap();
        assert!(Config::load_from(&path).is_err());
    }

    #[test]
    fn test_exam_settings_duration() {
        let config = Config {
            default_duration_minutes: 90,
            ..Config::default()
        };
        assert_eq!(config.exam_settings().default_duration, 5400);

        let zero = Config {
            default_duration_minutes: 0,
            ..Config::default()
        };
        assert_eq!(zero.exam_settings().default_duration, 7200);
        assert_eq!(zero.exam_settings().tick_interval, Duration::from_secs(1));
    }
}
