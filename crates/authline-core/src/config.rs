//! Application configuration management.
//!
//! This module handles loading and saving the client configuration: the
//! API base URL, auth endpoint paths, request timeout, locale and the
//! credential backend.
//!
//! Configuration is stored at `~/.config/authline/config.json`.
//! `AUTHLINE_API_URL` and `AUTHLINE_LOCALE` override the file.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::api::transport::DEFAULT_TIMEOUT_SECS;
use crate::api::{RenewalEndpoints, DEFAULT_LOGIN_PATH, DEFAULT_REFRESH_PATH};
use crate::auth::{CredentialStore, FileBackend, KeyringBackend, MemoryBackend};
use crate::locale::{LocaleStore, DEFAULT_LOCALE};

/// Application name used for config/cache directory paths
const APP_NAME: &str = "authline";

/// Config file name
const CONFIG_FILE: &str = "config.json";

const DEFAULT_API_BASE_URL: &str = "http://localhost:8000";

pub const API_URL_ENV: &str = "AUTHLINE_API_URL";
pub const LOCALE_ENV: &str = "AUTHLINE_LOCALE";

/// Where credentials are persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    Keyring,
    #[default]
    File,
    Memory,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api_base_url: String,
    pub refresh_path: String,
    pub login_path: String,
    pub request_timeout_secs: u64,
    pub locale: String,
    pub credential_backend: BackendKind,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            refresh_path: DEFAULT_REFRESH_PATH.to_string(),
            login_path: DEFAULT_LOGIN_PATH.to_string(),
            request_timeout_secs: DEFAULT_TIMEOUT_SECS,
            locale: DEFAULT_LOCALE.to_string(),
            credential_backend: BackendKind::default(),
        }
    }
}

impl Config {
    /// Load from the default location, then apply environment overrides.
    pub fn load() -> Result<Self> {
        let mut config = Self::load_from(&Self::config_path()?)?;
        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!(path = %path.display(), "No config file, using defaults");
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        serde_json::from_str(&contents).context("Failed to parse config file")
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup(API_URL_ENV).filter(|v| !v.trim().is_empty()) {
            self.api_base_url = url.trim().to_string();
        }
        if let Some(locale) = lookup(LOCALE_ENV).filter(|v| !v.trim().is_empty()) {
            self.locale = locale.trim().to_string();
        }
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    pub fn cache_dir(&self) -> Result<PathBuf> {
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;
        Ok(cache_dir.join(APP_NAME))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn endpoints(&self) -> RenewalEndpoints {
        RenewalEndpoints {
            refresh_path: self.refresh_path.clone(),
            login_path: self.login_path.clone(),
        }
    }

    pub fn locale_store(&self) -> Result<LocaleStore> {
        LocaleStore::new(&self.locale).context("Invalid locale in configuration")
    }

    /// Open the configured backend and load any persisted credentials.
    pub fn credential_store(&self) -> Result<CredentialStore> {
        let store = match self.credential_backend {
            BackendKind::Keyring => CredentialStore::load(KeyringBackend::new()),
            BackendKind::File => CredentialStore::load(FileBackend::in_dir(&self.cache_dir()?)),
            BackendKind::Memory => CredentialStore::new(MemoryBackend::new()),
        };
        Ok(store)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from(&dir.path().join("config.json")).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.refresh_path, "/auth/refresh");
        assert_eq!(config.credential_backend, BackendKind::File);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");

        let config = Config {
            api_base_url: "https://api.example.com".into(),
            locale: "en".into(),
            credential_backend: BackendKind::Keyring,
            ..Default::default()
        };
        config.save_to(&path).unwrap();

        assert_eq!(Config::load_from(&path).unwrap(), config);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"api_base_url":"https://api.example.com","credential_backend":"memory"}"#).unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.api_base_url, "https://api.example.com");
        assert_eq!(config.credential_backend, BackendKind::Memory);
        assert_eq!(config.login_path, DEFAULT_LOGIN_PATH);
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_env_overrides() {
        let mut config = Config::default();
        config.apply_overrides(|key| match key {
            API_URL_ENV => Some(" https://staging.example.com ".into()),
            LOCALE_ENV => Some(String::new()),
            _ => None,
        });
        assert_eq!(config.api_base_url, "https://staging.example.com");
        assert_eq!(config.locale, DEFAULT_LOCALE);
    }

    #[test]
    fn test_invalid_locale_is_reported() {
        let config = Config {
            locale: "persian".into(),
            ..Default::default()
        };
        assert!(config.locale_store().is_err());
    }
}
