//! Application configuration management.
//!
//! Settings come from `~/.config/makerstock/config.json`, overlaid by
//! environment variables:
//!
//! - `MAKERSTOCK_BACKEND_URL`: scripted backend deployment URL (required)
//! - `MAKERSTOCK_SHEETS_API_KEY`, `MAKERSTOCK_SPREADSHEET_ID`: optional
//!   spreadsheet values API credentials for fast live-stock reads
//! - `MAKERSTOCK_CACHE_DIR`: override for the cache directory
//!
//! Only file-level values are ever written back, so secrets supplied through
//! the environment never end up on disk.

use std::fmt;
use std::path::PathBuf;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use tracing::{error, warn};

/// Application name used for config/cache directory paths
const APP_NAME: &str = "makerstock";

/// Config file name
const CONFIG_FILE: &str = "config.json";

pub const ENV_BACKEND_URL: &str = "MAKERSTOCK_BACKEND_URL";
pub const ENV_SHEETS_API_KEY: &str = "MAKERSTOCK_SHEETS_API_KEY";
pub const ENV_SPREADSHEET_ID: &str = "MAKERSTOCK_SPREADSHEET_ID";
pub const ENV_CACHE_DIR: &str = "MAKERSTOCK_CACHE_DIR";

#[derive(Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub backend_url: Option<String>,
    #[serde(default)]
    pub sheets_api_key: Option<String>,
    #[serde(default)]
    pub spreadsheet_id: Option<String>,
    #[serde(default)]
    pub cache_dir: Option<PathBuf>,
    /// User id of the last successful borrow/return, offered as the default.
    #[serde(default)]
    pub last_user_id: Option<String>,
    /// Verify the user is checked in before borrowing.
    #[serde(default)]
    pub require_check_in: bool,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("backend_url", &self.backend_url)
            .field("sheets_api_key", &self.sheets_api_key.as_ref().map(|_| "<redacted>"))
            .field("spreadsheet_id", &self.spreadsheet_id)
            .field("cache_dir", &self.cache_dir)
            .field("last_user_id", &self.last_user_id)
            .field("require_check_in", &self.require_check_in)
            .finish()
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl Config {
    /// Load the config file and apply environment overrides.
    pub fn load() -> Result<Self> {
        let mut config = Self::load_file()?;
        config.apply_env(|name| std::env::var(name).ok());
        Ok(config)
    }

    /// Load only the config file, or defaults when it does not exist.
    pub fn load_file() -> Result<Self> {
        let path = Self::config_path()?;
        if path.exists() {
            let contents = std::fs::read_to_string(&path)?;
            Ok(serde_json::from_str(&contents)?)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Persist `user_id` as the default for the next run.
    pub fn remember_user(user_id: &str) -> Result<()> {
        let mut file_config = Self::load_file()?;
        if file_config.last_user_id.as_deref() == Some(user_id) {
            return Ok(());
        }
        file_config.last_user_id = Some(user_id.to_string());
        file_config.save()
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    /// Overlay values from `lookup` (normally the process environment).
    /// Blank values are ignored.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = non_blank(lookup(ENV_BACKEND_URL)) {
            self.backend_url = Some(url);
        }
        if let Some(key) = non_blank(lookup(ENV_SHEETS_API_KEY)) {
            self.sheets_api_key = Some(key);
        }
        if let Some(id) = non_blank(lookup(ENV_SPREADSHEET_ID)) {
            self.spreadsheet_id = Some(id);
        }
        if let Some(dir) = non_blank(lookup(ENV_CACHE_DIR)) {
            self.cache_dir = Some(PathBuf::from(dir));
        }
    }

    pub fn backend_url(&self) -> Option<&str> {
        self.backend_url.as_deref().map(str::trim).filter(|s| !s.is_empty())
    }

    /// `(api_key, spreadsheet_id)` when both are set.
    pub fn sheets_credentials(&self) -> Option<(&str, &str)> {
        let key = self.sheets_api_key.as_deref().map(str::trim).filter(|s| !s.is_empty())?;
        let id = self.spreadsheet_id.as_deref().map(str::trim).filter(|s| !s.is_empty())?;
        Some((key, id))
    }

    /// Log missing settings once at startup. Nothing here is fatal: without
    /// a backend URL every request fails, without spreadsheet credentials
    /// live stock falls back to the backend.
    pub fn report_problems(&self) {
        if self.backend_url().is_none() {
            error!(
                "{} is not set. Add your backend deployment URL to a .env file or the config file.",
                ENV_BACKEND_URL
            );
        }
        if self.sheets_credentials().is_none() {
            warn!(
                "{} or {} is not set. Live stock will fall back to the backend.",
                ENV_SHEETS_API_KEY, ENV_SPREADSHEET_ID
            );
        }
    }

    pub fn cache_dir(&self) -> Result<PathBuf> {
        if let Some(ref dir) = self.cache_dir {
            return Ok(dir.clone());
        }
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;
        Ok(cache_dir.join(APP_NAME))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_env_overrides_file_values() {
        let mut config = Config {
            backend_url: Some("https://old.example/exec".to_string()),
            last_user_id: Some("dev_devadath".to_string()),
            ..Default::default()
        };
        config.apply_env(env(&[
            (ENV_BACKEND_URL, "https://new.example/exec"),
            (ENV_CACHE_DIR, "/tmp/makerstock"),
        ]));

        assert_eq!(config.backend_url(), Some("https://new.example/exec"));
        assert_eq!(config.cache_dir().unwrap(), PathBuf::from("/tmp/makerstock"));
        assert_eq!(config.last_user_id.as_deref(), Some("dev_devadath"));
    }

    #[test]
    fn test_blank_env_values_are_ignored() {
        let mut config = Config {
            backend_url: Some("https://old.example/exec".to_string()),
            ..Default::default()
        };
        config.apply_env(env(&[(ENV_BACKEND_URL, "   ")]));
        assert_eq!(config.backend_url(), Some("https://old.example/exec"));
    }

    #[test]
    fn test_sheets_credentials_need_both_values() {
        let mut config = Config::default();
        config.apply_env(env(&[(ENV_SHEETS_API_KEY, "key")]));
        assert!(config.sheets_credentials().is_none());

        config.apply_env(env(&[(ENV_SPREADSHEET_ID, "sheet")]));
        assert_eq!(config.sheets_credentials(), Some(("key", "sheet")));
    }

    #[test]
    fn test_debug_redacts_api_key() {
        let config = Config {
            sheets_api_key: Some("super-secret".to_string()),
            ..Default::default()
        };
        let debug = format!("{:?}", config);
        assert!(!debug.contains("super-secret"));
        assert!(debug.contains("<redacted>"));
    }

    #[test]
    fn test_missing_fields_default() {
        let config: Config = serde_json::from_str(r#"{"last_user_id":"u1"}"#).unwrap();
        assert!(config.backend_url().is_none());
        assert!(!config.require_check_in);
    }
}
