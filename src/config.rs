use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::chat::ReconnectPolicy;

pub const DEFAULT_CONFIG_PATH: &str = "config/storefront.json";

pub const ENV_API_URL: &str = "STOREFRONT_API_URL";
pub const ENV_SOCKET_URL: &str = "STOREFRONT_SOCKET_URL";
pub const ENV_DB_PATH: &str = "STOREFRONT_DB";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub api_base_url: String,
    pub socket_url: String,
    pub database_path: PathBuf,
    pub page_limit: u32,
    pub request_timeout_secs: u64,
    pub reconnect: ReconnectPolicy,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:5000/api".to_string(),
            socket_url: "ws://localhost:5000/chat".to_string(),
            database_path: PathBuf::from("data/storefront.db"),
            page_limit: 12,
            request_timeout_secs: 15,
            reconnect: ReconnectPolicy::default(),
        }
    }
}

impl AppConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Environment variables win over the file.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| env::var(key).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup(ENV_API_URL) {
            self.api_base_url = url;
        }
        if let Some(url) = lookup(ENV_SOCKET_URL) {
            self.socket_url = url;
        }
        if let Some(path) = lookup(ENV_DB_PATH) {
            self.database_path = PathBuf::from(path);
        }
    }
}

/// Reads the JSON config at `path`. Missing, unreadable or invalid files yield defaults.
pub fn load_config(path: impl AsRef<Path>) -> AppConfig {
    let path = path.as_ref();
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            log::info!("No config at {}; using defaults", path.display());
            return AppConfig::default();
        }
        Err(err) => {
            log::warn!("Cannot read config {}: {err}; using defaults", path.display());
            return AppConfig::default();
        }
    };
    serde_json::from_str(&content).unwrap_or_else(|err| {
        log::warn!("Invalid config {}: {err}; using defaults", path.display());
        AppConfig::default()
    })
}
