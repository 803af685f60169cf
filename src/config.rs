use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

pub const DEFAULT_CONFIG_PATH: &str = "config/client.json";
pub const DEFAULT_SERVER_URL: &str = "https://chat-app-backend-11ku.onrender.com";
pub const DEFAULT_DB_PATH: &str = "data/client.db";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// REST API base URL
    pub api_url: String,
    /// Socket.IO server URL; usually the same host as the API
    pub socket_url: String,
    /// SQLite file holding the saved session
    pub db_path: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_SERVER_URL.to_string(),
            socket_url: DEFAULT_SERVER_URL.to_string(),
            db_path: DEFAULT_DB_PATH.to_string(),
        }
    }
}

impl AppConfig {
    /// Apply `EASE_API_URL`, `EASE_SOCKET_URL` and `EASE_DB_PATH`.
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let value = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        if let Some(api_url) = value("EASE_API_URL") {
            self.api_url = api_url;
        }
        if let Some(socket_url) = value("EASE_SOCKET_URL") {
            self.socket_url = socket_url;
        }
        if let Some(db_path) = value("EASE_DB_PATH") {
            self.db_path = db_path;
        }
        self
    }
}

pub fn load_config(path: &str) -> AppConfig {
    let path = Path::new(path);
    match fs::read_to_string(path) {
        Ok(content) => match serde_json::from_str::<AppConfig>(&content) {
            Ok(config) => config,
            Err(err) => {
                log::warn!("Failed to parse config file {}: {err}", path.display());
                AppConfig::default()
            }
        },
        Err(err) => {
            log::info!(
                "Config file {} not found ({err}); using defaults",
                path.display()
            );
            AppConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn missing_file_yields_defaults() {
        let config = load_config("does/not/exist.json");
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn partial_file_keeps_remaining_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("client.json");
        fs::write(&path, r#"{ "api_url": "http://localhost:3000" }"#).unwrap();

        let config = load_config(path.to_str().unwrap());
        assert_eq!(config.api_url, "http://localhost:3000");
        assert_eq!(config.socket_url, DEFAULT_SERVER_URL);
        assert_eq!(config.db_path, DEFAULT_DB_PATH);
    }

    #[test]
    fn malformed_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("client.json");
        fs::write(&path, "{ not json").unwrap();
        assert_eq!(load_config(path.to_str().unwrap()), AppConfig::default());
    }

    #[test]
    fn overrides_skip_blank_values() {
        let env: HashMap<&str, &str> = [
            ("EASE_SOCKET_URL", "http://localhost:4000"),
            ("EASE_DB_PATH", "  "),
        ]
        .into_iter()
        .collect();

        let config = AppConfig::default()
            .with_overrides(|key| env.get(key).map(|value| value.to_string()));
        assert_eq!(config.api_url, DEFAULT_SERVER_URL);
        assert_eq!(config.socket_url, "http://localhost:4000");
        assert_eq!(config.db_path, DEFAULT_DB_PATH);
    }
}
