//! Configuration for the ETOS client
//!
//! Settings are read from the first `etosctl.json` found in the working
//! directory or in `~/.config/etos/`, then overridden by `ETOS_*`
//! environment variables. A missing file is not an error.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ClientError, ClientResult};

pub const CONFIG_FILE_NAME: &str = "etosctl.json";

/// Main client configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// ETOS API server
    #[serde(default)]
    pub server: ServerConfig,

    /// Logging configuration
    #[serde(default)]
    pub log: LogConfig,

    /// HTTP request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 { 30 }

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            log: LogConfig::default(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Base URL of the ETOS API, e.g. `http://etos.example.com/api`
    #[serde(default)]
    pub url: String,

    /// Bearer token sent with every request
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogConfig {
    /// Default log level when neither flags nor `RUST_LOG` set one
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String { "info".to_string() }

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl ClientConfig {
    /// Load from the default search paths and the process environment
    pub fn load() -> ClientResult<Self> {
        Self::load_from(&Self::search_paths(), |key| std::env::var(key).ok())
    }

    /// Candidate configuration files in priority order
    pub fn search_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from(CONFIG_FILE_NAME)];
        if let Some(home) = dirs::home_dir() {
            paths.push(home.join(".config").join("etos").join(CONFIG_FILE_NAME));
        }
        paths
    }

    /// Load from the first existing path, then apply environment overrides
    pub fn load_from<F>(paths: &[PathBuf], env: F) -> ClientResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = match paths.iter().find(|p| p.is_file()) {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env(env);
        Ok(config)
    }

    pub fn from_file(path: &Path) -> ClientResult<Self> {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content)
            .map_err(|e| ClientError::Config(format!("{}: {}", path.display(), e)))
    }

    /// Override values from `ETOS_SERVER_URL`, `ETOS_SERVER_TOKEN` and `ETOS_LOG_LEVEL`
    pub fn apply_env<F>(&mut self, env: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = env("ETOS_SERVER_URL").filter(|v| !v.is_empty()) {
            self.server.url = url;
        }
        if let Some(token) = env("ETOS_SERVER_TOKEN").filter(|v| !v.is_empty()) {
            self.server.token = Some(token);
        }
        if let Some(level) = env("ETOS_LOG_LEVEL").filter(|v| !v.is_empty()) {
            self.log.level = level;
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}
