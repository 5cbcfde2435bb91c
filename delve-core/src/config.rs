// Crawl configuration loaded from a JSON file

use crate::sink::DonePolicy;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::Level;
use url::Url;

pub const DEFAULT_CONFIG_PATH: &str = "~/.config/delve/config.json";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("No seed URL configured")]
    MissingUrl,

    #[error("Invalid seed URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("{field} must be greater than zero")]
    NotPositive { field: &'static str },
}

/// Settings for one crawl run. Keys are PascalCase on disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct CrawlConfig {
    pub url: String,
    pub max_depth: i64,
    pub max_results: usize,
    pub max_errors: usize,
    /// Seconds.
    pub request_timeout: u64,
    /// Seconds, for the whole crawl.
    pub app_timeout: u64,
    #[serde(alias = "LogLevelString")]
    pub log_level: String,
    pub widen_by: i64,
    pub narrow_by: i64,
    pub cancel_on_done: bool,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            max_depth: 5,
            max_results: 50,
            max_errors: 5,
            request_timeout: 10,
            app_timeout: 60,
            log_level: "Info".to_string(),
            widen_by: 2,
            narrow_by: 2,
            cancel_on_done: true,
        }
    }
}

impl CrawlConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.url.trim().is_empty() {
            return Err(ConfigError::MissingUrl);
        }

        let parsed = Url::parse(&self.url).map_err(|e| ConfigError::InvalidUrl {
            url: self.url.clone(),
            reason: e.to_string(),
        })?;
        if parsed.scheme() != "http" && parsed.scheme() != "https" {
            return Err(ConfigError::InvalidUrl {
                url: self.url.clone(),
                reason: format!("unsupported scheme '{}'", parsed.scheme()),
            });
        }

        let positive = [
            ("MaxResults", self.max_results as u64),
            ("MaxErrors", self.max_errors as u64),
            ("RequestTimeout", self.request_timeout),
            ("AppTimeout", self.app_timeout),
        ];
        for (field, value) in positive {
            if value == 0 {
                return Err(ConfigError::NotPositive { field });
            }
        }

        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout)
    }

    pub fn app_timeout(&self) -> Duration {
        Duration::from_secs(self.app_timeout)
    }

    pub fn done_policy(&self) -> DonePolicy {
        if self.cancel_on_done {
            DonePolicy::Cancel
        } else {
            DonePolicy::Stop
        }
    }

    /// Map the configured level name onto a tracing level. The three
    /// panic-grade names collapse into `ERROR`; unknown names fall back to
    /// `INFO`.
    pub fn tracing_level(&self) -> Level {
        match self.log_level.as_str() {
            "Debug" => Level::DEBUG,
            "Info" => Level::INFO,
            "Warn" => Level::WARN,
            "Error" | "DPanic" | "Panic" | "Fatal" => Level::ERROR,
            _ => Level::INFO,
        }
    }

    pub fn to_json_pretty(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Read a config file. Missing keys take their defaults; the result is not
/// validated so callers can apply overrides first.
pub fn load_config(path: &Path) -> Result<CrawlConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.display().to_string(),
        source,
    })?;
    parse_config(&content)
}

pub fn parse_config(content: &str) -> Result<CrawlConfig, ConfigError> {
    Ok(serde_json::from_str(content)?)
}

pub fn default_config_path() -> PathBuf {
    expand_path(DEFAULT_CONFIG_PATH)
}

pub fn expand_path(path: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(path).as_ref())
}
