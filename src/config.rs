//! Runtime configuration, persisted as TOML.
//!
//! Loaded from `--config` or `$XDG_CONFIG_HOME/smartparse/config.toml`.
//! A missing file yields defaults; every field can be omitted.

use std::path::{Path, PathBuf};
use std::time::Duration;

use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::paths::SmartParsePaths;

/// Errors from configuration loading and validation.
#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    #[error("failed to read config: {path}")]
    #[diagnostic(
        code(smartparse::config::read),
        help("Ensure the config file exists and is readable.")
    )]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {path}: {message}")]
    #[diagnostic(
        code(smartparse::config::parse),
        help("Check the TOML syntax in the config file.")
    )]
    Parse { path: String, message: String },

    #[error("failed to write config: {path}")]
    #[diagnostic(
        code(smartparse::config::write),
        help("Ensure you have write permissions to the config directory.")
    )]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config value for `{field}`: {message}")]
    #[diagnostic(code(smartparse::config::invalid))]
    Invalid { field: &'static str, message: String },
}

pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Settings for the external completion service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Base URL of an OpenAI-compatible API (`.../v1`).
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Model used for PDF and text content.
    #[serde(default = "default_model")]
    pub model: String,
    /// Model used for images.
    #[serde(default = "default_vision_model")]
    pub vision_model: String,
    /// Name of the environment variable holding the API key.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    /// Request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Extracted text beyond this many characters is not sent.
    #[serde(default = "default_max_prompt_chars")]
    pub max_prompt_chars: usize,
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".into()
}
fn default_model() -> String {
    "gpt-4o-mini".into()
}
fn default_vision_model() -> String {
    "gpt-4o".into()
}
fn default_api_key_env() -> String {
    "OPENAI_API_KEY".into()
}
fn default_timeout_secs() -> u64 {
    60
}
fn default_max_prompt_chars() -> usize {
    4000
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            model: default_model(),
            vision_model: default_vision_model(),
            api_key_env: default_api_key_env(),
            timeout_secs: default_timeout_secs(),
            max_prompt_chars: default_max_prompt_chars(),
        }
    }
}

impl LlmConfig {
    /// Read the API key from the configured environment variable, if set.
    pub fn api_key(&self) -> Option<String> {
        std::env::var(&self.api_key_env)
            .ok()
            .filter(|k| !k.trim().is_empty())
    }
}

/// Top-level smartparse configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmartParseConfig {
    /// Directory to watch. `None` falls back to `~/SmartParseWatch`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub watch_dir: Option<PathBuf>,
    /// Watch subdirectories too. Only direct children are ever processed.
    #[serde(default = "default_recursive")]
    pub recursive: bool,
    /// Maximum number of queued entries.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    /// Number of worker threads.
    #[serde(default = "default_workers")]
    pub workers: usize,
    /// Delay between the two size samples of the stability check.
    #[serde(default = "default_settle_interval_ms")]
    pub settle_interval_ms: u64,
    /// Re-queues allowed before a still-growing file is quarantined.
    #[serde(default = "default_max_stability_attempts")]
    pub max_stability_attempts: u32,
    /// Filename prefix marking a file as permanently failed.
    #[serde(default = "default_quarantine_prefix")]
    pub quarantine_prefix: String,
    /// Where per-run outcome logs go. `None` uses the XDG state dir.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_dir: Option<PathBuf>,
    /// Raise OS notifications and Finder tags when available.
    #[serde(default = "default_notifications")]
    pub notifications: bool,
    #[serde(default)]
    pub llm: LlmConfig,
}

fn default_recursive() -> bool {
    true
}
fn default_queue_capacity() -> usize {
    10
}
fn default_workers() -> usize {
    1
}
fn default_settle_interval_ms() -> u64 {
    1000
}
fn default_max_stability_attempts() -> u32 {
    30
}
fn default_quarantine_prefix() -> String {
    "FAILED_".into()
}
fn default_notifications() -> bool {
    true
}

impl Default for SmartParseConfig {
    fn default() -> Self {
        Self {
            watch_dir: None,
            recursive: default_recursive(),
            queue_capacity: default_queue_capacity(),
            workers: default_workers(),
            settle_interval_ms: default_settle_interval_ms(),
            max_stability_attempts: default_max_stability_attempts(),
            quarantine_prefix: default_quarantine_prefix(),
            log_dir: None,
            notifications: default_notifications(),
            llm: LlmConfig::default(),
        }
    }
}

impl SmartParseConfig {
    /// Load from a TOML file.
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            source: e,
        })?;
        toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.display().to_string(),
            message: e.to_string(),
        })
    }

    /// Load from `path` if given, else from the XDG config file if it exists,
    /// else defaults. An explicitly named file must exist.
    pub fn discover(path: Option<&Path>, paths: &SmartParsePaths) -> ConfigResult<Self> {
        let config = match path {
            Some(p) => Self::load(p)?,
            None => {
                let global = paths.config_file();
                if global.is_file() {
                    Self::load(&global)?
                } else {
                    Self::default()
                }
            }
        };
        config.validate()?;
        Ok(config)
    }

    /// Save to a TOML file.
    pub fn save(&self, path: &Path) -> ConfigResult<()> {
        let content = toml::to_string_pretty(self).map_err(|e| ConfigError::Parse {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::Write {
                path: parent.display().to_string(),
                source: e,
            })?;
        }
        std::fs::write(path, content).map_err(|e| ConfigError::Write {
            path: path.display().to_string(),
            source: e,
        })
    }

    /// Reject values the pipeline cannot run with.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.queue_capacity == 0 {
            return Err(ConfigError::Invalid {
                field: "queue_capacity",
                message: "must be at least 1".into(),
            });
        }
        if self.workers == 0 {
            return Err(ConfigError::Invalid {
                field: "workers",
                message: "must be at least 1".into(),
            });
        }
        if self.max_stability_attempts == 0 {
            return Err(ConfigError::Invalid {
                field: "max_stability_attempts",
                message: "must be at least 1".into(),
            });
        }
        let prefix = self.quarantine_prefix.trim();
        if prefix.is_empty() || prefix.starts_with('.') || prefix.contains(['/', '\\']) {
            return Err(ConfigError::Invalid {
                field: "quarantine_prefix",
                message: format!("\"{}\" is not a usable filename prefix", self.quarantine_prefix),
            });
        }
        Ok(())
    }

    /// The watch directory: CLI override, then config, then the default.
    pub fn resolve_watch_dir(&self, cli: Option<PathBuf>, paths: &SmartParsePaths) -> PathBuf {
        cli.or_else(|| self.watch_dir.clone())
            .unwrap_or_else(|| paths.default_watch_dir())
    }

    /// The directory for this run's outcome log.
    pub fn resolve_log_dir(&self, paths: &SmartParsePaths) -> PathBuf {
        self.log_dir.clone().unwrap_or_else(|| paths.log_dir())
    }

    pub fn settle_interval(&self) -> Duration {
        Duration::from_millis(self.settle_interval_ms)
    }
}
