//! XDG-compliant path resolution for smartparse.
//!
//! Configuration lives in `$XDG_CONFIG_HOME/smartparse/`, per-run outcome
//! logs in `$XDG_STATE_HOME/smartparse/logs/`.

use std::path::{Path, PathBuf};

use miette::Diagnostic;
use thiserror::Error;

/// Errors from path resolution.
#[derive(Debug, Error, Diagnostic)]
pub enum PathError {
    #[error("cannot determine home directory")]
    #[diagnostic(
        code(smartparse::paths::no_home),
        help("Set the HOME environment variable or ensure a valid user profile exists.")
    )]
    NoHome,

    #[error("failed to create directory: {path}")]
    #[diagnostic(
        code(smartparse::paths::create_dir),
        help("Check that the parent directory exists and you have write permissions.")
    )]
    CreateDir {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

pub type PathResult<T> = std::result::Result<T, PathError>;

/// Global directories for smartparse.
#[derive(Debug, Clone)]
pub struct SmartParsePaths {
    /// `$HOME`
    pub home_dir: PathBuf,
    /// `$XDG_CONFIG_HOME/smartparse/`
    pub config_dir: PathBuf,
    /// `$XDG_STATE_HOME/smartparse/`
    pub state_dir: PathBuf,
}

impl SmartParsePaths {
    /// Resolve XDG directories from environment variables with standard fallbacks.
    pub fn resolve() -> PathResult<Self> {
        let home = std::env::var("HOME")
            .map(PathBuf::from)
            .map_err(|_| PathError::NoHome)?;

        let config_dir = std::env::var("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| home.join(".config"))
            .join("smartparse");

        let state_dir = std::env::var("XDG_STATE_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| home.join(".local/state"))
            .join("smartparse");

        Ok(Self {
            home_dir: home,
            config_dir,
            state_dir,
        })
    }

    /// Build paths rooted somewhere other than the environment (tests, sandboxes).
    pub fn rooted(root: &Path) -> Self {
        Self {
            home_dir: root.to_path_buf(),
            config_dir: root.join(".config/smartparse"),
            state_dir: root.join(".local/state/smartparse"),
        }
    }

    /// Path to the global config file.
    pub fn config_file(&self) -> PathBuf {
        self.config_dir.join("config.toml")
    }

    /// Directory that receives one JSONL outcome log per run.
    pub fn log_dir(&self) -> PathBuf {
        self.state_dir.join("logs")
    }

    /// Watch directory used when neither the CLI nor the config names one.
    pub fn default_watch_dir(&self) -> PathBuf {
        self.home_dir.join("SmartParseWatch")
    }

    /// Create the base directories. Idempotent.
    pub fn ensure_dirs(&self) -> PathResult<()> {
        for dir in [&self.config_dir, &self.state_dir, &self.log_dir()] {
            std::fs::create_dir_all(dir).map_err(|e| PathError::CreateDir {
                path: dir.display().to_string(),
                source: e,
            })?;
        }
        Ok(())
    }
}
