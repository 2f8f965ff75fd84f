//! `.refmt.toml` loading.
//!
//! The config file is optional. When no path is given explicitly, it is
//! discovered by walking up from the working directory, stopping at the first
//! directory that contains `.git`.
//!
//! ```toml
//! jobs = 4
//! timeout = 30000          # ms per tool, 0 disables the timeout
//! missing-file = "skip"    # or "fail"
//!
//! [tools.ruff]
//! command = ["ruff", "format", "--stdin-filename={path}", "-"]
//! settings = [{ key = "max_line_length", flag = "--line-length" }]
//!
//! [extensions.py]
//! pipeline = ["ruff"]
//! ```

use crate::formatter::config::ToolDefinition;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Config file names, in order of precedence
pub const CONFIG_FILES: &[&str] = &[".refmt.toml", "refmt.toml"];

const MAX_DEPTH: usize = 100;

fn default_timeout() -> u64 {
    30_000
}

/// What to do with an input path that doesn't exist.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum MissingFilePolicy {
    /// Report "Doesn't exist" without affecting the exit status
    #[default]
    Skip,
    /// Report "Doesn't exist" and fail the run
    Fail,
}

/// Formatter pipeline for one extension.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct ExtensionConfig {
    /// Tool ids run in order, each one fed the previous one's output
    pub pipeline: Vec<String>,
}

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct Config {
    /// Worker limit (default: number of logical CPUs)
    #[serde(default)]
    pub jobs: Option<usize>,

    /// Timeout per tool execution in milliseconds (default: 30000)
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    #[serde(default)]
    pub missing_file: MissingFilePolicy,

    /// Custom tool definitions (override built-ins)
    #[serde(default)]
    pub tools: HashMap<String, ToolDefinition>,

    /// Per-extension pipelines (override the defaults)
    #[serde(default)]
    pub extensions: HashMap<String, ExtensionConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            jobs: None,
            timeout: default_timeout(),
            missing_file: MissingFilePolicy::default(),
            tools: HashMap::new(),
            extensions: HashMap::new(),
        }
    }
}

/// Errors that can occur when loading configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file
    #[error("Failed to read config file at {path}: {source}")]
    IoError { source: io::Error, path: String },

    /// Failed to parse the configuration content
    #[error("Failed to parse config file at {path}: {source}")]
    ParseError { source: toml::de::Error, path: String },

    /// Configuration parsed but is unusable
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

impl Config {
    /// Parse config content. `origin` is only used in error messages.
    pub fn from_toml(content: &str, origin: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content).map_err(|source| ConfigError::ParseError {
            source,
            path: origin.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse the config file at `path`.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::IoError {
            source,
            path: path.display().to_string(),
        })?;
        Self::from_toml(&content, &path.display().to_string())
    }

    /// Load the explicit config if given, else the first one discovered
    /// upward from `start_dir`, else the defaults.
    ///
    /// Returns the config and the file it came from.
    pub fn load(explicit: Option<&Path>, start_dir: &Path) -> Result<(Self, Option<PathBuf>), ConfigError> {
        if let Some(path) = explicit {
            log::debug!("[refmt-config] Using explicit config: {}", path.display());
            return Ok((Self::from_file(path)?, Some(path.to_path_buf())));
        }

        match discover_config_upward(start_dir) {
            Some(path) => Ok((Self::from_file(&path)?, Some(path))),
            None => {
                log::debug!("[refmt-config] No config file found, using defaults");
                Ok((Self::default(), None))
            }
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.jobs == Some(0) {
            return Err(ConfigError::Invalid("jobs must be at least 1".to_string()));
        }
        for (id, tool) in &self.tools {
            if tool.command.is_empty() {
                return Err(ConfigError::Invalid(format!("tool '{id}' has an empty command")));
            }
        }
        for (ext, extension) in &self.extensions {
            if ext.starts_with('.') {
                return Err(ConfigError::Invalid(format!(
                    "extension '{ext}' must be given without the leading dot"
                )));
            }
            if extension.pipeline.is_empty() {
                return Err(ConfigError::Invalid(format!("extension '{ext}' has an empty pipeline")));
            }
        }
        Ok(())
    }
}

/// Discover a configuration file by traversing up from `start_dir`.
///
/// The search stops after the first directory containing `.git`.
pub fn discover_config_upward(start_dir: &Path) -> Option<PathBuf> {
    let mut current_dir = start_dir.to_path_buf();

    for _ in 0..MAX_DEPTH {
        log::debug!("[refmt-config] Searching for config in: {}", current_dir.display());

        for config_name in CONFIG_FILES {
            let config_path = current_dir.join(config_name);
            if config_path.is_file() {
                log::debug!("[refmt-config] Found config file: {}", config_path.display());
                return Some(config_path);
            }
        }

        if current_dir.join(".git").exists() {
            log::debug!("[refmt-config] Stopping at .git directory");
            return None;
        }

        match current_dir.parent() {
            Some(parent) => current_dir = parent.to_path_buf(),
            None => {
                log::debug!("[refmt-config] Reached filesystem root");
                return None;
            }
        }
    }

    log::debug!("[refmt-config] Maximum traversal depth reached");
    None
}

/// Finds the project root by walking up from `start_dir` looking for `.git`.
/// Falls back to `start_dir` if no `.git` is found.
pub fn find_project_root(start_dir: &Path) -> PathBuf {
    let mut current = start_dir.to_path_buf();

    for _ in 0..MAX_DEPTH {
        if current.join(".git").exists() {
            log::debug!("[refmt-config] Found .git at: {}", current.display());
            return current;
        }
        match current.parent() {
            Some(parent) => current = parent.to_path_buf(),
            None => break,
        }
    }

    log::debug!(
        "[refmt-config] No .git found, using working directory as project root: {}",
        start_dir.display()
    );
    start_dir.to_path_buf()
}
