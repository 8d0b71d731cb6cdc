//! Loader Configuration
//!
//! Handles parsing and management of autonative.toml configuration files.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::lifecycle::UnloadPolicy;
use crate::search::DEFAULT_ARCH_BASE;

/// File name looked up by [`LoaderConfig::find_and_load`]
pub const CONFIG_FILE_NAME: &str = "autonative.toml";

/// Filter used when neither the config nor `RUST_LOG` sets one
pub const DEFAULT_LOG_FILTER: &str = "autonative=info";

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Config file not found: {0}")]
    NotFound(String),
}

/// Result type for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Root configuration structure matching autonative.toml.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct LoaderConfig {
    /// Library search layout
    #[serde(default)]
    pub search: SearchConfig,

    /// Release behaviour
    #[serde(default)]
    pub lifecycle: LifecycleConfig,

    /// Log output
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl LoaderConfig {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> ConfigResult<Self> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.display().to_string()));
        }
        let content = std::fs::read_to_string(path)?;
        content.parse()
    }

    /// Find and load configuration by searching up from the given directory.
    pub fn find_and_load(start_dir: &Path) -> ConfigResult<Self> {
        let mut dir = start_dir.to_path_buf();
        loop {
            let config_path = dir.join(CONFIG_FILE_NAME);
            if config_path.exists() {
                return Self::load(&config_path);
            }
            if !dir.pop() {
                // Reached root without finding config
                return Ok(Self::default());
            }
        }
    }

    /// Save configuration to a file.
    pub fn save(&self, path: &Path) -> ConfigResult<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn unload_policy(&self) -> UnloadPolicy {
        UnloadPolicy::from_suppress_flag(self.lifecycle.suppress_unload)
    }
}

impl std::str::FromStr for LoaderConfig {
    type Err = ConfigError;

    fn from_str(s: &str) -> ConfigResult<Self> {
        Ok(toml::from_str(s)?)
    }
}

/// Where candidate libraries are looked for.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchConfig {
    /// Directory holding per-architecture subdirectories
    #[serde(default = "default_arch_base")]
    pub arch_base: String,

    /// Overrides the running executable's directory as the search root
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_dir: Option<PathBuf>,
}

fn default_arch_base() -> String {
    DEFAULT_ARCH_BASE.to_string()
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            arch_base: default_arch_base(),
            base_dir: None,
        }
    }
}

/// Release settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct LifecycleConfig {
    /// Keep libraries mapped after release
    #[serde(default)]
    pub suppress_unload: bool,
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoggingConfig {
    /// `tracing_subscriber::EnvFilter` directive
    #[serde(default = "default_filter")]
    pub filter: String,
}

fn default_filter() -> String {
    DEFAULT_LOG_FILTER.to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_filter(),
        }
    }
}
