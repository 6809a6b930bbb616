#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Configuration management for mdk
//!
//! This crate handles loading and merging configuration from:
//! - Default values (hard-coded)
//! - Configuration file (~/.config/mdk/config.toml)
//! - Environment variables
//! - CLI flags

pub mod constants;

use constants::{
    APP_DIR, CONFIG_FILE, DEFAULT_DEPLOYER_TIMEOUT_SECS, ENV_COLOR, ENV_DEPLOYER_TIMEOUT,
    ENV_OUTPUT, ENV_REPOSITORY_PATH, ENV_STAGING_PATH, LOGS_DIR, REPOSITORY_DIR, STAGING_DIR,
};
use mdk_errors::{ConfigError, Error};
use mdk_types::{ColorChoice, OutputFormat};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub general: GeneralConfig,

    #[serde(default)]
    pub deployer: DeployerConfig,

    #[serde(default)]
    pub paths: PathConfig,
}

/// General configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    #[serde(default = "default_output_format")]
    pub default_output: OutputFormat,
    #[serde(default = "default_color_choice")]
    pub color: ColorChoice,
}

/// Deployer configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeployerConfig {
    /// Upper bound on a single deploy, undeploy or update, in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Default for `DeploymentOptions::recoverable`
    #[serde(default = "default_recoverable")]
    pub recoverable: bool,
}

/// Path configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PathConfig {
    pub staging_path: Option<PathBuf>,
    pub repository_path: Option<PathBuf>,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            default_output: OutputFormat::Plain,
            color: ColorChoice::Auto,
        }
    }
}

impl Default for DeployerConfig {
    fn default() -> Self {
        Self {
            timeout_secs: DEFAULT_DEPLOYER_TIMEOUT_SECS,
            recoverable: true,
        }
    }
}

// Default value functions for serde
fn default_output_format() -> OutputFormat {
    OutputFormat::Plain
}

fn default_color_choice() -> ColorChoice {
    ColorChoice::Auto
}

fn default_timeout_secs() -> u64 {
    DEFAULT_DEPLOYER_TIMEOUT_SECS
}

fn default_recoverable() -> bool {
    true
}

impl Config {
    /// Get the default config file path
    ///
    /// # Errors
    ///
    /// Returns an error if the system config directory cannot be determined.
    pub fn default_path() -> Result<PathBuf, Error> {
        let config_dir = dirs::config_dir().ok_or_else(|| ConfigError::NotFound {
            path: "config directory".to_string(),
        })?;
        Ok(config_dir.join(APP_DIR).join(CONFIG_FILE))
    }

    /// Load configuration from file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or if the file contents
    /// contain invalid TOML syntax that cannot be parsed.
    pub async fn load_from_file(path: &Path) -> Result<Self, Error> {
        let contents = fs::read_to_string(path)
            .await
            .map_err(|_| ConfigError::NotFound {
                path: path.display().to_string(),
            })?;

        let config: Self = toml::from_str(&contents).map_err(|e| ConfigError::ParseError {
            message: e.to_string(),
        })?;
        config.validate()?;

        tracing::debug!(path = %path.display(), "loaded configuration file");
        Ok(config)
    }

    /// Load configuration with fallback to defaults
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration file exists but cannot be read
    /// or contains invalid TOML syntax.
    pub async fn load() -> Result<Self, Error> {
        let config_path = Self::default_path()?;

        if config_path.exists() {
            Self::load_from_file(&config_path).await
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from an optional path or use default
    ///
    /// If path is provided, loads from that file.
    /// If path is None, uses the default loading behavior.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file cannot be read or parsed
    pub async fn load_or_default(path: Option<&Path>) -> Result<Self, Error> {
        match path {
            Some(config_path) => Self::load_from_file(config_path).await,
            None => Self::load().await,
        }
    }

    /// Merge with environment variables
    ///
    /// # Errors
    ///
    /// Returns an error if environment variables contain invalid values
    /// that cannot be parsed into the expected types.
    pub fn merge_env(&mut self) -> Result<(), Error> {
        if let Ok(output) = std::env::var(ENV_OUTPUT) {
            self.general.default_output =
                output.parse().map_err(|_| ConfigError::InvalidValue {
                    field: ENV_OUTPUT.to_string(),
                    value: output.clone(),
                })?;
        }

        if let Ok(color) = std::env::var(ENV_COLOR) {
            self.general.color = match color.as_str() {
                "always" => ColorChoice::Always,
                "auto" => ColorChoice::Auto,
                "never" => ColorChoice::Never,
                _ => {
                    return Err(ConfigError::InvalidValue {
                        field: ENV_COLOR.to_string(),
                        value: color,
                    }
                    .into())
                }
            };
        }

        if let Ok(timeout) = std::env::var(ENV_DEPLOYER_TIMEOUT) {
            self.deployer.timeout_secs =
                timeout.parse().map_err(|_| ConfigError::InvalidValue {
                    field: ENV_DEPLOYER_TIMEOUT.to_string(),
                    value: timeout.clone(),
                })?;
        }

        if let Ok(path) = std::env::var(ENV_STAGING_PATH) {
            self.paths.staging_path = Some(non_empty_path(ENV_STAGING_PATH, path)?);
        }

        if let Ok(path) = std::env::var(ENV_REPOSITORY_PATH) {
            self.paths.repository_path = Some(non_empty_path(ENV_REPOSITORY_PATH, path)?);
        }

        self.validate()
    }

    /// Check values serde cannot reject on its own
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` for a zero deployment timeout.
    pub fn validate(&self) -> Result<(), Error> {
        if self.deployer.timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "deployer.timeout_secs".to_string(),
                value: "0".to_string(),
            }
            .into());
        }
        Ok(())
    }

    /// Deployment timeout as a duration
    #[must_use]
    pub fn deployer_timeout(&self) -> Duration {
        Duration::from_secs(self.deployer.timeout_secs)
    }

    /// Get the staging path (with default)
    #[must_use]
    pub fn staging_path(&self) -> PathBuf {
        self.paths
            .staging_path
            .clone()
            .unwrap_or_else(|| data_dir().join(STAGING_DIR))
    }

    /// Get the repository path (with default)
    #[must_use]
    pub fn repository_path(&self) -> PathBuf {
        self.paths
            .repository_path
            .clone()
            .unwrap_or_else(|| data_dir().join(REPOSITORY_DIR))
    }

    /// Directory debug log files are written to
    #[must_use]
    pub fn logs_path() -> PathBuf {
        data_dir().join(LOGS_DIR)
    }
}

fn data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(APP_DIR)
}

fn non_empty_path(field: &str, value: String) -> Result<PathBuf, ConfigError> {
    if value.trim().is_empty() {
        return Err(ConfigError::InvalidValue {
            field: field.to_string(),
            value,
        });
    }
    Ok(PathBuf::from(value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.deployer.timeout_secs, DEFAULT_DEPLOYER_TIMEOUT_SECS);
        assert_eq!(config.deployer_timeout(), Duration::from_secs(300));
        assert!(config.staging_path().ends_with("mdk/staging"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_toml_uses_serde_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.general.default_output, OutputFormat::Plain);
        assert!(config.deployer.recoverable);
        assert!(config.paths.repository_path.is_none());
    }
}
