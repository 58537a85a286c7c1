//! Configuration management for pawlingo.
//!
//! This module provides core configuration that doesn't depend on any
//! particular capture backend or front end.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use dirs::config_dir;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::APP_NAME;
use crate::state::Threshold;

/// Which animal the translator is listening to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Pet {
    Cat,
    #[default]
    Dog,
}

fn is_default_pet(v: &Pet) -> bool {
    *v == Pet::default()
}

/// Core configuration structure for the application.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// Loudness threshold in dB; samples strictly above it count as sound
    #[serde(
        default = "default_threshold_db",
        skip_serializing_if = "is_default_threshold_db"
    )]
    pub threshold_db: f32,

    /// How often the input level is sampled (in milliseconds)
    #[serde(
        default = "default_sample_interval_ms",
        skip_serializing_if = "is_default_sample_interval_ms"
    )]
    pub sample_interval_ms: u64,

    /// Requested capture sample rate (Hz)
    #[serde(
        default = "default_sample_rate",
        skip_serializing_if = "is_default_sample_rate"
    )]
    pub sample_rate: u32,

    /// File name of the capture file, overwritten every session
    #[serde(default = "default_file_name", skip_serializing_if = "is_default_file_name")]
    pub file_name: String,

    /// Directory for the capture file, the system temp dir when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_dir: Option<PathBuf>,

    /// Pet selected on start up
    #[serde(default, skip_serializing_if = "is_default_pet")]
    pub pet: Pet,

    /// Replacement phrase list for translations
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phrases: Option<Vec<String>>,
}

fn default_threshold_db() -> f32 {
    Threshold::DEFAULT_DB
}

fn is_default_threshold_db(v: &f32) -> bool {
    (*v - Threshold::DEFAULT_DB).abs() < f32::EPSILON
}

fn default_sample_interval_ms() -> u64 {
    100
}

fn is_default_sample_interval_ms(v: &u64) -> bool {
    *v == 100
}

fn default_sample_rate() -> u32 {
    12_000
}

fn is_default_sample_rate(v: &u32) -> bool {
    *v == 12_000
}

fn default_file_name() -> String {
    "recording.wav".to_string()
}

fn is_default_file_name(v: &String) -> bool {
    v == "recording.wav"
}

impl Default for Config {
    fn default() -> Self {
        Self {
            threshold_db: default_threshold_db(),
            sample_interval_ms: default_sample_interval_ms(),
            sample_rate: default_sample_rate(),
            file_name: default_file_name(),
            output_dir: None,
            pet: Pet::default(),
            phrases: None,
        }
    }
}

impl Config {
    /// Get the loudness threshold
    pub fn threshold(&self) -> Threshold {
        Threshold::new(self.threshold_db)
    }

    /// Get the sampler period as a Duration
    pub fn sample_interval(&self) -> Duration {
        Duration::from_millis(self.sample_interval_ms)
    }

    /// Full path of the capture file.
    pub fn output_path(&self) -> PathBuf {
        self.output_dir
            .clone()
            .unwrap_or_else(std::env::temp_dir)
            .join(&self.file_name)
    }

    /// Configured phrase list, if one overrides the built-in list
    pub fn phrases(&self) -> Option<&[String]> {
        self.phrases.as_deref()
    }
}

/// Manages loading and saving configuration files.
pub struct ConfigManager {
    config_path: PathBuf,
}

impl ConfigManager {
    /// Creates a new ConfigManager with the default configuration directory.
    pub fn new() -> Result<Self> {
        let config_path = Self::default_config_path()?;
        Ok(Self { config_path })
    }

    /// Creates a new ConfigManager with a specified configuration directory.
    pub fn with_config_dir<P: AsRef<Path>>(dir: P) -> Self {
        let config_path = dir.as_ref().join(format!("{}.toml", APP_NAME));
        Self { config_path }
    }

    /// Returns the default path to the configuration file.
    pub fn default_config_path() -> Result<PathBuf> {
        let config_dir = config_dir().context("Failed to retrieve configuration directory")?;
        Ok(config_dir.join(APP_NAME).join(format!("{}.toml", APP_NAME)))
    }

    /// Loads the configuration from the config file or returns default.
    pub fn load(&self) -> Result<Config> {
        if !self.config_path.exists() {
            return Ok(Config::default());
        }

        let config_content = fs::read_to_string(&self.config_path)
            .with_context(|| format!("Failed to read config file at {:?}", self.config_path))?;

        let config: Config = toml::from_str(&config_content)
            .with_context(|| format!("Failed to parse config file at {:?}", self.config_path))?;

        if config.sample_interval_ms == 0 {
            warn!("sample_interval_ms is 0, falling back to the default interval");
            return Ok(Config {
                sample_interval_ms: default_sample_interval_ms(),
                ..config
            });
        }

        Ok(config)
    }

    /// Saves the configuration to the config file.
    pub fn save(&self, config: &Config) -> Result<()> {
        let config_dir = self
            .config_path
            .parent()
            .with_context(|| format!("Failed to get parent directory of {:?}", self.config_path))?;

        fs::create_dir_all(config_dir)
            .with_context(|| format!("Failed to create config directory at {:?}", config_dir))?;

        let serialized =
            toml::to_string_pretty(&config).context("Failed to serialize configuration")?;

        fs::write(&self.config_path, serialized)
            .with_context(|| format!("Failed to write config file at {:?}", self.config_path))?;

        Ok(())
    }

    /// Returns the path to the configuration file.
    pub fn config_path(&self) -> &Path {
        &self.config_path
    }
}
