//! Configuration file support for CTSGuard.
//!
//! Configuration is loaded from `$XDG_CONFIG_HOME/ctsguard/config.toml`.
//! Every key is optional; missing keys take their defaults.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Application configuration
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub data: DataConfig,

    #[serde(default)]
    pub classifier: ClassifierConfig,

    #[serde(default)]
    pub recorder: RecorderConfig,

    #[serde(default)]
    pub estimator: EstimatorConfig,

    #[serde(default)]
    pub transport: TransportConfig,
}

/// Data storage configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DataConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

/// Zone thresholds and feedback timing
///
/// Pressures are kPa-equivalent; durations are seconds.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ClassifierConfig {
    #[serde(default = "default_medium_threshold")]
    pub medium_threshold: f64,

    #[serde(default = "default_high_threshold")]
    pub high_threshold: f64,

    /// Pressure at which the visual alert is drawn at full intensity
    #[serde(default = "default_deep_red_threshold")]
    pub deep_red_threshold: f64,

    #[serde(default = "default_bad_posture_duration_threshold")]
    pub bad_posture_duration_threshold: f64,

    #[serde(default = "default_pulse_cooldown")]
    pub pulse_cooldown: f64,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            medium_threshold: default_medium_threshold(),
            high_threshold: default_high_threshold(),
            deep_red_threshold: default_deep_red_threshold(),
            bad_posture_duration_threshold: default_bad_posture_duration_threshold(),
            pulse_cooldown: default_pulse_cooldown(),
        }
    }
}

/// Session recorder configuration
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct RecorderConfig {
    /// Minimum session time between two row log appends
    #[serde(default = "default_report_log_interval")]
    pub report_log_interval: f64,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            report_log_interval: default_report_log_interval(),
        }
    }
}

/// Pressure estimator configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EstimatorConfig {
    /// Use the typing pressure column (true) or the static one (false)
    #[serde(default = "default_typing")]
    pub typing: bool,

    /// Custom reference table; the built-in table is used when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dataset_path: Option<PathBuf>,
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        Self {
            typing: default_typing(),
            dataset_path: None,
        }
    }
}

/// Device channel settings, consumed by the transport layer only
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TransportConfig {
    #[serde(default = "default_port_identifier")]
    pub port_identifier: String,

    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            port_identifier: default_port_identifier(),
            baud_rate: default_baud_rate(),
        }
    }
}

// Default value functions
fn default_data_dir() -> PathBuf {
    let base = dirs::data_local_dir().unwrap_or_else(|| match std::env::var("HOME") {
        Ok(home) => PathBuf::from(home).join(".local/share"),
        Err(_) => PathBuf::from("."),
    });
    base.join("ctsguard")
}

fn default_medium_threshold() -> f64 {
    2.1
}

fn default_high_threshold() -> f64 {
    3.0
}

fn default_deep_red_threshold() -> f64 {
    3.1
}

fn default_bad_posture_duration_threshold() -> f64 {
    60.0
}

fn default_pulse_cooldown() -> f64 {
    1.0
}

fn default_report_log_interval() -> f64 {
    0.3
}

fn default_typing() -> bool {
    true
}

fn default_port_identifier() -> String {
    "COM5".into()
}

fn default_baud_rate() -> u32 {
    115_200
}

impl ClassifierConfig {
    /// Check threshold ordering and that every value is usable
    pub fn validate(&self) -> Result<()> {
        let values = [
            ("medium_threshold", self.medium_threshold),
            ("high_threshold", self.high_threshold),
            ("deep_red_threshold", self.deep_red_threshold),
            (
                "bad_posture_duration_threshold",
                self.bad_posture_duration_threshold,
            ),
            ("pulse_cooldown", self.pulse_cooldown),
        ];
        for (name, value) in values {
            if !value.is_finite() || value < 0.0 {
                return Err(Error::Config(format!(
                    "{} must be a non-negative number, got {}",
                    name, value
                )));
            }
        }

        if self.medium_threshold >= self.high_threshold {
            return Err(Error::Config(format!(
                "medium_threshold ({}) must be below high_threshold ({})",
                self.medium_threshold, self.high_threshold
            )));
        }

        if self.deep_red_threshold < self.high_threshold {
            return Err(Error::Config(format!(
                "deep_red_threshold ({}) must not be below high_threshold ({})",
                self.deep_red_threshold, self.high_threshold
            )));
        }

        Ok(())
    }
}

impl Config {
    /// Load configuration from the standard config path
    pub fn load() -> Result<Self> {
        let config_path = Self::default_config_path();
        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            tracing::info!(
                "No config file found at {:?}, using defaults",
                config_path
            );
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        tracing::info!("Loaded config from {:?}", path);
        Ok(config)
    }

    /// Validate all sections
    pub fn validate(&self) -> Result<()> {
        self.classifier.validate()?;

        let interval = self.recorder.report_log_interval;
        if !interval.is_finite() || interval < 0.0 {
            return Err(Error::Config(format!(
                "report_log_interval must be a non-negative number, got {}",
                interval
            )));
        }

        Ok(())
    }

    /// Get the default config file path
    pub fn default_config_path() -> PathBuf {
        let base = dirs::config_dir().unwrap_or_else(|| match std::env::var("HOME") {
            Ok(home) => PathBuf::from(home).join(".config"),
            Err(_) => PathBuf::from("."),
        });
        base.join("ctsguard").join("config.toml")
    }

    /// Serialize the configuration as TOML
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))
    }

    /// Save the current configuration to a specific path
    pub fn save_to(&self, path: &Path) -> Result<()> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        std::fs::write(path, self.to_toml()?)?;
        tracing::info!("Saved config to {:?}", path);
        Ok(())
    }
}
