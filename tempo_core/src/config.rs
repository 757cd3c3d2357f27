//! Configuration file support for hrtempo.
//!
//! Configuration is loaded from `$XDG_CONFIG_HOME/hrtempo/config.toml`.

use crate::presets::default_zone;
use crate::strategy::StrategyKind;
use crate::{Error, HrZone, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Application configuration
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub algorithm: AlgorithmConfig,

    #[serde(default)]
    pub data: DataConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Per-session configuration of the target-control algorithm
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct AlgorithmConfig {
    /// Lowest music BPM the algorithm will ask for
    #[serde(default = "default_min_music_bpm")]
    pub min_music_bpm: f64,

    /// Highest music BPM the algorithm will ask for
    #[serde(default = "default_max_music_bpm")]
    pub max_music_bpm: f64,

    /// Step scaling, 0.0 = gentle, 1.0 = aggressive
    #[serde(default = "default_responsiveness")]
    pub responsiveness: f64,

    /// Minimum seconds between two emitted targets
    #[serde(default = "default_cooldown_seconds")]
    pub cooldown_seconds: f64,

    /// Number of readings averaged into the smoothed HR
    #[serde(default = "default_smoothing_window")]
    pub smoothing_window: usize,

    /// Continuous out-of-zone time required before leaving MAINTAIN
    #[serde(default = "default_dwell_time_ms")]
    pub dwell_time_ms: i64,

    /// Continuous in-zone time required before returning to MAINTAIN
    #[serde(default = "default_return_to_maintain_ms")]
    pub return_to_maintain_ms: i64,

    #[serde(default)]
    pub strategy: StrategyKind,

    // Kept last so the TOML table follows the plain values
    #[serde(default = "default_zone")]
    pub target_zone: HrZone,
}

impl Default for AlgorithmConfig {
    fn default() -> Self {
        Self::for_zone(default_zone())
    }
}

impl AlgorithmConfig {
    /// Default tuning around the given target zone
    pub fn for_zone(target_zone: HrZone) -> Self {
        Self {
            min_music_bpm: default_min_music_bpm(),
            max_music_bpm: default_max_music_bpm(),
            responsiveness: default_responsiveness(),
            cooldown_seconds: default_cooldown_seconds(),
            smoothing_window: default_smoothing_window(),
            dwell_time_ms: default_dwell_time_ms(),
            return_to_maintain_ms: default_return_to_maintain_ms(),
            strategy: StrategyKind::default(),
            target_zone,
        }
    }

    /// Cooldown expressed in milliseconds
    pub fn cooldown_ms(&self) -> f64 {
        self.cooldown_seconds * 1000.0
    }

    /// Check the invariants the strategy relies on
    pub fn validate(&self) -> Result<()> {
        let zone = &self.target_zone;
        if !(zone.min_bpm < zone.max_bpm) {
            return Err(Error::Config(format!(
                "target zone '{}' must have min_bpm < max_bpm (got {} >= {})",
                zone.name, zone.min_bpm, zone.max_bpm
            )));
        }
        if !(self.min_music_bpm < self.max_music_bpm) {
            return Err(Error::Config(format!(
                "min_music_bpm must be below max_music_bpm (got {} >= {})",
                self.min_music_bpm, self.max_music_bpm
            )));
        }
        if !(0.0..=1.0).contains(&self.responsiveness) {
            return Err(Error::Config(format!(
                "responsiveness must be within [0, 1] (got {})",
                self.responsiveness
            )));
        }
        if !(self.cooldown_seconds >= 0.0) {
            return Err(Error::Config(format!(
                "cooldown_seconds must not be negative (got {})",
                self.cooldown_seconds
            )));
        }
        if self.smoothing_window < 1 {
            return Err(Error::Config("smoothing_window must be at least 1".into()));
        }
        if self.dwell_time_ms < 0 || self.return_to_maintain_ms < 0 {
            return Err(Error::Config(
                "dwell_time_ms and return_to_maintain_ms must not be negative".into(),
            ));
        }
        Ok(())
    }
}

/// Export location configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DataConfig {
    #[serde(default = "default_export_dir")]
    pub export_dir: PathBuf,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            export_dir: default_export_dir(),
        }
    }
}

/// Logging configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

// Default value functions
fn default_min_music_bpm() -> f64 {
    100.0
}

fn default_max_music_bpm() -> f64 {
    200.0
}

fn default_responsiveness() -> f64 {
    0.5
}

fn default_cooldown_seconds() -> f64 {
    5.0
}

fn default_smoothing_window() -> usize {
    5
}

fn default_dwell_time_ms() -> i64 {
    5000
}

fn default_return_to_maintain_ms() -> i64 {
    3000
}

fn default_export_dir() -> PathBuf {
    let base = dirs::data_local_dir()
        .or_else(|| dirs::home_dir().map(|home| home.join(".local/share")))
        .unwrap_or_else(|| PathBuf::from("."));
    base.join("hrtempo").join("exports")
}

fn default_log_level() -> String {
    "info".into()
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
        config.algorithm.validate()?;
        tracing::info!("Loaded config from {:?}", path);
        Ok(config)
    }

    /// Get the default config file path
    pub fn default_config_path() -> PathBuf {
        let base = dirs::config_dir()
            .or_else(|| dirs::home_dir().map(|home| home.join(".config")))
            .unwrap_or_else(|| PathBuf::from("."));
        base.join("hrtempo").join("config.toml")
    }

    /// Render as a TOML document
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))
    }

    /// Save the current configuration to the default path
    pub fn save(&self) -> Result<()> {
        let config_path = Self::default_config_path();
        self.save_to(&config_path)
    }

    /// Save the current configuration to a specific path
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        std::fs::write(path, self.to_toml()?)?;
        tracing::info!("Saved config to {:?}", path);
        Ok(())
    }
}
