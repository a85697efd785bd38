//! Configuration loading and validation.
//!
//! All engine components are configured from a single YAML file with
//! serde defaults, so an empty file yields a fully working configuration.
//!
//! # Usage
//!
//! ```rust,ignore
//! use slicer_engine::config::{Config, load_config};
//!
//! // Load from default path (config.yaml)
//! let config = load_config(None)?;
//!
//! // Load from custom path
//! let config = load_config(Some("custom/config.yaml"))?;
//! ```

use std::time::Duration;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::application::services::MonitorConfig;
use crate::application::services::engine::FeeRates;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read configuration file.
    #[error("Failed to read config file '{path}': {source}")]
    ReadError {
        /// Path to the config file.
        path: String,
        /// The underlying IO error.
        source: std::io::Error,
    },

    /// Failed to parse YAML configuration.
    #[error("Failed to parse config YAML: {0}")]
    ParseError(#[from] serde_yaml_bw::Error),

    /// Configuration validation failed.
    #[error("Config validation failed: {0}")]
    ValidationError(String),
}

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Default strategy parameters.
    #[serde(default)]
    pub strategy: StrategyConfig,
    /// Background monitor cadence.
    #[serde(default)]
    pub monitor: MonitorSection,
    /// Outbound request rate limiting.
    #[serde(default)]
    pub rate_limiter: RateLimiterConfig,
    /// Persistence configuration.
    #[serde(default)]
    pub persistence: PersistenceConfig,
    /// Fee rates for synthetic fill estimates.
    #[serde(default)]
    pub fees: FeesConfig,
}

/// Default strategy parameters applied when a request omits them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategyConfig {
    /// Default slice count.
    #[serde(default = "default_num_slices")]
    pub num_slices: u32,
    /// Default schedule duration in seconds.
    #[serde(default = "default_duration_seconds")]
    pub duration_seconds: u64,
    /// Default TWAP jitter as a fraction of the interval.
    #[serde(default)]
    pub jitter_pct: f64,
    /// Default trailing-volume window in seconds for participation checks.
    #[serde(default = "default_volume_lookback_seconds")]
    pub volume_lookback_seconds: u64,
    /// Hours of hourly candles used to build a VWAP volume profile.
    #[serde(default = "default_vwap_profile_hours")]
    pub vwap_profile_hours: u32,
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            num_slices: default_num_slices(),
            duration_seconds: default_duration_seconds(),
            jitter_pct: 0.0,
            volume_lookback_seconds: default_volume_lookback_seconds(),
            vwap_profile_hours: default_vwap_profile_hours(),
        }
    }
}

const fn default_num_slices() -> u32 {
    10
}
const fn default_duration_seconds() -> u64 {
    3_600
}
const fn default_volume_lookback_seconds() -> u64 {
    300
}
const fn default_vwap_profile_hours() -> u32 {
    168
}

/// Background monitor cadence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorSection {
    /// Queue wait in milliseconds when polling carries fill detection.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Queue wait in milliseconds when a push channel carries detection.
    #[serde(default = "default_push_poll_interval_ms")]
    pub push_poll_interval_ms: u64,
    /// Maximum orders folded into one batched fills request.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Idle sleep in milliseconds when nothing is tracked.
    #[serde(default = "default_idle_sleep_ms")]
    pub idle_sleep_ms: u64,
    /// Whether a push fill channel is wired up.
    #[serde(default)]
    pub push_enabled: bool,
}

impl Default for MonitorSection {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            push_poll_interval_ms: default_push_poll_interval_ms(),
            batch_size: default_batch_size(),
            idle_sleep_ms: default_idle_sleep_ms(),
            push_enabled: false,
        }
    }
}

impl MonitorSection {
    /// Convert to the monitor's runtime configuration.
    #[must_use]
    pub const fn to_monitor_config(&self) -> MonitorConfig {
        MonitorConfig {
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            push_poll_interval: Duration::from_millis(self.push_poll_interval_ms),
            batch_size: self.batch_size,
            idle_sleep: Duration::from_millis(self.idle_sleep_ms),
            push_enabled: self.push_enabled,
        }
    }
}

const fn default_poll_interval_ms() -> u64 {
    500
}
const fn default_push_poll_interval_ms() -> u64 {
    30_000
}
const fn default_batch_size() -> usize {
    50
}
const fn default_idle_sleep_ms() -> u64 {
    5_000
}

/// Outbound request rate limiting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimiterConfig {
    /// Sustained requests per second.
    #[serde(default = "default_rate")]
    pub requests_per_second: f64,
    /// Burst capacity.
    #[serde(default = "default_burst")]
    pub burst: u32,
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self {
            requests_per_second: default_rate(),
            burst: default_burst(),
        }
    }
}

const fn default_rate() -> f64 {
    10.0
}
const fn default_burst() -> u32 {
    20
}

/// Persistence configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistenceConfig {
    /// Backend: `json` (file-backed) or `memory`.
    #[serde(default = "default_backend")]
    pub backend: String,
    /// Base directory for the JSON store.
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            data_dir: default_data_dir(),
        }
    }
}

fn default_backend() -> String {
    "json".to_string()
}
fn default_data_dir() -> String {
    "data".to_string()
}

/// Fee rates for synthetic fill estimates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeesConfig {
    /// Maker fee as a fraction of notional.
    #[serde(default = "default_maker_rate")]
    pub maker_rate: Decimal,
    /// Taker fee as a fraction of notional.
    #[serde(default = "default_taker_rate")]
    pub taker_rate: Decimal,
}

impl Default for FeesConfig {
    fn default() -> Self {
        Self {
            maker_rate: default_maker_rate(),
            taker_rate: default_taker_rate(),
        }
    }
}

impl FeesConfig {
    /// Convert to the engine's runtime fee rates.
    #[must_use]
    pub const fn to_fee_rates(&self) -> FeeRates {
        FeeRates {
            maker: self.maker_rate,
            taker: self.taker_rate,
        }
    }
}

fn default_maker_rate() -> Decimal {
    Decimal::new(4, 3)
}
fn default_taker_rate() -> Decimal {
    Decimal::new(6, 3)
}

impl Config {
    /// Validate cross-field constraints that serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.rate_limiter.requests_per_second <= 0.0 {
            return Err(ConfigError::ValidationError(
                "rate_limiter.requests_per_second must be positive".to_string(),
            ));
        }
        if self.monitor.batch_size == 0 {
            return Err(ConfigError::ValidationError(
                "monitor.batch_size must be at least 1".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.strategy.jitter_pct) {
            return Err(ConfigError::ValidationError(
                "strategy.jitter_pct must be within [0, 1]".to_string(),
            ));
        }
        if self.persistence.backend != "json" && self.persistence.backend != "memory" {
            return Err(ConfigError::ValidationError(format!(
                "persistence.backend must be 'json' or 'memory', got '{}'",
                self.persistence.backend
            )));
        }
        Ok(())
    }
}

/// Load configuration from a YAML file, falling back to `config.yaml`.
///
/// A missing file is not an error; defaults apply.
pub fn load_config(path: Option<&str>) -> Result<Config, ConfigError> {
    let path = path.unwrap_or("config.yaml");
    let config = match std::fs::read_to_string(path) {
        Ok(contents) => serde_yaml_bw::from_str(&contents)?,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Config::default(),
        Err(source) => {
            return Err(ConfigError::ReadError {
                path: path.to_string(),
                source,
            });
        }
    };
    config.validate()?;
    Ok(config)
}
