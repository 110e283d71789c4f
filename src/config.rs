use crate::pricing::PricingConfig;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_CONFIG_PATH: &str = "config/config.toml";
pub const CONFIG_PATH_ENV: &str = "SMART_PARKING_CONFIG";
pub const DEFAULT_SERVER_PORT: u16 = 5000;
pub const DEFAULT_REFRESH_INTERVAL_SECS: u64 = 30;
pub const DEFAULT_LOT_NAME: &str = "Smart City Parking Network";
pub const DEFAULT_BASE_PRICE: f64 = 2.0;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub app: AppSection,
    pub logging: LoggingSection,
    #[serde(default)]
    pub server: Option<ServerSection>,
    #[serde(default)]
    pub lot: Option<LotSection>,
    #[serde(default)]
    pub pricing: Option<PricingSection>,
    #[serde(default)]
    pub detection: Option<DetectionSection>,
    #[serde(default)]
    pub prediction: Option<PredictionSection>,
    #[serde(default)]
    pub recommendation: Option<RecommendationSection>,
    #[serde(default)]
    pub ai: Option<AiSection>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppSection {
    pub name: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingSection {
    pub level: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerSection {
    /// Port to listen on (default: 5000)
    pub port: Option<u16>,
    /// Seconds between automatic update cycles; 0 disables (default: 30)
    pub refresh_interval_secs: Option<u64>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LotSection {
    pub name: Option<String>,
    pub base_price: Option<f64>,
    #[serde(default)]
    pub areas: Vec<AreaSection>,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct AreaSection {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub spots: u32,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct PricingSection {
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
    pub occupancy_threshold: Option<f64>,
    pub occupancy_cap_multiplier: Option<f64>,
    pub peak_start_hour: Option<u8>,
    pub peak_end_hour: Option<u8>,
    pub peak_multiplier: Option<f64>,
    pub off_peak_multiplier: Option<f64>,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct DetectionSection {
    /// Fixed RNG seed for reproducible simulation runs
    pub seed: Option<u64>,
    pub business_hours_probability: Option<f64>,
    pub evening_probability: Option<f64>,
    pub night_probability: Option<f64>,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct PredictionSection {
    pub default_confidence: Option<f64>,
    pub max_confidence: Option<f64>,
    pub samples_for_max_confidence: Option<u32>,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct RecommendationSection {
    pub confidence_weight: Option<f64>,
    pub proximity_weight: Option<f64>,
    pub limit: Option<usize>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AiSection {
    #[serde(default)]
    pub enabled: bool,
    pub base_url: Option<String>,
    pub model: Option<String>,
    /// Name of the environment variable holding the API key
    pub api_key_env: Option<String>,
    pub timeout_secs: Option<u64>,
    pub site_url: Option<String>,
    pub site_name: Option<String>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Read(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Path from `SMART_PARKING_CONFIG`, or the bundled default.
pub fn resolve_path() -> PathBuf {
    std::env::var_os(CONFIG_PATH_ENV)
        .filter(|value| !value.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

pub fn load_default() -> Result<Config, ConfigError> {
    load_from_path(DEFAULT_CONFIG_PATH)
}

pub fn load_from_path(path: impl AsRef<Path>) -> Result<Config, ConfigError> {
    let contents = std::fs::read_to_string(path)?;
    let config: Config = toml::from_str(&contents)?;
    config.validate()?;
    Ok(config)
}

impl Config {
    fn validate(&self) -> Result<(), ConfigError> {
        if !(self.base_price().is_finite() && self.base_price() > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "lot.base_price must be positive, got {}",
                self.base_price()
            )));
        }
        self.pricing_config()
            .validate()
            .map_err(|err| ConfigError::Invalid(err.to_string()))?;
        for area in self.areas() {
            if area.name.trim().is_empty() {
                return Err(ConfigError::Invalid("lot.areas entry with empty name".to_string()));
            }
        }
        Ok(())
    }

    /// Returns the server port (default: 5000)
    pub fn server_port(&self) -> u16 {
        self.server
            .as_ref()
            .and_then(|s| s.port)
            .unwrap_or(DEFAULT_SERVER_PORT)
    }

    /// Returns the automatic refresh interval, or `None` when disabled.
    pub fn refresh_interval(&self) -> Option<Duration> {
        let secs = self
            .server
            .as_ref()
            .and_then(|s| s.refresh_interval_secs)
            .unwrap_or(DEFAULT_REFRESH_INTERVAL_SECS);
        (secs > 0).then(|| Duration::from_secs(secs))
    }

    pub fn lot_name(&self) -> &str {
        self.lot
            .as_ref()
            .and_then(|lot| lot.name.as_deref())
            .filter(|name| !name.trim().is_empty())
            .unwrap_or(DEFAULT_LOT_NAME)
    }

    pub fn base_price(&self) -> f64 {
        self.lot
            .as_ref()
            .and_then(|lot| lot.base_price)
            .unwrap_or(DEFAULT_BASE_PRICE)
    }

    /// Configured areas; empty means the built-in city layout is used.
    pub fn areas(&self) -> &[AreaSection] {
        self.lot
            .as_ref()
            .map(|lot| lot.areas.as_slice())
            .unwrap_or(&[])
    }

    pub fn pricing_config(&self) -> PricingConfig {
        let defaults = PricingConfig::with_base_price(self.base_price());
        let section = self.pricing.clone().unwrap_or_default();
        PricingConfig {
            base_price: defaults.base_price,
            min_price: section.min_price.unwrap_or(defaults.min_price),
            max_price: section.max_price.unwrap_or(defaults.max_price),
            occupancy_threshold: section
                .occupancy_threshold
                .unwrap_or(defaults.occupancy_threshold),
            occupancy_cap_multiplier: section
                .occupancy_cap_multiplier
                .unwrap_or(defaults.occupancy_cap_multiplier),
            peak_start_hour: section.peak_start_hour.unwrap_or(defaults.peak_start_hour),
            peak_end_hour: section.peak_end_hour.unwrap_or(defaults.peak_end_hour),
            peak_multiplier: section.peak_multiplier.unwrap_or(defaults.peak_multiplier),
            off_peak_multiplier: section
                .off_peak_multiplier
                .unwrap_or(defaults.off_peak_multiplier),
        }
    }

    pub fn detection(&self) -> DetectionSection {
        self.detection.clone().unwrap_or_default()
    }

    pub fn prediction(&self) -> PredictionSection {
        self.prediction.clone().unwrap_or_default()
    }

    pub fn recommendation(&self) -> RecommendationSection {
        self.recommendation.clone().unwrap_or_default()
    }

    /// AI section, only when explicitly enabled.
    pub fn ai(&self) -> Option<&AiSection> {
        self.ai.as_ref().filter(|ai| ai.enabled)
    }
}
