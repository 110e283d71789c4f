//! Availability prediction.
//!
//! A `PredictionProvider` turns a spot's occupancy history into an
//! availability estimate for a query time. The provider is chosen from the
//! `[ai]` config section at startup: the local statistical estimator by
//! default, or the external completion service wrapped with a local fallback.

use crate::config::Config;
use crate::store::{ParkingHistory, ParkingSpot};
use async_trait::async_trait;
use std::env;
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tracing::{info, warn};

pub mod local;
pub mod remote;

use local::LocalEstimator;
use remote::{ExternalProvider, ExternalSettings};

pub const DEFAULT_AI_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_AI_MODEL: &str = "gpt-3.5-turbo";
pub const DEFAULT_AI_KEY_ENV: &str = "OPENAI_API_KEY";
pub const DEFAULT_AI_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PredictionSource {
    Local,
    External,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    pub predicted_available: bool,
    /// In `[0, 1]`
    pub confidence: f64,
    /// Empirical occupancy for the queried hour bucket, when it has samples.
    pub occupancy_rate: Option<f64>,
    pub samples: usize,
    pub source: PredictionSource,
    pub reasoning: Option<String>,
    pub model: Option<String>,
}

/// Everything a provider may look at. Built under the store read lock and
/// owned by the caller so no lock is held across an await.
#[derive(Debug, Clone, Copy)]
pub struct PredictionInput<'a> {
    pub spot: &'a ParkingSpot,
    pub history: &'a [ParkingHistory],
    pub query_time: SystemTime,
}

#[async_trait]
pub trait PredictionProvider: Send + Sync + std::fmt::Debug {
    /// Never fails; providers degrade to a local estimate instead.
    async fn predict(&self, input: PredictionInput<'_>) -> Prediction;

    fn name(&self) -> &'static str;
}

/// Select the provider described by the config.
pub fn build_provider(config: &Config) -> Arc<dyn PredictionProvider> {
    let local = LocalEstimator::from_config(&config.prediction());

    let Some(ai) = config.ai() else {
        info!("Prediction running in local statistical mode");
        return Arc::new(local);
    };

    let key_env = ai.api_key_env.as_deref().unwrap_or(DEFAULT_AI_KEY_ENV);
    let api_key = match env::var(key_env) {
        Ok(key) if !key.trim().is_empty() => key,
        _ => {
            warn!(
                env = key_env,
                "AI prediction enabled but no API key set, using local estimator"
            );
            return Arc::new(local);
        }
    };

    let settings = ExternalSettings {
        base_url: ai
            .base_url
            .clone()
            .unwrap_or_else(|| DEFAULT_AI_BASE_URL.to_string()),
        model: ai
            .model
            .clone()
            .unwrap_or_else(|| DEFAULT_AI_MODEL.to_string()),
        api_key,
        timeout: Duration::from_secs(ai.timeout_secs.unwrap_or(DEFAULT_AI_TIMEOUT_SECS)),
        site_url: ai.site_url.clone(),
        site_name: ai.site_name.clone(),
    };

    match ExternalProvider::new(settings, local.clone()) {
        Ok(provider) => {
            info!(
                base_url = %provider.settings().base_url,
                model = %provider.settings().model,
                "External prediction provider enabled"
            );
            Arc::new(provider)
        }
        Err(err) => {
            warn!(error = %err, "Failed to build external provider, using local estimator");
            Arc::new(local)
        }
    }
}
