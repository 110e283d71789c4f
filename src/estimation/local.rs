//! Historical-average estimator.
//!
//! History rows are bucketed by UTC hour of day. The bucket matching the
//! query hour gives an empirical occupancy rate; the spot is predicted
//! available when that rate is below one half. Confidence grows with the
//! bucket's sample count up to a cap. An empty bucket yields the neutral
//! default (available, `default_confidence`).

use crate::clock::{self, HOURS_PER_DAY};
use crate::config::PredictionSection;
use crate::estimation::{Prediction, PredictionInput, PredictionProvider, PredictionSource};
use crate::store::ParkingHistory;
use async_trait::async_trait;
use std::time::SystemTime;

pub const DEFAULT_CONFIDENCE: f64 = 0.5;
pub const DEFAULT_MAX_CONFIDENCE: f64 = 0.9;
pub const DEFAULT_SAMPLES_FOR_MAX_CONFIDENCE: u32 = 10;
pub const AVAILABILITY_THRESHOLD: f64 = 0.5;

#[derive(Debug, Clone, PartialEq)]
pub struct LocalParams {
    pub default_confidence: f64,
    pub max_confidence: f64,
    pub samples_for_max_confidence: u32,
}

impl Default for LocalParams {
    fn default() -> Self {
        Self {
            default_confidence: DEFAULT_CONFIDENCE,
            max_confidence: DEFAULT_MAX_CONFIDENCE,
            samples_for_max_confidence: DEFAULT_SAMPLES_FOR_MAX_CONFIDENCE,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HourBucket {
    pub samples: usize,
    pub occupied: usize,
}

impl HourBucket {
    pub fn occupancy_rate(&self) -> Option<f64> {
        (self.samples > 0).then(|| self.occupied as f64 / self.samples as f64)
    }
}

#[derive(Debug, Clone, Default)]
pub struct LocalEstimator {
    params: LocalParams,
}

impl LocalEstimator {
    pub fn new(params: LocalParams) -> Self {
        Self { params }
    }

    pub fn with_defaults() -> Self {
        Self::default()
    }

    pub fn from_config(section: &PredictionSection) -> Self {
        let defaults = LocalParams::default();
        Self::new(LocalParams {
            default_confidence: section
                .default_confidence
                .filter(|value| (0.0..=1.0).contains(value))
                .unwrap_or(defaults.default_confidence),
            max_confidence: section
                .max_confidence
                .filter(|value| (0.0..=1.0).contains(value))
                .unwrap_or(defaults.max_confidence),
            samples_for_max_confidence: section
                .samples_for_max_confidence
                .filter(|value| *value > 0)
                .unwrap_or(defaults.samples_for_max_confidence),
        })
    }

    pub fn params(&self) -> &LocalParams {
        &self.params
    }

    pub fn estimate(&self, history: &[ParkingHistory], query_time: SystemTime) -> Prediction {
        let buckets = hourly_buckets(history);
        let bucket = buckets[usize::from(clock::hour_of_day(query_time))];

        let Some(occupancy_rate) = bucket.occupancy_rate() else {
            return Prediction {
                predicted_available: true,
                confidence: self.params.default_confidence,
                occupancy_rate: None,
                samples: 0,
                source: PredictionSource::Local,
                reasoning: None,
                model: None,
            };
        };

        Prediction {
            predicted_available: occupancy_rate < AVAILABILITY_THRESHOLD,
            confidence: self.confidence_for(bucket.samples),
            occupancy_rate: Some(occupancy_rate),
            samples: bucket.samples,
            source: PredictionSource::Local,
            reasoning: None,
            model: None,
        }
    }

    fn confidence_for(&self, samples: usize) -> f64 {
        let full = f64::from(self.params.samples_for_max_confidence.max(1));
        (samples as f64 / full).min(self.params.max_confidence)
    }
}

#[async_trait]
impl PredictionProvider for LocalEstimator {
    async fn predict(&self, input: PredictionInput<'_>) -> Prediction {
        self.estimate(input.history, input.query_time)
    }

    fn name(&self) -> &'static str {
        "local"
    }
}

pub fn hourly_buckets(history: &[ParkingHistory]) -> [HourBucket; HOURS_PER_DAY] {
    let mut buckets = [HourBucket::default(); HOURS_PER_DAY];
    for row in history {
        let bucket = &mut buckets[usize::from(clock::hour_of_day(row.timestamp))];
        bucket.samples += 1;
        bucket.occupied += usize::from(row.occupied);
    }
    buckets
}
