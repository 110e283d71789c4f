//! Dynamic pricing.
//!
//! Formula: `base_price * occupancy_multiplier(rate) * time_multiplier(hour)`,
//! rounded to cents and clamped to `[min_price, max_price]`.
//!
//! The occupancy multiplier is 1.0 up to `occupancy_threshold` and rises
//! linearly to `occupancy_cap_multiplier` at full occupancy. The time
//! multiplier is a two-level peak/off-peak table over UTC hours.

use crate::clock::{self, HOURS_PER_DAY};
use crate::store::ParkingHistory;
use serde::Serialize;
use std::time::{Duration, SystemTime};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq)]
pub struct PricingConfig {
    pub base_price: f64,
    pub min_price: f64,
    pub max_price: f64,
    pub occupancy_threshold: f64,
    pub occupancy_cap_multiplier: f64,
    /// First peak hour (inclusive, UTC)
    pub peak_start_hour: u8,
    /// Last peak hour (inclusive, UTC)
    pub peak_end_hour: u8,
    pub peak_multiplier: f64,
    pub off_peak_multiplier: f64,
}

impl PricingConfig {
    pub fn with_base_price(base_price: f64) -> Self {
        Self {
            base_price,
            min_price: 1.0,
            max_price: 6.0,
            occupancy_threshold: 0.5,
            occupancy_cap_multiplier: 2.0,
            peak_start_hour: 9,
            peak_end_hour: 17,
            peak_multiplier: 1.1,
            off_peak_multiplier: 1.0,
        }
    }

    pub fn validate(&self) -> Result<(), PricingError> {
        let positive = |value: f64| value.is_finite() && value > 0.0;
        if !positive(self.base_price) {
            return Err(PricingError::InvalidConfig(format!(
                "base_price must be positive, got {}",
                self.base_price
            )));
        }
        if !positive(self.min_price) || !positive(self.max_price) || self.min_price > self.max_price
        {
            return Err(PricingError::InvalidConfig(format!(
                "price band [{}, {}] is not a valid positive range",
                self.min_price, self.max_price
            )));
        }
        if !(0.0..1.0).contains(&self.occupancy_threshold) {
            return Err(PricingError::InvalidConfig(format!(
                "occupancy_threshold must be in [0, 1), got {}",
                self.occupancy_threshold
            )));
        }
        if !(self.occupancy_cap_multiplier.is_finite() && self.occupancy_cap_multiplier >= 1.0) {
            return Err(PricingError::InvalidConfig(format!(
                "occupancy_cap_multiplier must be >= 1, got {}",
                self.occupancy_cap_multiplier
            )));
        }
        if usize::from(self.peak_start_hour) >= HOURS_PER_DAY
            || usize::from(self.peak_end_hour) >= HOURS_PER_DAY
        {
            return Err(PricingError::InvalidConfig(
                "peak hours must be in 0..=23".to_string(),
            ));
        }
        if !positive(self.peak_multiplier) || !positive(self.off_peak_multiplier) {
            return Err(PricingError::InvalidConfig(
                "time multipliers must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self::with_base_price(crate::config::DEFAULT_BASE_PRICE)
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum PricingError {
    #[error("occupancy rate must be within [0, 1], got {0}")]
    InvalidOccupancyRate(f64),
    #[error("hour of day must be within 0..=23, got {0}")]
    InvalidHour(u8),
    #[error("invalid pricing config: {0}")]
    InvalidConfig(String),
}

#[derive(Debug, Clone)]
pub struct PricingCalculator {
    config: PricingConfig,
}

impl PricingCalculator {
    pub fn new(config: PricingConfig) -> Result<Self, PricingError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &PricingConfig {
        &self.config
    }

    /// Price per hour for a lot at the given occupancy rate and UTC hour.
    pub fn price(&self, occupancy_rate: f64, hour_of_day: u8) -> Result<f64, PricingError> {
        if !(0.0..=1.0).contains(&occupancy_rate) {
            return Err(PricingError::InvalidOccupancyRate(occupancy_rate));
        }
        if usize::from(hour_of_day) >= HOURS_PER_DAY {
            return Err(PricingError::InvalidHour(hour_of_day));
        }

        let raw = self.config.base_price
            * self.occupancy_multiplier(occupancy_rate)
            * self.time_multiplier(hour_of_day);
        let cents = (raw * 100.0).round() / 100.0;
        Ok(cents.clamp(self.config.min_price, self.config.max_price))
    }

    pub fn occupancy_multiplier(&self, occupancy_rate: f64) -> f64 {
        let threshold = self.config.occupancy_threshold;
        if occupancy_rate <= threshold {
            return 1.0;
        }
        let progress = ((occupancy_rate - threshold) / (1.0 - threshold)).min(1.0);
        1.0 + progress * (self.config.occupancy_cap_multiplier - 1.0)
    }

    pub fn time_multiplier(&self, hour_of_day: u8) -> f64 {
        if self.is_peak_hour(hour_of_day) {
            self.config.peak_multiplier
        } else {
            self.config.off_peak_multiplier
        }
    }

    fn is_peak_hour(&self, hour_of_day: u8) -> bool {
        let (start, end) = (self.config.peak_start_hour, self.config.peak_end_hour);
        if start <= end {
            (start..=end).contains(&hour_of_day)
        } else {
            // window wraps past midnight
            hour_of_day >= start || hour_of_day <= end
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HourlyPrice {
    pub hour: u8,
    pub price: Option<f64>,
    pub occupancy_rate: Option<f64>,
    pub samples: usize,
}

/// Aggregate history rows into the last `buckets` wall-clock hours, most recent first.
pub fn hourly_price_history(
    history: &[ParkingHistory],
    now: SystemTime,
    buckets: usize,
) -> Vec<HourlyPrice> {
    let current_hour = clock::floor_to_hour(now);
    (0..buckets)
        .map(|offset| {
            let start = current_hour
                .checked_sub(Duration::from_secs(3600 * offset as u64))
                .unwrap_or(SystemTime::UNIX_EPOCH);
            let end = start + Duration::from_secs(3600);
            let rows: Vec<&ParkingHistory> = history
                .iter()
                .filter(|row| row.timestamp >= start && row.timestamp < end)
                .collect();
            let samples = rows.len();
            let (price, occupancy_rate) = if samples == 0 {
                (None, None)
            } else {
                let total_price: f64 = rows.iter().map(|row| row.price).sum();
                let occupied = rows.iter().filter(|row| row.occupied).count();
                let mean_price = ((total_price / samples as f64) * 100.0).round() / 100.0;
                (Some(mean_price), Some(occupied as f64 / samples as f64))
            };
            HourlyPrice {
                hour: clock::hour_of_day(start),
                price,
                occupancy_rate,
                samples,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::UNIX_EPOCH;

    fn calculator() -> PricingCalculator {
        PricingCalculator::new(PricingConfig::with_base_price(2.0)).expect("valid default config")
    }

    #[test]
    fn fixture_seven_of_ten_at_two_pm() -> Result<(), PricingError> {
        let occupancy_rate = 7.0 / 10.0;

        let price = calculator().price(occupancy_rate, 14)?;

        // 2.0 * (1 + 0.2 / 0.5) * 1.1 = 3.08
        assert_eq!(price, 3.08);
        Ok(())
    }

    #[test]
    fn low_occupancy_off_peak_is_base_price() -> Result<(), PricingError> {
        assert_eq!(calculator().price(0.3, 3)?, 2.0);
        Ok(())
    }

    #[test]
    fn full_occupancy_hits_cap_multiplier() -> Result<(), PricingError> {
        assert_eq!(calculator().price(1.0, 22)?, 4.0);
        assert_eq!(calculator().price(1.0, 9)?, 4.4);
        Ok(())
    }

    #[test]
    fn price_is_monotonic_and_bounded() -> Result<(), PricingError> {
        let calculator = calculator();
        let config = calculator.config().clone();
        for hour in 0..24u8 {
            let mut previous = f64::MIN;
            for step in 0..=100 {
                let rate = f64::from(step) / 100.0;
                let price = calculator.price(rate, hour)?;
                assert!(price >= previous, "price fell at rate {rate} hour {hour}");
                assert!(price >= config.min_price && price <= config.max_price);
                previous = price;
            }
        }
        Ok(())
    }

    #[test]
    fn price_is_deterministic() -> Result<(), PricingError> {
        let calculator = calculator();
        for step in 0..=20 {
            let rate = f64::from(step) / 20.0;
            let first = calculator.price(rate, 11)?;
            let second = calculator.price(rate, 11)?;
            assert_eq!(first.to_bits(), second.to_bits());
        }
        Ok(())
    }

    #[test]
    fn clamps_to_configured_band() -> Result<(), PricingError> {
        let mut config = PricingConfig::with_base_price(5.0);
        config.max_price = 6.0;
        config.min_price = 5.5;
        let calculator = PricingCalculator::new(config)?;

        assert_eq!(calculator.price(0.0, 2)?, 5.5);
        assert_eq!(calculator.price(1.0, 12)?, 6.0);
        Ok(())
    }

    #[test]
    fn rejects_out_of_range_inputs() {
        let calculator = calculator();

        assert_eq!(
            calculator.price(1.2, 10),
            Err(PricingError::InvalidOccupancyRate(1.2))
        );
        assert!(matches!(
            calculator.price(f64::NAN, 10),
            Err(PricingError::InvalidOccupancyRate(_))
        ));
        assert_eq!(calculator.price(0.5, 24), Err(PricingError::InvalidHour(24)));
    }

    #[test]
    fn peak_window_can_wrap_midnight() -> Result<(), PricingError> {
        let mut config = PricingConfig::with_base_price(2.0);
        config.peak_start_hour = 22;
        config.peak_end_hour = 2;
        let calculator = PricingCalculator::new(config)?;

        assert_eq!(calculator.time_multiplier(23), 1.1);
        assert_eq!(calculator.time_multiplier(1), 1.1);
        assert_eq!(calculator.time_multiplier(12), 1.0);
        Ok(())
    }

    #[test]
    fn invalid_config_is_rejected() {
        let mut config = PricingConfig::with_base_price(2.0);
        config.occupancy_cap_multiplier = 0.5;

        assert!(matches!(
            PricingCalculator::new(config),
            Err(PricingError::InvalidConfig(_))
        ));
    }

    fn row(spot_id: u32, secs: u64, occupied: bool, price: f64) -> ParkingHistory {
        ParkingHistory {
            spot_id,
            timestamp: UNIX_EPOCH + Duration::from_secs(secs),
            occupied,
            price,
        }
    }

    #[test]
    fn hourly_history_buckets_most_recent_first() {
        let now = UNIX_EPOCH + Duration::from_secs(10 * 3600 + 900);
        let history = vec![
            row(1, 10 * 3600 + 60, true, 3.0),
            row(2, 10 * 3600 + 120, false, 3.0),
            row(1, 9 * 3600 + 10, true, 2.0),
            row(1, 2 * 3600, false, 1.0),
        ];

        let summary = hourly_price_history(&history, now, 24);

        assert_eq!(summary.len(), 24);
        assert_eq!(summary[0].hour, 10);
        assert_eq!(summary[0].samples, 2);
        assert_eq!(summary[0].price, Some(3.0));
        assert_eq!(summary[0].occupancy_rate, Some(0.5));
        assert_eq!(summary[1].hour, 9);
        assert_eq!(summary[1].occupancy_rate, Some(1.0));
        assert_eq!(summary[2].samples, 0);
        assert_eq!(summary[2].price, None);
        assert_eq!(summary[8].hour, 2);
        assert_eq!(summary[8].samples, 1);
    }
}
