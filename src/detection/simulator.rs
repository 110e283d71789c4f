//! Simulated vehicle detection.
//!
//! Occupancy is a Bernoulli draw whose probability follows a diurnal profile:
//! busy during business hours, moderate in the evening, quiet at night.

use crate::clock;
use crate::config::DetectionSection;
use crate::detection::OccupancyDetector;
use crate::error::AppError;
use crate::store::ParkingSpot;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::time::SystemTime;

#[derive(Debug, Clone, PartialEq)]
pub struct DiurnalProfile {
    /// 09:00-17:59 UTC
    pub business_hours: f64,
    /// 18:00-22:59 UTC
    pub evening: f64,
    pub night: f64,
}

impl Default for DiurnalProfile {
    fn default() -> Self {
        Self {
            business_hours: 0.7,
            evening: 0.5,
            night: 0.2,
        }
    }
}

impl DiurnalProfile {
    pub fn from_config(section: &DetectionSection) -> Self {
        let defaults = Self::default();
        Self {
            business_hours: probability_or(
                section.business_hours_probability,
                defaults.business_hours,
            ),
            evening: probability_or(section.evening_probability, defaults.evening),
            night: probability_or(section.night_probability, defaults.night),
        }
    }

    pub fn occupancy_probability(&self, hour_of_day: u8) -> f64 {
        match hour_of_day {
            9..=17 => self.business_hours,
            18..=22 => self.evening,
            _ => self.night,
        }
    }
}

fn probability_or(value: Option<f64>, default: f64) -> f64 {
    value
        .filter(|p| p.is_finite())
        .unwrap_or(default)
        .clamp(0.0, 1.0)
}

#[derive(Debug)]
pub struct SimulatedDetector {
    rng: StdRng,
    profile: DiurnalProfile,
}

impl SimulatedDetector {
    pub fn new(rng: StdRng, profile: DiurnalProfile) -> Self {
        Self { rng, profile }
    }

    /// Deterministic sequence for a given seed.
    pub fn seeded(seed: u64, profile: DiurnalProfile) -> Self {
        Self::new(StdRng::seed_from_u64(seed), profile)
    }

    pub fn from_entropy(profile: DiurnalProfile) -> Self {
        Self::new(StdRng::from_entropy(), profile)
    }
}

impl OccupancyDetector for SimulatedDetector {
    fn detect(&mut self, _spot: &ParkingSpot, at: SystemTime) -> Result<bool, AppError> {
        let probability = self
            .profile
            .occupancy_probability(clock::hour_of_day(at));
        Ok(self.rng.gen_bool(probability))
    }
}
