//! Ranking of available spots for `find-parking`.

use crate::config::RecommendationSection;
use crate::estimation::Prediction;
use crate::store::{ParkingArea, ParkingSpot};
use std::cmp::Ordering;

pub const DEFAULT_CONFIDENCE_WEIGHT: f64 = 0.7;
pub const DEFAULT_PROXIMITY_WEIGHT: f64 = 0.3;
pub const DEFAULT_LIMIT: usize = 3;
pub const MAIN_ENTRANCE: &str = "main_entrance";
/// Corner-to-corner distance of the 100x100 city map.
pub const MAX_MAP_DISTANCE: f64 = 141.421_356_237_309_5;

#[derive(Debug, Clone, PartialEq)]
pub struct RankingParams {
    pub confidence_weight: f64,
    pub proximity_weight: f64,
    pub limit: usize,
}

impl Default for RankingParams {
    fn default() -> Self {
        Self {
            confidence_weight: DEFAULT_CONFIDENCE_WEIGHT,
            proximity_weight: DEFAULT_PROXIMITY_WEIGHT,
            limit: DEFAULT_LIMIT,
        }
    }
}

impl RankingParams {
    pub fn from_config(section: &RecommendationSection) -> Self {
        let defaults = Self::default();
        let weight = |value: Option<f64>, fallback: f64| {
            value
                .filter(|weight| weight.is_finite() && *weight >= 0.0)
                .unwrap_or(fallback)
        };
        Self {
            confidence_weight: weight(section.confidence_weight, defaults.confidence_weight),
            proximity_weight: weight(section.proximity_weight, defaults.proximity_weight),
            limit: section
                .limit
                .filter(|limit| *limit > 0)
                .unwrap_or(defaults.limit),
        }
    }
}

/// An available spot with its area and current prediction.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub spot: ParkingSpot,
    pub area: Option<ParkingArea>,
    pub prediction: Prediction,
}

#[derive(Debug, Clone)]
pub struct Ranked {
    pub candidate: Candidate,
    pub proximity: f64,
    pub score: f64,
}

/// Map point of the destination: the centre of the area whose name matches,
/// otherwise the map origin (also used for `main_entrance`).
pub fn destination_point<'a>(
    areas: impl IntoIterator<Item = &'a ParkingArea>,
    destination: &str,
) -> (f64, f64) {
    let wanted = destination.trim();
    if wanted.is_empty() || wanted.eq_ignore_ascii_case(MAIN_ENTRANCE) {
        return (0.0, 0.0);
    }
    areas
        .into_iter()
        .find(|area| area.name.eq_ignore_ascii_case(wanted))
        .map(ParkingArea::center)
        .unwrap_or((0.0, 0.0))
}

/// Spots without an area sit at the far edge of the map.
pub fn proximity(area: Option<&ParkingArea>, destination: (f64, f64)) -> f64 {
    let Some(area) = area else {
        return 0.0;
    };
    let (x, y) = area.center();
    let distance = (x - destination.0).hypot(y - destination.1);
    (1.0 - distance / MAX_MAP_DISTANCE).clamp(0.0, 1.0)
}

/// Score every candidate and keep the best `limit`, highest first.
pub fn rank(
    candidates: Vec<Candidate>,
    destination: (f64, f64),
    params: &RankingParams,
) -> Vec<Ranked> {
    let mut ranked: Vec<Ranked> = candidates
        .into_iter()
        .map(|candidate| {
            let proximity = proximity(candidate.area.as_ref(), destination);
            let score = params.confidence_weight * candidate.prediction.confidence
                + params.proximity_weight * proximity;
            Ranked {
                candidate,
                proximity,
                score: (score * 1000.0).round() / 1000.0,
            }
        })
        .collect();

    ranked.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.candidate.spot.id.cmp(&b.candidate.spot.id))
    });
    ranked.truncate(params.limit);
    ranked
}
