use crate::detection::OccupancyDetector;
use crate::error::AppError;
use crate::store::{ParkingSpot, SpotId};
use std::time::SystemTime;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockDetection {
    Occupied,
    Vacant,
    Fail,
}

/// Detector that replays a fixed script, one entry per `detect` call.
///
/// Once the script is exhausted every spot reads as vacant.
#[derive(Debug, Default)]
pub struct ScriptedDetector {
    script: Vec<MockDetection>,
    next_index: usize,
    seen: Vec<SpotId>,
}

impl ScriptedDetector {
    pub fn new(script: Vec<MockDetection>) -> Self {
        Self {
            script,
            next_index: 0,
            seen: Vec::new(),
        }
    }

    pub fn all(outcome: MockDetection, count: usize) -> Self {
        Self::new(vec![outcome; count])
    }

    /// Spot ids in the order they were queried.
    pub fn seen(&self) -> &[SpotId] {
        &self.seen
    }

    fn next_outcome(&mut self) -> MockDetection {
        let outcome = self
            .script
            .get(self.next_index)
            .copied()
            .unwrap_or(MockDetection::Vacant);
        self.next_index += 1;
        outcome
    }
}

impl OccupancyDetector for ScriptedDetector {
    fn detect(&mut self, spot: &ParkingSpot, _at: SystemTime) -> Result<bool, AppError> {
        self.seen.push(spot.id);
        match self.next_outcome() {
            MockDetection::Occupied => Ok(true),
            MockDetection::Vacant => Ok(false),
            MockDetection::Fail => Err(AppError::Detection(format!(
                "mock detection failed for spot {}",
                spot.spot_number
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::UNIX_EPOCH;

    fn spot(id: SpotId) -> ParkingSpot {
        ParkingSpot {
            id,
            lot_id: 1,
            area_id: None,
            spot_number: format!("A{id:02}"),
            is_occupied: false,
            last_updated: UNIX_EPOCH,
        }
    }

    #[test]
    fn replays_script_then_defaults_to_vacant() -> Result<(), AppError> {
        let mut detector =
            ScriptedDetector::new(vec![MockDetection::Occupied, MockDetection::Vacant]);

        assert!(detector.detect(&spot(1), UNIX_EPOCH)?);
        assert!(!detector.detect(&spot(2), UNIX_EPOCH)?);
        assert!(!detector.detect(&spot(3), UNIX_EPOCH)?);
        assert_eq!(detector.seen(), &[1, 2, 3]);
        Ok(())
    }

    #[test]
    fn scripted_failure_is_detection_error() {
        let mut detector = ScriptedDetector::all(MockDetection::Fail, 1);

        let err = detector.detect(&spot(4), UNIX_EPOCH).unwrap_err();

        assert_eq!(
            err.to_string(),
            "detection error: mock detection failed for spot A04"
        );
    }
}
