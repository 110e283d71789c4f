use crate::error::AppError;
use crate::store::ParkingSpot;
use std::time::SystemTime;

pub mod mock;
pub mod simulator;

pub use simulator::{DiurnalProfile, SimulatedDetector};

/// Source of per-spot occupancy readings for an update cycle.
///
/// Implementations hold no persisted state; the coordinator writes results
/// back into the store.
pub trait OccupancyDetector: Send {
    fn detect(&mut self, spot: &ParkingSpot, at: SystemTime) -> Result<bool, AppError>;
}
