use crate::error::AppError;
use std::collections::HashMap;
use std::time::{Duration, SystemTime};

pub mod seed;

pub type LotId = u32;
pub type AreaId = u32;
pub type SpotId = u32;

#[derive(Debug, Clone, PartialEq)]
pub struct ParkingLot {
    pub id: LotId,
    pub name: String,
    pub total_spots: usize,
    pub base_price: f64,
    pub current_price: f64,
    pub last_updated: SystemTime,
}

/// Named region of the city map; coordinates are percentages of a 100x100 map.
#[derive(Debug, Clone, PartialEq)]
pub struct ParkingArea {
    pub id: AreaId,
    pub lot_id: LotId,
    pub name: String,
    pub description: String,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl ParkingArea {
    pub fn center(&self) -> (f64, f64) {
        (self.x + self.width / 2.0, self.y + self.height / 2.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParkingSpot {
    pub id: SpotId,
    pub lot_id: LotId,
    pub area_id: Option<AreaId>,
    pub spot_number: String,
    pub is_occupied: bool,
    pub last_updated: SystemTime,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParkingHistory {
    pub spot_id: SpotId,
    pub timestamp: SystemTime,
    pub occupied: bool,
    pub price: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LotOccupancy {
    pub total: usize,
    pub occupied: usize,
}

impl LotOccupancy {
    pub fn available(&self) -> usize {
        self.total - self.occupied
    }

    /// Fraction of spots occupied; `None` for a lot without spots.
    pub fn rate(&self) -> Option<f64> {
        (self.total > 0).then(|| self.occupied as f64 / self.total as f64)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewArea {
    pub name: String,
    pub description: String,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// In-memory table set for lots, areas, spots and the append-only history.
///
/// Every mutation goes through `&mut self`; callers share the store as
/// `Arc<RwLock<ParkingStore>>` so each write is atomic per row.
#[derive(Debug, Default)]
pub struct ParkingStore {
    lots: Vec<ParkingLot>,
    areas: Vec<ParkingArea>,
    spots: Vec<ParkingSpot>,
    spot_index: HashMap<SpotId, usize>,
    history: Vec<ParkingHistory>,
}

impl ParkingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_lot(&mut self, name: &str, base_price: f64, now: SystemTime) -> LotId {
        let id = self.lots.len() as LotId + 1;
        self.lots.push(ParkingLot {
            id,
            name: name.to_string(),
            total_spots: 0,
            base_price,
            current_price: base_price,
            last_updated: now,
        });
        id
    }

    pub fn insert_area(&mut self, lot_id: LotId, area: NewArea) -> Result<AreaId, AppError> {
        self.lot(lot_id)?;
        let id = self.areas.len() as AreaId + 1;
        self.areas.push(ParkingArea {
            id,
            lot_id,
            name: area.name,
            description: area.description,
            x: area.x,
            y: area.y,
            width: area.width,
            height: area.height,
        });
        Ok(id)
    }

    pub fn insert_spot(
        &mut self,
        lot_id: LotId,
        area_id: Option<AreaId>,
        spot_number: &str,
        is_occupied: bool,
        now: SystemTime,
    ) -> Result<SpotId, AppError> {
        let spot_number = spot_number.trim().to_uppercase();
        if spot_number.is_empty() {
            return Err(AppError::Validation("spot number must not be empty".to_string()));
        }
        self.lot(lot_id)?;
        if let Some(area_id) = area_id
            && !self
                .areas
                .iter()
                .any(|area| area.id == area_id && area.lot_id == lot_id)
        {
            return Err(AppError::not_found("area", area_id));
        }
        if self.spot_by_number(lot_id, &spot_number).is_some() {
            return Err(AppError::Validation(format!(
                "spot number {spot_number} already exists in lot {lot_id}"
            )));
        }

        let id = self.spots.len() as SpotId + 1;
        self.spot_index.insert(id, self.spots.len());
        self.spots.push(ParkingSpot {
            id,
            lot_id,
            area_id,
            spot_number,
            is_occupied,
            last_updated: now,
        });
        self.lot_mut(lot_id)?.total_spots += 1;
        Ok(id)
    }

    pub fn lot(&self, lot_id: LotId) -> Result<&ParkingLot, AppError> {
        self.lots
            .iter()
            .find(|lot| lot.id == lot_id)
            .ok_or_else(|| AppError::not_found("lot", lot_id))
    }

    fn lot_mut(&mut self, lot_id: LotId) -> Result<&mut ParkingLot, AppError> {
        self.lots
            .iter_mut()
            .find(|lot| lot.id == lot_id)
            .ok_or_else(|| AppError::not_found("lot", lot_id))
    }

    pub fn areas_for_lot(&self, lot_id: LotId) -> impl Iterator<Item = &ParkingArea> {
        self.areas.iter().filter(move |area| area.lot_id == lot_id)
    }

    pub fn area(&self, area_id: AreaId) -> Option<&ParkingArea> {
        self.areas.iter().find(|area| area.id == area_id)
    }

    pub fn spots_for_lot(&self, lot_id: LotId) -> impl Iterator<Item = &ParkingSpot> {
        self.spots.iter().filter(move |spot| spot.lot_id == lot_id)
    }

    pub fn spot(&self, spot_id: SpotId) -> Result<&ParkingSpot, AppError> {
        self.spot_index
            .get(&spot_id)
            .and_then(|index| self.spots.get(*index))
            .ok_or_else(|| AppError::not_found("spot", spot_id))
    }

    /// Case-insensitive lookup by spot number within a lot.
    pub fn spot_by_number(&self, lot_id: LotId, spot_number: &str) -> Option<&ParkingSpot> {
        let wanted = spot_number.trim();
        self.spots_for_lot(lot_id)
            .find(|spot| spot.spot_number.eq_ignore_ascii_case(wanted))
    }

    pub fn lot_occupancy(&self, lot_id: LotId) -> Result<LotOccupancy, AppError> {
        self.lot(lot_id)?;
        let (total, occupied) = self
            .spots_for_lot(lot_id)
            .fold((0, 0), |(total, occupied), spot| {
                (total + 1, occupied + usize::from(spot.is_occupied))
            });
        Ok(LotOccupancy { total, occupied })
    }

    /// Record a detection result. `last_updated` strictly advances even when
    /// two writes carry the same clock reading.
    pub fn set_spot_occupancy(
        &mut self,
        spot_id: SpotId,
        is_occupied: bool,
        now: SystemTime,
    ) -> Result<(), AppError> {
        let index = *self
            .spot_index
            .get(&spot_id)
            .ok_or_else(|| AppError::not_found("spot", spot_id))?;
        let spot = &mut self.spots[index];
        let floor = spot.last_updated + Duration::from_nanos(1);
        spot.is_occupied = is_occupied;
        spot.last_updated = now.max(floor);
        Ok(())
    }

    pub fn set_lot_price(
        &mut self,
        lot_id: LotId,
        price: f64,
        now: SystemTime,
    ) -> Result<(), AppError> {
        if !(price.is_finite() && price > 0.0) {
            return Err(AppError::Validation(format!("invalid lot price {price}")));
        }
        let lot = self.lot_mut(lot_id)?;
        lot.current_price = price;
        lot.last_updated = now.max(lot.last_updated);
        Ok(())
    }

    pub fn append_history(&mut self, row: ParkingHistory) -> Result<(), AppError> {
        self.spot(row.spot_id)?;
        self.history.push(row);
        Ok(())
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    pub fn history_for_spot(&self, spot_id: SpotId) -> Vec<ParkingHistory> {
        self.history
            .iter()
            .filter(|row| row.spot_id == spot_id)
            .cloned()
            .collect()
    }

    pub fn history_for_lot(&self, lot_id: LotId) -> Vec<ParkingHistory> {
        self.history
            .iter()
            .filter(|row| {
                self.spot(row.spot_id)
                    .map(|spot| spot.lot_id == lot_id)
                    .unwrap_or(false)
            })
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::UNIX_EPOCH;

    fn at(secs: u64) -> SystemTime {
        UNIX_EPOCH + Duration::from_secs(secs)
    }

    #[test]
    fn spot_numbers_are_unique_per_lot() -> Result<(), AppError> {
        let mut store = ParkingStore::new();
        let first = store.insert_lot("North", 2.0, at(0));
        let second = store.insert_lot("South", 2.0, at(0));

        store.insert_spot(first, None, "a01", false, at(0))?;
        let duplicate = store.insert_spot(first, None, "A01", true, at(0));
        store.insert_spot(second, None, "A01", false, at(0))?;

        assert!(matches!(duplicate, Err(AppError::Validation(_))));
        assert_eq!(store.lot(first)?.total_spots, 1);
        assert_eq!(store.lot(second)?.total_spots, 1);
        Ok(())
    }

    #[test]
    fn spot_requires_existing_lot_and_area() -> Result<(), AppError> {
        let mut store = ParkingStore::new();
        let lot_id = store.insert_lot("North", 2.0, at(0));

        let missing_lot = store.insert_spot(9, None, "A01", false, at(0));
        let missing_area = store.insert_spot(lot_id, Some(3), "A01", false, at(0));

        assert!(matches!(missing_lot, Err(AppError::NotFound { entity: "lot", .. })));
        assert!(matches!(missing_area, Err(AppError::NotFound { entity: "area", .. })));
        Ok(())
    }

    #[test]
    fn occupancy_counts_only_the_lot_spots() -> Result<(), AppError> {
        let mut store = ParkingStore::new();
        let lot_id = store.insert_lot("North", 2.0, at(0));
        let other = store.insert_lot("South", 2.0, at(0));
        for (index, occupied) in [true, true, false, false].into_iter().enumerate() {
            store.insert_spot(lot_id, None, &format!("N{index:02}"), occupied, at(0))?;
        }
        store.insert_spot(other, None, "S01", true, at(0))?;

        let occupancy = store.lot_occupancy(lot_id)?;

        assert_eq!(occupancy, LotOccupancy { total: 4, occupied: 2 });
        assert_eq!(occupancy.available(), 2);
        assert_eq!(occupancy.rate(), Some(0.5));
        Ok(())
    }

    #[test]
    fn empty_lot_has_no_rate() -> Result<(), AppError> {
        let mut store = ParkingStore::new();
        let lot_id = store.insert_lot("Empty", 2.0, at(0));

        assert_eq!(store.lot_occupancy(lot_id)?.rate(), None);
        Ok(())
    }

    #[test]
    fn occupancy_write_always_advances_timestamp() -> Result<(), AppError> {
        let mut store = ParkingStore::new();
        let lot_id = store.insert_lot("North", 2.0, at(0));
        let spot_id = store.insert_spot(lot_id, None, "A01", false, at(100))?;

        store.set_spot_occupancy(spot_id, true, at(100))?;

        let spot = store.spot(spot_id)?;
        assert!(spot.is_occupied);
        assert!(spot.last_updated > at(100));
        Ok(())
    }

    #[test]
    fn unknown_spot_write_is_not_found() {
        let mut store = ParkingStore::new();

        let result = store.set_spot_occupancy(42, true, at(1));

        assert!(matches!(result, Err(AppError::NotFound { entity: "spot", .. })));
    }

    #[test]
    fn history_is_filtered_by_spot_and_lot() -> Result<(), AppError> {
        let mut store = ParkingStore::new();
        let north = store.insert_lot("North", 2.0, at(0));
        let south = store.insert_lot("South", 2.0, at(0));
        let a = store.insert_spot(north, None, "A01", false, at(0))?;
        let b = store.insert_spot(south, None, "B01", false, at(0))?;
        for (spot_id, secs) in [(a, 10), (a, 20), (b, 30)] {
            store.append_history(ParkingHistory {
                spot_id,
                timestamp: at(secs),
                occupied: true,
                price: 2.0,
            })?;
        }

        assert_eq!(store.history_len(), 3);
        assert_eq!(store.history_for_spot(a).len(), 2);
        assert_eq!(store.history_for_lot(south).len(), 1);
        Ok(())
    }

    #[test]
    fn lot_price_must_be_positive() -> Result<(), AppError> {
        let mut store = ParkingStore::new();
        let lot_id = store.insert_lot("North", 2.0, at(0));

        let result = store.set_lot_price(lot_id, f64::NAN, at(5));
        store.set_lot_price(lot_id, 3.25, at(6))?;

        assert!(matches!(result, Err(AppError::Validation(_))));
        assert_eq!(store.lot(lot_id)?.current_price, 3.25);
        assert_eq!(store.lot(lot_id)?.last_updated, at(6));
        Ok(())
    }

    #[test]
    fn lot_timestamp_never_moves_backwards() -> Result<(), AppError> {
        let mut store = ParkingStore::new();
        let lot_id = store.insert_lot("North", 2.0, at(0));

        store.set_lot_price(lot_id, 3.0, at(20))?;
        store.set_lot_price(lot_id, 2.5, at(10))?;

        assert_eq!(store.lot(lot_id)?.current_price, 2.5);
        assert_eq!(store.lot(lot_id)?.last_updated, at(20));
        Ok(())
    }
}
