//! Initial lot layout.

use crate::config::AreaSection;
use crate::error::AppError;
use crate::store::{LotId, NewArea, ParkingStore};
use rand::Rng;
use std::time::SystemTime;
use tracing::info;

/// Built-in ten-area city layout used when the config lists no areas.
pub fn default_areas() -> Vec<AreaSection> {
    let layout: [(&str, &str, f64, f64, f64, f64); 10] = [
        ("Downtown Mall", "Shopping center parking", 5.0, 5.0, 20.0, 15.0),
        ("City Hospital", "Medical center parking", 30.0, 10.0, 18.0, 12.0),
        ("University Campus", "Student & faculty parking", 55.0, 8.0, 22.0, 14.0),
        ("Business District", "Office complex parking", 80.0, 12.0, 15.0, 10.0),
        ("Residential Zone A", "Apartment complex parking", 8.0, 35.0, 16.0, 12.0),
        ("Tech Park", "Technology companies parking", 35.0, 40.0, 20.0, 15.0),
        ("Sports Complex", "Stadium & gym parking", 65.0, 38.0, 18.0, 13.0),
        ("Airport Terminal", "Airport long-term parking", 10.0, 65.0, 25.0, 20.0),
        ("Train Station", "Public transit parking", 45.0, 70.0, 20.0, 15.0),
        ("Beach Resort", "Tourist area parking", 75.0, 68.0, 18.0, 16.0),
    ];
    layout
        .into_iter()
        .map(|(name, description, x, y, width, height)| AreaSection {
            name: name.to_string(),
            description: description.to_string(),
            x,
            y,
            width,
            height,
            spots: default_spot_count(name),
        })
        .collect()
}

fn default_spot_count(area_name: &str) -> u32 {
    if area_name.contains("Airport") || area_name.contains("Stadium") {
        8
    } else if area_name.contains("Hospital") || area_name.contains("University") {
        6
    } else {
        4
    }
}

/// Two-letter code from the area's capitals ("Downtown Mall" -> "DM").
pub fn area_code(area_name: &str) -> String {
    let capitals: String = area_name
        .chars()
        .filter(char::is_ascii_uppercase)
        .take(2)
        .collect();
    if capitals.len() == 2 {
        capitals
    } else {
        area_name
            .chars()
            .filter(char::is_ascii_alphanumeric)
            .take(2)
            .collect::<String>()
            .to_uppercase()
    }
}

/// Create a lot with its areas and spots. Initial occupancy is a fair coin per spot.
pub fn seed_lot<R: Rng>(
    store: &mut ParkingStore,
    lot_name: &str,
    base_price: f64,
    areas: &[AreaSection],
    rng: &mut R,
    now: SystemTime,
) -> Result<LotId, AppError> {
    let lot_id = store.insert_lot(lot_name, base_price, now);

    for area in areas {
        let area_id = store.insert_area(
            lot_id,
            NewArea {
                name: area.name.clone(),
                description: area.description.clone(),
                x: area.x,
                y: area.y,
                width: area.width,
                height: area.height,
            },
        )?;
        let code = area_code(&area.name);
        for index in 1..=area.spots {
            let occupied = rng.gen_bool(0.5);
            let spot_number = next_free_number(store, lot_id, &code, index);
            store.insert_spot(lot_id, Some(area_id), &spot_number, occupied, now)?;
        }
    }

    let occupancy = store.lot_occupancy(lot_id)?;
    info!(
        lot_id,
        lot_name,
        areas = areas.len(),
        spots = occupancy.total,
        available = occupancy.available(),
        "Parking lot seeded"
    );
    Ok(lot_id)
}

// Two areas can share a code; keep numbers unique within the lot.
fn next_free_number(store: &ParkingStore, lot_id: LotId, code: &str, index: u32) -> String {
    let mut candidate = index;
    loop {
        let number = format!("{code}{candidate:02}");
        if store.spot_by_number(lot_id, &number).is_none() {
            return number;
        }
        candidate += 1;
    }
}
