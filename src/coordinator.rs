//! One detection -> persist -> price -> history pass over a lot.
//!
//! The detector lives inside the cycle mutex: holding the lock is the
//! Updating state, so overlapping cycle requests for the same lot queue
//! instead of interleaving. Readers of the store are never blocked for more
//! than a single row write.

use crate::clock;
use crate::detection::OccupancyDetector;
use crate::error::AppError;
use crate::pricing::PricingCalculator;
use crate::store::{LotId, ParkingHistory, ParkingStore, SpotId};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock, TryLockError};
use std::time::{Duration, Instant, SystemTime};
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CyclePhase {
    Idle,
    Updating,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SpotFailure {
    pub spot_id: SpotId,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CycleReport {
    pub lot_id: LotId,
    pub timestamp: SystemTime,
    pub updated: Vec<(SpotId, bool)>,
    pub failures: Vec<SpotFailure>,
    pub occupancy_rate: f64,
    pub price: f64,
}

pub struct UpdateCoordinator {
    lot_id: LotId,
    store: Arc<RwLock<ParkingStore>>,
    pricing: PricingCalculator,
    detector: Mutex<Box<dyn OccupancyDetector>>,
}

impl UpdateCoordinator {
    pub fn new(
        lot_id: LotId,
        store: Arc<RwLock<ParkingStore>>,
        pricing: PricingCalculator,
        detector: Box<dyn OccupancyDetector>,
    ) -> Self {
        Self {
            lot_id,
            store,
            pricing,
            detector: Mutex::new(detector),
        }
    }

    pub fn lot_id(&self) -> LotId {
        self.lot_id
    }

    pub fn store(&self) -> &Arc<RwLock<ParkingStore>> {
        &self.store
    }

    pub fn phase(&self) -> CyclePhase {
        match self.detector.try_lock() {
            Ok(_) => CyclePhase::Idle,
            Err(TryLockError::WouldBlock) => CyclePhase::Updating,
            Err(TryLockError::Poisoned(_)) => CyclePhase::Idle,
        }
    }

    /// Run a full cycle stamped with the time the cycle lock was acquired.
    pub fn run_cycle(&self) -> Result<CycleReport, AppError> {
        let mut detector = self.detector.lock().map_err(|_| AppError::StateLock)?;
        self.cycle_locked(&mut **detector, SystemTime::now())
    }

    /// Run a full cycle stamped with `now`.
    ///
    /// Per-spot detection or write failures are logged and skipped. A pricing
    /// failure aborts the cycle before the lot price or any history row is
    /// written.
    pub fn run_cycle_at(&self, now: SystemTime) -> Result<CycleReport, AppError> {
        let mut detector = self.detector.lock().map_err(|_| AppError::StateLock)?;
        self.cycle_locked(&mut **detector, now)
    }

    fn cycle_locked(
        &self,
        detector: &mut dyn OccupancyDetector,
        now: SystemTime,
    ) -> Result<CycleReport, AppError> {
        let started = Instant::now();

        let spots = {
            let guard = self.store.read().map_err(|_| AppError::StateLock)?;
            guard.lot(self.lot_id)?;
            guard
                .spots_for_lot(self.lot_id)
                .cloned()
                .collect::<Vec<_>>()
        };
        debug!(lot_id = self.lot_id, spots = spots.len(), "Update cycle started");

        let mut updated = Vec::with_capacity(spots.len());
        let mut failures = Vec::new();
        for spot in &spots {
            let occupied = match detector.detect(spot, now) {
                Ok(occupied) => occupied,
                Err(err) => {
                    warn!(
                        spot_id = spot.id,
                        spot_number = %spot.spot_number,
                        error = %err,
                        "Detection failed, keeping previous state"
                    );
                    failures.push(SpotFailure {
                        spot_id: spot.id,
                        reason: err.to_string(),
                    });
                    continue;
                }
            };

            let write = self
                .store
                .write()
                .map_err(|_| AppError::StateLock)
                .and_then(|mut guard| guard.set_spot_occupancy(spot.id, occupied, now));
            match write {
                Ok(()) => updated.push((spot.id, occupied)),
                Err(err) => {
                    warn!(
                        spot_id = spot.id,
                        spot_number = %spot.spot_number,
                        error = %err,
                        "Spot write failed"
                    );
                    failures.push(SpotFailure {
                        spot_id: spot.id,
                        reason: err.to_string(),
                    });
                }
            }
        }

        let occupancy = {
            let guard = self.store.read().map_err(|_| AppError::StateLock)?;
            guard.lot_occupancy(self.lot_id)?
        };
        let price = occupancy
            .rate()
            .ok_or_else(|| AppError::FatalCycle(format!("lot {} has no spots", self.lot_id)))
            .and_then(|rate| {
                self.pricing
                    .price(rate, clock::hour_of_day(now))
                    .map_err(|err| AppError::FatalCycle(err.to_string()))
            })
            .inspect_err(|err| {
                error!(
                    lot_id = self.lot_id,
                    error = %err,
                    "Price computation failed, cycle aborted"
                );
            })?;

        {
            let mut guard = self.store.write().map_err(|_| AppError::StateLock)?;
            guard
                .set_lot_price(self.lot_id, price, now)
                .map_err(|err| AppError::FatalCycle(err.to_string()))?;
            for (spot_id, occupied) in &updated {
                guard.append_history(ParkingHistory {
                    spot_id: *spot_id,
                    timestamp: now,
                    occupied: *occupied,
                    price,
                })?;
            }
        }

        let occupancy_rate = occupancy.rate().unwrap_or(0.0);
        info!(
            lot_id = self.lot_id,
            updated = updated.len(),
            failed = failures.len(),
            available = occupancy.available(),
            occupancy_rate,
            price,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Update cycle complete"
        );

        Ok(CycleReport {
            lot_id: self.lot_id,
            timestamp: now,
            updated,
            failures,
            occupancy_rate,
            price,
        })
    }
}

impl std::fmt::Debug for UpdateCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpdateCoordinator")
            .field("lot_id", &self.lot_id)
            .field("phase", &self.phase())
            .finish()
    }
}

/// Spawn the periodic refresh thread that runs a cycle every `interval`.
pub fn spawn_refresh_thread(
    coordinator: Arc<UpdateCoordinator>,
    interval: Duration,
    stop: Arc<AtomicBool>,
) -> std::thread::JoinHandle<()> {
    std::thread::spawn(move || {
        while !stop.load(Ordering::Relaxed) {
            let cycle_start = Instant::now();

            if let Err(err) = coordinator.run_cycle() {
                warn!(error = %err, "Scheduled update cycle failed");
            }

            sleep_with_stop(interval, &stop, cycle_start);
        }
        debug!("Refresh thread stopped");
    })
}

fn sleep_with_stop(duration: Duration, stop: &AtomicBool, start: Instant) {
    let elapsed = start.elapsed();
    if elapsed >= duration {
        return;
    }
    let remaining = duration - elapsed;
    let step = Duration::from_millis(100).min(remaining);
    let mut slept = Duration::ZERO;

    while slept < remaining {
        if stop.load(Ordering::Relaxed) {
            break;
        }
        std::thread::sleep(step);
        slept += step;
    }
}
