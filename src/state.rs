use crate::coordinator::UpdateCoordinator;
use crate::error::AppError;
use crate::estimation::PredictionProvider;
use crate::estimation::local::LocalEstimator;
use crate::recommend::RankingParams;
use crate::store::{LotId, ParkingStore};
use std::sync::{Arc, RwLock, RwLockReadGuard};

/// Handles shared by every request. Cheap to clone; everything is behind `Arc`.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<RwLock<ParkingStore>>,
    pub coordinator: Arc<UpdateCoordinator>,
    pub provider: Arc<dyn PredictionProvider>,
    /// Used for bulk ranking so `find-parking` never fans out to the external provider.
    pub local: LocalEstimator,
    pub ranking: RankingParams,
}

impl AppState {
    pub fn new(
        coordinator: Arc<UpdateCoordinator>,
        provider: Arc<dyn PredictionProvider>,
        local: LocalEstimator,
        ranking: RankingParams,
    ) -> Self {
        Self {
            store: Arc::clone(coordinator.store()),
            coordinator,
            provider,
            local,
            ranking,
        }
    }

    pub fn lot_id(&self) -> LotId {
        self.coordinator.lot_id()
    }

    pub fn read_store(&self) -> Result<RwLockReadGuard<'_, ParkingStore>, AppError> {
        self.store.read().map_err(|_| AppError::StateLock)
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("lot_id", &self.lot_id())
            .field("provider", &self.provider.name())
            .field("ranking", &self.ranking)
            .finish_non_exhaustive()
    }
}
