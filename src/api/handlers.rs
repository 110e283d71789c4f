use crate::api::responses::{
    AreaStats, CycleFailure, CycleSummary, ErrorCode, ErrorResponse, FindParkingResponse,
    PredictionBody, PredictionResponse, PredictionSourceLabel, PricingHistoryResponse,
    RecommendedSpot, RecommendedSpotInfo, SpotPredictionResponse, SpotStatus, StatusResponse,
    UpdateResponse,
};
use crate::clock::{self, HOURS_PER_DAY};
use crate::coordinator::CycleReport;
use crate::error::AppError;
use crate::estimation::{Prediction, PredictionInput, PredictionSource};
use crate::pricing::hourly_price_history;
use crate::recommend::{self, Candidate};
use crate::state::AppState;
use crate::store::{ParkingHistory, ParkingSpot, ParkingStore, SpotId};
use axum::Json;
use axum::extract::rejection::QueryRejection;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use std::time::SystemTime;
use tracing::{error, warn};

const INTERNAL_ERROR_MESSAGE: &str = "Internal server error";

/// Client-facing wrapper around `AppError`.
#[derive(Debug)]
pub struct ApiError(pub AppError);

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        Self(err)
    }
}

impl ApiError {
    fn status_and_body(&self, now: SystemTime) -> (StatusCode, ErrorResponse) {
        let (status, error_code, error_message) = match &self.0 {
            AppError::Validation(message) => (
                StatusCode::BAD_REQUEST,
                ErrorCode::ValidationError,
                message.clone(),
            ),
            err @ AppError::NotFound { .. } => {
                (StatusCode::NOT_FOUND, ErrorCode::NotFound, err.to_string())
            }
            err @ AppError::FatalCycle(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorCode::CycleFailed,
                err.to_string(),
            ),
            AppError::Detection(_) | AppError::ExternalService(_) | AppError::StateLock => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorCode::InternalError,
                INTERNAL_ERROR_MESSAGE.to_string(),
            ),
        };
        (
            status,
            ErrorResponse {
                error_code,
                error_message,
                timestamp: clock::format_timestamp_lossy(now),
            },
        )
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = self.status_and_body(SystemTime::now());
        if status.is_server_error() {
            error!(error = %self.0, "Internal error while handling request");
        } else {
            warn!(error = %self.0, status = status.as_u16(), "Request rejected");
        }
        (status, Json(body)).into_response()
    }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

#[derive(Debug, Default, Deserialize)]
pub struct PredictQuery {
    pub time: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct FindParkingQuery {
    pub destination: Option<String>,
}

pub async fn get_status(State(state): State<AppState>) -> ApiResult<StatusResponse> {
    Ok(Json(build_status_response(&state)?))
}

pub async fn post_update(State(state): State<AppState>) -> ApiResult<UpdateResponse> {
    let coordinator = std::sync::Arc::clone(&state.coordinator);
    let report = tokio::task::spawn_blocking(move || coordinator.run_cycle())
        .await
        .map_err(|err| {
            error!(error = %err, "Update cycle task failed to complete");
            AppError::StateLock
        })??;

    Ok(Json(UpdateResponse {
        status: build_status_response(&state)?,
        cycle: cycle_summary(&report),
    }))
}

pub async fn get_predict(
    State(state): State<AppState>,
    Path(spot_id): Path<String>,
    query: Result<Query<PredictQuery>, QueryRejection>,
) -> ApiResult<PredictionResponse> {
    let spot_id = parse_spot_id(&spot_id)?;
    let query = parse_query(query)?;
    let query_time = parse_query_time(query.time.as_deref())?;
    let (spot, history) = {
        let store = state.read_store()?;
        let spot = find_spot_by_id(&store, &state, spot_id)?.clone();
        (spot, store.history_for_spot(spot_id))
    };

    let prediction = predict(&state, &spot, &history, query_time).await;
    Ok(Json(PredictionResponse {
        prediction: prediction_body(prediction),
        query_time: clock::format_timestamp_lossy(query_time),
    }))
}

pub async fn get_predict_by_number(
    State(state): State<AppState>,
    Path(spot_number): Path<String>,
    query: Result<Query<PredictQuery>, QueryRejection>,
) -> ApiResult<SpotPredictionResponse> {
    let query = parse_query(query)?;
    let query_time = parse_query_time(query.time.as_deref())?;
    let (spot, history) = {
        let store = state.read_store()?;
        let spot = find_spot_by_number(&store, &state, &spot_number)?.clone();
        let history = store.history_for_spot(spot.id);
        (spot, history)
    };

    let prediction = predict(&state, &spot, &history, query_time).await;
    Ok(Json(SpotPredictionResponse {
        spot_id: spot.id,
        spot_number: spot.spot_number,
        prediction: prediction_body(prediction),
        query_time: clock::format_timestamp_lossy(query_time),
    }))
}

pub async fn get_find_parking(
    State(state): State<AppState>,
    query: Result<Query<FindParkingQuery>, QueryRejection>,
) -> ApiResult<FindParkingResponse> {
    let query = parse_query(query)?;
    Ok(Json(build_find_parking_response(
        &state,
        query.destination.as_deref(),
        SystemTime::now(),
    )?))
}

pub async fn get_pricing_history(
    State(state): State<AppState>,
) -> ApiResult<PricingHistoryResponse> {
    Ok(Json(build_pricing_history_response(&state, SystemTime::now())?))
}

async fn predict(
    state: &AppState,
    spot: &ParkingSpot,
    history: &[ParkingHistory],
    query_time: SystemTime,
) -> Prediction {
    state
        .provider
        .predict(PredictionInput {
            spot,
            history,
            query_time,
        })
        .await
}

fn parse_query<T>(query: Result<Query<T>, QueryRejection>) -> Result<T, AppError> {
    query
        .map(|Query(query)| query)
        .map_err(|rejection| AppError::Validation(rejection.body_text()))
}

fn parse_spot_id(raw: &str) -> Result<SpotId, AppError> {
    raw.trim()
        .parse::<SpotId>()
        .map_err(|_| AppError::Validation(format!("invalid spot id {raw:?}")))
}

fn parse_query_time(raw: Option<&str>) -> Result<SystemTime, AppError> {
    match raw.map(str::trim).filter(|value| !value.is_empty()) {
        Some(value) => clock::parse_timestamp(value),
        None => Ok(SystemTime::now()),
    }
}

/// Spots of other lots are reported as missing.
fn find_spot_by_id<'a>(
    store: &'a ParkingStore,
    state: &AppState,
    spot_id: SpotId,
) -> Result<&'a ParkingSpot, AppError> {
    store
        .spot(spot_id)
        .ok()
        .filter(|spot| spot.lot_id == state.lot_id())
        .ok_or_else(|| AppError::not_found("spot", spot_id))
}

/// Spot number first, then a numeric id within the served lot.
fn find_spot_by_number<'a>(
    store: &'a ParkingStore,
    state: &AppState,
    spot_number: &str,
) -> Result<&'a ParkingSpot, AppError> {
    if let Some(spot) = store.spot_by_number(state.lot_id(), spot_number) {
        return Ok(spot);
    }
    spot_number
        .trim()
        .parse::<SpotId>()
        .ok()
        .and_then(|id| find_spot_by_id(store, state, id).ok())
        .ok_or_else(|| AppError::not_found("spot", spot_number.trim()))
}

pub(crate) fn build_status_response(state: &AppState) -> Result<StatusResponse, AppError> {
    let store = state.read_store()?;
    let lot_id = state.lot_id();
    let lot = store.lot(lot_id)?;
    let occupancy = store.lot_occupancy(lot_id)?;

    let area_stats = store
        .areas_for_lot(lot_id)
        .map(|area| {
            let (total, occupied) = store
                .spots_for_lot(lot_id)
                .filter(|spot| spot.area_id == Some(area.id))
                .fold((0usize, 0usize), |(total, occupied), spot| {
                    (total + 1, occupied + usize::from(spot.is_occupied))
                });
            AreaStats {
                name: area.name.clone(),
                total,
                available: total - occupied,
                occupancy_rate: rate(occupied, total),
            }
        })
        .collect();

    let spots = store
        .spots_for_lot(lot_id)
        .map(|spot| SpotStatus {
            id: spot.id,
            spot_number: spot.spot_number.clone(),
            is_occupied: spot.is_occupied,
            last_updated: clock::format_timestamp_lossy(spot.last_updated),
            area_id: spot.area_id,
        })
        .collect();

    Ok(StatusResponse {
        lot_name: lot.name.clone(),
        total_spots: occupancy.total,
        available_spots: occupancy.available(),
        occupancy_rate: occupancy.rate().unwrap_or(0.0),
        current_price: lot.current_price,
        base_price: lot.base_price,
        last_updated: clock::format_timestamp_lossy(lot.last_updated),
        area_stats,
        spots,
    })
}

fn rate(occupied: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        occupied as f64 / total as f64
    }
}

fn cycle_summary(report: &CycleReport) -> CycleSummary {
    CycleSummary {
        timestamp: clock::format_timestamp_lossy(report.timestamp),
        updated_spots: report.updated.len(),
        failed_spots: report
            .failures
            .iter()
            .map(|failure| CycleFailure {
                spot_id: failure.spot_id,
                reason: failure.reason.clone(),
            })
            .collect(),
        occupancy_rate: report.occupancy_rate,
        price: report.price,
    }
}

pub(crate) fn build_find_parking_response(
    state: &AppState,
    destination: Option<&str>,
    now: SystemTime,
) -> Result<FindParkingResponse, AppError> {
    let destination = destination
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .unwrap_or(recommend::MAIN_ENTRANCE)
        .to_string();

    let (candidates, target) = {
        let store = state.read_store()?;
        let lot_id = state.lot_id();
        let candidates: Vec<Candidate> = store
            .spots_for_lot(lot_id)
            .filter(|spot| !spot.is_occupied)
            .map(|spot| Candidate {
                spot: spot.clone(),
                area: spot.area_id.and_then(|id| store.area(id)).cloned(),
                prediction: state
                    .local
                    .estimate(&store.history_for_spot(spot.id), now),
            })
            .collect();
        let target = recommend::destination_point(store.areas_for_lot(lot_id), &destination);
        (candidates, target)
    };

    let total_available = candidates.len();
    let recommended_spots = recommend::rank(candidates, target, &state.ranking)
        .into_iter()
        .map(|ranked| {
            let Candidate {
                spot,
                area,
                prediction,
            } = ranked.candidate;
            RecommendedSpot {
                spot: RecommendedSpotInfo {
                    id: spot.id,
                    spot_number: spot.spot_number,
                    area_id: spot.area_id,
                    area_name: area.map(|area| area.name),
                },
                score: ranked.score,
                proximity: ranked.proximity,
                prediction: prediction_body(prediction),
            }
        })
        .collect();

    Ok(FindParkingResponse {
        destination,
        total_available,
        recommended_spots,
    })
}

pub(crate) fn build_pricing_history_response(
    state: &AppState,
    now: SystemTime,
) -> Result<PricingHistoryResponse, AppError> {
    let history = state.read_store()?.history_for_lot(state.lot_id());
    Ok(PricingHistoryResponse {
        pricing_history: hourly_price_history(&history, now, HOURS_PER_DAY),
        timestamp: clock::format_timestamp_lossy(now),
    })
}

fn prediction_body(prediction: Prediction) -> PredictionBody {
    PredictionBody {
        predicted_available: prediction.predicted_available,
        confidence: prediction.confidence,
        occupancy_rate: prediction.occupancy_rate,
        samples: prediction.samples,
        source: match prediction.source {
            PredictionSource::Local => PredictionSourceLabel::Local,
            PredictionSource::External => PredictionSourceLabel::External,
        },
        reasoning: prediction.reasoning,
        model: prediction.model,
    }
}
