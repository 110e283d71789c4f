use crate::state::AppState;
use axum::Router;
use axum::routing::{get, post};

pub mod handlers;
pub mod responses;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/status", get(handlers::get_status))
        .route("/api/update", post(handlers::post_update))
        .route("/api/predict/{spot_id}", get(handlers::get_predict))
        .route(
            "/api/predict-by-number/{spot_number}",
            get(handlers::get_predict_by_number),
        )
        .route("/api/find-parking", get(handlers::get_find_parking))
        .route("/api/pricing/history", get(handlers::get_pricing_history))
        .with_state(state)
}
