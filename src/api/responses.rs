use crate::pricing::HourlyPrice;
use crate::store::{AreaId, SpotId};
use serde::Serialize;

#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct StatusResponse {
    pub lot_name: String,
    pub total_spots: usize,
    pub available_spots: usize,
    pub occupancy_rate: f64,
    pub current_price: f64,
    pub base_price: f64,
    pub last_updated: String,
    pub area_stats: Vec<AreaStats>,
    pub spots: Vec<SpotStatus>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct SpotStatus {
    pub id: SpotId,
    pub spot_number: String,
    pub is_occupied: bool,
    pub last_updated: String,
    pub area_id: Option<AreaId>,
}

#[derive(Debug, Serialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub struct AreaStats {
    pub name: String,
    pub total: usize,
    pub available: usize,
    pub occupancy_rate: f64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct UpdateResponse {
    #[serde(flatten)]
    pub status: StatusResponse,
    pub cycle: CycleSummary,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct CycleSummary {
    pub timestamp: String,
    pub updated_spots: usize,
    pub failed_spots: Vec<CycleFailure>,
    pub occupancy_rate: f64,
    pub price: f64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct CycleFailure {
    pub spot_id: SpotId,
    pub reason: String,
}

#[derive(Debug, Serialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum PredictionSourceLabel {
    Local,
    External,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct PredictionBody {
    pub predicted_available: bool,
    pub confidence: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub occupancy_rate: Option<f64>,
    pub samples: usize,
    pub source: PredictionSourceLabel,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct PredictionResponse {
    #[serde(flatten)]
    pub prediction: PredictionBody,
    pub query_time: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct SpotPredictionResponse {
    pub spot_id: SpotId,
    pub spot_number: String,
    #[serde(flatten)]
    pub prediction: PredictionBody,
    pub query_time: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct FindParkingResponse {
    pub destination: String,
    pub total_available: usize,
    pub recommended_spots: Vec<RecommendedSpot>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct RecommendedSpot {
    pub spot: RecommendedSpotInfo,
    pub score: f64,
    pub proximity: f64,
    pub prediction: PredictionBody,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct RecommendedSpotInfo {
    pub id: SpotId,
    pub spot_number: String,
    pub area_id: Option<AreaId>,
    pub area_name: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct PricingHistoryResponse {
    pub pricing_history: Vec<HourlyPrice>,
    pub timestamp: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct ErrorResponse {
    pub error_code: ErrorCode,
    pub error_message: String,
    pub timestamp: String,
}

#[derive(Debug, Serialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    ValidationError,
    NotFound,
    CycleFailed,
    InternalError,
}
