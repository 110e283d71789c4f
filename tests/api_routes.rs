use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde_json::Value;
use smart_parking::api;
use smart_parking::coordinator::UpdateCoordinator;
use smart_parking::detection::mock::{MockDetection, ScriptedDetector};
use smart_parking::estimation::local::LocalEstimator;
use smart_parking::pricing::{PricingCalculator, PricingConfig};
use smart_parking::recommend::RankingParams;
use smart_parking::state::AppState;
use smart_parking::store::{ParkingStore, seed};
use std::sync::{Arc, RwLock};
use std::time::{Duration, UNIX_EPOCH};
use tower::ServiceExt;

type TestResult = Result<(), Box<dyn std::error::Error>>;

fn app(script: Vec<MockDetection>) -> Result<Router, Box<dyn std::error::Error>> {
    let mut store = ParkingStore::new();
    let mut rng = StdRng::seed_from_u64(11);
    let lot_id = seed::seed_lot(
        &mut store,
        "Smart City Parking Network",
        2.0,
        &seed::default_areas(),
        &mut rng,
        UNIX_EPOCH + Duration::from_secs(60),
    )?;
    let coordinator = Arc::new(UpdateCoordinator::new(
        lot_id,
        Arc::new(RwLock::new(store)),
        PricingCalculator::new(PricingConfig::with_base_price(2.0))?,
        Box::new(ScriptedDetector::new(script)),
    ));
    let local = LocalEstimator::with_defaults();
    Ok(api::router(AppState::new(
        coordinator,
        Arc::new(local.clone()),
        local,
        RankingParams::default(),
    )))
}

async fn send(
    app: Router,
    method: &str,
    uri: &str,
) -> Result<(StatusCode, Value), Box<dyn std::error::Error>> {
    let request = Request::builder().method(method).uri(uri).body(Body::empty())?;
    let response = app.oneshot(request).await?;
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await?;
    Ok((status, serde_json::from_slice(&bytes)?))
}

#[tokio::test]
async fn status_lists_every_spot() -> TestResult {
    let (status, body) = send(app(Vec::new())?, "GET", "/api/status").await?;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["lot_name"], "Smart City Parking Network");
    assert_eq!(body["total_spots"], 48);
    assert_eq!(body["spots"].as_array().map(Vec::len), Some(48));
    assert_eq!(body["area_stats"].as_array().map(Vec::len), Some(10));
    assert_eq!(body["current_price"], 2.0);
    Ok(())
}

#[tokio::test]
async fn update_runs_a_cycle_and_returns_status() -> TestResult {
    let (status, body) = send(
        app(vec![MockDetection::Occupied; 48])?,
        "POST",
        "/api/update",
    )
    .await?;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["available_spots"], 0);
    assert_eq!(body["occupancy_rate"], 1.0);
    assert_eq!(body["cycle"]["updated_spots"], 48);
    assert_eq!(body["cycle"]["failed_spots"].as_array().map(Vec::len), Some(0));
    assert_eq!(body["cycle"]["price"], body["current_price"]);
    Ok(())
}

#[tokio::test]
async fn update_reports_failed_spots() -> TestResult {
    let (status, body) = send(
        app(vec![MockDetection::Fail, MockDetection::Vacant])?,
        "POST",
        "/api/update",
    )
    .await?;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["cycle"]["updated_spots"], 47);
    assert_eq!(body["cycle"]["failed_spots"][0]["spot_id"], 1);
    Ok(())
}

#[tokio::test]
async fn predict_without_history_returns_default_confidence() -> TestResult {
    let (status, body) = send(
        app(Vec::new())?,
        "GET",
        "/api/predict/1?time=2026-01-11T14:00:00Z",
    )
    .await?;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["predicted_available"], true);
    assert_eq!(body["confidence"], 0.5);
    assert!(body.get("occupancy_rate").is_none());
    assert_eq!(body["source"], "local");
    assert_eq!(body["query_time"], "2026-01-11T14:00:00Z");
    Ok(())
}

#[tokio::test]
async fn predict_unknown_spot_is_not_found() -> TestResult {
    let (status, body) = send(app(Vec::new())?, "GET", "/api/predict/999").await?;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error_code"], "NOT_FOUND");
    assert!(body["timestamp"].is_string());
    Ok(())
}

#[tokio::test]
async fn predict_rejects_malformed_input() -> TestResult {
    let (id_status, id_body) = send(app(Vec::new())?, "GET", "/api/predict/abc").await?;
    let (time_status, time_body) =
        send(app(Vec::new())?, "GET", "/api/predict/1?time=yesterday").await?;

    assert_eq!(id_status, StatusCode::BAD_REQUEST);
    assert_eq!(id_body["error_code"], "VALIDATION_ERROR");
    assert_eq!(time_status, StatusCode::BAD_REQUEST);
    assert_eq!(time_body["error_code"], "VALIDATION_ERROR");
    Ok(())
}

#[tokio::test]
async fn unparseable_query_string_returns_json_error() -> TestResult {
    let (predict_status, predict_body) = send(
        app(Vec::new())?,
        "GET",
        "/api/predict/1?time=2026-01-01T00:00:00Z&time=x",
    )
    .await?;
    let (by_number_status, by_number_body) = send(
        app(Vec::new())?,
        "GET",
        "/api/predict-by-number/DM01?time=a&time=b",
    )
    .await?;
    let (find_status, find_body) = send(
        app(Vec::new())?,
        "GET",
        "/api/find-parking?destination=Mall&destination=Park",
    )
    .await?;

    for (status, body) in [
        (predict_status, predict_body),
        (by_number_status, by_number_body),
        (find_status, find_body),
    ] {
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error_code"], "VALIDATION_ERROR");
        assert!(body["error_message"].is_string());
        assert!(body["timestamp"].is_string());
    }
    Ok(())
}

#[tokio::test]
async fn predict_by_number_is_case_insensitive() -> TestResult {
    let (status, body) = send(app(Vec::new())?, "GET", "/api/predict-by-number/dm01").await?;
    let (missing, _) = send(app(Vec::new())?, "GET", "/api/predict-by-number/XX42").await?;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["spot_number"], "DM01");
    assert_eq!(body["spot_id"], 1);
    assert_eq!(missing, StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn find_parking_ranks_best_first() -> TestResult {
    let app = app(Vec::new())?;
    send(app.clone(), "POST", "/api/update").await?;

    let (status, body) = send(
        app,
        "GET",
        "/api/find-parking?destination=Airport%20Terminal",
    )
    .await?;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["destination"], "Airport Terminal");
    let spots = body["recommended_spots"].as_array().cloned().unwrap_or_default();
    assert_eq!(body["total_available"], 48);
    assert_eq!(spots.len(), 3);
    let scores: Vec<f64> = spots.iter().filter_map(|spot| spot["score"].as_f64()).collect();
    assert!(scores.windows(2).all(|pair| pair[0] >= pair[1]));
    assert!(spots.iter().all(|spot| spot["spot"]["area_name"] == "Airport Terminal"));
    Ok(())
}

#[tokio::test]
async fn find_parking_is_empty_when_full() -> TestResult {
    let app = app(vec![MockDetection::Occupied; 48])?;
    let (update_status, _) = send(app.clone(), "POST", "/api/update").await?;

    let (status, body) = send(app, "GET", "/api/find-parking").await?;

    assert_eq!(update_status, StatusCode::OK);
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total_available"], 0);
    assert_eq!(body["recommended_spots"], serde_json::json!([]));
    Ok(())
}

#[tokio::test]
async fn pricing_history_has_24_buckets() -> TestResult {
    let app = app(Vec::new())?;
    send(app.clone(), "POST", "/api/update").await?;

    let (status, body) = send(app, "GET", "/api/pricing/history").await?;

    assert_eq!(status, StatusCode::OK);
    let buckets = body["pricing_history"].as_array().cloned().unwrap_or_default();
    assert_eq!(buckets.len(), 24);
    assert_eq!(buckets[0]["samples"], 48);
    assert!(buckets[0]["price"].is_number());
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn overlapping_updates_leave_every_spot_consistent() -> TestResult {
    let mut script = vec![MockDetection::Occupied; 48];
    script.extend(vec![MockDetection::Vacant; 48]);
    let app = app(script)?;

    let (first, second) = tokio::join!(
        send(app.clone(), "POST", "/api/update"),
        send(app.clone(), "POST", "/api/update"),
    );
    let (first, first_body) = first?;
    let (second, second_body) = second?;

    assert_eq!(first, StatusCode::OK);
    assert_eq!(second, StatusCode::OK);
    assert_eq!(first_body["cycle"]["updated_spots"], 48);
    assert_eq!(second_body["cycle"]["updated_spots"], 48);

    let (status, body) = send(app.clone(), "GET", "/api/status").await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["available_spots"], 48);
    let spots = body["spots"].as_array().cloned().unwrap_or_default();
    assert_eq!(spots.len(), 48);
    assert!(spots
        .iter()
        .all(|spot| spot["is_occupied"] == false && spot["last_updated"].is_string()));

    // The vacant cycle ran second and nothing touched the lot after it.
    let last = [&first_body, &second_body]
        .into_iter()
        .find(|response| response["cycle"]["occupancy_rate"] == 0.0)
        .ok_or("no response reports the vacant cycle")?;
    assert_eq!(last["available_spots"], 48);
    assert_eq!(body["last_updated"], last["last_updated"]);
    assert_eq!(body["current_price"], last["cycle"]["price"]);

    let (_, history) = send(app, "GET", "/api/pricing/history").await?;
    let samples: u64 = history["pricing_history"]
        .as_array()
        .into_iter()
        .flatten()
        .filter_map(|bucket| bucket["samples"].as_u64())
        .sum();
    assert_eq!(samples, 96);
    Ok(())
}
