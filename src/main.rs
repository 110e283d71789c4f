use rand::SeedableRng;
use rand::rngs::StdRng;
use smart_parking::api;
use smart_parking::config::{self, Config};
use smart_parking::coordinator::{self, UpdateCoordinator};
use smart_parking::detection::{DiurnalProfile, SimulatedDetector};
use smart_parking::estimation::{self, local::LocalEstimator};
use smart_parking::pricing::PricingCalculator;
use smart_parking::recommend::RankingParams;
use smart_parking::state::AppState;
use smart_parking::store::{ParkingStore, seed};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::time::SystemTime;
use tracing::Level;

fn init_tracing(level: &str) {
    let parsed = level.parse::<Level>().ok();
    let subscriber = tracing_subscriber::fmt()
        .with_target(false)
        .with_max_level(parsed.unwrap_or(Level::INFO))
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);
    if parsed.is_none() {
        tracing::warn!(level, "Unknown log level in config, using info");
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config_path = config::resolve_path();
    let config = match config::load_from_path(&config_path) {
        Ok(config) => config,
        Err(err) => {
            init_tracing("info");
            tracing::error!(path = %config_path.display(), error = %err, "Failed to load config");
            return Err(err.into());
        }
    };
    init_tracing(&config.logging.level);
    tracing::info!(
        config_path = %config_path.display(),
        app = %config.app.name,
        "smart-parking starting"
    );

    let detection = config.detection();
    let profile = DiurnalProfile::from_config(&detection);
    let (mut seed_rng, detector) = match detection.seed {
        Some(seed) => (
            StdRng::seed_from_u64(seed),
            SimulatedDetector::seeded(seed.wrapping_add(1), profile),
        ),
        None => (StdRng::from_entropy(), SimulatedDetector::from_entropy(profile)),
    };

    let store = Arc::new(RwLock::new(ParkingStore::new()));
    let lot_id = seed_store(&config, &store, &mut seed_rng)?;

    let pricing = PricingCalculator::new(config.pricing_config())?;
    let coordinator = Arc::new(UpdateCoordinator::new(
        lot_id,
        Arc::clone(&store),
        pricing,
        Box::new(detector),
    ));

    let provider = estimation::build_provider(&config);
    let state = AppState::new(
        Arc::clone(&coordinator),
        provider,
        LocalEstimator::from_config(&config.prediction()),
        RankingParams::from_config(&config.recommendation()),
    );

    // Periodic refresh (detection -> price -> history)
    let stop_flag = Arc::new(AtomicBool::new(false));
    let refresh_handle = match config.refresh_interval() {
        Some(interval) => {
            tracing::info!(interval_secs = interval.as_secs(), "Starting refresh thread");
            Some(coordinator::spawn_refresh_thread(
                Arc::clone(&coordinator),
                interval,
                Arc::clone(&stop_flag),
            ))
        }
        None => {
            tracing::info!("Refresh thread disabled, cycles run on POST /api/update only");
            None
        }
    };

    let app = api::router(state);
    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port()));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "API server listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    stop_flag.store(true, Ordering::Relaxed);
    if let Some(handle) = refresh_handle
        && handle.join().is_err()
    {
        tracing::warn!("Refresh thread panicked");
    }
    tracing::info!("smart-parking stopped");

    Ok(())
}

fn seed_store(
    config: &Config,
    store: &Arc<RwLock<ParkingStore>>,
    rng: &mut StdRng,
) -> Result<smart_parking::store::LotId, Box<dyn std::error::Error>> {
    let areas = if config.areas().is_empty() {
        tracing::info!("No areas configured, using built-in city layout");
        seed::default_areas()
    } else {
        config.areas().to_vec()
    };
    let mut guard = store
        .write()
        .map_err(|_| smart_parking::error::AppError::StateLock)?;
    let lot_id = seed::seed_lot(
        &mut guard,
        config.lot_name(),
        config.base_price(),
        &areas,
        rng,
        SystemTime::now(),
    )?;
    Ok(lot_id)
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
