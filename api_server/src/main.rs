use anyhow::Context;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use config_manager::SystemConfig;
use fee_core::PriceFetcher;
use fee_orchestrator::{FeeReportService, IngestionOrchestrator, ReportError};
use price_client::CoinGeckoPriceClient;
use std::sync::Arc;
use std::time::Instant;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tracing::{error, info, warn};

mod handlers;
mod types;

use handlers::*;
use types::*;

/// Price source behind the report service
pub type SharedPriceFetcher = Arc<dyn PriceFetcher>;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub report_service: Arc<FeeReportService<SharedPriceFetcher>>,
    pub started_at: Instant,
}

/// Main application error type
#[derive(thiserror::Error, Debug)]
pub enum ApiError {
    #[error("Report error: {0}")]
    Report(#[from] ReportError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        // Details stay in the logs
        error!("❌ Failed to build fee report: {}", self);

        let body = Json(ErrorResponse::new("Failed to fetch fee data"));
        (StatusCode::INTERNAL_SERVER_ERROR, body).into_response()
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,api_server=debug".into()),
        )
        .init();

    info!("Starting Fee Tracker API Server...");

    // Load configuration
    let config = SystemConfig::load().context("Failed to load configuration")?;
    config.validate().context("Invalid configuration")?;
    if !config.etherscan.has_api_key() {
        warn!("⚠️ FEE__ETHERSCAN__API_KEY is not set, /api/fees will fail until it is configured");
    }
    info!("Configuration loaded successfully");

    let price_client = CoinGeckoPriceClient::new(&config.price).context("Failed to build price client")?;
    let report_service = FeeReportService::new(
        IngestionOrchestrator::new(config.clone()),
        Arc::new(price_client) as SharedPriceFetcher,
    );
    info!("Fee report service initialized");

    let app_state = AppState {
        report_service: Arc::new(report_service),
        started_at: Instant::now(),
    };

    let app = create_router(app_state);

    info!("📋 Available endpoints:");
    info!("   • GET /api/fees - Aggregated fee totals and recent transactions");
    info!("   • GET /health - Health check");

    // Bind and serve
    let bind_addr = format!("{}:{}", config.api.host, config.api.port);
    info!("Starting server on {}", bind_addr);

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", bind_addr))?;
    info!("Server listening on {}", bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}

/// Create the main application router
fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/api/fees", get(get_fees))
        .layer(
            ServiceBuilder::new()
                .layer(CorsLayer::permissive())
                .into_inner(),
        )
        .with_state(state)
}
