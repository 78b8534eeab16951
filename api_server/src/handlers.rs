use crate::types::*;
use crate::{ApiError, AppState};
use axum::{
    extract::State,
    http::{header, HeaderValue},
    response::{IntoResponse, Json, Response},
};
use tracing::{debug, info};

/// Fee data must never be served from an intermediary cache
pub const NO_STORE: &str = "no-store, no-cache, must-revalidate, max-age=0";

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    Json(SuccessResponse::new(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.started_at.elapsed().as_secs(),
    }))
}

/// Aggregated fee totals plus the most recent transactions
pub async fn get_fees(State(state): State<AppState>) -> Response {
    info!("📥 Fee report requested");

    let mut response = match state.report_service.build_report().await {
        Ok(report) => {
            debug!(
                "Serving fee report with {} currencies",
                report.aggregation.breakdowns.len()
            );
            Json(FeesResponse::from(report)).into_response()
        }
        Err(e) => ApiError::from(e).into_response(),
    };

    response
        .headers_mut()
        .insert(header::CACHE_CONTROL, HeaderValue::from_static(NO_STORE));
    response
}
