use chrono::{DateTime, Utc};
use fee_core::{CurrencyBreakdown, PricedTransaction};
use fee_orchestrator::FeeReport;
use serde::Serialize;
use std::collections::HashMap;

/// Standard API error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
    pub timestamp: DateTime<Utc>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: error.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Standard API success response
#[derive(Debug, Serialize)]
pub struct SuccessResponse<T> {
    pub data: T,
    pub timestamp: DateTime<Utc>,
}

impl<T> SuccessResponse<T> {
    pub fn new(data: T) -> Self {
        Self {
            data,
            timestamp: Utc::now(),
        }
    }
}

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
}

/// Per-currency totals and their USD sum
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeeSummary {
    pub currencies: HashMap<String, CurrencyBreakdown>,
    pub total_usd: f64,
}

/// `GET /api/fees` body
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeesResponse {
    pub success: bool,
    pub data: FeeSummary,
    pub recent_transactions: Vec<PricedTransaction>,
    pub timestamp: DateTime<Utc>,
}

impl From<FeeReport> for FeesResponse {
    fn from(report: FeeReport) -> Self {
        let total_usd = report.total_usd();
        Self {
            success: true,
            data: FeeSummary {
                currencies: report.aggregation.breakdowns,
                total_usd,
            },
            recent_transactions: report.recent_transactions,
            timestamp: report.generated_at,
        }
    }
}
