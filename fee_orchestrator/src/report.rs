use crate::{IngestionError, IngestionOrchestrator};
use chrono::{DateTime, Utc};
use fee_core::{aggregate_with_prices, recent_transactions, AggregationResult, FeeAggregator, PriceFetcher, PricedTransaction};
use serde::Serialize;
use thiserror::Error;
use tracing::info;

#[derive(Error, Debug)]
pub enum ReportError {
    #[error("Ingestion failed: {0}")]
    Ingestion(#[from] IngestionError),
}

/// Fee totals plus the most recent priced transactions
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeeReport {
    pub aggregation: AggregationResult,
    pub recent_transactions: Vec<PricedTransaction>,
    pub generated_at: DateTime<Utc>,
}

impl FeeReport {
    pub fn total_usd(&self) -> f64 {
        self.aggregation.grand_total_usd()
    }
}

/// Ingest, price and aggregate in one pass
pub struct FeeReportService<P: PriceFetcher> {
    ingestion: IngestionOrchestrator,
    aggregator: FeeAggregator<P>,
    recent_limit: usize,
}

impl<P: PriceFetcher> FeeReportService<P> {
    pub fn new(ingestion: IngestionOrchestrator, price_fetcher: P) -> Self {
        let recent_limit = ingestion.config().api.recent_transactions_limit;
        Self {
            ingestion,
            aggregator: FeeAggregator::new(price_fetcher),
            recent_limit,
        }
    }

    pub fn with_recent_limit(mut self, limit: usize) -> Self {
        self.recent_limit = limit;
        self
    }

    pub fn ingestion(&self) -> &IngestionOrchestrator {
        &self.ingestion
    }

    pub async fn build_report(&self) -> Result<FeeReport, ReportError> {
        let transactions = self.ingestion.fetch_all_transactions().await?;

        // One price lookup serves both the totals and the recent list
        let prices = self.aggregator.fetch_prices(&transactions).await;
        let aggregation = aggregate_with_prices(&transactions, &prices);
        let recent = recent_transactions(&transactions, &prices, self.recent_limit);

        info!(
            "📊 Fee report: {} transactions, ${:.2} total",
            aggregation.transaction_count(),
            aggregation.grand_total_usd()
        );

        Ok(FeeReport {
            aggregation,
            recent_transactions: recent,
            generated_at: Utc::now(),
        })
    }
}
