use config_manager::SystemConfig;
use fee_core::{count_by_symbol, dedup_transactions, Transaction};
use futures::future::join_all;
use ledger_client::{FetchCache, LedgerClient, LedgerClientConfig, LedgerError, TransactionNormalizer};
use retry_utils::RetryConfig;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

pub mod policy;
pub mod report;

pub use policy::CategoryPolicy;
pub use report::{FeeReport, FeeReportService, ReportError};

#[derive(Error, Debug)]
pub enum IngestionError {
    #[error("Ledger API key is not configured (set FEE__ETHERSCAN__API_KEY)")]
    MissingApiKey,
}

pub type Result<T> = std::result::Result<T, IngestionError>;

/// Fetches every enabled category for the tracked contract, normalizes,
/// merges and deduplicates the results
pub struct IngestionOrchestrator {
    config: SystemConfig,
    cache: Arc<FetchCache>,
    /// Absent when no API key is configured or the HTTP client failed to build
    client: Option<LedgerClient>,
    normalizer: TransactionNormalizer,
    policies: Vec<CategoryPolicy>,
}

impl IngestionOrchestrator {
    pub fn new(config: SystemConfig) -> Self {
        let cache = Arc::new(FetchCache::new(Duration::from_secs(
            config.etherscan.cache_ttl_seconds,
        )));
        let normalizer = TransactionNormalizer::from_config(&config.tracking);
        let policies = CategoryPolicy::from_config(&config.etherscan);

        let client = match build_client(&config, cache.clone()) {
            Ok(client) => Some(client),
            Err(LedgerError::MissingApiKey) => None,
            Err(e) => {
                error!("❌ Failed to build ledger client: {}", e);
                None
            }
        };

        Self {
            config,
            cache,
            client,
            normalizer,
            policies,
        }
    }

    /// Share a fetch cache with other orchestrators
    pub fn with_cache(mut self, cache: Arc<FetchCache>) -> Self {
        self.client = self.client.map(|client| client.with_cache(cache.clone()));
        self.cache = cache;
        self
    }

    /// Ledger client reused across ingestion runs
    pub fn ledger_client(&self) -> Option<&LedgerClient> {
        self.client.as_ref()
    }

    pub fn cache(&self) -> &Arc<FetchCache> {
        &self.cache
    }

    pub fn policies(&self) -> &[CategoryPolicy] {
        &self.policies
    }

    pub fn config(&self) -> &SystemConfig {
        &self.config
    }

    /// All qualifying transactions across categories, deduplicated by
    /// (hash, value). Only a missing API key is an error; upstream failures
    /// shrink the result instead.
    pub async fn fetch_all_transactions(&self) -> Result<Vec<Transaction>> {
        if !self.config.etherscan.has_api_key() {
            return Err(IngestionError::MissingApiKey);
        }
        let Some(client) = &self.client else {
            error!("❌ Ledger client unavailable, no transactions fetched");
            return Ok(Vec::new());
        };

        info!(
            "🚀 Fetching {} categories for contract {}",
            self.policies.len(),
            self.config.tracking.contract_address
        );

        let outcomes = if self.config.etherscan.parallel_categories {
            let futures = self
                .policies
                .iter()
                .map(|policy| self.fetch_with_policy(client, policy));
            join_all(futures).await
        } else {
            let delay = Duration::from_millis(self.config.etherscan.inter_category_delay_ms);
            let mut outcomes = Vec::with_capacity(self.policies.len());
            for (index, policy) in self.policies.iter().enumerate() {
                if index > 0 && !delay.is_zero() {
                    sleep(delay).await;
                }
                outcomes.push(self.fetch_with_policy(client, policy).await);
            }
            outcomes
        };

        let mut merged = Vec::new();
        for (policy, outcome) in self.policies.iter().zip(outcomes) {
            match outcome {
                Ok(transactions) => {
                    debug!("{}: {} transactions", policy.category, transactions.len());
                    merged.extend(transactions);
                }
                Err(e) => error!("❌ Giving up on {} transactions: {}", policy.category, e),
            }
        }

        let fetched = merged.len();
        let transactions = dedup_transactions(merged);
        if transactions.len() < fetched {
            debug!("Removed {} duplicate transactions", fetched - transactions.len());
        }

        self.log_summary(&transactions);
        Ok(transactions)
    }

    async fn fetch_with_policy(
        &self,
        client: &LedgerClient,
        policy: &CategoryPolicy,
    ) -> std::result::Result<Vec<Transaction>, LedgerError> {
        match self.fetch_and_normalize(client, policy).await {
            Err(e) if policy.critical => {
                warn!("⚠️ {} fetch failed ({}), retrying once more", policy.category, e);
                self.fetch_and_normalize(client, policy).await
            }
            outcome => outcome,
        }
    }

    async fn fetch_and_normalize(
        &self,
        client: &LedgerClient,
        policy: &CategoryPolicy,
    ) -> std::result::Result<Vec<Transaction>, LedgerError> {
        let records = client
            .fetch_category(
                policy.category,
                &self.config.tracking.contract_address,
                policy.max_attempts,
            )
            .await?;
        Ok(self.normalizer.normalize(policy.category, records))
    }

    fn log_summary(&self, transactions: &[Transaction]) {
        let counts = count_by_symbol(transactions);
        info!("✅ Ingested {} unique transactions", transactions.len());

        let mut symbols: Vec<_> = counts.iter().collect();
        symbols.sort();
        for (symbol, count) in symbols {
            info!("  {}: {} transactions", symbol, count);
        }

        for symbol in self.normalizer.tracked_symbols() {
            if !counts.contains_key(&symbol) {
                warn!("⚠️ No {} transactions found for tracked contract", symbol);
            }
        }
    }
}

fn build_client(
    config: &SystemConfig,
    cache: Arc<FetchCache>,
) -> std::result::Result<LedgerClient, LedgerError> {
    let etherscan = &config.etherscan;
    let retry = RetryConfig {
        max_attempts: etherscan.max_attempts,
        base_delay_ms: etherscan.base_delay_ms,
        max_delay_ms: etherscan.max_delay_ms,
    };

    Ok(LedgerClient::with_config(LedgerClientConfig::from(etherscan))?
        .with_retry_config(retry)
        .with_cache(cache))
}
