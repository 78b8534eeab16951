// CoinGecko price client: current USD unit prices for a set of tickers

use async_trait::async_trait;
use config_manager::PriceConfig;
use fee_core::{FeeError, PriceFetcher, Result as FeeResult};
use reqwest::Client;
use retry_utils::{retry_with_backoff, RetryConfig, RetryableError};
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Error, Debug)]
pub enum PriceClientError {
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Invalid price data: {0}")]
    InvalidPriceData(String),
    #[error("Rate limit exceeded")]
    RateLimit,
}

impl PriceClientError {
    fn retry_class(&self) -> RetryableError {
        match self {
            PriceClientError::RateLimit => RetryableError::RateLimit,
            PriceClientError::Http(e) if e.is_timeout() || e.is_connect() => RetryableError::Timeout,
            PriceClientError::Http(_) | PriceClientError::InvalidPriceData(_) => {
                RetryableError::ServerError
            }
            PriceClientError::Json(_) => RetryableError::Other,
        }
    }
}

/// `{"ethereum": {"usd": 3000.0}, ...}`
type SimplePriceResponse = HashMap<String, HashMap<String, f64>>;

/// CoinGecko `simple/price` client
#[derive(Debug, Clone)]
pub struct CoinGeckoPriceClient {
    http_client: Client,
    base_url: String,
    api_key: String,
    /// Upper-cased ticker -> CoinGecko id
    symbol_ids: HashMap<String, String>,
    retry: RetryConfig,
}

impl CoinGeckoPriceClient {
    pub fn new(config: &PriceConfig) -> Result<Self, PriceClientError> {
        let http_client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_seconds))
            .build()?;

        let symbol_ids = config
            .symbol_ids
            .iter()
            .map(|(symbol, id)| (symbol.to_uppercase(), id.clone()))
            .collect();

        Ok(Self {
            http_client,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            symbol_ids,
            retry: RetryConfig {
                max_attempts: 3,
                base_delay_ms: 500,
                max_delay_ms: 2000,
            },
        })
    }

    pub fn with_retry_config(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Current USD price per ticker. Tickers without a known id, or that the
    /// API does not price, are absent from the result.
    pub async fn get_usd_prices(&self, symbols: &[String]) -> Result<HashMap<String, f64>, PriceClientError> {
        let mut ids_by_symbol: HashMap<String, String> = HashMap::new();
        for symbol in symbols {
            let symbol = symbol.to_uppercase();
            match self.symbol_ids.get(&symbol) {
                Some(id) => {
                    ids_by_symbol.insert(symbol, id.clone());
                }
                None => debug!("No price id configured for {}", symbol),
            }
        }

        if ids_by_symbol.is_empty() {
            return Ok(HashMap::new());
        }

        let mut ids: Vec<&str> = ids_by_symbol.values().map(String::as_str).collect();
        ids.sort_unstable();
        ids.dedup();
        let ids_param = ids.join(",");

        let response = retry_with_backoff(
            || self.fetch_simple_price(&ids_param),
            &self.retry,
            PriceClientError::retry_class,
        )
        .await?;

        let prices: HashMap<String, f64> = ids_by_symbol
            .into_iter()
            .filter_map(|(symbol, id)| {
                let price = response.get(&id).and_then(|quote| quote.get("usd")).copied();
                if price.is_none() {
                    warn!("Price API returned no USD price for {} ({})", symbol, id);
                }
                price.map(|p| (symbol, p))
            })
            .collect();

        debug!("✅ Fetched {} prices", prices.len());
        Ok(prices)
    }

    async fn fetch_simple_price(&self, ids: &str) -> Result<SimplePriceResponse, PriceClientError> {
        let url = format!("{}/simple/price", self.base_url);
        let mut request = self
            .http_client
            .get(&url)
            .query(&[("ids", ids), ("vs_currencies", "usd")]);

        if !self.api_key.is_empty() {
            request = request.header("x-cg-demo-api-key", &self.api_key);
        }

        let response = request.send().await?;
        let status = response.status();

        if status.as_u16() == 429 {
            return Err(PriceClientError::RateLimit);
        }
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(PriceClientError::InvalidPriceData(format!("HTTP {}: {}", status, text)));
        }

        let text = response.text().await?;
        Ok(serde_json::from_str(&text)?)
    }
}

#[async_trait]
impl PriceFetcher for CoinGeckoPriceClient {
    async fn fetch_prices(&self, symbols: &[String]) -> FeeResult<HashMap<String, f64>> {
        self.get_usd_prices(symbols)
            .await
            .map_err(|e| FeeError::PriceFetch(e.to_string()))
    }
}
