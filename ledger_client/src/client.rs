use crate::{
    cache::FetchCache,
    error::LedgerError,
    types::{LedgerClientConfig, LedgerEnvelope, RawLedgerRecord, TransactionCategory, NO_TRANSACTIONS_MESSAGE},
};
use reqwest::Client;
use retry_utils::{retry_with_backoff, RetryConfig};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};
use url::Url;

/// Highest block number requested; the upstream clamps it to the chain head
pub const END_BLOCK: u64 = 99_999_999;

/// Outcome of a single successful HTTP exchange
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    /// Upstream reported "No transactions found"
    NoResults,
    Records(Vec<RawLedgerRecord>),
}

impl FetchOutcome {
    pub fn into_records(self) -> Vec<RawLedgerRecord> {
        match self {
            FetchOutcome::NoResults => Vec::new(),
            FetchOutcome::Records(records) => records,
        }
    }
}

/// Etherscan-style ledger API client with retry and an optional response cache
#[derive(Debug, Clone)]
pub struct LedgerClient {
    client: Client,
    config: LedgerClientConfig,
    retry: RetryConfig,
    cache: Option<Arc<FetchCache>>,
}

impl LedgerClient {
    /// Create a client. Refuses to build without an API key so no
    /// unauthenticated request is ever sent.
    pub fn with_config(config: LedgerClientConfig) -> Result<Self, LedgerError> {
        if config.api_key.trim().is_empty() {
            return Err(LedgerError::MissingApiKey);
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .connect_timeout(Duration::from_secs(10))
            .user_agent(config.user_agent.clone())
            .pool_idle_timeout(Duration::from_secs(90))
            .build()?;

        Ok(Self {
            client,
            config,
            retry: RetryConfig::default(),
            cache: None,
        })
    }

    pub fn with_cache(mut self, cache: Arc<FetchCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn with_retry_config(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn cache(&self) -> Option<&Arc<FetchCache>> {
        self.cache.as_ref()
    }

    /// Query URL for one category against `address`, full block range, ascending
    pub fn build_url(&self, category: TransactionCategory, address: &str) -> String {
        let chain_id = self.config.chain_id.to_string();
        let end_block = END_BLOCK.to_string();
        let params = [
            ("chainid", chain_id.as_str()),
            ("module", "account"),
            ("action", category.action()),
            ("address", address),
            ("startblock", "0"),
            ("endblock", end_block.as_str()),
            ("sort", "asc"),
            ("apikey", self.config.api_key.as_str()),
        ];

        match Url::parse_with_params(&self.config.base_url, &params) {
            Ok(url) => url.to_string(),
            Err(e) => {
                warn!("Invalid ledger base URL '{}': {}", self.config.base_url, e);
                let query: Vec<String> = params.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
                format!("{}?{}", self.config.base_url, query.join("&"))
            }
        }
    }

    /// Fetch one category for `address`
    pub async fn fetch_category(
        &self,
        category: TransactionCategory,
        address: &str,
        max_attempts: u32,
    ) -> Result<Vec<RawLedgerRecord>, LedgerError> {
        let url = self.build_url(category, address);
        info!("📡 Fetching {} records for {}", category, address);
        self.fetch_records(&url, max_attempts).await
    }

    /// Fetch the result list behind `url`, retrying with capped exponential
    /// backoff. Fresh cache entries short-circuit the network.
    pub async fn fetch_records(
        &self,
        url: &str,
        max_attempts: u32,
    ) -> Result<Vec<RawLedgerRecord>, LedgerError> {
        if let Some(cache) = &self.cache {
            if let Some(records) = cache.get(url) {
                debug!("Fetch cache hit ({} records): {}", records.len(), self.masked(url));
                return Ok(records);
            }
        }

        let retry = self.retry.clone().with_max_attempts(max_attempts);
        let outcome = retry_with_backoff(|| self.fetch_once(url), &retry, LedgerError::retry_class).await?;

        match outcome {
            FetchOutcome::NoResults => {
                debug!("No transactions found: {}", self.masked(url));
                Ok(Vec::new())
            }
            FetchOutcome::Records(records) => {
                if let Some(cache) = &self.cache {
                    cache.insert(url, records.clone());
                    cache.purge_expired();
                }
                Ok(records)
            }
        }
    }

    /// Single GET + envelope validation
    async fn fetch_once(&self, url: &str) -> Result<FetchOutcome, LedgerError> {
        debug!("🌐 GET {}", self.masked(url));

        let start_time = std::time::Instant::now();
        let response = self.client.get(url).send().await?;
        let status = response.status();
        debug!("📨 Response status: {} in {:.2}s", status, start_time.elapsed().as_secs_f64());

        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            error!("❌ Ledger API error - Status: {}, Body: {}", status, text);

            return Err(match status.as_u16() {
                429 => LedgerError::RateLimit,
                code => LedgerError::HttpStatus { status: code, body: text },
            });
        }

        let response_text = response.text().await?;
        parse_envelope(&response_text)
    }

    fn masked(&self, url: &str) -> String {
        mask_api_key(url, &self.config.api_key)
    }
}

/// Validate an upstream envelope body
pub fn parse_envelope(body: &str) -> Result<FetchOutcome, LedgerError> {
    let envelope: LedgerEnvelope = match serde_json::from_str(body) {
        Ok(envelope) => envelope,
        Err(e) => {
            let sample: String = body.chars().take(500).collect();
            error!("❌ Failed to parse ledger response: {} (sample: {})", e, sample);
            return Err(LedgerError::JsonError(e));
        }
    };

    if envelope.status != "1" {
        if envelope.message.trim() == NO_TRANSACTIONS_MESSAGE {
            return Ok(FetchOutcome::NoResults);
        }

        let message = match envelope.result.as_str() {
            Some(detail) if !detail.is_empty() => format!("{}: {}", envelope.message, detail),
            _ if envelope.message.is_empty() => "Unknown API error".to_string(),
            _ => envelope.message.clone(),
        };
        error!("❌ Ledger API returned error status: {}", message);
        return Err(LedgerError::ApiError { message });
    }

    let records = match envelope.result {
        serde_json::Value::Array(items) => {
            let total = items.len();
            let records: Vec<RawLedgerRecord> = items
                .into_iter()
                .filter_map(|item| match serde_json::from_value(item) {
                    Ok(record) => Some(record),
                    Err(e) => {
                        warn!("Skipping malformed ledger record: {}", e);
                        None
                    }
                })
                .collect();
            debug!("Parsed {}/{} ledger records", records.len(), total);
            records
        }
        other => {
            warn!("Ledger result is not a list ({}), treating as empty", other);
            Vec::new()
        }
    };

    Ok(FetchOutcome::Records(records))
}

/// Replace the `apikey` query value in a URL for logging
pub fn mask_api_key(url: &str, api_key: &str) -> String {
    let Ok(mut parsed) = Url::parse(url) else {
        if api_key.is_empty() {
            return url.to_string();
        }
        return url.replace(api_key, "***");
    };

    let pairs: Vec<(String, String)> = parsed
        .query_pairs()
        .into_owned()
        .map(|(key, value)| {
            if key == "apikey" {
                (key, "***".to_string())
            } else {
                (key, value)
            }
        })
        .collect();

    if pairs.is_empty() {
        return parsed.to_string();
    }

    parsed.query_pairs_mut().clear().extend_pairs(pairs);
    parsed.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> LedgerClientConfig {
        LedgerClientConfig {
            api_key: "test-key".to_string(),
            base_url: "https://api.etherscan.io/v2/api".to_string(),
            chain_id: 1,
            timeout_seconds: 5,
            user_agent: "fee-tracker-test".to_string(),
        }
    }

    #[test]
    fn test_missing_api_key_is_rejected() {
        let mut cfg = config();
        cfg.api_key = "  ".to_string();
        assert!(matches!(LedgerClient::with_config(cfg), Err(LedgerError::MissingApiKey)));
    }

    #[test]
    fn test_build_url() {
        let client = LedgerClient::with_config(config()).unwrap();
        let url = client.build_url(
            TransactionCategory::TokenTransfer,
            "0x742d35cc6131b2f6e7f4c3b5e8a8c8d8f0b4c4e3",
        );

        let parsed = Url::parse(&url).unwrap();
        let pairs: std::collections::HashMap<_, _> = parsed.query_pairs().into_owned().collect();
        assert_eq!(pairs["chainid"], "1");
        assert_eq!(pairs["module"], "account");
        assert_eq!(pairs["action"], "tokentx");
        assert_eq!(pairs["startblock"], "0");
        assert_eq!(pairs["endblock"], "99999999");
        assert_eq!(pairs["sort"], "asc");
        assert_eq!(pairs["apikey"], "test-key");

        let internal = client.build_url(TransactionCategory::InternalTransfer, "0xabc");
        assert!(internal.contains("action=txlistinternal"));
    }

    #[test]
    fn test_no_transactions_found_is_empty_not_error() {
        let body = r#"{"status":"0","message":"No transactions found","result":[]}"#;
        assert_eq!(parse_envelope(body).unwrap(), FetchOutcome::NoResults);
    }

    #[test]
    fn test_error_status_carries_upstream_message() {
        let body = r#"{"status":"0","message":"NOTOK","result":"Max rate limit reached"}"#;
        match parse_envelope(body) {
            Err(LedgerError::ApiError { message }) => {
                assert!(message.contains("NOTOK"));
                assert!(message.contains("Max rate limit reached"));
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[test]
    fn test_non_list_result_is_empty() {
        let body = r#"{"status":"1","message":"OK","result":"unexpected"}"#;
        assert_eq!(parse_envelope(body).unwrap(), FetchOutcome::Records(vec![]));

        let body = r#"{"status":"1","message":"OK"}"#;
        assert_eq!(parse_envelope(body).unwrap(), FetchOutcome::Records(vec![]));
    }

    #[test]
    fn test_records_parse_with_defaults() {
        let body = r#"{"status":"1","message":"OK","result":[
            {"hash":"0x1","timeStamp":"1735689600","value":"1000000","from":"0xa","to":"0xb",
             "contractAddress":"0xc","tokenSymbol":"USDC","tokenDecimal":"6","blockNumber":"100"},
            {"hash":"0x2","timeStamp":"1735689601","value":"5"}
        ]}"#;

        let records = parse_envelope(body).unwrap().into_records();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].token_decimal, "6");
        assert_eq!(records[0].contract_address, "0xc");
        assert_eq!(records[1].token_decimal, "");
        assert_eq!(records[1].to, "");
    }

    #[test]
    fn test_invalid_json_is_an_error() {
        assert!(matches!(parse_envelope("<html>"), Err(LedgerError::JsonError(_))));
    }

    #[test]
    fn test_mask_api_key() {
        assert_eq!(
            mask_api_key("https://x/api?apikey=secret&a=1", "secret"),
            "https://x/api?apikey=***&a=1"
        );
    }

    #[test]
    fn test_mask_api_key_with_reserved_characters() {
        let mut cfg = config();
        cfg.api_key = "ab+c/d=e&f g%".to_string();
        let client = LedgerClient::with_config(cfg).unwrap();

        let url = client.build_url(TransactionCategory::TokenTransfer, "0xabc");
        let masked = client.masked(&url);

        assert!(masked.contains("apikey=***"));
        assert!(!masked.contains("ab%2Bc"));
        assert!(!masked.contains("ab+c"));
        assert!(masked.contains("action=tokentx"));
        assert!(masked.contains("address=0xabc"));
    }
}
