use async_trait::async_trait;
use config_manager::SystemConfig;
use fee_core::{FeeError, PriceFetcher};
use fee_orchestrator::{FeeReportService, IngestionError, IngestionOrchestrator, ReportError};
use ledger_client::FetchCache;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const CONTRACT: &str = "0x1234567890abcdef1234567890abcdef12345678";
const USDC: &str = "0xa0b86991c6218b36c1d19d4a2e9eb0ce3606eb48";

fn config_for(server: &MockServer) -> SystemConfig {
    let mut config = SystemConfig::default();
    config.etherscan.api_key = "test-key".to_string();
    config.etherscan.api_base_url = format!("{}/api", server.uri());
    config.etherscan.max_attempts = 2;
    config.etherscan.base_delay_ms = 10;
    config.etherscan.max_delay_ms = 20;
    config.etherscan.inter_category_delay_ms = 0;
    config.tracking.contract_address = CONTRACT.to_string();
    config
}

fn page(records: Vec<Value>) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "status": "1",
        "message": "OK",
        "result": records
    }))
}

fn no_transactions() -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "status": "0",
        "message": "No transactions found",
        "result": []
    }))
}

fn usdc_transfer(hash: &str, value: &str) -> Value {
    json!({
        "hash": hash,
        "timeStamp": "1735689660",
        "value": value,
        "from": "0x9999999999999999999999999999999999999999",
        "to": CONTRACT,
        "contractAddress": USDC,
        "tokenSymbol": "USDC",
        "tokenDecimal": "6",
        "blockNumber": "21525000"
    })
}

fn internal_transfer(hash: &str, value: &str) -> Value {
    json!({
        "hash": hash,
        "timeStamp": "1735700000",
        "value": value,
        "from": "0x8888888888888888888888888888888888888888",
        "to": CONTRACT,
        "blockNumber": "21526000",
        "isError": "0"
    })
}

async fn mount(server: &MockServer, action: &str, response: ResponseTemplate, expected: u64) {
    Mock::given(method("GET"))
        .and(path("/api"))
        .and(query_param("action", action))
        .respond_with(response)
        .expect(expected)
        .mount(server)
        .await;
}

struct FixedPrices(HashMap<String, f64>);

#[async_trait]
impl PriceFetcher for FixedPrices {
    async fn fetch_prices(&self, symbols: &[String]) -> fee_core::Result<HashMap<String, f64>> {
        Ok(symbols
            .iter()
            .filter_map(|s| self.0.get(s).map(|p| (s.clone(), *p)))
            .collect())
    }
}

struct UnavailablePrices;

#[async_trait]
impl PriceFetcher for UnavailablePrices {
    async fn fetch_prices(&self, _symbols: &[String]) -> fee_core::Result<HashMap<String, f64>> {
        Err(FeeError::PriceFetch("service unavailable".to_string()))
    }
}

#[tokio::test]
async fn test_single_usdc_transfer_reports_one_dollar() {
    let server = MockServer::start().await;
    mount(&server, "tokentx", page(vec![usdc_transfer("0xaaa", "1000000")]), 1).await;
    mount(&server, "txlistinternal", no_transactions(), 1).await;

    let mut prices = HashMap::new();
    prices.insert("USDC".to_string(), 1.0);

    let service = FeeReportService::new(
        IngestionOrchestrator::new(config_for(&server)),
        FixedPrices(prices),
    );
    let report = service.build_report().await.unwrap();

    let usdc = report.aggregation.get("USDC").unwrap();
    assert_eq!(usdc.count, 1);
    assert_eq!(usdc.total_amount, 1.0);
    assert_eq!(usdc.total_value_usd, 1.0);
    assert_eq!(report.total_usd(), 1.0);
    assert_eq!(report.recent_transactions.len(), 1);
    assert_eq!(report.recent_transactions[0].value_usd, 1.0);
}

#[tokio::test]
async fn test_cross_category_duplicate_counted_once() {
    let server = MockServer::start().await;
    mount(&server, "tokentx", page(vec![usdc_transfer("0xabc", "500")]), 1).await;
    mount(&server, "txlistinternal", page(vec![internal_transfer("0xabc", "500")]), 1).await;

    let orchestrator = IngestionOrchestrator::new(config_for(&server));
    let transactions = orchestrator.fetch_all_transactions().await.unwrap();

    assert_eq!(transactions.len(), 1);
    assert_eq!(transactions[0].hash, "0xabc");
    assert_eq!(transactions[0].token_symbol, "USDC");
}

#[tokio::test]
async fn test_critical_category_gets_one_extra_retry() {
    let server = MockServer::start().await;
    // Two attempts per fetch, two fetches for the critical category
    mount(&server, "tokentx", ResponseTemplate::new(500), 4).await;
    mount(
        &server,
        "txlistinternal",
        page(vec![internal_transfer("0xdef", "1000000000000000000")]),
        1,
    )
    .await;

    let orchestrator = IngestionOrchestrator::new(config_for(&server));
    let transactions = orchestrator.fetch_all_transactions().await.unwrap();

    assert_eq!(transactions.len(), 1);
    assert_eq!(transactions[0].token_symbol, "ETH");
    assert_eq!(transactions[0].token_decimal, 18);
}

#[tokio::test]
async fn test_non_critical_failure_is_isolated() {
    let server = MockServer::start().await;
    mount(&server, "tokentx", page(vec![usdc_transfer("0xaaa", "2500000")]), 1).await;
    mount(&server, "txlistinternal", ResponseTemplate::new(503), 2).await;

    let orchestrator = IngestionOrchestrator::new(config_for(&server));
    let transactions = orchestrator.fetch_all_transactions().await.unwrap();

    assert_eq!(transactions.len(), 1);
    assert_eq!(transactions[0].token_symbol, "USDC");
}

#[tokio::test]
async fn test_total_failure_yields_empty_list() {
    let server = MockServer::start().await;
    mount(&server, "tokentx", ResponseTemplate::new(500), 4).await;
    mount(&server, "txlistinternal", ResponseTemplate::new(500), 2).await;

    let orchestrator = IngestionOrchestrator::new(config_for(&server));
    let transactions = orchestrator.fetch_all_transactions().await.unwrap();

    assert!(transactions.is_empty());
}

#[tokio::test]
async fn test_missing_api_key_fails_before_any_request() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(no_transactions())
        .expect(0)
        .mount(&server)
        .await;

    let mut config = config_for(&server);
    config.etherscan.api_key = String::new();

    let orchestrator = IngestionOrchestrator::new(config.clone());
    let result = orchestrator.fetch_all_transactions().await;
    assert!(matches!(result, Err(IngestionError::MissingApiKey)));

    let service = FeeReportService::new(IngestionOrchestrator::new(config), UnavailablePrices);
    let result = service.build_report().await;
    assert!(matches!(result, Err(ReportError::Ingestion(IngestionError::MissingApiKey))));
}

#[tokio::test]
async fn test_parallel_dispatch_matches_sequential() {
    let server = MockServer::start().await;
    mount(&server, "tokentx", page(vec![usdc_transfer("0xaaa", "1000000")]), 1).await;
    mount(
        &server,
        "txlistinternal",
        page(vec![internal_transfer("0xbbb", "500000000000000000")]),
        1,
    )
    .await;

    let mut config = config_for(&server);
    config.etherscan.parallel_categories = true;

    let orchestrator = IngestionOrchestrator::new(config);
    let transactions = orchestrator.fetch_all_transactions().await.unwrap();

    // Policy order is kept regardless of completion order
    let hashes: Vec<&str> = transactions.iter().map(|t| t.hash.as_str()).collect();
    assert_eq!(hashes, vec!["0xaaa", "0xbbb"]);
}

#[tokio::test]
async fn test_normal_transfers_when_enabled() {
    let server = MockServer::start().await;
    mount(&server, "tokentx", no_transactions(), 1).await;
    mount(&server, "txlistinternal", no_transactions(), 1).await;

    let mut failed = internal_transfer("0xfail", "1000");
    failed["isError"] = json!("1");
    mount(
        &server,
        "txlist",
        page(vec![internal_transfer("0xok", "1000"), failed]),
        1,
    )
    .await;

    let mut config = config_for(&server);
    config.etherscan.include_normal_transactions = true;

    let orchestrator = IngestionOrchestrator::new(config);
    assert_eq!(orchestrator.policies().len(), 3);

    let transactions = orchestrator.fetch_all_transactions().await.unwrap();
    assert_eq!(transactions.len(), 1);
    assert_eq!(transactions[0].hash, "0xok");
}

#[tokio::test]
async fn test_shared_cache_serves_repeat_ingestion() {
    let server = MockServer::start().await;
    mount(&server, "tokentx", page(vec![usdc_transfer("0xaaa", "1000000")]), 1).await;
    mount(
        &server,
        "txlistinternal",
        page(vec![internal_transfer("0xbbb", "1000")]),
        1,
    )
    .await;

    let cache = Arc::new(FetchCache::new(Duration::from_secs(1800)));
    let first = IngestionOrchestrator::new(config_for(&server)).with_cache(cache.clone());
    let second = IngestionOrchestrator::new(config_for(&server)).with_cache(cache.clone());

    let a = first.fetch_all_transactions().await.unwrap();
    let b = second.fetch_all_transactions().await.unwrap();

    assert_eq!(a, b);
    assert_eq!(a.len(), 2);
    assert_eq!(cache.len(), 2);
    assert!(Arc::ptr_eq(first.cache(), second.cache()));
}

#[tokio::test]
async fn test_unpriced_report_keeps_counts() {
    let server = MockServer::start().await;
    mount(
        &server,
        "tokentx",
        page(vec![usdc_transfer("0x1", "1000000"), usdc_transfer("0x2", "3000000")]),
        1,
    )
    .await;
    mount(&server, "txlistinternal", no_transactions(), 1).await;

    let service = FeeReportService::new(IngestionOrchestrator::new(config_for(&server)), UnavailablePrices)
        .with_recent_limit(1);
    let report = service.build_report().await.unwrap();

    let usdc = report.aggregation.get("USDC").unwrap();
    assert_eq!(usdc.count, 2);
    assert_eq!(usdc.total_amount, 4.0);
    assert_eq!(usdc.total_value_usd, 0.0);
    assert_eq!(report.total_usd(), 0.0);
    assert_eq!(report.recent_transactions.len(), 1);
}

#[tokio::test]
async fn test_repeat_ingestion_reuses_client_and_cache() {
    let server = MockServer::start().await;
    mount(&server, "tokentx", page(vec![usdc_transfer("0xaaa", "1000000")]), 1).await;
    mount(
        &server,
        "txlistinternal",
        page(vec![internal_transfer("0xbbb", "1000")]),
        1,
    )
    .await;

    let orchestrator = IngestionOrchestrator::new(config_for(&server));
    let first = orchestrator.fetch_all_transactions().await.unwrap();
    let second = orchestrator.fetch_all_transactions().await.unwrap();

    assert_eq!(first, second);
    assert_eq!(first.len(), 2);
}

#[tokio::test]
async fn test_sequential_dispatch_pauses_between_categories() {
    let server = MockServer::start().await;
    mount(&server, "tokentx", no_transactions(), 1).await;
    mount(&server, "txlistinternal", no_transactions(), 1).await;

    let mut config = config_for(&server);
    config.etherscan.inter_category_delay_ms = 300;

    let orchestrator = IngestionOrchestrator::new(config);
    let start = Instant::now();
    let transactions = orchestrator.fetch_all_transactions().await.unwrap();

    assert!(transactions.is_empty());
    assert!(start.elapsed() >= Duration::from_millis(300));
}

#[tokio::test]
async fn test_parallel_dispatch_skips_the_pause() {
    let server = MockServer::start().await;
    mount(&server, "tokentx", no_transactions(), 1).await;
    mount(&server, "txlistinternal", no_transactions(), 1).await;

    let mut config = config_for(&server);
    config.etherscan.inter_category_delay_ms = 5_000;
    config.etherscan.parallel_categories = true;

    let orchestrator = IngestionOrchestrator::new(config);
    let start = Instant::now();
    orchestrator.fetch_all_transactions().await.unwrap();

    assert!(start.elapsed() < Duration::from_millis(5_000));
}
