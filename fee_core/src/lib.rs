pub mod aggregator;
pub mod value_parser;

pub use aggregator::{aggregate_with_prices, price_transactions, recent_transactions, FeeAggregator};
pub use value_parser::{parse_decimals, parse_token_amount, DEFAULT_TOKEN_DECIMALS};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FeeError {
    #[error("Price fetching error: {0}")]
    PriceFetch(String),
}

pub type Result<T> = std::result::Result<T, FeeError>;

/// Normalized incoming transfer to the tracked contract
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    /// Transaction hash. Unique per (hash, value), not across categories.
    pub hash: String,

    /// Block time in epoch milliseconds
    pub timestamp: i64,

    /// Amount in the asset's smallest unit, not scaled by decimals
    pub value: String,

    /// Canonical ticker
    pub token_symbol: String,

    pub token_decimal: u32,

    pub from: String,

    pub to: String,

    /// Fixed network tag
    pub network: String,

    pub block_number: u64,
}

impl Transaction {
    /// Scaled amount (`value / 10^token_decimal`)
    pub fn amount(&self) -> f64 {
        parse_token_amount(&self.value, self.token_decimal)
    }
}

/// Per-symbol aggregate
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CurrencyBreakdown {
    /// Number of transactions
    pub count: u64,

    /// Summed scaled native amount
    pub total_amount: f64,

    /// Summed USD value
    pub total_value_usd: f64,

    /// Unit price used for the conversion (0 when unpriced)
    pub price_usd: f64,
}

/// Aggregated fees keyed by canonical ticker
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AggregationResult {
    pub breakdowns: HashMap<String, CurrencyBreakdown>,
}

impl AggregationResult {
    /// Sum of every breakdown's USD value
    pub fn grand_total_usd(&self) -> f64 {
        self.breakdowns.values().map(|b| b.total_value_usd).sum()
    }

    pub fn transaction_count(&self) -> u64 {
        self.breakdowns.values().map(|b| b.count).sum()
    }

    pub fn get(&self, symbol: &str) -> Option<&CurrencyBreakdown> {
        self.breakdowns.get(symbol)
    }
}

/// Transaction annotated with its USD value at the current price
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PricedTransaction {
    #[serde(flatten)]
    pub transaction: Transaction,

    /// Scaled amount
    pub amount: f64,

    pub value_usd: f64,
}

/// Trait for fetching current unit prices
#[async_trait]
pub trait PriceFetcher: Send + Sync {
    /// Fetch current USD prices for a set of upper-cased tickers.
    /// Symbols without a price are absent from the map (or zero).
    async fn fetch_prices(&self, symbols: &[String]) -> Result<HashMap<String, f64>>;
}

#[async_trait]
impl<T: PriceFetcher + ?Sized> PriceFetcher for std::sync::Arc<T> {
    async fn fetch_prices(&self, symbols: &[String]) -> Result<HashMap<String, f64>> {
        (**self).fetch_prices(symbols).await
    }
}

/// Drop repeated (hash, value) pairs, keeping the first occurrence in list order
pub fn dedup_transactions(transactions: Vec<Transaction>) -> Vec<Transaction> {
    let mut seen: HashSet<(String, String)> = HashSet::with_capacity(transactions.len());

    transactions
        .into_iter()
        .filter(|tx| seen.insert((tx.hash.clone(), tx.value.clone())))
        .collect()
}

/// Count transactions per ticker
pub fn count_by_symbol(transactions: &[Transaction]) -> HashMap<String, usize> {
    let mut counts = HashMap::new();
    for tx in transactions {
        *counts.entry(tx.token_symbol.clone()).or_insert(0) += 1;
    }
    counts
}


#[cfg(test)]
mod tests {
    use super::test_support::tx;
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_dedup_keeps_first_occurrence() {
        let transactions = vec![
            tx("0xabc", "500", "USDC", 6, 1),
            tx("0xdef", "100", "ETH", 18, 2),
            tx("0xabc", "500", "ETH", 18, 3),
            tx("0xabc", "700", "USDC", 6, 4),
        ];

        let unique = dedup_transactions(transactions);

        assert_eq!(unique.len(), 3);
        assert_eq!(unique[0].timestamp, 1);
        assert_eq!(unique[1].hash, "0xdef");
        assert_eq!(unique[2].value, "700");
    }

    #[test]
    fn test_dedup_is_idempotent() {
        let transactions = vec![
            tx("0x1", "1", "USDC", 6, 1),
            tx("0x1", "1", "USDC", 6, 2),
            tx("0x2", "1", "USDC", 6, 3),
            tx("0x3", "9", "ETH", 18, 4),
            tx("0x2", "1", "ETH", 18, 5),
        ];

        let once = dedup_transactions(transactions);
        let twice = dedup_transactions(once.clone());

        assert_eq!(once, twice);
        let hashes: Vec<_> = once.iter().map(|t| t.hash.as_str()).collect();
        assert_eq!(hashes, vec!["0x1", "0x2", "0x3"]);
    }

    #[test]
    fn prop_dedup_is_idempotent_and_keeps_first() {
        let strategy =
            prop::collection::vec((0u8..8, prop::sample::select(vec!["1", "500", "700"]), 0i64..100), 0..40);

        proptest!(|(rows in strategy)| {
            let transactions: Vec<Transaction> = rows
                .iter()
                .map(|(hash, value, ts)| tx(&format!("0x{}", hash), value, "USDC", 6, *ts))
                .collect();

            let once = dedup_transactions(transactions.clone());
            let twice = dedup_transactions(once.clone());
            prop_assert_eq!(&once, &twice);

            // Exactly the first occurrence of every distinct (hash, value), in input order
            let mut seen = HashSet::new();
            let expected: Vec<Transaction> = transactions
                .into_iter()
                .filter(|t| seen.insert((t.hash.clone(), t.value.clone())))
                .collect();
            prop_assert_eq!(once, expected);
        });
    }

    #[test]
    fn test_count_by_symbol() {
        let transactions = vec![
            tx("0x1", "1", "USDC", 6, 1),
            tx("0x2", "1", "USDC", 6, 2),
            tx("0x3", "1", "ETH", 18, 3),
        ];
        let counts = count_by_symbol(&transactions);
        assert_eq!(counts.get("USDC"), Some(&2));
        assert_eq!(counts.get("ETH"), Some(&1));
    }

    #[test]
    fn test_transaction_serializes_camel_case() {
        let json = serde_json::to_value(tx("0x1", "1", "USDC", 6, 1)).unwrap();
        assert_eq!(json["tokenSymbol"], "USDC");
        assert_eq!(json["tokenDecimal"], 6);
        assert_eq!(json["blockNumber"], 1);
    }

    #[test]
    fn test_grand_total_is_sum_of_breakdowns() {
        let mut result = AggregationResult::default();
        result.breakdowns.insert(
            "USDC".to_string(),
            CurrencyBreakdown { count: 2, total_amount: 3.0, total_value_usd: 3.0, price_usd: 1.0 },
        );
        result.breakdowns.insert(
            "ETH".to_string(),
            CurrencyBreakdown { count: 1, total_amount: 0.5, total_value_usd: 1500.0, price_usd: 3000.0 },
        );

        assert_eq!(result.grand_total_usd(), 1503.0);
        assert_eq!(result.transaction_count(), 3);
    }
}
