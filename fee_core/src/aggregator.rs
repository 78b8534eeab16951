use crate::{AggregationResult, PriceFetcher, PricedTransaction, Transaction};
use std::collections::{BTreeSet, HashMap};
use tracing::{debug, info, warn};

/// Converts deduplicated transactions to per-symbol USD breakdowns
pub struct FeeAggregator<P: PriceFetcher> {
    price_fetcher: P,
}

impl<P: PriceFetcher> FeeAggregator<P> {
    pub fn new(price_fetcher: P) -> Self {
        Self { price_fetcher }
    }

    /// Look up current prices for every distinct symbol in one batch call.
    /// A failed lookup degrades to an empty price map.
    pub async fn fetch_prices(&self, transactions: &[Transaction]) -> HashMap<String, f64> {
        let symbols: Vec<String> = transactions
            .iter()
            .map(|tx| tx.token_symbol.to_uppercase())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        if symbols.is_empty() {
            return HashMap::new();
        }

        debug!("Fetching prices for symbols: {:?}", symbols);

        match self.price_fetcher.fetch_prices(&symbols).await {
            Ok(prices) => prices
                .into_iter()
                .map(|(symbol, price)| (symbol.to_uppercase(), price))
                .collect(),
            Err(e) => {
                warn!("Price lookup failed, treating all symbols as unpriced: {}", e);
                HashMap::new()
            }
        }
    }

    /// Aggregate transactions into per-symbol breakdowns
    pub async fn aggregate(&self, transactions: &[Transaction]) -> AggregationResult {
        let prices = self.fetch_prices(transactions).await;
        aggregate_with_prices(transactions, &prices)
    }
}

fn price_for(prices: &HashMap<String, f64>, symbol: &str) -> f64 {
    prices
        .get(&symbol.to_uppercase())
        .copied()
        .filter(|p| p.is_finite() && *p > 0.0)
        .unwrap_or(0.0)
}

/// Aggregate with an already resolved price map. Unpriced symbols still
/// accumulate count and amount but contribute no USD value.
pub fn aggregate_with_prices(
    transactions: &[Transaction],
    prices: &HashMap<String, f64>,
) -> AggregationResult {
    let mut result = AggregationResult::default();

    for tx in transactions {
        let amount = tx.amount();
        let price = price_for(prices, &tx.token_symbol);

        let breakdown = result
            .breakdowns
            .entry(tx.token_symbol.clone())
            .or_default();
        breakdown.count += 1;
        breakdown.total_amount += amount;
        breakdown.total_value_usd += amount * price;
        breakdown.price_usd = price;
    }

    for (symbol, breakdown) in &result.breakdowns {
        if breakdown.price_usd == 0.0 {
            warn!("No price available for {}, USD value counted as 0", symbol);
        }
    }

    info!(
        "Aggregated {} transactions into {} currencies, total ${:.2}",
        transactions.len(),
        result.breakdowns.len(),
        result.grand_total_usd()
    );

    result
}

/// Annotate transactions with their USD value
pub fn price_transactions(
    transactions: &[Transaction],
    prices: &HashMap<String, f64>,
) -> Vec<PricedTransaction> {
    transactions
        .iter()
        .map(|tx| {
            let amount = tx.amount();
            PricedTransaction {
                transaction: tx.clone(),
                amount,
                value_usd: amount * price_for(prices, &tx.token_symbol),
            }
        })
        .collect()
}

/// The `limit` most recent transactions by timestamp, newest first, priced
pub fn recent_transactions(
    transactions: &[Transaction],
    prices: &HashMap<String, f64>,
    limit: usize,
) -> Vec<PricedTransaction> {
    let mut sorted: Vec<Transaction> = transactions.to_vec();
    sorted.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    sorted.truncate(limit);
    price_transactions(&sorted, prices)
}
