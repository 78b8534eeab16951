use crate::types::{RawLedgerRecord, TransactionCategory};
use config_manager::TrackingConfig;
use fee_core::value_parser::is_positive_raw_value;
use fee_core::{parse_decimals, Transaction, DEFAULT_TOKEN_DECIMALS};
use tracing::{debug, info};

/// Why a raw record was dropped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    BeforeCutoff,
    InvalidTimestamp,
    WrongRecipient,
    NonPositiveValue,
    UntrackedToken,
    FailedCall,
}

/// Maps raw upstream records to [`Transaction`]s, applying the shared
/// filters (cutoff, recipient, positive value) plus per-category rules.
#[derive(Debug, Clone)]
pub struct TransactionNormalizer {
    contract_address: String,
    network: String,
    cutoff_ms: i64,
    native_symbol: String,
    tracked_tokens: Vec<TrackedTokenRule>,
}

#[derive(Debug, Clone)]
struct TrackedTokenRule {
    contract_address: String,
    symbol: String,
    symbol_alias: Option<String>,
}

impl TransactionNormalizer {
    pub fn from_config(config: &TrackingConfig) -> Self {
        let rule = |token: &config_manager::TrackedToken| TrackedTokenRule {
            contract_address: token.contract_address.to_lowercase(),
            symbol: token.symbol.to_uppercase(),
            symbol_alias: token.symbol_alias.as_ref().map(|a| a.to_uppercase()),
        };

        Self {
            contract_address: config.contract_address.to_lowercase(),
            network: config.network.clone(),
            cutoff_ms: config.cutoff_timestamp.timestamp_millis(),
            native_symbol: config.native_symbol.to_uppercase(),
            tracked_tokens: vec![rule(&config.stablecoin), rule(&config.wrapped_native)],
        }
    }

    /// Normalize one category's records, dropping everything that fails a filter
    pub fn normalize(
        &self,
        category: TransactionCategory,
        records: Vec<RawLedgerRecord>,
    ) -> Vec<Transaction> {
        let total = records.len();
        let transactions: Vec<Transaction> = records
            .iter()
            .filter_map(|record| match self.normalize_record(category, record) {
                Ok(tx) => Some(tx),
                Err(reason) => {
                    debug!("Dropping {} record {}: {:?}", category, record.hash, reason);
                    None
                }
            })
            .collect();

        info!(
            "🧹 {}: kept {} of {} records after filtering",
            category,
            transactions.len(),
            total
        );

        transactions
    }

    /// Normalize a single record
    pub fn normalize_record(
        &self,
        category: TransactionCategory,
        record: &RawLedgerRecord,
    ) -> Result<Transaction, RejectReason> {
        let timestamp = record
            .time_stamp
            .trim()
            .parse::<i64>()
            .map_err(|_| RejectReason::InvalidTimestamp)?
            .checked_mul(1000)
            .ok_or(RejectReason::InvalidTimestamp)?;

        if timestamp < self.cutoff_ms {
            return Err(RejectReason::BeforeCutoff);
        }

        if !record.to.eq_ignore_ascii_case(&self.contract_address) {
            return Err(RejectReason::WrongRecipient);
        }

        if !is_positive_raw_value(&record.value) {
            return Err(RejectReason::NonPositiveValue);
        }

        let (token_symbol, token_decimal) = match category {
            TransactionCategory::TokenTransfer => {
                let rule = self
                    .tracked_tokens
                    .iter()
                    .find(|t| t.contract_address.eq_ignore_ascii_case(&record.contract_address))
                    .ok_or(RejectReason::UntrackedToken)?;
                (
                    self.canonical_symbol(rule, &record.token_symbol),
                    parse_decimals(&record.token_decimal),
                )
            }
            TransactionCategory::InternalTransfer => {
                (self.native_symbol.clone(), DEFAULT_TOKEN_DECIMALS)
            }
            TransactionCategory::NormalTransfer => {
                if record.is_error.trim() == "1" {
                    return Err(RejectReason::FailedCall);
                }
                (self.native_symbol.clone(), DEFAULT_TOKEN_DECIMALS)
            }
        };

        Ok(Transaction {
            hash: record.hash.clone(),
            timestamp,
            value: record.value.trim().to_string(),
            token_symbol,
            token_decimal,
            from: record.from.clone(),
            to: record.to.clone(),
            network: self.network.clone(),
            block_number: record.block_number.trim().parse().unwrap_or(0),
        })
    }

    fn canonical_symbol(&self, rule: &TrackedTokenRule, upstream: &str) -> String {
        let upstream = upstream.trim().to_uppercase();
        match &rule.symbol_alias {
            Some(alias) if *alias == upstream => rule.symbol.clone(),
            _ if upstream.is_empty() => rule.symbol.clone(),
            _ => upstream,
        }
    }

    /// Canonical tickers of the allow-listed tokens
    pub fn tracked_symbols(&self) -> Vec<String> {
        let mut symbols: Vec<String> = self.tracked_tokens.iter().map(|t| t.symbol.clone()).collect();
        symbols.dedup();
        symbols
    }
}
