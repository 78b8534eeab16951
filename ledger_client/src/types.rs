use serde::{Deserialize, Serialize};

/// Message the upstream attaches to an empty (`status = "0"`) result
pub const NO_TRANSACTIONS_MESSAGE: &str = "No transactions found";

/// Upstream query category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionCategory {
    /// ERC-20 transfers (`tokentx`)
    TokenTransfer,
    /// Internal value transfers (`txlistinternal`)
    InternalTransfer,
    /// Top-level value transfers (`txlist`)
    NormalTransfer,
}

impl TransactionCategory {
    pub fn action(&self) -> &'static str {
        match self {
            TransactionCategory::TokenTransfer => "tokentx",
            TransactionCategory::InternalTransfer => "txlistinternal",
            TransactionCategory::NormalTransfer => "txlist",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionCategory::TokenTransfer => "token_transfer",
            TransactionCategory::InternalTransfer => "internal_transfer",
            TransactionCategory::NormalTransfer => "normal_transfer",
        }
    }
}

impl std::fmt::Display for TransactionCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Response envelope: `{status, message, result}`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LedgerEnvelope {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub message: String,
    /// A list on success, an error string otherwise
    #[serde(default)]
    pub result: serde_json::Value,
}

/// One upstream ledger record, shared by all categories
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawLedgerRecord {
    pub hash: String,
    /// Unix seconds
    pub time_stamp: String,
    /// Smallest-unit integer amount
    pub value: String,
    pub from: String,
    pub to: String,
    /// Token contract, token-transfer category only
    pub contract_address: String,
    pub token_symbol: String,
    pub token_decimal: String,
    pub block_number: String,
    /// "1" when the call reverted (internal/normal categories)
    pub is_error: String,
}

/// Configuration for the ledger API client
#[derive(Debug, Clone)]
pub struct LedgerClientConfig {
    pub api_key: String,
    pub base_url: String,
    pub chain_id: u64,
    pub timeout_seconds: u64,
    pub user_agent: String,
}

impl From<&config_manager::EtherscanConfig> for LedgerClientConfig {
    fn from(config: &config_manager::EtherscanConfig) -> Self {
        Self {
            api_key: config.api_key.clone(),
            base_url: config.api_base_url.clone(),
            chain_id: config.chain_id,
            timeout_seconds: config.request_timeout_seconds,
            user_agent: config.user_agent.clone(),
        }
    }
}
