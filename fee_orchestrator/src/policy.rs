use config_manager::EtherscanConfig;
use ledger_client::TransactionCategory;

/// How hard to try for one transaction category
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CategoryPolicy {
    pub category: TransactionCategory,
    /// Attempts per fetch, including the first
    pub max_attempts: u32,
    /// Critical categories get one extra end-to-end fetch when the first fails
    pub critical: bool,
}

impl CategoryPolicy {
    pub fn new(category: TransactionCategory, max_attempts: u32) -> Self {
        Self {
            category,
            max_attempts,
            critical: false,
        }
    }

    pub fn critical(mut self) -> Self {
        self.critical = true;
        self
    }

    /// Enabled categories in fetch order
    pub fn from_config(config: &EtherscanConfig) -> Vec<Self> {
        let mut policies = vec![
            Self::new(TransactionCategory::TokenTransfer, config.max_attempts).critical(),
            Self::new(TransactionCategory::InternalTransfer, config.max_attempts),
        ];

        if config.include_normal_transactions {
            policies.push(Self::new(TransactionCategory::NormalTransfer, config.max_attempts));
        }

        policies
    }
}
