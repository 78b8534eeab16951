use chrono::{DateTime, TimeZone, Utc};
use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Error, Debug)]
pub enum ConfigurationError {
    #[error("Configuration loading error: {0}")]
    ConfigLoad(#[from] ConfigError),
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

pub type Result<T> = std::result::Result<T, ConfigurationError>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemConfig {
    /// Etherscan-style ledger API configuration
    pub etherscan: EtherscanConfig,

    /// Tracked contract and asset allow-list
    pub tracking: TrackingConfig,

    /// Price lookup configuration
    pub price: PriceConfig,

    /// API server configuration
    pub api: ApiConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EtherscanConfig {
    /// Ledger API key. Not required at load time; ingestion refuses to run without it.
    pub api_key: String,

    /// Ledger API base URL
    pub api_base_url: String,

    /// Chain identifier passed as `chainid`
    pub chain_id: u64,

    /// Request timeout in seconds
    pub request_timeout_seconds: u64,

    /// Identifying client header sent with every request
    pub user_agent: String,

    /// Attempts per category fetch, including the first one
    pub max_attempts: u32,

    /// First backoff delay in milliseconds (doubles per attempt)
    pub base_delay_ms: u64,

    /// Backoff cap in milliseconds
    pub max_delay_ms: u64,

    /// Freshness window of the fetch cache in seconds
    pub cache_ttl_seconds: u64,

    /// Pause between sequential category fetches in milliseconds
    pub inter_category_delay_ms: u64,

    /// Dispatch category fetches concurrently instead of sequentially
    pub parallel_categories: bool,

    /// Also fetch the normal (`txlist`) category. Off by default: it can
    /// double count value already reported as an internal transfer.
    pub include_normal_transactions: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TrackedToken {
    /// Token contract address
    pub contract_address: String,

    /// Canonical ticker reported for this token
    pub symbol: String,

    /// Upstream ticker rewritten to `symbol`, if any
    #[serde(default)]
    pub symbol_alias: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackingConfig {
    /// Contract whose incoming value is tracked
    pub contract_address: String,

    /// Network tag stamped on every normalized transaction
    pub network: String,

    /// Records older than this instant are ignored
    pub cutoff_timestamp: DateTime<Utc>,

    /// Ticker of the chain's native unit (internal transfers)
    pub native_symbol: String,

    /// Allow-listed stablecoin
    pub stablecoin: TrackedToken,

    /// Allow-listed wrapped native token
    pub wrapped_native: TrackedToken,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceConfig {
    /// Price API base URL
    pub api_base_url: String,

    /// Optional price API key
    pub api_key: String,

    /// Request timeout in seconds
    pub request_timeout_seconds: u64,

    /// Ticker -> price API asset id
    pub symbol_ids: HashMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// API server host
    pub host: String,

    /// API server port
    pub port: u16,

    /// Number of most recent transactions returned by the fee endpoint
    pub recent_transactions_limit: usize,
}

impl Default for SystemConfig {
    fn default() -> Self {
        let mut symbol_ids = HashMap::new();
        symbol_ids.insert("ETH".to_string(), "ethereum".to_string());
        symbol_ids.insert("USDC".to_string(), "usd-coin".to_string());

        Self {
            etherscan: EtherscanConfig {
                api_key: "".to_string(), // Must be set in .env or config file
                api_base_url: "https://api.etherscan.io/v2/api".to_string(),
                chain_id: 1,
                request_timeout_seconds: 30,
                user_agent: format!("fee-tracker/{}", env!("CARGO_PKG_VERSION")),
                max_attempts: 3,
                base_delay_ms: 1000,
                max_delay_ms: 5000,
                cache_ttl_seconds: 30 * 60,
                inter_category_delay_ms: 1000, // Free tier allows a handful of calls per second
                parallel_categories: false,
                include_normal_transactions: false,
            },
            tracking: TrackingConfig {
                contract_address: "0x0000000000000000000000000000000000000000".to_string(),
                network: "ethereum".to_string(),
                cutoff_timestamp: Utc
                    .with_ymd_and_hms(2025, 1, 1, 0, 0, 0)
                    .single()
                    .unwrap_or_default(),
                native_symbol: "ETH".to_string(),
                stablecoin: TrackedToken {
                    contract_address: "0xa0b86991c6218b36c1d19d4a2e9eb0ce3606eb48".to_string(),
                    symbol: "USDC".to_string(),
                    symbol_alias: None,
                },
                wrapped_native: TrackedToken {
                    contract_address: "0xc02aaa39b223fe8d0a0e5c4f27ead9083c756cc2".to_string(),
                    symbol: "ETH".to_string(),
                    symbol_alias: Some("WETH".to_string()),
                },
            },
            price: PriceConfig {
                api_base_url: "https://api.coingecko.com/api/v3".to_string(),
                api_key: "".to_string(),
                request_timeout_seconds: 15,
                symbol_ids,
            },
            api: ApiConfig {
                host: "0.0.0.0".to_string(),
                port: 8080,
                recent_transactions_limit: 20,
            },
        }
    }
}

impl EtherscanConfig {
    /// Validate ledger API configuration
    pub fn validate(&self) -> Result<()> {
        if self.api_base_url.is_empty() {
            return Err(ConfigurationError::InvalidValue(
                "Etherscan API base URL is required".to_string(),
            ));
        }

        if self.request_timeout_seconds == 0 {
            return Err(ConfigurationError::InvalidValue(
                "Request timeout must be greater than 0".to_string(),
            ));
        }

        if self.max_attempts == 0 {
            return Err(ConfigurationError::InvalidValue(
                "max_attempts must be at least 1".to_string(),
            ));
        }

        if self.base_delay_ms > self.max_delay_ms {
            return Err(ConfigurationError::InvalidValue(format!(
                "base_delay_ms ({}) cannot exceed max_delay_ms ({})",
                self.base_delay_ms, self.max_delay_ms
            )));
        }

        Ok(())
    }

    pub fn has_api_key(&self) -> bool {
        !self.api_key.trim().is_empty()
    }
}

impl TrackingConfig {
    /// Validate tracked addresses
    pub fn validate(&self) -> Result<()> {
        validate_evm_address(&self.contract_address)?;
        validate_evm_address(&self.stablecoin.contract_address)?;
        validate_evm_address(&self.wrapped_native.contract_address)?;

        if self
            .stablecoin
            .contract_address
            .eq_ignore_ascii_case(&self.wrapped_native.contract_address)
        {
            return Err(ConfigurationError::InvalidValue(
                "Stablecoin and wrapped native token must be distinct contracts".to_string(),
            ));
        }

        if self.native_symbol.is_empty() || self.network.is_empty() {
            return Err(ConfigurationError::InvalidValue(
                "native_symbol and network must be set".to_string(),
            ));
        }

        Ok(())
    }
}

impl SystemConfig {
    /// Load configuration from file and environment variables
    pub fn load() -> Result<Self> {
        Self::load_from_path("config.toml")
    }

    /// Load configuration from a specific file path
    pub fn load_from_path<P: AsRef<Path>>(config_path: P) -> Result<Self> {
        let mut config_builder = Config::builder()
            // Start with defaults
            .add_source(Config::try_from(&SystemConfig::default())?);

        if config_path.as_ref().exists() {
            info!(
                "Loading configuration from: {}",
                config_path.as_ref().display()
            );
            config_builder = config_builder.add_source(File::from(config_path.as_ref()));
        } else {
            debug!("Config file not found, using defaults and environment variables");
        }

        config_builder = config_builder.add_source(
            Environment::with_prefix("FEE")
                .try_parsing(true)
                .separator("__"),
        );

        let config = config_builder.build()?;
        let system_config: SystemConfig = config.try_deserialize()?;

        system_config.validate()?;

        if !system_config.etherscan.has_api_key() {
            info!("Etherscan API key not configured; ingestion requests will be rejected");
        }

        Ok(system_config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        self.etherscan.validate()?;
        self.tracking.validate()?;

        if self.price.request_timeout_seconds == 0 {
            return Err(ConfigurationError::InvalidValue(
                "Price request timeout must be greater than 0".to_string(),
            ));
        }

        if self.api.port == 0 {
            return Err(ConfigurationError::InvalidValue(
                "API port cannot be 0".to_string(),
            ));
        }

        Ok(())
    }
}

/// Basic EVM address validation (0x + 40 hex chars)
pub fn validate_evm_address(address: &str) -> Result<()> {
    let is_valid = address.len() == 42
        && address.starts_with("0x")
        && address[2..].chars().all(|c| c.is_ascii_hexdigit());

    if !is_valid {
        return Err(ConfigurationError::InvalidValue(format!(
            "Invalid EVM address: '{}'",
            address
        )));
    }

    Ok(())
}
