pub mod cache;
pub mod client;
pub mod error;
pub mod normalizer;
pub mod types;

pub use cache::FetchCache;
pub use client::{FetchOutcome, LedgerClient};
pub use error::LedgerError;
pub use normalizer::{RejectReason, TransactionNormalizer};
pub use types::*;
