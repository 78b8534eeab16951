use retry_utils::RetryableError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("HTTP {status}: {body}")]
    HttpStatus { status: u16, body: String },

    #[error("JSON parsing failed: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("API error: {message}")]
    ApiError { message: String },

    #[error("Rate limit exceeded")]
    RateLimit,

    #[error("Ledger API key is not configured")]
    MissingApiKey,
}

impl LedgerError {
    /// Retry classification. Everything the upstream can cause is retried;
    /// only local configuration problems are not.
    pub fn retry_class(&self) -> RetryableError {
        match self {
            LedgerError::RateLimit => RetryableError::RateLimit,
            LedgerError::HttpStatus { status, .. } if *status == 429 => RetryableError::RateLimit,
            LedgerError::HttpError(e) if e.is_timeout() || e.is_connect() => RetryableError::Timeout,
            LedgerError::HttpError(_)
            | LedgerError::HttpStatus { .. }
            | LedgerError::JsonError(_)
            | LedgerError::ApiError { .. } => RetryableError::ServerError,
            LedgerError::MissingApiKey => RetryableError::Other,
        }
    }
}
