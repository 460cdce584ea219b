//! Oracle error types.

use cambio_common::CurrencyPair;
use thiserror::Error;

/// Errors that can occur while acquiring an exchange rate.
#[derive(Debug, Error)]
pub enum RateError {
    /// The requested pair is not one of the two configured conversion
    /// directions.
    #[error("Unsupported pair: {0}")]
    UnsupportedPair(CurrencyPair),

    /// The upstream quote source timed out, failed, or returned a body the
    /// oracle could not use. No rate row is persisted when this occurs.
    #[error("Upstream quote source unavailable: {0}")]
    UpstreamUnavailable(String),
}

/// Result type for oracle operations.
pub type RateResult<T> = Result<T, RateError>;
