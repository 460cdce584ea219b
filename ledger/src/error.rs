//! Ledger error taxonomy.

use cambio_common::{Currency, CurrencyPair, OwnerId, WalletId};
use cambio_fx::RateError;
use rust_decimal::Decimal;
use thiserror::Error;

/// Errors surfaced by the conversion ledger.
///
/// Every variant carries the guarantee that no partial ledger mutation
/// precedes it: callers observe either a completed transaction with its two
/// journal lines, or untouched state.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// Conversion or deposit amount was not strictly positive.
    #[error("Invalid amount: {0}")]
    InvalidAmount(Decimal),

    /// No wallet exists for the owner in the given currency.
    #[error("Wallet not found for owner {owner} in {currency}")]
    WalletNotFound { owner: OwnerId, currency: Currency },

    /// Source wallet balance cannot cover the requested amount.
    #[error("Insufficient funds: requested {requested}, available {available}")]
    InsufficientFunds {
        requested: Decimal,
        available: Decimal,
    },

    /// The flat deduction drove the settlement amount below zero.
    #[error("Settlement below zero: {0}")]
    SettlementBelowZero(Decimal),

    /// The upstream quote source failed before any lock was taken.
    #[error("Upstream quote source unavailable: {0}")]
    UpstreamUnavailable(String),

    /// The requested pair is not one of the two supported conversion
    /// directions.
    #[error("Unsupported direction: {0}")]
    UnsupportedDirection(CurrencyPair),

    /// Bounded wallet-lock acquisition timed out under contention.
    #[error("Lock contention on wallet {0}")]
    Conflict(WalletId),

    /// Reference generation exhausted its retry budget. Retried inside the
    /// engine; reaching a caller indicates a generator defect, not a
    /// recoverable request error.
    #[error("Transaction reference collision")]
    ReferenceCollision,
}

impl From<RateError> for LedgerError {
    fn from(err: RateError) -> Self {
        match err {
            RateError::UnsupportedPair(pair) => LedgerError::UnsupportedDirection(pair),
            RateError::UpstreamUnavailable(msg) => LedgerError::UpstreamUnavailable(msg),
        }
    }
}

/// Result type alias for ledger operations.
pub type LedgerResult<T> = Result<T, LedgerError>;
