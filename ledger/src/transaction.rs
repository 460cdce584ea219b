//! Conversion transactions and the settlement rule.

use cambio_common::{
    now, quantize, Currency, CurrencyPair, OwnerId, Timestamp, TransactionId, TransactionRef,
};
use cambio_fx::ExchangeRate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{LedgerError, LedgerResult};

/// Conversion direction relative to the configured pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConversionDirection {
    /// Sell the pair's base currency for its quote currency. No fee.
    BaseToQuote,
    /// Sell the pair's quote currency for its base currency. A flat
    /// deduction applies after conversion.
    QuoteToBase,
}

impl ConversionDirection {
    /// Resolve (source, destination) currencies against the configured pair.
    pub fn currencies(&self, pair: &CurrencyPair) -> (Currency, Currency) {
        match self {
            ConversionDirection::BaseToQuote => (pair.base.clone(), pair.quote.clone()),
            ConversionDirection::QuoteToBase => (pair.quote.clone(), pair.base.clone()),
        }
    }
}

/// Lifecycle state of a conversion transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionStatus {
    /// Recorded but not yet settled.
    Pending,
    /// Settled; exactly two journal lines reference it.
    Completed,
    /// Rejected after recording.
    Failed,
}

impl TransactionStatus {
    /// Check if this is a final state.
    pub fn is_final(&self) -> bool {
        matches!(self, TransactionStatus::Completed | TransactionStatus::Failed)
    }
}

/// One completed currency exchange, backed by two journal entries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionTransaction {
    /// Unique transaction ID.
    pub id: TransactionId,
    /// Human-readable reference code, unique across the journal.
    pub reference: TransactionRef,
    /// Owner the conversion was executed for.
    pub owner_id: OwnerId,
    /// Conversion direction.
    pub direction: ConversionDirection,
    /// Amount debited from the source wallet.
    pub source_amount: Decimal,
    /// Cross rate applied.
    pub applied_rate: Decimal,
    /// The exact rate capture the settlement was priced from.
    pub rate_id: Uuid,
    /// Amount credited to the destination wallet.
    pub settlement_amount: Decimal,
    /// Lifecycle state.
    pub status: TransactionStatus,
    /// When the transaction was created.
    pub created_at: Timestamp,
    /// When the transaction settled.
    pub completed_at: Option<Timestamp>,
}

impl ConversionTransaction {
    /// Build a settled transaction record.
    pub fn completed(
        reference: TransactionRef,
        owner_id: OwnerId,
        direction: ConversionDirection,
        source_amount: Decimal,
        rate: &ExchangeRate,
        settlement_amount: Decimal,
    ) -> Self {
        let timestamp = now();
        Self {
            id: TransactionId::new(),
            reference,
            owner_id,
            direction,
            source_amount,
            applied_rate: rate.rate,
            rate_id: rate.id,
            settlement_amount,
            status: TransactionStatus::Completed,
            created_at: timestamp,
            completed_at: Some(timestamp),
        }
    }
}

/// Compute the settlement amount for a conversion.
///
/// Base-to-quote converts at the raw cross rate; quote-to-base subtracts the
/// capture's flat deduction after conversion. The result is quantized to six
/// fractional digits half-up, matching the rate precision.
pub fn settle(
    direction: ConversionDirection,
    source_amount: Decimal,
    rate: &ExchangeRate,
) -> LedgerResult<Decimal> {
    let gross = source_amount * rate.rate;
    let net = match direction {
        ConversionDirection::BaseToQuote => gross,
        ConversionDirection::QuoteToBase => gross - rate.discount,
    };

    let settled = quantize(net);
    if settled < Decimal::ZERO {
        return Err(LedgerError::SettlementBelowZero(settled));
    }

    Ok(settled)
}
