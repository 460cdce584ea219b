//! Exchange-rate capture rows.

use cambio_common::{now, CurrencyPair, Timestamp};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One captured cross rate.
///
/// Rows are append-only: every successful upstream fetch produces a new row
/// and existing rows are never mutated, so each transaction can reference
/// the exact rate and fee parameters that were applied to it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExchangeRate {
    /// Unique capture ID.
    pub id: Uuid,
    /// The pair this rate converts, base into quote.
    pub pair: CurrencyPair,
    /// Cross rate derived from the two USD legs, six fractional digits.
    pub rate: Decimal,
    /// Flat markup recorded for base-to-quote captures. Carried on the row
    /// for audit; the settlement rule does not currently apply it.
    pub margin: Decimal,
    /// Flat deduction applied to quote-to-base settlements.
    pub discount: Decimal,
    /// When this rate was captured.
    pub captured_at: Timestamp,
    /// Whether this capture is usable for new conversions.
    pub active: bool,
}

impl ExchangeRate {
    /// Create a new capture row.
    pub fn new(pair: CurrencyPair, rate: Decimal, margin: Decimal, discount: Decimal) -> Self {
        Self {
            id: Uuid::now_v7(),
            pair,
            rate,
            margin,
            discount,
            captured_at: now(),
            active: true,
        }
    }
}
