//! Monetary primitives for the Cambio ledger.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Fractional digits carried by rates and settlement amounts.
pub const MONEY_SCALE: u32 = 6;

/// Round a value to the ledger precision, half-up.
///
/// This is the single rounding policy for cross rates and settlement
/// amounts; half-up matters because the default `round_dp` strategy is
/// banker's rounding.
pub fn quantize(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(MONEY_SCALE, RoundingStrategy::MidpointAwayFromZero)
}

/// ISO 4217 currency code.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Currency(String);

impl Currency {
    /// Create a new currency from code.
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into().to_uppercase())
    }

    /// Get the currency code.
    pub fn code(&self) -> &str {
        &self.0
    }

    /// Common currencies
    pub fn rwf() -> Self {
        Self::new("RWF")
    }

    pub fn mad() -> Self {
        Self::new("MAD")
    }

    pub fn usd() -> Self {
        Self::new("USD")
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Currency {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// A currency pair for conversion operations.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CurrencyPair {
    /// Base currency (the currency being sold).
    pub base: Currency,
    /// Quote currency (the currency being bought).
    pub quote: Currency,
}

impl CurrencyPair {
    /// Create a new currency pair.
    pub fn new(base: Currency, quote: Currency) -> Self {
        Self { base, quote }
    }

    /// Get the inverse pair.
    pub fn inverse(&self) -> Self {
        Self {
            base: self.quote.clone(),
            quote: self.base.clone(),
        }
    }
}

impl fmt::Display for CurrencyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.base, self.quote)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_quantize_half_up() {
        assert_eq!(quantize(dec!(0.0000005)), dec!(0.000001));
        assert_eq!(quantize(dec!(1.2345675)), dec!(1.234568));
        assert_eq!(quantize(dec!(1.2345674)), dec!(1.234567));
    }

    #[test]
    fn test_quantize_preserves_short_values() {
        assert_eq!(quantize(dec!(100)), dec!(100));
        assert_eq!(quantize(dec!(0.74)), dec!(0.74));
    }

    #[test]
    fn test_currency_uppercases_code() {
        assert_eq!(Currency::new("rwf"), Currency::rwf());
        assert_eq!(Currency::new("mad").code(), "MAD");
    }

    #[test]
    fn test_pair_inverse() {
        let pair = CurrencyPair::new(Currency::rwf(), Currency::mad());
        let inverse = pair.inverse();
        assert_eq!(inverse.base, Currency::mad());
        assert_eq!(inverse.quote, Currency::rwf());
        assert_eq!(inverse.inverse(), pair);
    }

    #[test]
    fn test_pair_display() {
        let pair = CurrencyPair::new(Currency::rwf(), Currency::mad());
        assert_eq!(pair.to_string(), "RWF/MAD");
    }
}
