//! Rate oracle implementation.

use std::sync::Arc;

use cambio_common::{quantize, Currency, CurrencyPair};
use rust_decimal::Decimal;
use tracing::{info, instrument};

use crate::error::{RateError, RateResult};
use crate::history::RateHistory;
use crate::quote::QuoteSource;
use crate::rate::ExchangeRate;

/// Configuration for the rate oracle.
#[derive(Debug, Clone)]
pub struct OracleConfig {
    /// The single supported pair, base into quote. The inverse direction is
    /// implicitly supported as well; everything else is rejected.
    pub pair: CurrencyPair,
    /// Flat markup recorded on base-to-quote captures.
    pub margin: Decimal,
    /// Flat deduction recorded on quote-to-base captures and applied to
    /// their settlements.
    pub discount: Decimal,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            pair: CurrencyPair::new(Currency::rwf(), Currency::mad()),
            margin: Decimal::ZERO,
            discount: Decimal::from(15),
        }
    }
}

impl OracleConfig {
    /// Validate configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.pair.base == self.pair.quote {
            return Err("Pair must span two distinct currencies".to_string());
        }

        if self.margin < Decimal::ZERO || self.discount < Decimal::ZERO {
            return Err("Margin and discount cannot be negative".to_string());
        }

        Ok(())
    }
}

/// Derive a cross rate from two USD-denominated legs.
///
/// `USD→base` and `USD→target` quotes combine as `target_leg / base_leg`,
/// quantized to six fractional digits half-up.
fn cross_rate(base_leg: Decimal, target_leg: Decimal) -> RateResult<Decimal> {
    if base_leg <= Decimal::ZERO || target_leg <= Decimal::ZERO {
        return Err(RateError::UpstreamUnavailable(
            "non-positive USD leg in quote body".to_string(),
        ));
    }

    let raw = target_leg
        .checked_div(base_leg)
        .ok_or_else(|| RateError::UpstreamUnavailable("cross rate overflow".to_string()))?;

    Ok(quantize(raw))
}

/// The rate oracle.
///
/// Fetches USD quotes from the configured source, derives the cross rate
/// for the requested direction, and records one immutable capture row per
/// successful call.
pub struct RateOracle {
    source: Arc<dyn QuoteSource>,
    history: RateHistory,
    config: OracleConfig,
}

impl RateOracle {
    /// Create a new oracle over the given quote source.
    pub fn new(source: Arc<dyn QuoteSource>, config: OracleConfig) -> Self {
        Self {
            source,
            history: RateHistory::new(),
            config,
        }
    }

    /// The configured pair, base into quote.
    pub fn configured_pair(&self) -> &CurrencyPair {
        &self.config.pair
    }

    /// Check whether a pair is one of the two supported directions.
    pub fn supports_pair(&self, pair: &CurrencyPair) -> bool {
        *pair == self.config.pair || *pair == self.config.pair.inverse()
    }

    /// Read-only capture history.
    pub fn history(&self) -> &RateHistory {
        &self.history
    }

    /// Fetch and record the current rate for `base` into `target`.
    ///
    /// Blocks on upstream I/O; callers must invoke this before taking any
    /// wallet lock. Nothing is recorded unless the fetch and the cross-rate
    /// derivation both succeed.
    #[instrument(skip(self), fields(base = %base, target = %target))]
    pub async fn get_rate(&self, base: &Currency, target: &Currency) -> RateResult<ExchangeRate> {
        let requested = CurrencyPair::new(base.clone(), target.clone());
        if !self.supports_pair(&requested) {
            return Err(RateError::UnsupportedPair(requested));
        }

        let quotes = self.source.fetch_usd_quotes().await?;

        let base_leg = quotes.leg(base).ok_or_else(|| {
            RateError::UpstreamUnavailable(format!("missing USD{} quote", base.code()))
        })?;
        let target_leg = quotes.leg(target).ok_or_else(|| {
            RateError::UpstreamUnavailable(format!("missing USD{} quote", target.code()))
        })?;

        let rate = cross_rate(base_leg, target_leg)?;

        // Fee parameters ride on the capture row so each transaction can
        // point back at the exact values that shaped its settlement.
        let (margin, discount) = if requested == self.config.pair {
            (self.config.margin, Decimal::ZERO)
        } else {
            (Decimal::ZERO, self.config.discount)
        };

        let row = ExchangeRate::new(requested, rate, margin, discount);
        self.history.record(row.clone());

        info!(rate = %row.rate, capture = %row.id, "Captured exchange rate");

        Ok(row)
    }
}
