//! Append-only rate capture history.

use cambio_common::CurrencyPair;
use parking_lot::RwLock;
use tracing::debug;

use crate::rate::ExchangeRate;

/// Append-only store of rate captures.
///
/// There is deliberately no update or delete operation: a fetch records a
/// new row, and collaborators read the history as-is.
#[derive(Default)]
pub struct RateHistory {
    rows: RwLock<Vec<ExchangeRate>>,
}

impl RateHistory {
    /// Create an empty history.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a new capture.
    pub fn record(&self, rate: ExchangeRate) {
        debug!(pair = %rate.pair, rate = %rate.rate, "Recording rate capture");
        self.rows.write().push(rate);
    }

    /// Most recent capture for a pair, if any.
    pub fn latest(&self, pair: &CurrencyPair) -> Option<ExchangeRate> {
        self.rows
            .read()
            .iter()
            .rev()
            .find(|row| &row.pair == pair)
            .cloned()
    }

    /// Snapshot of all captures, oldest first.
    pub fn all(&self) -> Vec<ExchangeRate> {
        self.rows.read().clone()
    }

    /// Number of recorded captures.
    pub fn len(&self) -> usize {
        self.rows.read().len()
    }

    /// Check if the history is empty.
    pub fn is_empty(&self) -> bool {
        self.rows.read().is_empty()
    }
}
