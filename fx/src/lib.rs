//! Cambio FX Oracle
//!
//! Exchange-rate acquisition for the Cambio conversion ledger.
//!
//! The oracle fetches two USD-denominated quotes from an upstream source,
//! derives the cross rate for the configured currency pair, and records an
//! immutable capture row per successful fetch.
//!
//! # Example
//!
//! ```rust,ignore
//! use cambio_fx::{HttpQuoteSource, OracleConfig, QuoteSourceConfig, RateOracle};
//! use cambio_common::Currency;
//! use std::sync::Arc;
//!
//! let source = Arc::new(HttpQuoteSource::new(QuoteSourceConfig::from_env()));
//! let oracle = RateOracle::new(source, OracleConfig::default());
//!
//! let rate = oracle.get_rate(&Currency::rwf(), &Currency::mad()).await?;
//! ```

pub mod error;
pub mod history;
pub mod oracle;
pub mod quote;
pub mod rate;

pub use error::{RateError, RateResult};
pub use history::RateHistory;
pub use oracle::{OracleConfig, RateOracle};
pub use quote::{HttpQuoteSource, QuoteSource, QuoteSourceConfig, UsdQuotes};
pub use rate::ExchangeRate;

#[cfg(any(test, feature = "test-utils"))]
pub use quote::MockQuoteSource;
