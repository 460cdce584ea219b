//! Upstream quote sources.

use async_trait::async_trait;
use cambio_common::Currency;
use reqwest::Client;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

use crate::error::{RateError, RateResult};

/// Default HTTP request timeout.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// USD-denominated quotes keyed by 6-character pair code (`"USDMAD"`).
#[derive(Debug, Clone, Default)]
pub struct UsdQuotes {
    quotes: HashMap<String, Decimal>,
}

impl UsdQuotes {
    /// Create an empty quote map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a quote for a pair code.
    pub fn insert(&mut self, code: impl Into<String>, value: Decimal) {
        self.quotes.insert(code.into(), value);
    }

    /// Quote for one USD leg, e.g. `leg(&Currency::mad())` reads `"USDMAD"`.
    pub fn leg(&self, currency: &Currency) -> Option<Decimal> {
        self.quotes.get(&format!("USD{}", currency.code())).copied()
    }

    /// Number of quoted legs.
    pub fn len(&self) -> usize {
        self.quotes.len()
    }

    /// Check if no legs were quoted.
    pub fn is_empty(&self) -> bool {
        self.quotes.is_empty()
    }
}

/// Trait for upstream quote sources.
#[async_trait]
pub trait QuoteSource: Send + Sync {
    /// Get the source name.
    fn name(&self) -> &str;

    /// Fetch the current USD-denominated quote map.
    async fn fetch_usd_quotes(&self) -> RateResult<UsdQuotes>;
}

/// Configuration for the HTTP quote source.
#[derive(Debug, Clone)]
pub struct QuoteSourceConfig {
    /// Upstream quote endpoint.
    pub endpoint: String,
    /// API key sent as the `access_key` query parameter.
    pub access_key: String,
    /// Request timeout.
    pub timeout: Duration,
}

impl Default for QuoteSourceConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://api.exchangerate.host/live".to_string(),
            access_key: String::new(),
            timeout: REQUEST_TIMEOUT,
        }
    }
}

impl QuoteSourceConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(endpoint) = std::env::var("CAMBIO_QUOTE_ENDPOINT") {
            config.endpoint = endpoint;
        }

        if let Ok(key) = std::env::var("CAMBIO_QUOTE_ACCESS_KEY") {
            config.access_key = key;
        }

        config
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.endpoint.is_empty() {
            return Err("Quote endpoint cannot be empty".to_string());
        }

        Ok(())
    }
}

/// Upstream response body: a success flag and a nested quote map.
#[derive(Debug, Deserialize)]
struct QuoteBody {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    quotes: HashMap<String, Decimal>,
}

impl QuoteBody {
    fn into_quotes(self) -> RateResult<UsdQuotes> {
        if !self.success {
            return Err(RateError::UpstreamUnavailable(
                "quote source reported failure".to_string(),
            ));
        }

        Ok(UsdQuotes {
            quotes: self.quotes,
        })
    }
}

/// Quote source backed by a single HTTP GET against a static endpoint.
pub struct HttpQuoteSource {
    client: Client,
    config: QuoteSourceConfig,
}

impl HttpQuoteSource {
    /// Create a new HTTP quote source.
    pub fn new(config: QuoteSourceConfig) -> Self {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .unwrap_or_else(|_| Client::new());

        Self { client, config }
    }
}

#[async_trait]
impl QuoteSource for HttpQuoteSource {
    fn name(&self) -> &str {
        "HTTP"
    }

    async fn fetch_usd_quotes(&self) -> RateResult<UsdQuotes> {
        let response = self
            .client
            .get(&self.config.endpoint)
            .query(&[("access_key", self.config.access_key.as_str())])
            .send()
            .await
            .map_err(|e| RateError::UpstreamUnavailable(e.to_string()))?;

        let body: QuoteBody = response
            .error_for_status()
            .map_err(|e| RateError::UpstreamUnavailable(e.to_string()))?
            .json()
            .await
            .map_err(|e| RateError::UpstreamUnavailable(format!("malformed quote body: {e}")))?;

        let quotes = body.into_quotes()?;

        debug!(
            source = self.name(),
            legs = quotes.len(),
            "Fetched USD quotes"
        );

        Ok(quotes)
    }
}

/// Mock quote source for testing.
#[cfg(any(test, feature = "test-utils"))]
pub struct MockQuoteSource {
    quotes: parking_lot::RwLock<HashMap<String, Decimal>>,
    unavailable: std::sync::atomic::AtomicBool,
}

#[cfg(any(test, feature = "test-utils"))]
impl MockQuoteSource {
    /// Create a new mock source with no quotes.
    pub fn new() -> Self {
        Self {
            quotes: parking_lot::RwLock::new(HashMap::new()),
            unavailable: std::sync::atomic::AtomicBool::new(false),
        }
    }

    /// Set a quote for a pair code.
    pub fn set_quote(&self, code: impl Into<String>, value: Decimal) {
        self.quotes.write().insert(code.into(), value);
    }

    /// Toggle simulated upstream failure.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable
            .store(unavailable, std::sync::atomic::Ordering::SeqCst);
    }
}

#[cfg(any(test, feature = "test-utils"))]
impl Default for MockQuoteSource {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(any(test, feature = "test-utils"))]
#[async_trait]
impl QuoteSource for MockQuoteSource {
    fn name(&self) -> &str {
        "MOCK"
    }

    async fn fetch_usd_quotes(&self) -> RateResult<UsdQuotes> {
        if self.unavailable.load(std::sync::atomic::Ordering::SeqCst) {
            return Err(RateError::UpstreamUnavailable(
                "mock source offline".to_string(),
            ));
        }

        Ok(UsdQuotes {
            quotes: self.quotes.read().clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_parse_live_body() {
        let raw = r#"{
            "success": true,
            "source": "USD",
            "quotes": { "USDMAD": 9.87, "USDRWF": 1350.0 }
        }"#;

        let body: QuoteBody = serde_json::from_str(raw).unwrap();
        let quotes = body.into_quotes().unwrap();

        assert_eq!(quotes.leg(&Currency::mad()), Some(dec!(9.87)));
        assert_eq!(quotes.leg(&Currency::rwf()), Some(dec!(1350.0)));
        assert_eq!(quotes.leg(&Currency::new("EUR")), None);
    }

    #[test]
    fn test_parse_failure_body() {
        let raw = r#"{ "success": false, "error": { "code": 101 } }"#;

        let body: QuoteBody = serde_json::from_str(raw).unwrap();
        let result = body.into_quotes();

        assert!(matches!(result, Err(RateError::UpstreamUnavailable(_))));
    }

    #[test]
    fn test_config_validation() {
        assert!(QuoteSourceConfig::default().validate().is_ok());

        let mut config = QuoteSourceConfig::default();
        config.endpoint.clear();
        assert!(config.validate().is_err());
    }

    #[tokio::test]
    async fn test_mock_source() {
        let source = MockQuoteSource::new();
        source.set_quote("USDMAD", dec!(9.87));

        let quotes = source.fetch_usd_quotes().await.unwrap();
        assert_eq!(quotes.leg(&Currency::mad()), Some(dec!(9.87)));
    }

    #[tokio::test]
    async fn test_mock_source_unavailable() {
        let source = MockQuoteSource::new();
        source.set_quote("USDMAD", dec!(9.87));
        source.set_unavailable(true);

        let result = source.fetch_usd_quotes().await;
        assert!(matches!(result, Err(RateError::UpstreamUnavailable(_))));
    }
}
