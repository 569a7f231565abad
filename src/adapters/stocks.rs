//! Equity adapter.
//!
//! Fetches quotes and company profiles from Finnhub. Requires an API key;
//! without one the whole domain fails (no symbol can be fetched at all).
//!
//! API: https://finnhub.io/api/v1 — `/quote` and `/stock/profile2`.
//!
//! The daily percent change comes straight from the quote's `dp` field —
//! the upstream number already encodes the correct session baseline, so
//! it is never recomputed against the previous cycle.

use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::net::Transport;
use crate::types::{now_millis, PulseError, Settings, StockMetric};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

pub(crate) const FINNHUB_API_URL: &str = "https://finnhub.io/api/v1";

/// Display-name overrides for common index/ETF tickers whose upstream
/// profile name is unhelpful. The override path is terminal: no
/// industry/country enrichment is attached.
const NAME_OVERRIDES: &[(&str, &str)] = &[
    ("SPY", "S&P 500 ETF"),
    ("QQQ", "Nasdaq 100 ETF"),
    ("DIA", "Dow Jones ETF"),
    ("IWM", "Russell 2000 ETF"),
    ("EEM", "Emerging Markets ETF"),
    ("EFA", "EAFE ETF"),
    ("GLD", "Gold ETF"),
    ("SLV", "Silver ETF"),
    ("TLT", "20+ Year Treasury ETF"),
    ("VTI", "Total Stock Market ETF"),
    ("VOO", "S&P 500 ETF"),
    ("^VIX", "CBOE Volatility Index"),
    ("^FTSE", "FTSE 100 (UK)"),
    ("^FCHI", "CAC 40 (France)"),
];

fn override_name(symbol: &str) -> Option<&'static str> {
    NAME_OVERRIDES
        .iter()
        .find(|(s, _)| *s == symbol)
        .map(|(_, name)| *name)
}

// ---------------------------------------------------------------------------
// Finnhub response types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct FinnhubQuote {
    /// Current price. Finnhub returns 0 for unknown symbols.
    #[serde(default)]
    c: f64,
    /// Daily percent change.
    #[serde(default)]
    dp: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct FinnhubProfile {
    #[serde(default)]
    name: Option<String>,
    #[serde(default, rename = "finnhubIndustry")]
    finnhub_industry: Option<String>,
    #[serde(default)]
    country: Option<String>,
}

// ---------------------------------------------------------------------------
// Adapter
// ---------------------------------------------------------------------------

pub struct StockAdapter {
    transport: Arc<dyn Transport>,
}

impl StockAdapter {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    pub async fn fetch_metrics(
        &self,
        settings: &Settings,
        _previous: &[StockMetric],
    ) -> Result<Vec<StockMetric>, PulseError> {
        let api_key = settings.api_keys.finnhub.trim();
        if api_key.is_empty() {
            return Err(PulseError::MissingKey("Finnhub"));
        }

        let symbols = &settings.selected_metrics.stock_symbols;
        if symbols.is_empty() {
            return Ok(Vec::new());
        }

        let mut metrics = Vec::new();
        for symbol in symbols {
            match self.fetch_symbol(symbol, api_key).await {
                Ok(metric) => metrics.push(metric),
                Err(e) => warn!(symbol = %symbol, error = %e, "Failed to fetch stock"),
            }
        }

        if metrics.is_empty() {
            return Err(PulseError::Exhausted("no stock data retrieved".to_string()));
        }

        Ok(metrics)
    }

    async fn fetch_symbol(&self, symbol: &str, api_key: &str) -> Result<StockMetric, PulseError> {
        let quote_url = format!("{FINNHUB_API_URL}/quote?symbol={symbol}&token={api_key}");
        let profile_url =
            format!("{FINNHUB_API_URL}/stock/profile2?symbol={symbol}&token={api_key}");

        // Quote and profile for one symbol are fetched concurrently;
        // profile failure is tolerated, quote failure is not.
        let (quote, profile) = tokio::join!(
            self.transport.get_json(&quote_url),
            self.transport.get_json(&profile_url),
        );

        let quote: FinnhubQuote = serde_json::from_value(quote?)
            .map_err(|e| PulseError::DataShape(format!("unexpected quote payload: {e}")))?;
        let profile: Option<FinnhubProfile> =
            profile.ok().and_then(|v| serde_json::from_value(v).ok());

        if quote.c == 0.0 {
            return Err(PulseError::DataShape("invalid quote data".into()));
        }

        let mut name = symbol.to_string();
        let mut industry = None;
        let mut country = None;

        if let Some(label) = override_name(symbol) {
            name = label.to_string();
        } else if let Some(profile_name) =
            profile.as_ref().and_then(|p| p.name.clone()).filter(|n| !n.is_empty())
        {
            name = profile_name;
            industry = profile.as_ref().and_then(|p| p.finnhub_industry.clone());
            country = profile.as_ref().and_then(|p| p.country.clone());
        }

        debug!(symbol, name = %name, price = quote.c, "Stock metric built");

        Ok(StockMetric {
            symbol: symbol.to_string(),
            name,
            industry,
            country,
            price: quote.c,
            change: quote.dp.unwrap_or(0.0),
            timestamp: now_millis(),
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::testutil::CannedTransport;
    use serde_json::json;

    fn settings_with_symbols(symbols: &[&str]) -> Settings {
        let mut settings = Settings::default();
        settings.api_keys.finnhub = "test-key".into();
        settings.selected_metrics.stock_symbols =
            symbols.iter().map(|s| s.to_string()).collect();
        settings
    }

    #[tokio::test]
    async fn test_missing_key_fails_whole_domain() {
        let adapter = StockAdapter::new(Arc::new(CannedTransport::new()));
        let err = adapter
            .fetch_metrics(&Settings::default(), &[])
            .await
            .unwrap_err();
        assert_eq!(err, PulseError::MissingKey("Finnhub"));
    }

    #[tokio::test]
    async fn test_empty_selection_is_empty_success() {
        let adapter = StockAdapter::new(Arc::new(CannedTransport::new()));
        let metrics = adapter
            .fetch_metrics(&settings_with_symbols(&[]), &[])
            .await
            .unwrap();
        assert!(metrics.is_empty());
    }

    #[tokio::test]
    async fn test_override_beats_profile_name() {
        let transport = CannedTransport::new()
            .respond("quote?symbol=SPY", json!({"c": 512.3, "dp": 0.8}))
            .respond(
                "profile2?symbol=SPY",
                json!({"name": "SPDR S&P 500 ETF Trust", "finnhubIndustry": "Funds", "country": "US"}),
            );

        let adapter = StockAdapter::new(Arc::new(transport));
        let metrics = adapter
            .fetch_metrics(&settings_with_symbols(&["SPY"]), &[])
            .await
            .unwrap();

        assert_eq!(metrics[0].name, "S&P 500 ETF");
        // The override path is terminal: no enrichment from the profile.
        assert!(metrics[0].industry.is_none());
        assert!(metrics[0].country.is_none());
    }

    #[tokio::test]
    async fn test_profile_name_with_enrichment() {
        let transport = CannedTransport::new()
            .respond("quote?symbol=AAPL", json!({"c": 231.1, "dp": -0.4}))
            .respond(
                "profile2?symbol=AAPL",
                json!({"name": "Apple Inc", "finnhubIndustry": "Technology", "country": "US"}),
            );

        let adapter = StockAdapter::new(Arc::new(transport));
        let metrics = adapter
            .fetch_metrics(&settings_with_symbols(&["AAPL"]), &[])
            .await
            .unwrap();

        assert_eq!(metrics[0].name, "Apple Inc");
        assert_eq!(metrics[0].industry.as_deref(), Some("Technology"));
        assert_eq!(metrics[0].country.as_deref(), Some("US"));
        assert_eq!(metrics[0].change, -0.4);
    }

    #[tokio::test]
    async fn test_profile_failure_is_tolerated() {
        let transport = CannedTransport::new()
            .respond("quote?symbol=AAPL", json!({"c": 231.1, "dp": 1.2}))
            .fail("profile2?symbol=AAPL", PulseError::Timeout);

        let adapter = StockAdapter::new(Arc::new(transport));
        let metrics = adapter
            .fetch_metrics(&settings_with_symbols(&["AAPL"]), &[])
            .await
            .unwrap();

        assert_eq!(metrics[0].name, "AAPL");
        assert_eq!(metrics[0].price, 231.1);
    }

    #[tokio::test]
    async fn test_zero_price_is_invalid_quote() {
        let transport = CannedTransport::new()
            .respond("quote?symbol=BAD", json!({"c": 0.0}))
            .respond("profile2?symbol=BAD", json!({}))
            .respond("quote?symbol=AAPL", json!({"c": 231.1}))
            .respond("profile2?symbol=AAPL", json!({}));

        let adapter = StockAdapter::new(Arc::new(transport));
        let metrics = adapter
            .fetch_metrics(&settings_with_symbols(&["BAD", "AAPL"]), &[])
            .await
            .unwrap();

        // BAD is skipped with a warning, AAPL survives.
        assert_eq!(metrics.len(), 1);
        assert_eq!(metrics[0].symbol, "AAPL");
    }

    #[tokio::test]
    async fn test_all_symbols_failing_exhausts_domain() {
        let transport = CannedTransport::new()
            .fail("quote", PulseError::Network("dns failure".into()))
            .fail("profile2", PulseError::Network("dns failure".into()));

        let adapter = StockAdapter::new(Arc::new(transport));
        let err = adapter
            .fetch_metrics(&settings_with_symbols(&["AAPL", "MSFT"]), &[])
            .await
            .unwrap_err();
        assert!(matches!(err, PulseError::Exhausted(_)));
    }
}
