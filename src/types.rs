//! Shared types for MARKETPULSE.
//!
//! The data model used across all modules: per-domain metric records,
//! the persisted snapshot and error state, user settings, and the
//! crate-wide error enum. Persisted shapes serialize with camelCase
//! keys so the state file matches the schema the display layer reads.

use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Domains
// ---------------------------------------------------------------------------

/// One of the four metric categories tracked per cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Domain {
    Polymarket,
    Stocks,
    Forex,
    Economic,
}

impl Domain {
    pub const ALL: [Domain; 4] = [
        Domain::Polymarket,
        Domain::Stocks,
        Domain::Forex,
        Domain::Economic,
    ];
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Domain::Polymarket => "polymarket",
            Domain::Stocks => "stocks",
            Domain::Forex => "forex",
            Domain::Economic => "economic",
        };
        write!(f, "{name}")
    }
}

// ---------------------------------------------------------------------------
// Metric records
// ---------------------------------------------------------------------------

/// A prediction-market event, reduced to its representative market.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketMetric {
    /// Condition id, falling back to market id, falling back to the slug.
    pub id: String,
    pub title: String,
    pub slug: String,
    /// Leading-outcome probability in [0, 1].
    pub probability: f64,
    /// Label of the leading option for multi-choice events; `None` for binary.
    #[serde(default)]
    pub top_outcome: Option<String>,
    /// Percent delta versus the previous cycle's matching record.
    pub change: f64,
    /// Epoch millis at fetch time.
    pub timestamp: i64,
}

/// A single equity quote.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StockMetric {
    pub symbol: String,
    pub name: String,
    #[serde(default)]
    pub industry: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
    pub price: f64,
    /// Daily percent change as reported upstream (not recomputed locally).
    pub change: f64,
    pub timestamp: i64,
}

/// One exchange rate for a base/target currency pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForexMetric {
    /// Literal `"{base}/{target}"` — the snapshot identity for this domain.
    pub pair: String,
    pub base: String,
    pub target: String,
    pub rate: f64,
    pub change: f64,
    pub timestamp: i64,
}

/// The latest observation of one macroeconomic series.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EconomicMetric {
    pub series: String,
    pub name: String,
    /// Raw units string from upstream, passed through unmodified.
    #[serde(default)]
    pub units: Option<String>,
    /// Frequency code from upstream ("M", "Q", ...).
    #[serde(default)]
    pub frequency: Option<String>,
    /// Best-effort geography extracted from the series title.
    #[serde(default)]
    pub geography: Option<String>,
    pub value: f64,
    pub change: f64,
    /// Observation date as reported upstream.
    pub date: String,
    pub timestamp: i64,
}

// ---------------------------------------------------------------------------
// Snapshot
// ---------------------------------------------------------------------------

/// The persisted set of most-recent metric lists, one per domain.
///
/// Fully replaced each cycle. A domain whose fetch failed contributes an
/// empty list, overwriting previously-successful data — staleness is not
/// preserved.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Snapshot {
    pub polymarket: Vec<MarketMetric>,
    pub stocks: Vec<StockMetric>,
    pub forex: Vec<ForexMetric>,
    pub economic: Vec<EconomicMetric>,
}

impl Snapshot {
    pub fn total_records(&self) -> usize {
        self.polymarket.len() + self.stocks.len() + self.forex.len() + self.economic.len()
    }
}

// ---------------------------------------------------------------------------
// Error state
// ---------------------------------------------------------------------------

/// Last error message per domain, plus a catch-all `system` entry.
///
/// Cleared wholesale at the start of every cycle, then populated only for
/// domains that failed. A `None` entry distinguishes an empty-but-healthy
/// domain from a failed one.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ErrorState {
    pub polymarket: Option<String>,
    pub stocks: Option<String>,
    pub forex: Option<String>,
    pub economic: Option<String>,
    pub system: Option<String>,
}

impl ErrorState {
    pub fn record(&mut self, domain: Domain, message: String) {
        match domain {
            Domain::Polymarket => self.polymarket = Some(message),
            Domain::Stocks => self.stocks = Some(message),
            Domain::Forex => self.forex = Some(message),
            Domain::Economic => self.economic = Some(message),
        }
    }

    pub fn get(&self, domain: Domain) -> Option<&str> {
        match domain {
            Domain::Polymarket => self.polymarket.as_deref(),
            Domain::Stocks => self.stocks.as_deref(),
            Domain::Forex => self.forex.as_deref(),
            Domain::Economic => self.economic.as_deref(),
        }
    }

    pub fn has_any(&self) -> bool {
        self.polymarket.is_some()
            || self.stocks.is_some()
            || self.forex.is_some()
            || self.economic.is_some()
            || self.system.is_some()
    }
}

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------

pub const MIN_UPDATE_FREQUENCY: u32 = 1;
pub const MAX_UPDATE_FREQUENCY: u32 = 60;
pub const DEFAULT_UPDATE_FREQUENCY: u32 = 5;

/// User-facing configuration, read by every cycle and replaced wholesale
/// by the settings surface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    /// Polling interval in minutes, valid range 1–60.
    pub update_frequency: u32,
    pub api_keys: ApiKeys,
    pub selected_metrics: SelectedMetrics,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            update_frequency: DEFAULT_UPDATE_FREQUENCY,
            api_keys: ApiKeys::default(),
            selected_metrics: SelectedMetrics::default(),
        }
    }
}

impl Settings {
    /// Reject an update frequency outside the 1–60 minute range.
    pub fn validate(&self) -> Result<(), PulseError> {
        if !(MIN_UPDATE_FREQUENCY..=MAX_UPDATE_FREQUENCY).contains(&self.update_frequency) {
            return Err(PulseError::Config(format!(
                "update frequency must be between {MIN_UPDATE_FREQUENCY} and \
                 {MAX_UPDATE_FREQUENCY} minutes, got {}",
                self.update_frequency
            )));
        }
        Ok(())
    }
}

/// Opaque caller-supplied API keys. Empty string = feature disabled.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ApiKeys {
    pub finnhub: String,
    pub fred: String,
}

/// Per-domain selection lists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SelectedMetrics {
    /// Polymarket event slugs; empty = top 5 active markets.
    pub polymarket_ids: Vec<String>,
    pub stock_symbols: Vec<String>,
    pub economic_series: Vec<SeriesSelection>,
    pub forex_pairs: Vec<CurrencyPair>,
}

impl Default for SelectedMetrics {
    fn default() -> Self {
        SelectedMetrics {
            polymarket_ids: Vec::new(),
            stock_symbols: vec!["AAPL".into(), "GOOGL".into(), "MSFT".into()],
            economic_series: vec![
                SeriesSelection::named("GDP", "US GDP Growth"),
                SeriesSelection::named("UNRATE", "Unemployment Rate"),
                SeriesSelection::named("CPIAUCSL", "Consumer Price Index"),
            ],
            forex_pairs: vec![
                CurrencyPair::new("USD", "EUR"),
                CurrencyPair::new("USD", "JPY"),
                CurrencyPair::new("USD", "GBP"),
            ],
        }
    }
}

/// A macro series id with an optional caller-supplied display name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SeriesSelection {
    pub id: String,
    pub name: Option<String>,
}

impl SeriesSelection {
    pub fn bare(id: &str) -> Self {
        SeriesSelection { id: id.to_string(), name: None }
    }

    pub fn named(id: &str, name: &str) -> Self {
        SeriesSelection { id: id.to_string(), name: Some(name.to_string()) }
    }
}

/// A requested exchange-rate pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrencyPair {
    pub base: String,
    pub target: String,
}

impl CurrencyPair {
    pub fn new(base: &str, target: &str) -> Self {
        CurrencyPair { base: base.to_string(), target: target.to_string() }
    }
}

impl fmt::Display for CurrencyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.base, self.target)
    }
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Error taxonomy for the fetch pipeline.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PulseError {
    #[error("network error: {0}")]
    Network(String),

    #[error("request timeout")]
    Timeout,

    #[error("HTTP {status}: {status_text}")]
    Http { status: u16, status_text: String },

    #[error("unexpected response shape: {0}")]
    DataShape(String),

    #[error("{0} API key not configured")]
    MissingKey(&'static str),

    /// Every selected item in a domain failed; the domain has nothing
    /// to report this cycle.
    #[error("{0}")]
    Exhausted(String),

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl PulseError {
    /// Transient failures worth retrying: transport errors and 5xx.
    pub fn is_retryable(&self) -> bool {
        match self {
            PulseError::Network(_) => true,
            PulseError::Http { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

/// Epoch milliseconds at the current instant.
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_frequency_bounds() {
        let mut settings = Settings::default();

        settings.update_frequency = 0;
        assert!(settings.validate().is_err());

        settings.update_frequency = 61;
        assert!(settings.validate().is_err());

        settings.update_frequency = 1;
        assert!(settings.validate().is_ok());

        settings.update_frequency = 60;
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.update_frequency, 5);
        assert!(settings.api_keys.finnhub.is_empty());
        assert!(settings.selected_metrics.polymarket_ids.is_empty());
        assert_eq!(settings.selected_metrics.stock_symbols, vec!["AAPL", "GOOGL", "MSFT"]);
        assert_eq!(settings.selected_metrics.economic_series.len(), 3);
        assert_eq!(settings.selected_metrics.forex_pairs.len(), 3);
    }

    #[test]
    fn test_settings_camel_case_schema() {
        let json = serde_json::to_value(Settings::default()).unwrap();
        assert!(json.get("updateFrequency").is_some());
        assert!(json["selectedMetrics"].get("stockSymbols").is_some());
        assert!(json["apiKeys"].get("finnhub").is_some());
    }

    #[test]
    fn test_settings_tolerates_missing_fields() {
        // Older state files may lack whole sections.
        let settings: Settings = serde_json::from_str(r#"{"updateFrequency": 10}"#).unwrap();
        assert_eq!(settings.update_frequency, 10);
        assert_eq!(settings.selected_metrics.stock_symbols.len(), 3);
    }

    #[test]
    fn test_error_state_record_and_query() {
        let mut errors = ErrorState::default();
        assert!(!errors.has_any());

        errors.record(Domain::Stocks, "Finnhub API key not configured".into());
        assert!(errors.has_any());
        assert_eq!(errors.get(Domain::Stocks), Some("Finnhub API key not configured"));
        assert_eq!(errors.get(Domain::Forex), None);
    }

    #[test]
    fn test_currency_pair_display() {
        assert_eq!(CurrencyPair::new("USD", "EUR").to_string(), "USD/EUR");
    }

    #[test]
    fn test_retryable_errors() {
        assert!(PulseError::Network("connection reset".into()).is_retryable());
        assert!(PulseError::Http { status: 503, status_text: "Service Unavailable".into() }
            .is_retryable());
        assert!(!PulseError::Http { status: 404, status_text: "Not Found".into() }.is_retryable());
        assert!(!PulseError::Timeout.is_retryable());
        assert!(!PulseError::MissingKey("Finnhub").is_retryable());
    }

    #[test]
    fn test_error_messages() {
        assert_eq!(
            PulseError::MissingKey("FRED").to_string(),
            "FRED API key not configured"
        );
        assert_eq!(
            PulseError::Http { status: 429, status_text: "Too Many Requests".into() }.to_string(),
            "HTTP 429: Too Many Requests"
        );
    }

    #[test]
    fn test_snapshot_total_records() {
        let mut snapshot = Snapshot::default();
        assert_eq!(snapshot.total_records(), 0);
        snapshot.forex.push(ForexMetric {
            pair: "USD/EUR".into(),
            base: "USD".into(),
            target: "EUR".into(),
            rate: 0.92,
            change: 0.0,
            timestamp: 0,
        });
        assert_eq!(snapshot.total_records(), 1);
    }
}
