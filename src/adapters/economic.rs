//! Macro-series adapter.
//!
//! Fetches series metadata and the two most recent observations from the
//! FRED API (Federal Reserve Economic Data). Requires an API key; without
//! one the whole domain fails.
//!
//! API: https://api.stlouisfed.org/fred — `/series` and
//! `/series/observations`. Auth via `api_key` query param.
//!
//! Change is computed between the two latest observations, except when
//! the series' units string already denotes a rate/change quantity —
//! a percent change of a percent change is meaningless, so change is
//! forced to 0 for those series. Geography is extracted from the title
//! on a best-effort basis, display only.

use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::adapters::percent_change;
use crate::net::Transport;
use crate::types::{now_millis, EconomicMetric, PulseError, SeriesSelection, Settings};

pub(crate) const FRED_API_URL: &str = "https://api.stlouisfed.org/fred";

/// Units substrings that mark a series as already being a rate/change.
const CHANGE_UNIT_PATTERNS: &[&str] = &[
    "growth rate",
    "percent change",
    "rate of change",
    "annual rate",
    "percentage points",
];

// ---------------------------------------------------------------------------
// FRED API response types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct FredSeriesResponse {
    #[serde(default)]
    seriess: Vec<FredSeriesInfo>,
}

#[derive(Debug, Clone, Deserialize)]
struct FredSeriesInfo {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    units: Option<String>,
    #[serde(default)]
    frequency_short: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FredObservationsResponse {
    #[serde(default)]
    observations: Vec<FredObservation>,
}

#[derive(Debug, Deserialize)]
struct FredObservation {
    #[serde(default)]
    date: String,
    /// Numeric string; FRED uses "." for missing data points.
    #[serde(default)]
    value: String,
}

// ---------------------------------------------------------------------------
// Pure helpers
// ---------------------------------------------------------------------------

/// Whether the units string already denotes a rate/change quantity.
fn is_change_metric(units: Option<&str>) -> bool {
    match units {
        Some(u) => {
            let u = u.to_lowercase();
            CHANGE_UNIT_PATTERNS.iter().any(|p| u.contains(p))
        }
        None => false,
    }
}

/// Best-effort geography extraction from a series title.
///
/// Scans for trailing "for X" / "in X" patterns where X is a capitalized
/// phrase running to end-of-string, comma, or paren; a trailing
/// "All Items" suffix is stripped. Returns `None` when nothing matches.
fn extract_geography(title: &str) -> Option<String> {
    capture_after(title, " for ").or_else(|| capture_after(title, " in "))
}

fn capture_after(title: &str, marker: &str) -> Option<String> {
    let mut search_from = 0;
    while let Some(pos) = title[search_from..].find(marker) {
        let start = search_from + pos + marker.len();
        search_from = start;

        let rest = &title[start..];
        if !rest.chars().next().is_some_and(|c| c.is_ascii_uppercase()) {
            continue;
        }

        // Capture letters and spaces; a comma or paren terminates the
        // phrase, any other character disqualifies this occurrence.
        let mut end = None;
        for (i, c) in rest.char_indices() {
            if c == ',' || c == '(' {
                end = Some(i);
                break;
            }
            if !(c.is_ascii_alphabetic() || c == ' ') {
                break;
            }
            end = Some(i + c.len_utf8());
        }

        let Some(end) = end else { continue };
        // Disqualified mid-phrase unless we stopped at a terminator or
        // ran to the end of the title.
        let stopped_cleanly = rest[end..].starts_with([',', '('])
            || rest[..end].len() == rest.trim_end().len()
            || end == rest.len();
        if !stopped_cleanly {
            continue;
        }

        let mut phrase = rest[..end].trim().to_string();
        let lowered = phrase.to_lowercase();
        if let Some(cut) = lowered.strip_suffix("all items") {
            if cut.ends_with(' ') {
                phrase.truncate(cut.len());
                phrase = phrase.trim_end().to_string();
            }
        }

        if !phrase.is_empty() {
            return Some(phrase);
        }
    }
    None
}

/// Parse a FRED observation value; "." placeholders stay unparseable.
fn parse_observation(raw: &str) -> Option<f64> {
    raw.trim().parse().ok()
}

// ---------------------------------------------------------------------------
// Adapter
// ---------------------------------------------------------------------------

pub struct EconomicAdapter {
    transport: Arc<dyn Transport>,
}

impl EconomicAdapter {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    pub async fn fetch_metrics(
        &self,
        settings: &Settings,
        _previous: &[EconomicMetric],
    ) -> Result<Vec<EconomicMetric>, PulseError> {
        let api_key = settings.api_keys.fred.trim();
        if api_key.is_empty() {
            return Err(PulseError::MissingKey("FRED"));
        }

        let series = &settings.selected_metrics.economic_series;
        if series.is_empty() {
            return Ok(Vec::new());
        }

        let mut metrics = Vec::new();
        for selection in series {
            match self.fetch_series(selection, api_key).await {
                Ok(metric) => metrics.push(metric),
                Err(e) => {
                    warn!(series = %selection.id, error = %e, "Failed to fetch economic series")
                }
            }
        }

        if metrics.is_empty() {
            return Err(PulseError::Exhausted(
                "no economic data retrieved".to_string(),
            ));
        }

        Ok(metrics)
    }

    async fn fetch_series(
        &self,
        selection: &SeriesSelection,
        api_key: &str,
    ) -> Result<EconomicMetric, PulseError> {
        let series_id = selection.id.as_str();
        let series_url = format!(
            "{FRED_API_URL}/series?series_id={series_id}&api_key={api_key}&file_type=json"
        );
        let observations_url = format!(
            "{FRED_API_URL}/series/observations?series_id={series_id}&api_key={api_key}\
             &file_type=json&limit=2&sort_order=desc"
        );

        // Metadata and observations for one series are fetched concurrently;
        // metadata failure is tolerated, missing observations are not.
        let (series, observations) = tokio::join!(
            self.transport.get_json(&series_url),
            self.transport.get_json(&observations_url),
        );

        let observations: FredObservationsResponse = serde_json::from_value(observations?)
            .map_err(|e| PulseError::DataShape(format!("unexpected observations payload: {e}")))?;
        let info: Option<FredSeriesInfo> = series
            .ok()
            .and_then(|v| serde_json::from_value::<FredSeriesResponse>(v).ok())
            .and_then(|r| r.seriess.into_iter().next());

        let latest = observations
            .observations
            .first()
            .ok_or_else(|| PulseError::DataShape("no observations available".into()))?;
        let current = parse_observation(&latest.value).ok_or_else(|| {
            PulseError::DataShape(format!("unparseable observation value {:?}", latest.value))
        })?;
        let previous_value = observations
            .observations
            .get(1)
            .and_then(|o| parse_observation(&o.value));

        let title = info.as_ref().and_then(|i| i.title.clone());
        let units = info.as_ref().and_then(|i| i.units.clone());
        let frequency = info.as_ref().and_then(|i| i.frequency_short.clone());

        // Display name precedence: caller-supplied > upstream title > id.
        let name = selection
            .name
            .clone()
            .or_else(|| title.clone())
            .unwrap_or_else(|| series_id.to_string());
        let geography = title.as_deref().and_then(extract_geography);

        let change = if is_change_metric(units.as_deref()) {
            0.0
        } else {
            percent_change(current, previous_value)
        };

        debug!(series = series_id, value = current, change, "Economic metric built");

        Ok(EconomicMetric {
            series: series_id.to_string(),
            name,
            units,
            frequency,
            geography,
            value: current,
            change,
            date: latest.date.clone(),
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

    fn settings_with_series(series: Vec<SeriesSelection>) -> Settings {
        let mut settings = Settings::default();
        settings.api_keys.fred = "test-key".into();
        settings.selected_metrics.economic_series = series;
        settings
    }

    fn observations(values: &[(&str, &str)]) -> serde_json::Value {
        json!({
            "observations": values
                .iter()
                .map(|(date, value)| json!({"date": date, "value": value}))
                .collect::<Vec<_>>()
        })
    }

    #[test]
    fn test_is_change_metric_patterns() {
        assert!(is_change_metric(Some("Percent Change from Year Ago")));
        assert!(is_change_metric(Some("Compounded Annual Rate of Change")));
        assert!(is_change_metric(Some("Growth Rate Same Period Previous Year")));
        assert!(is_change_metric(Some("Percentage Points")));
        assert!(!is_change_metric(Some("Index 2015=100")));
        assert!(!is_change_metric(Some("Percent")));
        assert!(!is_change_metric(None));
    }

    #[test]
    fn test_extract_geography_for_pattern() {
        assert_eq!(
            extract_geography("Consumer Price Index for Japan").as_deref(),
            Some("Japan")
        );
        assert_eq!(
            extract_geography("Harmonized Index of Consumer Prices for Euro Area (19 Countries)")
                .as_deref(),
            Some("Euro Area")
        );
    }

    #[test]
    fn test_extract_geography_in_pattern_and_comma_stop() {
        assert_eq!(
            extract_geography("Unemployment Rate in Germany, Seasonally Adjusted").as_deref(),
            Some("Germany")
        );
    }

    #[test]
    fn test_extract_geography_strips_all_items_suffix() {
        assert_eq!(
            extract_geography("Consumer Price Index for United States All Items").as_deref(),
            Some("United States")
        );
    }

    #[test]
    fn test_extract_geography_requires_capitalized_phrase() {
        assert_eq!(extract_geography("Demand for widgets"), None);
        assert_eq!(extract_geography("Gross Domestic Product"), None);
    }

    #[test]
    fn test_parse_observation_placeholder() {
        assert_eq!(parse_observation("110.5"), Some(110.5));
        assert_eq!(parse_observation("."), None);
    }

    #[tokio::test]
    async fn test_missing_key_fails_whole_domain() {
        let adapter = EconomicAdapter::new(Arc::new(CannedTransport::new()));
        let err = adapter
            .fetch_metrics(&Settings::default(), &[])
            .await
            .unwrap_err();
        assert_eq!(err, PulseError::MissingKey("FRED"));
    }

    #[tokio::test]
    async fn test_change_suppressed_for_rate_series() {
        let transport = CannedTransport::new()
            .respond(
                "/series?series_id=A191RL1Q225SBEA",
                json!({"seriess": [{
                    "title": "Real GDP",
                    "units": "Percent Change from Year Ago",
                    "frequency_short": "Q"
                }]}),
            )
            .respond(
                "/series/observations?series_id=A191RL1Q225SBEA",
                observations(&[("2026-04-01", "2.8"), ("2026-01-01", "1.4")]),
            );

        let adapter = EconomicAdapter::new(Arc::new(transport));
        let settings = settings_with_series(vec![SeriesSelection::bare("A191RL1Q225SBEA")]);

        let metrics = adapter.fetch_metrics(&settings, &[]).await.unwrap();
        assert_eq!(metrics[0].value, 2.8);
        assert_eq!(metrics[0].change, 0.0);
    }

    #[tokio::test]
    async fn test_change_computed_for_level_series() {
        let transport = CannedTransport::new()
            .respond(
                "/series?series_id=CPIAUCSL",
                json!({"seriess": [{
                    "title": "Consumer Price Index for All Urban Consumers",
                    "units": "Index 2015=100",
                    "frequency_short": "M"
                }]}),
            )
            .respond(
                "/series/observations?series_id=CPIAUCSL",
                observations(&[("2026-07-01", "110"), ("2026-06-01", "100")]),
            );

        let adapter = EconomicAdapter::new(Arc::new(transport));
        let settings = settings_with_series(vec![SeriesSelection::bare("CPIAUCSL")]);

        let metrics = adapter.fetch_metrics(&settings, &[]).await.unwrap();
        assert!((metrics[0].change - 10.0).abs() < 1e-9);
        assert_eq!(metrics[0].date, "2026-07-01");
        assert_eq!(metrics[0].frequency.as_deref(), Some("M"));
    }

    #[tokio::test]
    async fn test_display_name_precedence() {
        let transport = CannedTransport::new()
            .respond(
                "/series?series_id=UNRATE",
                json!({"seriess": [{"title": "Unemployment Rate", "units": "Percent"}]}),
            )
            .respond(
                "/series/observations?series_id=UNRATE",
                observations(&[("2026-07-01", "4.1")]),
            );

        let adapter = EconomicAdapter::new(Arc::new(transport));

        // Custom name wins over the upstream title.
        let settings =
            settings_with_series(vec![SeriesSelection::named("UNRATE", "Jobless Rate")]);
        let metrics = adapter.fetch_metrics(&settings, &[]).await.unwrap();
        assert_eq!(metrics[0].name, "Jobless Rate");
    }

    #[tokio::test]
    async fn test_metadata_failure_is_tolerated() {
        let transport = CannedTransport::new()
            .fail("/series?series_id=GDP", PulseError::Timeout)
            .respond(
                "/series/observations?series_id=GDP",
                observations(&[("2026-04-01", "28000"), ("2026-01-01", "27500")]),
            );

        let adapter = EconomicAdapter::new(Arc::new(transport));
        let settings = settings_with_series(vec![SeriesSelection::bare("GDP")]);

        let metrics = adapter.fetch_metrics(&settings, &[]).await.unwrap();
        // No metadata: name falls back to the series id, units stay empty.
        assert_eq!(metrics[0].name, "GDP");
        assert!(metrics[0].units.is_none());
        assert!((metrics[0].change - (500.0 / 27500.0 * 100.0)).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_placeholder_observation_skips_series() {
        let transport = CannedTransport::new()
            .respond("/series?series_id=DFF", json!({"seriess": []}))
            .respond(
                "/series/observations?series_id=DFF",
                observations(&[("2026-07-01", ".")]),
            )
            .respond("/series?series_id=UNRATE", json!({"seriess": []}))
            .respond(
                "/series/observations?series_id=UNRATE",
                observations(&[("2026-07-01", "4.1")]),
            );

        let adapter = EconomicAdapter::new(Arc::new(transport));
        let settings = settings_with_series(vec![
            SeriesSelection::bare("DFF"),
            SeriesSelection::bare("UNRATE"),
        ]);

        let metrics = adapter.fetch_metrics(&settings, &[]).await.unwrap();
        assert_eq!(metrics.len(), 1);
        assert_eq!(metrics[0].series, "UNRATE");
    }

    #[tokio::test]
    async fn test_no_observations_for_every_series_exhausts_domain() {
        let transport = CannedTransport::new()
            .respond("/series?", json!({"seriess": []}))
            .respond("/series/observations?", json!({"observations": []}));

        let adapter = EconomicAdapter::new(Arc::new(transport));
        let settings = settings_with_series(vec![SeriesSelection::bare("GDP")]);

        let err = adapter.fetch_metrics(&settings, &[]).await.unwrap_err();
        assert!(matches!(err, PulseError::Exhausted(_)));
    }
}
