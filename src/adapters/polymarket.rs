//! Polymarket adapter.
//!
//! Fetches events from the Gamma API (no auth required). Selection is a
//! list of event slugs; an empty selection falls back to the top 5
//! currently-active markets from the generic listing endpoint.
//!
//! Gamma API: https://gamma-api.polymarket.com
//!
//! The `/events?slug=` response arrives in one of three shapes — a bare
//! array, an envelope with a `data` array, or a single direct object —
//! so lookup goes through an explicit normalization step before any
//! field is touched. Outcome prices are just as loose: a JSON-encoded
//! string array under `outcomePrices`, or object arrays under
//! `outcomes`/`outcomeTokens`.

use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};
use urlencoding::encode;

use crate::adapters::percent_change;
use crate::net::Transport;
use crate::types::{now_millis, MarketMetric, PulseError, Settings};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

const GAMMA_API_URL: &str = "https://gamma-api.polymarket.com";
const TOP_MARKETS_LIMIT: usize = 5;

/// Neutral prior when no price data is parseable. Zero would imply
/// impossibility, which the data does not support.
const DEFAULT_PROBABILITY: f64 = 0.5;

// ---------------------------------------------------------------------------
// Gamma API response types
// ---------------------------------------------------------------------------

/// A Gamma event carrying one or more markets. Only the fields we need.
#[derive(Debug, Clone, Deserialize)]
pub struct GammaEvent {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub slug: String,
    #[serde(default)]
    pub markets: Vec<GammaMarket>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GammaMarket {
    /// Numeric or string id depending on endpoint version.
    #[serde(default)]
    pub id: Option<Value>,
    #[serde(default, rename = "conditionId")]
    pub condition_id: Option<String>,
    #[serde(default)]
    pub question: Option<String>,
    #[serde(default, rename = "groupItemTitle")]
    pub group_item_title: Option<String>,
    /// Outcome prices as a JSON-encoded string array: "[\"0.65\",\"0.35\"]"
    #[serde(default, rename = "outcomePrices")]
    pub outcome_prices: Option<String>,
    /// Alternate shape: [{"price": ...}, ...]
    #[serde(default)]
    pub outcomes: Option<Value>,
    #[serde(default, rename = "outcomeTokens")]
    pub outcome_tokens: Option<Value>,
}

/// The three shapes `/events?slug=` is known to return.
///
/// `Envelope` must be tried before `Single`: every `GammaEvent` field is
/// defaulted, so a `{"data": [...]}` object would otherwise match `Single`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum EventsResponse {
    Bare(Vec<GammaEvent>),
    Envelope { data: Vec<GammaEvent> },
    Single(GammaEvent),
}

/// The listing endpoint wraps events differently again.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum EventListing {
    Bare(Vec<GammaEvent>),
    Envelope { events: Vec<GammaEvent> },
}

/// Normalize a slug-lookup response to the one matching event.
///
/// A direct object counts as a match only when its slug equals the
/// requested slug; anything else is the unmatched case.
fn resolve_event(body: Value, slug: &str) -> Option<GammaEvent> {
    match serde_json::from_value::<EventsResponse>(body).ok()? {
        EventsResponse::Bare(mut events) => {
            (!events.is_empty()).then(|| events.remove(0))
        }
        EventsResponse::Envelope { mut data } => {
            (!data.is_empty()).then(|| data.remove(0))
        }
        EventsResponse::Single(event) => (event.slug == slug).then_some(event),
    }
}

// ---------------------------------------------------------------------------
// Market selection
// ---------------------------------------------------------------------------

struct TopMarket<'a> {
    market: &'a GammaMarket,
    probability: f64,
    /// Leading option label; only set for multi-choice events.
    top_outcome: Option<String>,
}

/// Pick the representative market of an event.
///
/// Single market ⇒ binary: its first outcome price is the probability and
/// no top-outcome annotation is attached. Multiple markets ⇒ multi-choice:
/// the market with the highest leading-outcome price wins and its label
/// (group item title, falling back to question text) is recorded.
fn find_top_market(markets: &[GammaMarket]) -> Option<TopMarket<'_>> {
    let first = markets.first()?;
    let is_multi_choice = markets.len() > 1;

    let mut best_market = first;
    let mut best_probability = 0.0f64;
    let mut top_outcome = None;

    for market in markets {
        let prob = leading_price(market).unwrap_or(0.0);
        if prob > best_probability {
            best_probability = prob;
            best_market = market;
            top_outcome = market
                .group_item_title
                .clone()
                .or_else(|| market.question.clone());
        }
    }

    if !is_multi_choice {
        top_outcome = None;
    }

    let probability = if best_probability > 0.0 {
        best_probability
    } else {
        DEFAULT_PROBABILITY
    };

    Some(TopMarket { market: best_market, probability, top_outcome })
}

/// First parsed leading-outcome price. Tries `outcomePrices`, then
/// `outcomes`, then `outcomeTokens`; first parseable field wins.
fn leading_price(market: &GammaMarket) -> Option<f64> {
    market
        .outcome_prices
        .as_deref()
        .and_then(price_from_encoded_array)
        .or_else(|| first_entry_price(market.outcomes.as_ref()))
        .or_else(|| first_entry_price(market.outcome_tokens.as_ref()))
}

/// "[\"0.65\",\"0.35\"]" → 0.65
fn price_from_encoded_array(raw: &str) -> Option<f64> {
    let prices: Vec<Value> = serde_json::from_str(raw).ok()?;
    value_as_f64(prices.first()?)
}

/// [{"price": "0.7"}, ...] → 0.7
fn first_entry_price(field: Option<&Value>) -> Option<f64> {
    value_as_f64(field?.as_array()?.first()?.get("price")?)
}

/// Prices arrive as numbers or numeric strings.
fn value_as_f64(v: &Value) -> Option<f64> {
    match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Stable identity for change-matching: condition id, falling back to
/// market id, falling back to the event slug itself.
fn market_key(market: &GammaMarket, slug: &str) -> String {
    market
        .condition_id
        .clone()
        .filter(|s| !s.is_empty())
        .or_else(|| market.id.as_ref().and_then(id_string))
        .unwrap_or_else(|| slug.to_string())
}

fn id_string(v: &Value) -> Option<String> {
    match v {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Adapter
// ---------------------------------------------------------------------------

pub struct PolymarketAdapter {
    transport: Arc<dyn Transport>,
}

impl PolymarketAdapter {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    /// Fetch metrics for the selected slugs, or the top active markets
    /// when the selection is empty.
    pub async fn fetch_metrics(
        &self,
        settings: &Settings,
        previous: &[MarketMetric],
    ) -> Result<Vec<MarketMetric>, PulseError> {
        let slugs = &settings.selected_metrics.polymarket_ids;
        if slugs.is_empty() {
            return self.fetch_top_markets(previous).await;
        }

        let mut metrics = Vec::new();
        for slug in slugs {
            match self.fetch_event(slug, previous).await {
                Ok(Some(metric)) => metrics.push(metric),
                Ok(None) => warn!(slug = %slug, "No market data found for slug"),
                Err(e) => warn!(slug = %slug, error = %e, "Failed to fetch Polymarket event"),
            }
        }

        if metrics.is_empty() {
            return Err(PulseError::Exhausted(
                "no Polymarket metrics retrieved; leave the selection empty \
                 to track the top 5 active markets"
                    .to_string(),
            ));
        }

        Ok(metrics)
    }

    async fn fetch_event(
        &self,
        slug: &str,
        previous: &[MarketMetric],
    ) -> Result<Option<MarketMetric>, PulseError> {
        let url = format!("{GAMMA_API_URL}/events?slug={}", encode(slug));
        let body = self.transport.get_json(&url).await?;

        let Some(event) = resolve_event(body, slug) else {
            return Ok(None);
        };
        Ok(Self::build_metric(&event, slug, previous))
    }

    async fn fetch_top_markets(
        &self,
        previous: &[MarketMetric],
    ) -> Result<Vec<MarketMetric>, PulseError> {
        let url = format!("{GAMMA_API_URL}/events?limit={TOP_MARKETS_LIMIT}&active=true");
        let body = self.transport.get_json(&url).await?;

        let events = match serde_json::from_value::<EventListing>(body) {
            Ok(EventListing::Bare(events)) => events,
            Ok(EventListing::Envelope { events }) => events,
            Err(_) => {
                return Err(PulseError::DataShape(
                    "unrecognized Polymarket events listing".into(),
                ))
            }
        };

        let mut metrics = Vec::new();
        for event in events.iter().take(TOP_MARKETS_LIMIT) {
            if event.markets.is_empty() {
                continue;
            }
            if let Some(metric) = Self::build_metric(event, &event.slug, previous) {
                metrics.push(metric);
            }
        }
        Ok(metrics)
    }

    fn build_metric(
        event: &GammaEvent,
        slug: &str,
        previous: &[MarketMetric],
    ) -> Option<MarketMetric> {
        let top = find_top_market(&event.markets)?;
        let id = market_key(top.market, slug);
        let prior = previous.iter().find(|m| m.id == id).map(|m| m.probability);

        let title = event
            .title
            .clone()
            .or_else(|| top.market.question.clone())
            .unwrap_or_else(|| "Unknown Market".to_string());

        debug!(
            slug,
            probability = top.probability,
            top_outcome = ?top.top_outcome,
            "Polymarket event resolved"
        );

        Some(MarketMetric {
            id,
            title,
            slug: slug.to_string(),
            probability: top.probability,
            top_outcome: top.top_outcome,
            change: percent_change(top.probability, prior),
            timestamp: now_millis(),
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
