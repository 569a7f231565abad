//! Currency-pair adapter.
//!
//! Fetches exchange rates from exchangerate-api (no auth required).
//! Requested pairs are grouped by base currency so each distinct base
//! costs one upstream request covering all of its targets. A target
//! absent from the response is dropped with a warning, not a failure.
//!
//! Snapshot identity for this domain is the literal `"{base}/{target}"`.

use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::adapters::percent_change;
use crate::net::Transport;
use crate::types::{now_millis, CurrencyPair, ForexMetric, PulseError, Settings};

const EXCHANGE_RATE_API_URL: &str = "https://api.exchangerate-api.com/v4";

#[derive(Debug, Deserialize)]
struct RatesResponse {
    /// Kept loose: rate values are probed per target.
    #[serde(default)]
    rates: Option<HashMap<String, Value>>,
}

pub struct ForexAdapter {
    transport: Arc<dyn Transport>,
}

impl ForexAdapter {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    pub async fn fetch_metrics(
        &self,
        settings: &Settings,
        previous: &[ForexMetric],
    ) -> Result<Vec<ForexMetric>, PulseError> {
        let pairs = &settings.selected_metrics.forex_pairs;
        if pairs.is_empty() {
            return Ok(Vec::new());
        }

        let mut metrics = Vec::new();
        for (base, targets) in group_by_base(pairs) {
            match self.fetch_base(&base, &targets, previous).await {
                Ok(mut batch) => metrics.append(&mut batch),
                Err(e) => warn!(base = %base, error = %e, "Failed to fetch forex rates"),
            }
        }

        if metrics.is_empty() {
            return Err(PulseError::Exhausted("no forex data retrieved".to_string()));
        }

        Ok(metrics)
    }

    async fn fetch_base(
        &self,
        base: &str,
        targets: &[String],
        previous: &[ForexMetric],
    ) -> Result<Vec<ForexMetric>, PulseError> {
        let url = format!(
            "{EXCHANGE_RATE_API_URL}/latest?from={base}&to={}",
            targets.join(",")
        );
        let body = self.transport.get_json(&url).await?;

        let response: RatesResponse = serde_json::from_value(body)
            .map_err(|e| PulseError::DataShape(format!("unexpected rates payload: {e}")))?;
        let rates = response
            .rates
            .ok_or_else(|| PulseError::DataShape("invalid forex data".into()))?;

        let timestamp = now_millis();
        let mut metrics = Vec::new();
        for target in targets {
            let Some(rate) = rates.get(target).and_then(Value::as_f64) else {
                warn!(base = %base, target = %target, "Exchange rate not available for pair");
                continue;
            };

            let pair = format!("{base}/{target}");
            let prior = previous.iter().find(|m| m.pair == pair).map(|m| m.rate);

            debug!(pair = %pair, rate, "Forex metric built");
            metrics.push(ForexMetric {
                pair,
                base: base.to_string(),
                target: target.clone(),
                rate,
                change: percent_change(rate, prior),
                timestamp,
            });
        }
        Ok(metrics)
    }
}

/// Group pairs by base currency, preserving first-seen order.
/// An empty base defaults to USD.
fn group_by_base(pairs: &[CurrencyPair]) -> Vec<(String, Vec<String>)> {
    let mut grouped: Vec<(String, Vec<String>)> = Vec::new();
    for pair in pairs {
        let base = if pair.base.is_empty() { "USD" } else { pair.base.as_str() };
        match grouped.iter_mut().find(|(b, _)| b == base) {
            Some((_, targets)) => targets.push(pair.target.clone()),
            None => grouped.push((base.to_string(), vec![pair.target.clone()])),
        }
    }
    grouped
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
