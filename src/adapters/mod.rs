//! Source adapters.
//!
//! One adapter per upstream API, each turning that API's idiosyncratic
//! payload into a list of uniform metric records:
//! - Polymarket (Gamma API) — prediction-market probabilities
//! - Finnhub — equity quotes
//! - exchangerate-api — currency pairs
//! - FRED — macroeconomic series
//!
//! Shared contract: per-item failures are logged and skipped; an adapter
//! fails as a whole only when a required API key is absent or every
//! selected item failed. Selected items are fetched sequentially to bound
//! request burstiness against upstream rate limits; the per-item
//! sub-fetches inside an item run concurrently.

pub mod economic;
pub mod forex;
pub mod polymarket;
pub mod stocks;

/// Percent delta of `current` versus the previous cycle's value.
///
/// Returns 0 when there is no prior value or the prior value is zero —
/// a missing baseline is "no movement", not an error.
pub fn percent_change(current: f64, previous: Option<f64>) -> f64 {
    match previous {
        Some(prev) if prev != 0.0 => (current - prev) / prev.abs() * 100.0,
        _ => 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percent_change_no_baseline() {
        assert_eq!(percent_change(42.0, None), 0.0);
        assert_eq!(percent_change(42.0, Some(0.0)), 0.0);
    }

    #[test]
    fn test_percent_change_basic() {
        assert_eq!(percent_change(110.0, Some(100.0)), 10.0);
        assert_eq!(percent_change(90.0, Some(100.0)), -10.0);
    }

    #[test]
    fn test_percent_change_negative_baseline() {
        // Delta is taken against |previous| so the sign tracks direction.
        assert_eq!(percent_change(-50.0, Some(-100.0)), 50.0);
        assert_eq!(percent_change(-150.0, Some(-100.0)), -50.0);
    }

    #[test]
    fn test_percent_change_unchanged_value() {
        assert_eq!(percent_change(0.7, Some(0.7)), 0.0);
    }
}
