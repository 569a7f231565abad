//! API key validation probes.
//!
//! One cheap authenticated request per provider, so the settings
//! surface can tell a bad key apart from a bad network before the next
//! cycle silently fails.

use std::sync::Arc;

use crate::adapters::economic::FRED_API_URL;
use crate::adapters::stocks::FINNHUB_API_URL;
use crate::net::Transport;
use crate::types::{ApiKeys, PulseError};

#[derive(Debug, Clone, PartialEq)]
pub struct KeyCheck {
    pub valid: bool,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct KeyValidation {
    pub finnhub: KeyCheck,
    pub fred: KeyCheck,
}

/// Probe each configured key with a single test request. An empty key
/// is reported as not provided without touching the network.
pub async fn validate_keys(transport: &Arc<dyn Transport>, keys: &ApiKeys) -> KeyValidation {
    KeyValidation {
        finnhub: probe_finnhub(transport, &keys.finnhub).await,
        fred: probe_fred(transport, &keys.fred).await,
    }
}

async fn probe_finnhub(transport: &Arc<dyn Transport>, key: &str) -> KeyCheck {
    if key.is_empty() {
        return KeyCheck {
            valid: false,
            message: "API key not provided".to_string(),
        };
    }
    let url = format!("{FINNHUB_API_URL}/quote?symbol=AAPL&token={key}");
    match transport.get_json(&url).await {
        Ok(_) => KeyCheck {
            valid: true,
            message: "Valid API key".to_string(),
        },
        Err(PulseError::Http { status: 401, .. }) => KeyCheck {
            valid: false,
            message: "Invalid API key".to_string(),
        },
        Err(e) => KeyCheck {
            valid: false,
            message: format!("Error: {e}"),
        },
    }
}

async fn probe_fred(transport: &Arc<dyn Transport>, key: &str) -> KeyCheck {
    if key.is_empty() {
        return KeyCheck {
            valid: false,
            message: "API key not provided".to_string(),
        };
    }
    let url = format!("{FRED_API_URL}/series?series_id=GDP&api_key={key}&file_type=json");
    match transport.get_json(&url).await {
        Ok(_) => KeyCheck {
            valid: true,
            message: "Valid API key".to_string(),
        },
        // FRED answers a bad key with 400, not 401.
        Err(PulseError::Http { status: 400, .. }) => KeyCheck {
            valid: false,
            message: "Invalid API key".to_string(),
        },
        Err(e) => KeyCheck {
            valid: false,
            message: format!("Error: {e}"),
        },
    }
}
