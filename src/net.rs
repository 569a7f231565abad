//! Timed HTTP fetch.
//!
//! Wraps every upstream GET in a hard deadline and uniform error
//! translation. The deadline is enforced here with `tokio::time::timeout`
//! rather than trusting client-side defaults; dropping the in-flight
//! future cancels the request. Schema validation is each adapter's job —
//! this layer only guarantees "parsed JSON or a typed error".

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

use anyhow::{Context, Result};

use crate::types::PulseError;

/// Default per-request deadline (10 seconds).
pub const DEFAULT_TIMEOUT_MS: u64 = 10_000;

/// Abstraction over the network seam.
///
/// Adapters talk to upstream APIs only through this trait, so tests can
/// substitute canned responses without any sockets.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Issue a GET and return the parsed JSON body.
    async fn get_json(&self, url: &str) -> Result<Value, PulseError>;
}

// ---------------------------------------------------------------------------
// Retry policy
// ---------------------------------------------------------------------------

/// Fixed retry/backoff knob applied to transient failures only.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub initial_delay: Duration,
    pub backoff_multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            max_retries: 3,
            initial_delay: Duration::from_millis(1000),
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (zero-based): initial × multiplier^attempt.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let secs = self.initial_delay.as_secs_f64() * self.backoff_multiplier.powi(attempt as i32);
        Duration::from_secs_f64(secs)
    }
}

// ---------------------------------------------------------------------------
// HTTP transport
// ---------------------------------------------------------------------------

/// Production transport: shared `reqwest::Client` + deadline + retry.
pub struct HttpTransport {
    http: Client,
    timeout: Duration,
    retry: RetryPolicy,
}

impl HttpTransport {
    pub fn new(timeout: Duration, retry: RetryPolicy) -> Result<Self> {
        let http = Client::builder()
            .user_agent("marketpulse/0.1.0")
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self { http, timeout, retry })
    }

    pub fn with_defaults() -> Result<Self> {
        Self::new(Duration::from_millis(DEFAULT_TIMEOUT_MS), RetryPolicy::default())
    }

    /// One request attempt: send + status check + body parse, all raced
    /// against a single deadline.
    async fn attempt(&self, url: &str) -> Result<Value, PulseError> {
        let fut = async {
            let resp = self.http.get(url).send().await.map_err(|e| {
                if e.is_timeout() {
                    PulseError::Timeout
                } else {
                    PulseError::Network(e.to_string())
                }
            })?;

            let status = resp.status();
            if !status.is_success() {
                return Err(PulseError::Http {
                    status: status.as_u16(),
                    status_text: status.canonical_reason().unwrap_or("Unknown").to_string(),
                });
            }

            resp.json::<Value>()
                .await
                .map_err(|e| PulseError::DataShape(format!("invalid JSON body: {e}")))
        };

        match tokio::time::timeout(self.timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(PulseError::Timeout),
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get_json(&self, url: &str) -> Result<Value, PulseError> {
        with_retry(&self.retry, url, || self.attempt(url)).await
    }
}

/// Drive one request operation through the retry policy: transient
/// failures (per [`PulseError::is_retryable`]) are retried up to
/// `max_retries` times with backoff, anything else returns immediately.
async fn with_retry<Fut>(
    policy: &RetryPolicy,
    url: &str,
    mut op: impl FnMut() -> Fut,
) -> Result<Value, PulseError>
where
    Fut: std::future::Future<Output = Result<Value, PulseError>>,
{
    let mut attempt = 0u32;
    loop {
        match op().await {
            Ok(value) => {
                debug!(url = %redact(url), "Fetch succeeded");
                return Ok(value);
            }
            Err(e) if e.is_retryable() && attempt < policy.max_retries => {
                let delay = policy.delay_for(attempt);
                warn!(
                    url = %redact(url),
                    error = %e,
                    attempt = attempt + 1,
                    delay_ms = delay.as_millis() as u64,
                    "Transient fetch failure, retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Strip the query string before logging — it can carry API keys.
fn redact(url: &str) -> &str {
    url.split('?').next().unwrap_or(url)
}

// ---------------------------------------------------------------------------
// Test transport
// ---------------------------------------------------------------------------


// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
