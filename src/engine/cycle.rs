//! Cycle orchestrator.
//!
//! One cycle: clear error state, read settings and the prior snapshot,
//! dispatch all four source adapters concurrently, assemble the combined
//! snapshot, and persist it together with the per-domain error state.
//!
//! The central correctness property: one domain's total failure never
//! prevents the other three from completing and persisting. A failed
//! domain contributes an empty list for the cycle, overwriting any
//! previously-successful data — staleness is not preserved.
//!
//! Re-entrancy is last-writer-wins: no lock is held across a cycle, and
//! concurrent cycles independently read-then-write storage.

use anyhow::Result;
use std::sync::Arc;
use tracing::{error, info};

use crate::adapters::economic::EconomicAdapter;
use crate::adapters::forex::ForexAdapter;
use crate::adapters::polymarket::PolymarketAdapter;
use crate::adapters::stocks::StockAdapter;
use crate::net::Transport;
use crate::storage::{Storage, StorageExt};
use crate::types::{now_millis, Domain, ErrorState, PulseError, Snapshot};

/// Terminal state of one cycle.
#[derive(Debug, Clone)]
pub enum CycleStatus {
    /// All four domains were joined and the snapshot was persisted,
    /// regardless of individual domain outcomes.
    Completed(CycleReport),
    /// A failure outside the adapter invocations (storage, typically).
    /// Recorded under the `system` error key; never crashes the host.
    FatallyFailed(String),
}

/// Per-cycle summary for logging and the manual-trigger caller.
#[derive(Debug, Clone, Default)]
pub struct CycleReport {
    pub polymarket: usize,
    pub stocks: usize,
    pub forex: usize,
    pub economic: usize,
    pub failed_domains: Vec<Domain>,
}

impl CycleReport {
    pub fn total_records(&self) -> usize {
        self.polymarket + self.stocks + self.forex + self.economic
    }
}

pub struct CycleRunner {
    storage: Arc<dyn Storage>,
    polymarket: PolymarketAdapter,
    stocks: StockAdapter,
    forex: ForexAdapter,
    economic: EconomicAdapter,
}

impl CycleRunner {
    pub fn new(storage: Arc<dyn Storage>, transport: Arc<dyn Transport>) -> Self {
        Self {
            storage,
            polymarket: PolymarketAdapter::new(transport.clone()),
            stocks: StockAdapter::new(transport.clone()),
            forex: ForexAdapter::new(transport.clone()),
            economic: EconomicAdapter::new(transport),
        }
    }

    /// Run one full cycle. Never panics and never propagates an error
    /// upward — the worst outcome is a `system` error entry in storage.
    pub async fn run(&self) -> CycleStatus {
        info!("Starting metrics cycle");
        match self.run_inner().await {
            Ok(report) => {
                info!(
                    polymarket = report.polymarket,
                    stocks = report.stocks,
                    forex = report.forex,
                    economic = report.economic,
                    failed = ?report.failed_domains,
                    "Cycle complete"
                );
                CycleStatus::Completed(report)
            }
            Err(e) => {
                error!(error = %e, "Fatal error during metrics cycle");
                let mut errors = self.storage.load_errors().unwrap_or_default();
                errors.system = Some(e.to_string());
                if let Err(save_err) = self.storage.save_errors(&errors) {
                    error!(error = %save_err, "Failed to record system error");
                }
                CycleStatus::FatallyFailed(e.to_string())
            }
        }
    }

    async fn run_inner(&self) -> Result<CycleReport> {
        // Previous errors are cleared wholesale before fetching.
        self.storage.save_errors(&ErrorState::default())?;

        let settings = self.storage.load_settings()?.unwrap_or_default();
        let previous = self.storage.load_snapshot()?.unwrap_or_default();

        // All four domains are dispatched concurrently and joined;
        // each outcome is captured independently.
        let (polymarket, stocks, forex, economic) = tokio::join!(
            self.polymarket.fetch_metrics(&settings, &previous.polymarket),
            self.stocks.fetch_metrics(&settings, &previous.stocks),
            self.forex.fetch_metrics(&settings, &previous.forex),
            self.economic.fetch_metrics(&settings, &previous.economic),
        );

        let mut errors = ErrorState::default();
        let snapshot = Snapshot {
            polymarket: unwrap_domain(Domain::Polymarket, polymarket, &mut errors),
            stocks: unwrap_domain(Domain::Stocks, stocks, &mut errors),
            forex: unwrap_domain(Domain::Forex, forex, &mut errors),
            economic: unwrap_domain(Domain::Economic, economic, &mut errors),
        };

        self.storage.save_snapshot(&snapshot, now_millis())?;
        self.storage.save_errors(&errors)?;

        Ok(CycleReport {
            polymarket: snapshot.polymarket.len(),
            stocks: snapshot.stocks.len(),
            forex: snapshot.forex.len(),
            economic: snapshot.economic.len(),
            failed_domains: Domain::ALL
                .iter()
                .copied()
                .filter(|d| errors.get(*d).is_some())
                .collect(),
        })
    }
}

/// Capture one domain's outcome: its record list on success, or an error
/// entry plus an empty list on failure.
fn unwrap_domain<T>(
    domain: Domain,
    result: Result<Vec<T>, PulseError>,
    errors: &mut ErrorState,
) -> Vec<T> {
    match result {
        Ok(metrics) => metrics,
        Err(e) => {
            error!(domain = %domain, error = %e, "Domain fetch failed");
            errors.record(domain, e.to_string());
            Vec::new()
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
