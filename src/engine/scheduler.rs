//! Scheduling driver.
//!
//! Owns *when* a cycle runs, not how. The host (binary main loop, or any
//! embedding) drives these explicit entrypoints:
//!
//! - `on_install`: first activation ever, seed default settings and run
//!   an immediate cycle.
//! - `on_schedule`: the recurring trigger fired.
//! - `on_manual_trigger`: an on-demand refresh from the display layer,
//!   reporting success/failure back to the caller.
//! - `on_settings_changed`: the settings surface committed a new record;
//!   persist it, run an immediate cycle, and hand the host the new
//!   interval so it can recreate its timer.
//!
//! The driver owns no in-memory state that must survive between
//! triggers: everything is re-read from storage on each activation.

use anyhow::Result;
use std::sync::Arc;
use tracing::info;

use crate::engine::cycle::{CycleReport, CycleRunner, CycleStatus};
use crate::net::Transport;
use crate::storage::{Storage, StorageExt};
use crate::types::{Settings, DEFAULT_UPDATE_FREQUENCY};

pub struct Scheduler {
    storage: Arc<dyn Storage>,
    runner: CycleRunner,
}

impl Scheduler {
    pub fn new(storage: Arc<dyn Storage>, transport: Arc<dyn Transport>) -> Self {
        let runner = CycleRunner::new(storage.clone(), transport);
        Self { storage, runner }
    }

    /// First activation: seed settings if absent and run one cycle
    /// immediately. Returns the interval (minutes) the host should
    /// schedule its recurring trigger at.
    pub async fn on_install(&self, defaults: Settings) -> Result<u32> {
        defaults.validate()?;
        let seeded = self.storage.initialize(&defaults)?;
        info!(seeded, "Scheduler installed");

        self.runner.run().await;
        Ok(self.current_frequency())
    }

    /// The recurring trigger fired: run one cycle.
    pub async fn on_schedule(&self) -> CycleStatus {
        self.runner.run().await
    }

    /// Manual refresh. Per-domain failures still count as success: the
    /// cycle completed and the error state carries the detail; only a
    /// fatal (system-level) failure is reported as an error.
    pub async fn on_manual_trigger(&self) -> Result<CycleReport, String> {
        match self.runner.run().await {
            CycleStatus::Completed(report) => Ok(report),
            CycleStatus::FatallyFailed(message) => Err(message),
        }
    }

    /// Settings changed: validate, replace the stored record wholesale,
    /// run one cycle immediately, and return the new interval for the
    /// host to reschedule its trigger with.
    pub async fn on_settings_changed(&self, new_settings: Settings) -> Result<u32> {
        new_settings.validate()?;
        self.storage.save_settings(&new_settings)?;
        let frequency = new_settings.update_frequency;
        info!(frequency_minutes = frequency, "Settings updated, rescheduling");

        self.runner.run().await;
        Ok(frequency)
    }

    /// Current polling interval, re-read from storage. The stored record
    /// is untrusted (storage enforces no schema), so an out-of-range
    /// frequency falls back to the default rather than reaching a timer.
    pub fn current_frequency(&self) -> u32 {
        self.storage
            .load_settings()
            .ok()
            .flatten()
            .filter(|s| s.validate().is_ok())
            .map(|s| s.update_frequency)
            .unwrap_or(DEFAULT_UPDATE_FREQUENCY)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::testutil::CannedTransport;
    use crate::storage::MemoryStore;
    use serde_json::json;

    fn scheduler_with_store() -> (Scheduler, Arc<MemoryStore>) {
        let storage = Arc::new(MemoryStore::new());
        let transport = CannedTransport::new()
            .respond("active=true", json!([]))
            .respond("from=USD", json!({"rates": {"EUR": 0.92, "JPY": 151.2, "GBP": 0.79}}));
        let scheduler = Scheduler::new(storage.clone(), Arc::new(transport));
        (scheduler, storage)
    }

    #[tokio::test]
    async fn test_install_seeds_defaults_and_runs() {
        let (scheduler, storage) = scheduler_with_store();

        let frequency = scheduler.on_install(Settings::default()).await.unwrap();
        assert_eq!(frequency, DEFAULT_UPDATE_FREQUENCY);

        // The immediate first cycle ran and persisted a snapshot.
        assert!(storage.load_snapshot().unwrap().is_some());
        assert!(storage.load_settings().unwrap().is_some());
    }

    #[tokio::test]
    async fn test_reinstall_preserves_existing_settings() {
        let (scheduler, storage) = scheduler_with_store();

        let mut settings = Settings::default();
        settings.update_frequency = 42;
        storage.save_settings(&settings).unwrap();

        let frequency = scheduler.on_install(Settings::default()).await.unwrap();
        assert_eq!(frequency, 42);
    }

    #[tokio::test]
    async fn test_settings_change_persists_and_returns_interval() {
        let (scheduler, storage) = scheduler_with_store();

        let mut settings = Settings::default();
        settings.update_frequency = 10;
        let frequency = scheduler.on_settings_changed(settings).await.unwrap();

        assert_eq!(frequency, 10);
        assert_eq!(storage.load_settings().unwrap().unwrap().update_frequency, 10);
        // The settings change triggered an immediate cycle.
        assert!(storage.last_update().unwrap().is_some());
    }

    #[tokio::test]
    async fn test_settings_change_rejects_invalid_frequency() {
        let (scheduler, storage) = scheduler_with_store();

        let mut settings = Settings::default();
        settings.update_frequency = 0;
        assert!(scheduler.on_settings_changed(settings).await.is_err());
        // Nothing was persisted and no cycle ran.
        assert!(storage.load_settings().unwrap().is_none());
        assert!(storage.last_update().unwrap().is_none());
    }

    #[tokio::test]
    async fn test_out_of_range_stored_frequency_falls_back_to_default() {
        let (scheduler, storage) = scheduler_with_store();

        // A hand-edited or corrupt state file can hold any number; it
        // must never reach the host's timer.
        let mut settings = Settings::default();
        settings.update_frequency = 0;
        storage.save_settings(&settings).unwrap();
        assert_eq!(scheduler.current_frequency(), DEFAULT_UPDATE_FREQUENCY);

        settings.update_frequency = 61;
        storage.save_settings(&settings).unwrap();
        assert_eq!(scheduler.current_frequency(), DEFAULT_UPDATE_FREQUENCY);
    }

    #[tokio::test]
    async fn test_manual_trigger_reports_completion() {
        let (scheduler, _storage) = scheduler_with_store();
        let report = scheduler.on_manual_trigger().await.unwrap();
        // Forex succeeds with the default three pairs; stocks/economic
        // fail on missing keys but the cycle still completes.
        assert_eq!(report.forex, 3);
        assert_eq!(report.failed_domains.len(), 2);
    }
}
