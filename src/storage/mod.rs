//! Persistence layer.
//!
//! An opaque key-value store with get/set/clear semantics, plus typed
//! accessors for the four well-known keys. The production backend keeps
//! the whole map in a single JSON state file; `MemoryStore` backs tests.
//!
//! Snapshot and error state are the only mutable shared state in the
//! system. All access is read-then-write with no compare-and-swap;
//! concurrent cycles race with last-writer-wins semantics.

use anyhow::{Context, Result};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, info};

use crate::types::{ErrorState, Settings, Snapshot};

/// Well-known storage keys, matching the schema the display layer reads.
pub mod keys {
    pub const METRICS: &str = "metrics";
    pub const SETTINGS: &str = "settings";
    pub const ERRORS: &str = "errors";
    pub const LAST_UPDATE: &str = "lastUpdate";
}

/// The storage port: an opaque, durable key-value store.
pub trait Storage: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<Value>>;
    fn set(&self, key: &str, value: Value) -> Result<()>;
    fn clear(&self) -> Result<()>;
}

/// Typed accessors over any [`Storage`] backend.
pub trait StorageExt: Storage {
    fn load_settings(&self) -> Result<Option<Settings>> {
        self.get(keys::SETTINGS)?
            .map(serde_json::from_value)
            .transpose()
            .context("Failed to parse stored settings")
    }

    fn save_settings(&self, settings: &Settings) -> Result<()> {
        let value = serde_json::to_value(settings).context("Failed to serialise settings")?;
        self.set(keys::SETTINGS, value)
    }

    fn load_snapshot(&self) -> Result<Option<Snapshot>> {
        self.get(keys::METRICS)?
            .map(serde_json::from_value)
            .transpose()
            .context("Failed to parse stored snapshot")
    }

    /// Replace the snapshot wholesale and stamp the last-update time.
    fn save_snapshot(&self, snapshot: &Snapshot, timestamp: i64) -> Result<()> {
        let value = serde_json::to_value(snapshot).context("Failed to serialise snapshot")?;
        self.set(keys::METRICS, value)?;
        self.set(keys::LAST_UPDATE, Value::from(timestamp))
    }

    fn last_update(&self) -> Result<Option<i64>> {
        Ok(self.get(keys::LAST_UPDATE)?.and_then(|v| v.as_i64()))
    }

    fn load_errors(&self) -> Result<ErrorState> {
        Ok(self
            .get(keys::ERRORS)?
            .map(serde_json::from_value)
            .transpose()
            .context("Failed to parse stored error state")?
            .unwrap_or_default())
    }

    fn save_errors(&self, errors: &ErrorState) -> Result<()> {
        let value = serde_json::to_value(errors).context("Failed to serialise error state")?;
        self.set(keys::ERRORS, value)
    }

    /// Seed default settings on first activation. Returns whether
    /// seeding happened; existing settings are never overwritten.
    fn initialize(&self, defaults: &Settings) -> Result<bool> {
        if self.get(keys::SETTINGS)?.is_some() {
            return Ok(false);
        }
        self.save_settings(defaults)?;
        info!("Storage seeded with default settings");
        Ok(true)
    }
}

impl<S: Storage + ?Sized> StorageExt for S {}

// ---------------------------------------------------------------------------
// File-backed store
// ---------------------------------------------------------------------------

/// Default state file path.
pub const DEFAULT_STATE_FILE: &str = "pulse_state.json";

/// JSON-file store. The whole key-value map lives in one file and every
/// write is a read-modify-write of the full map under a lock.
pub struct FileStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        FileStore { path: path.into(), lock: Mutex::new(()) }
    }

    fn read_all(&self) -> Result<Map<String, Value>> {
        if !Path::new(&self.path).exists() {
            return Ok(Map::new());
        }
        let json = std::fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read state from {}", self.path.display()))?;
        let map: Map<String, Value> = serde_json::from_str(&json)
            .with_context(|| format!("Failed to parse state from {}", self.path.display()))?;
        Ok(map)
    }

    fn write_all(&self, map: &Map<String, Value>) -> Result<()> {
        let json = serde_json::to_string_pretty(map).context("Failed to serialise state")?;
        std::fs::write(&self.path, json)
            .with_context(|| format!("Failed to write state to {}", self.path.display()))?;
        debug!(path = %self.path.display(), keys = map.len(), "State saved");
        Ok(())
    }
}

impl Storage for FileStore {
    fn get(&self, key: &str) -> Result<Option<Value>> {
        let _guard = self.lock.lock().unwrap();
        Ok(self.read_all()?.get(key).cloned())
    }

    fn set(&self, key: &str, value: Value) -> Result<()> {
        let _guard = self.lock.lock().unwrap();
        let mut map = self.read_all()?;
        map.insert(key.to_string(), value);
        self.write_all(&map)
    }

    fn clear(&self) -> Result<()> {
        let _guard = self.lock.lock().unwrap();
        if Path::new(&self.path).exists() {
            std::fs::remove_file(&self.path)
                .with_context(|| format!("Failed to delete state file {}", self.path.display()))?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// In-memory store
// ---------------------------------------------------------------------------

/// In-memory store for tests and ephemeral runs.
#[derive(Default)]
pub struct MemoryStore {
    data: Mutex<HashMap<String, Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Storage for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.data.lock().unwrap().get(key).cloned())
    }

    fn set(&self, key: &str, value: Value) -> Result<()> {
        self.data.lock().unwrap().insert(key.to_string(), value);
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        self.data.lock().unwrap().clear();
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
