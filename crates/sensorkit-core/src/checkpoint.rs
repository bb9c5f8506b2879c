//! Durable per-(sensor, device) progress markers.
//!
//! [`CheckpointStore`] maps a [`CheckpointKey`] onto a string key in a
//! [`CheckpointBackend`]. It is built once by the module and shared by `Arc`;
//! there is no process-wide cache.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tracing::{debug, info, warn};

use sensorkit_types::{Checkpoint, CheckpointBackend, CheckpointKey, Sensor, StorageError};

use crate::error::Result;

/// Default prefix for persisted checkpoint keys.
pub const DEFAULT_ANCHOR_PREFIX: &str = "sensorkit.anchor";

/// Checkpoint access on top of a backend.
#[derive(Clone)]
pub struct CheckpointStore {
    backend: Arc<dyn CheckpointBackend>,
    prefix: String,
}

impl CheckpointStore {
    pub fn new(backend: Arc<dyn CheckpointBackend>, prefix: impl Into<String>) -> Self {
        Self {
            backend,
            prefix: prefix.into(),
        }
    }

    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Current checkpoint for `key`.
    ///
    /// Never fails: an absent key or a backend failure reads as
    /// [`Checkpoint::DistantPast`], which at worst causes data to be
    /// fetched again.
    #[must_use]
    pub fn get(&self, key: &CheckpointKey) -> Checkpoint {
        let storage_key = key.storage_key(&self.prefix);
        match self.backend.load(&storage_key) {
            Ok(Some(checkpoint)) => checkpoint,
            Ok(None) => Checkpoint::DistantPast,
            Err(e) => {
                warn!(key = %storage_key, error = %e, "Failed to load checkpoint, starting from the distant past");
                Checkpoint::DistantPast
            }
        }
    }

    /// Persist `checkpoint` for `key` unconditionally.
    pub fn set(&self, key: &CheckpointKey, checkpoint: Checkpoint) -> Result<()> {
        let storage_key = key.storage_key(&self.prefix);
        self.backend.store(&storage_key, checkpoint)?;
        debug!(key = %storage_key, %checkpoint, "Stored checkpoint");
        Ok(())
    }

    /// A handle that only ever moves the checkpoint forward.
    #[must_use]
    pub fn anchor(&self, key: CheckpointKey) -> Anchor {
        let current = self.get(&key);
        Anchor {
            store: self.clone(),
            key,
            current,
        }
    }

    /// Delete every checkpoint of `sensor`, across all devices.
    pub fn reset_sensor(&self, sensor: Sensor) -> Result<usize> {
        let prefix = CheckpointKey::sensor_prefix(&self.prefix, sensor);
        let removed = self.backend.delete_matching(&prefix)?;
        info!(%sensor, removed, "Reset checkpoints");
        Ok(removed)
    }

    /// Delete every checkpoint under this store's prefix.
    pub fn reset_all(&self) -> Result<usize> {
        let prefix = format!("{}.", self.prefix);
        let removed = self.backend.delete_matching(&prefix)?;
        info!(removed, "Reset all checkpoints");
        Ok(removed)
    }
}

impl std::fmt::Debug for CheckpointStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CheckpointStore")
            .field("prefix", &self.prefix)
            .finish_non_exhaustive()
    }
}

/// Monotonic view of one checkpoint.
#[derive(Debug)]
pub struct Anchor {
    store: CheckpointStore,
    key: CheckpointKey,
    current: Checkpoint,
}

impl Anchor {
    #[must_use]
    pub fn key(&self) -> &CheckpointKey {
        &self.key
    }

    /// The last value read or written.
    #[must_use]
    pub fn current(&self) -> Checkpoint {
        self.current
    }

    /// Move the checkpoint to `next`.
    ///
    /// Returns `Ok(false)` without touching the backend when `next` equals the
    /// current value or would move it backwards. On a write failure the
    /// in-memory value is left unchanged.
    pub fn update(&mut self, next: Checkpoint) -> Result<bool> {
        if next == self.current {
            return Ok(false);
        }
        if next < self.current {
            warn!(key = %self.key, current = %self.current, requested = %next, "Refusing to move checkpoint backwards");
            return Ok(false);
        }
        self.store.set(&self.key, next)?;
        self.current = next;
        Ok(true)
    }
}

/// In-memory backend for tests and ephemeral use.
///
/// Counts successful writes and can be told to fail them.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    entries: Mutex<HashMap<String, Checkpoint>>,
    writes: AtomicUsize,
    fail_writes: AtomicBool,
    fail_loads: AtomicBool,
}

impl MemoryBackend {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of successful `store` calls so far.
    #[must_use]
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Make subsequent `store` calls fail (or succeed again).
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Make subsequent `load` calls fail (or succeed again).
    pub fn set_fail_loads(&self, fail: bool) {
        self.fail_loads.store(fail, Ordering::SeqCst);
    }

    /// Snapshot of every stored key, sorted.
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.entries().keys().cloned().collect();
        keys.sort();
        keys
    }

    fn entries(&self) -> std::sync::MutexGuard<'_, HashMap<String, Checkpoint>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl CheckpointBackend for MemoryBackend {
    fn load(&self, key: &str) -> std::result::Result<Option<Checkpoint>, StorageError> {
        if self.fail_loads.load(Ordering::SeqCst) {
            return Err(StorageError::new(format!("injected load failure for {key}")));
        }
        Ok(self.entries().get(key).copied())
    }

    fn store(&self, key: &str, checkpoint: Checkpoint) -> std::result::Result<(), StorageError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StorageError::new(format!("injected write failure for {key}")));
        }
        self.entries().insert(key.to_string(), checkpoint);
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn delete(&self, key: &str) -> std::result::Result<(), StorageError> {
        self.entries().remove(key);
        Ok(())
    }

    fn delete_matching(&self, prefix: &str) -> std::result::Result<usize, StorageError> {
        let mut entries = self.entries();
        let before = entries.len();
        entries.retain(|key, _| !key.starts_with(prefix));
        Ok(before - entries.len())
    }
}
