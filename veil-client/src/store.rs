//! Pluggable keyed storage for client session state.
//!
//! The [`KeyValueStore`] trait abstracts over where the client keeps the
//! little state it must survive restarts with (currently the sticky default
//! DC). The credential store that backs it in production, usually encrypted
//! at rest, is owned by the host application and plugged in here.
//!
//! Built-in backends:
//! * [`InMemoryStore`] — nothing touches disk (default).
//! * [`JsonFileStore`] — one flat JSON object per file.
//! * [`ScopedStore`] — namespaces another store per local identity.

use std::collections::{BTreeMap, HashMap};
use std::io;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

// ─── Trait ────────────────────────────────────────────────────────────────────

/// A string-to-string store.
pub trait KeyValueStore: Send + Sync {
    /// Read the value stored under `key`, or `None` if absent.
    fn get(&self, key: &str) -> io::Result<Option<String>>;

    /// Store `value` under `key`, replacing any previous value.
    fn set(&self, key: &str, value: &str) -> io::Result<()>;

    /// Remove `key`. Removing an absent key is not an error.
    fn remove(&self, key: &str) -> io::Result<()>;

    /// Human-readable name of this backend (for log messages).
    fn name(&self) -> &str;
}

// ─── InMemoryStore ────────────────────────────────────────────────────────────

/// An ephemeral store. Useful for tests or for sessions that should always
/// start fresh.
#[derive(Default)]
pub struct InMemoryStore {
    data: Mutex<HashMap<String, String>>,
}

impl InMemoryStore {
    pub fn new() -> Self { Self::default() }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        self.data.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl KeyValueStore for InMemoryStore {
    fn get(&self, key: &str) -> io::Result<Option<String>> {
        Ok(self.lock().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> io::Result<()> {
        self.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> io::Result<()> {
        self.lock().remove(key);
        Ok(())
    }

    fn name(&self) -> &str { "in-memory" }
}

// ─── JsonFileStore ────────────────────────────────────────────────────────────

/// Stores all keys in a single JSON object on disk.
///
/// Every `set`/`remove` rewrites the whole file; the store is meant for a
/// handful of keys, not bulk data.
pub struct JsonFileStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), lock: Mutex::new(()) }
    }

    fn read_all(&self) -> io::Result<BTreeMap<String, String>> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }
        let raw = std::fs::read(&self.path)?;
        if raw.is_empty() {
            return Ok(BTreeMap::new());
        }
        serde_json::from_slice(&raw).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
    }

    fn write_all(&self, map: &BTreeMap<String, String>) -> io::Result<()> {
        let raw = serde_json::to_vec_pretty(map).map_err(io::Error::other)?;
        std::fs::write(&self.path, raw)
    }

    fn update(&self, f: impl FnOnce(&mut BTreeMap<String, String>)) -> io::Result<()> {
        let _guard = self.lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let mut map = self.read_all()?;
        f(&mut map);
        self.write_all(&map)
    }
}

impl KeyValueStore for JsonFileStore {
    fn get(&self, key: &str) -> io::Result<Option<String>> {
        let _guard = self.lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        Ok(self.read_all()?.remove(key))
    }

    fn set(&self, key: &str, value: &str) -> io::Result<()> {
        self.update(|map| { map.insert(key.to_string(), value.to_string()); })
    }

    fn remove(&self, key: &str) -> io::Result<()> {
        self.update(|map| { map.remove(key); })
    }

    fn name(&self) -> &str { "json-file" }
}

// ─── ScopedStore ──────────────────────────────────────────────────────────────

/// Prefixes every key with `<scope>/` so several local identities can share
/// one backing store without seeing each other's entries.
pub struct ScopedStore {
    inner: Arc<dyn KeyValueStore>,
    scope: String,
}

impl ScopedStore {
    pub fn new(inner: Arc<dyn KeyValueStore>, scope: impl Into<String>) -> Self {
        Self { inner, scope: scope.into() }
    }

    fn key(&self, key: &str) -> String {
        format!("{}/{}", self.scope, key)
    }
}

impl KeyValueStore for ScopedStore {
    fn get(&self, key: &str) -> io::Result<Option<String>> {
        self.inner.get(&self.key(key))
    }

    fn set(&self, key: &str, value: &str) -> io::Result<()> {
        self.inner.set(&self.key(key), value)
    }

    fn remove(&self, key: &str) -> io::Result<()> {
        self.inner.remove(&self.key(key))
    }

    fn name(&self) -> &str { "scoped" }
}
