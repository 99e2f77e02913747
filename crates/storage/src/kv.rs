//! Key-value store contract
//!
//! geostash only needs two operations from a store: put a byte buffer under a
//! string key and get it back. Values are binary-safe; the stored length is
//! always the exact buffer length, embedded NULs included.
//!
//! [`MemoryStore`] is the in-process implementation. Handles obtained from
//! [`MemoryStore::select`] share one server-side state, with every database
//! index a separate keyspace.

use crate::config::{ConfigError, StoreConfig};
use geostash_core::{Error, Result};
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Minimal binary-safe key-value store
pub trait KeyValueStore: Send + Sync {
    /// Store exactly `value.len()` bytes under `key`, replacing any previous value
    fn put(&self, key: &str, value: &[u8]) -> Result<()>;

    /// Fetch the bytes stored under `key`, or `None` if the key is absent
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;
}

impl<T: KeyValueStore + ?Sized> KeyValueStore for Arc<T> {
    fn put(&self, key: &str, value: &[u8]) -> Result<()> {
        (**self).put(key, value)
    }

    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        (**self).get(key)
    }
}

impl<T: KeyValueStore + ?Sized> KeyValueStore for &T {
    fn put(&self, key: &str, value: &[u8]) -> Result<()> {
        (**self).put(key, value)
    }

    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        (**self).get(key)
    }
}

type Keyspace = FxHashMap<String, Vec<u8>>;

/// In-memory store with numbered keyspaces
#[derive(Debug)]
pub struct MemoryStore {
    keyspaces: Arc<RwLock<FxHashMap<u32, Keyspace>>>,
    database: u32,
    connected: AtomicBool,
}

impl MemoryStore {
    /// Fresh store using database 0
    pub fn new() -> Self {
        MemoryStore {
            keyspaces: Arc::new(RwLock::new(FxHashMap::default())),
            database: 0,
            connected: AtomicBool::new(true),
        }
    }

    /// Fresh store using the database index from `config`
    pub fn connect(config: &StoreConfig) -> std::result::Result<Self, ConfigError> {
        config.validate()?;
        debug!(
            address = %config.address(),
            database = config.database,
            "Connected to in-memory store"
        );
        Ok(MemoryStore {
            database: config.database,
            ..Self::new()
        })
    }

    /// Another connected handle on the same state, using `database`
    pub fn select(&self, database: u32) -> Self {
        MemoryStore {
            keyspaces: Arc::clone(&self.keyspaces),
            database,
            connected: AtomicBool::new(true),
        }
    }

    /// Database index this handle reads and writes
    pub fn database(&self) -> u32 {
        self.database
    }

    /// Drop the connection; later calls fail with `StoreUnavailable`
    pub fn disconnect(&self) {
        self.connected.store(false, Ordering::Release);
    }

    /// Restore the connection
    pub fn reconnect(&self) {
        self.connected.store(true, Ordering::Release);
    }

    /// Whether calls are currently accepted
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    /// Number of keys in this handle's database
    pub fn len(&self) -> usize {
        self.keyspaces
            .read()
            .get(&self.database)
            .map_or(0, |keyspace| keyspace.len())
    }

    /// Whether this handle's database holds no keys
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn ensure_connected(&self) -> Result<()> {
        if self.is_connected() {
            Ok(())
        } else {
            Err(Error::StoreUnavailable(format!(
                "in-memory store database {} is disconnected",
                self.database
            )))
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyValueStore for MemoryStore {
    fn put(&self, key: &str, value: &[u8]) -> Result<()> {
        self.ensure_connected()?;
        self.keyspaces
            .write()
            .entry(self.database)
            .or_default()
            .insert(key.to_string(), value.to_vec());
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        self.ensure_connected()?;
        Ok(self
            .keyspaces
            .read()
            .get(&self.database)
            .and_then(|keyspace| keyspace.get(key))
            .cloned())
    }
}
