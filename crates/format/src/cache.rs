//! Memoized serialization buffer
//!
//! Each codec entity owns one `BufferCache` holding the last bytes it encoded.
//!
//! ## State Machine
//!
//! ```text
//! Uninitialized --get--> Latest
//! Uninitialized --mutate--> Uninitialized
//! Latest --get--> Latest        (cached bytes returned, no re-encode)
//! Latest --mutate--> Stale
//! Stale --get--> Latest         (re-encoded)
//! Stale --mutate--> Stale
//! ```
//!
//! `get_or_encode` is the only transition besides `invalidate`. A failed
//! encode leaves both the state and the previously cached bytes untouched.

use geostash_core::Result;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, trace};

/// Staleness of a cached buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheState {
    /// Nothing has been encoded yet
    Uninitialized,
    /// Bytes exist but the entity changed since they were encoded
    Stale,
    /// Bytes reflect the entity's current content
    Latest,
}

#[derive(Debug, Clone)]
struct Slot {
    bytes: Option<Arc<[u8]>>,
    state: CacheState,
}

/// Per-entity cache of the last encoded buffer
#[derive(Debug)]
pub struct BufferCache {
    slot: Mutex<Slot>,
}

impl BufferCache {
    /// Create an empty cache
    pub fn new() -> Self {
        BufferCache {
            slot: Mutex::new(Slot {
                bytes: None,
                state: CacheState::Uninitialized,
            }),
        }
    }

    /// Create a cache already holding the current bytes of its entity
    ///
    /// Used when an entity is decoded from a buffer: the input is its encoding.
    pub fn with_latest(bytes: impl Into<Arc<[u8]>>) -> Self {
        BufferCache {
            slot: Mutex::new(Slot {
                bytes: Some(bytes.into()),
                state: CacheState::Latest,
            }),
        }
    }

    /// Current state
    pub fn state(&self) -> CacheState {
        self.slot.lock().state
    }

    /// Cached bytes, whatever their state
    pub fn peek(&self) -> Option<Arc<[u8]>> {
        self.slot.lock().bytes.clone()
    }

    /// Mark cached bytes out of date
    ///
    /// Only `Latest` moves (to `Stale`); other states are left as they are.
    pub fn invalidate(&mut self) {
        let slot = self.slot.get_mut();
        if slot.state == CacheState::Latest {
            slot.state = CacheState::Stale;
        }
    }

    /// Return the cached bytes, running `encode` first unless they are `Latest`
    pub fn get_or_encode<F>(&self, encode: F) -> Result<Arc<[u8]>>
    where
        F: FnOnce() -> Result<Vec<u8>>,
    {
        let mut slot = self.slot.lock();
        if slot.state == CacheState::Latest {
            if let Some(bytes) = &slot.bytes {
                trace!(len = bytes.len(), "Buffer cache hit");
                return Ok(Arc::clone(bytes));
            }
        }

        let previous = slot.state;
        let bytes: Arc<[u8]> = encode()?.into();
        debug!(
            len = bytes.len(),
            previous = ?previous,
            "Buffer cache recomputed"
        );
        slot.bytes = Some(Arc::clone(&bytes));
        slot.state = CacheState::Latest;
        Ok(bytes)
    }
}

impl Default for BufferCache {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for BufferCache {
    /// Copies the cached buffer into a fresh allocation
    fn clone(&self) -> Self {
        let slot = self.slot.lock();
        BufferCache {
            slot: Mutex::new(Slot {
                bytes: slot.bytes.as_ref().map(|b| Arc::from(b.to_vec())),
                state: slot.state,
            }),
        }
    }
}
