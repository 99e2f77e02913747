//! Store layer for geostash
//!
//! This crate persists encoded layers in a key-value store:
//! - KeyValueStore: binary-safe put/get contract
//! - MemoryStore: in-process store with numbered keyspaces
//! - SpatialStore: layer and section persistence with the metadata key scheme
//! - StoreConfig: connection settings and metadata key prefix

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod kv;
pub mod spatial;

pub use config::{ConfigError, StoreConfig};
pub use kv::{KeyValueStore, MemoryStore};
pub use spatial::SpatialStore;
