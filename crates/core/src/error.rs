//! Error types for geostash
//!
//! This module defines all error types surfaced by the codec and store layers.
//! We use `thiserror` for automatic `Display` and `Error` trait implementations.
//!
//! Decoding never panics on bad input: every length or offset disagreement is
//! reported as [`Error::MalformedInput`], so a truncated or padded buffer can
//! not decode into a plausible-but-wrong layer.

use thiserror::Error;

/// Result type alias for geostash operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for geostash
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    /// A required buffer could not be obtained
    ///
    /// The failing call leaves the entity exactly as it was before the call.
    #[error("Allocation failure: could not reserve {requested} bytes for {context}")]
    AllocationFailure {
        /// What the buffer was for
        context: &'static str,
        /// Number of bytes requested
        requested: usize,
    },

    /// Decoded byte stream disagrees with its own length prefixes
    #[error("Malformed {block} block at offset {offset}: {detail}")]
    MalformedInput {
        /// Block being decoded (metadata, schema, features, records, snapshot)
        block: &'static str,
        /// Offset within the block where the problem was detected
        offset: usize,
        /// Human-readable description
        detail: String,
    },

    /// Record cell kind or arity disagrees with the column schema
    #[error("Schema mismatch: {0}")]
    SchemaMismatch(String),

    /// Snapshot sections are inconsistent with each other
    #[error("Invalid snapshot: {0}")]
    InvalidSnapshot(String),

    /// A length does not fit in the 32-bit length prefix
    #[error("Length overflow: {context} length {length} exceeds i32::MAX")]
    LengthOverflow {
        /// What was being measured
        context: &'static str,
        /// The offending length
        length: usize,
    },

    /// The key-value transport is not connected or replied with an error
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    /// Key not present in the key-value store
    #[error("Key not found: {0}")]
    KeyNotFound(String),
}

impl Error {
    /// Create a malformed-input error for `block` at `offset`
    pub fn malformed(block: &'static str, offset: usize, detail: impl Into<String>) -> Self {
        Error::MalformedInput {
            block,
            offset,
            detail: detail.into(),
        }
    }

    /// Check if this error was caused by bad input bytes
    pub fn is_malformed(&self) -> bool {
        matches!(self, Error::MalformedInput { .. })
    }
}
