//! Binary layer codecs for geostash
//!
//! This crate turns a vector layer into self-describing byte buffers and back:
//!
//! - Block cursor: bounds-checked reader, shared sizing/writing path
//! - BufferCache: memoized encoding with Uninitialized/Stale/Latest states
//! - Section codecs: metadata, schema, feature geometries, attribute records
//! - LayerSnapshot: all four sections in monolithic or split layout
//! - LayerSource: read seam for live layers, plus the owned `MemoryLayer`
//!
//! Every length prefix counts the whole block including itself. Integers and
//! floats are written in host byte order.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod cache; // Per-entity encoded buffer cache
pub mod cursor; // BlockReader, BlockSink, encode_block
pub mod features; // Feature geometry block
pub mod metadata; // Layer metadata block
pub mod records; // Attribute record block
pub mod schema; // Attribute schema block
pub mod snapshot; // Whole-layer snapshot, both layouts
pub mod source; // LayerSource seam and MemoryLayer

pub use cache::{BufferCache, CacheState};
pub use cursor::{encode_block, BlockReader, BlockSink, LEN_SIZE};
pub use features::{decode_features, encode_features, LayerFeatures};
pub use metadata::{decode_metadata, encode_metadata, LayerMetadataBlock};
pub use records::AttributeRecords;
pub use schema::{decode_schema, encode_schema, AttributeSchema};
pub use snapshot::{EncodedSnapshot, LayerSnapshot, SnapshotLayout, SplitSections};
pub use source::{LayerSource, MemoryLayer, SourceFeature};
