//! geostash - binary snapshots of vector-geospatial layers
//!
//! geostash captures a vector layer (named features with typed attribute
//! columns) as self-describing byte buffers, stores them in a key-value store
//! and rebuilds the layer from them byte for byte.
//!
//! # Quick Start
//!
//! ```
//! use geostash::{
//!     Feature, FieldKind, FieldSchema, GeometryType, LayerSnapshot, MemoryLayer, MemoryStore,
//!     SourceFeature, SpatialStore,
//! };
//!
//! let mut layer = MemoryLayer::new("roads", GeometryType::LINE_STRING)
//!     .with_field(FieldSchema::new("name", FieldKind::String));
//! layer.push_feature(SourceFeature::new(
//!     Feature::new(GeometryType::LINE_STRING, vec![1, 2, 0, 0, 0]),
//!     vec!["Main St".into()],
//! ));
//!
//! let spatial = SpatialStore::new(MemoryStore::new());
//! spatial.put_layer(&LayerSnapshot::from_source(&layer))?;
//!
//! let restored = MemoryLayer::from_snapshot(&spatial.get_layer("roads")?);
//! assert_eq!(restored, layer);
//! # Ok::<(), geostash::Error>(())
//! ```
//!
//! # Architecture
//!
//! - `geostash-core`: data model and error taxonomy
//! - `geostash-format`: section codecs, buffer cache, snapshot layouts
//! - `geostash-storage`: key-value contract and layer persistence

pub use geostash_core::*;
pub use geostash_format::{
    AttributeRecords, AttributeSchema, BufferCache, CacheState, EncodedSnapshot, LayerFeatures,
    LayerMetadataBlock, LayerSnapshot, LayerSource, MemoryLayer, SnapshotLayout, SourceFeature,
    SplitSections,
};
pub use geostash_storage::{ConfigError, KeyValueStore, MemoryStore, SpatialStore, StoreConfig};

/// Low-level block codecs
pub mod format {
    pub use geostash_format::*;
}
