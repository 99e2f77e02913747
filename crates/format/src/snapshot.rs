//! Layer snapshot codec
//!
//! A snapshot bundles the four sections of one layer and encodes them in one
//! of two layouts.
//!
//! ## Monolithic Layout
//!
//! ```text
//! [totalLength: i32]
//! [metadata block]
//! [schema block]
//! [feature block]
//! [record block]
//! ```
//!
//! Each inner block carries its own length prefix and is byte-identical to
//! the standalone encoding of that section.
//!
//! ## Split Layout
//!
//! The four standalone blocks, kept apart so each can be stored under its
//! own key ([`SplitSections`]).
//!
//! ## Consistency
//!
//! Before encoding, and after decoding, a snapshot must have one record per
//! feature and every record must match the schema. Violations are reported as
//! `InvalidSnapshot` (counts) or `SchemaMismatch` (arity or kind).

use crate::cache::{BufferCache, CacheState};
use crate::cursor::{encode_block, BlockReader};
use crate::features::{LayerFeatures, FEATURES_BLOCK};
use crate::metadata::{LayerMetadataBlock, METADATA_BLOCK};
use crate::records::{AttributeRecords, RECORDS_BLOCK};
use crate::schema::{AttributeSchema, SCHEMA_BLOCK};
use crate::source::{LayerSource, MemoryLayer, SourceFeature};
use geostash_core::{AttributeValue, Error, Feature, FieldSchema, LayerMetadata, Result};
use std::sync::Arc;
use tracing::debug;

/// Block name used in errors and logs
pub const SNAPSHOT_BLOCK: &str = "snapshot";

/// How a snapshot is laid out in bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SnapshotLayout {
    /// One buffer holding all four sections
    #[default]
    Monolithic,
    /// Four independent buffers
    Split,
}

/// The four standalone section buffers of a snapshot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitSections {
    /// Metadata block
    pub metadata: Arc<[u8]>,
    /// Schema block
    pub schema: Arc<[u8]>,
    /// Feature block
    pub features: Arc<[u8]>,
    /// Record block
    pub records: Arc<[u8]>,
}

impl SplitSections {
    /// Combined length of all four buffers
    pub fn total_len(&self) -> usize {
        self.metadata.len() + self.schema.len() + self.features.len() + self.records.len()
    }
}

/// Encoded snapshot in either layout
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EncodedSnapshot {
    /// Single buffer
    Monolithic(Arc<[u8]>),
    /// Four section buffers
    Split(SplitSections),
}

impl EncodedSnapshot {
    /// Layout of this encoding
    pub fn layout(&self) -> SnapshotLayout {
        match self {
            EncodedSnapshot::Monolithic(_) => SnapshotLayout::Monolithic,
            EncodedSnapshot::Split(_) => SnapshotLayout::Split,
        }
    }

    /// Number of encoded bytes across all buffers
    pub fn total_len(&self) -> usize {
        match self {
            EncodedSnapshot::Monolithic(bytes) => bytes.len(),
            EncodedSnapshot::Split(sections) => sections.total_len(),
        }
    }
}

/// One layer: metadata, schema, feature geometries and attribute records
#[derive(Debug, Clone, Default)]
pub struct LayerSnapshot {
    metadata: LayerMetadataBlock,
    schema: AttributeSchema,
    features: LayerFeatures,
    records: AttributeRecords,
    cache: BufferCache,
}

impl LayerSnapshot {
    /// Empty snapshot
    pub fn new() -> Self {
        Self::default()
    }

    /// Assemble a snapshot from its sections
    ///
    /// Consistency is checked when the snapshot is encoded, or earlier via
    /// [`validate`](Self::validate).
    pub fn from_sections(
        metadata: LayerMetadataBlock,
        schema: AttributeSchema,
        features: LayerFeatures,
        records: AttributeRecords,
    ) -> Self {
        LayerSnapshot {
            metadata,
            schema,
            features,
            records,
            cache: BufferCache::new(),
        }
    }

    /// Snapshot a live layer
    pub fn from_source<S: LayerSource + ?Sized>(source: &S) -> Self {
        let snapshot = Self::from_sections(
            LayerMetadataBlock::from_source(source),
            AttributeSchema::from_source(source),
            LayerFeatures::from_source(source),
            AttributeRecords::from_source(source),
        );
        debug!(
            layer = snapshot.name(),
            features = snapshot.feature_count(),
            fields = snapshot.schema.field_count(),
            "Captured layer snapshot"
        );
        snapshot
    }

    /// Decode either layout
    pub fn decode(encoded: &EncodedSnapshot) -> Result<Self> {
        match encoded {
            EncodedSnapshot::Monolithic(bytes) => Self::from_monolithic(bytes),
            EncodedSnapshot::Split(sections) => Self::from_split(sections),
        }
    }

    /// Decode a monolithic buffer; the input becomes the cached encoding
    pub fn from_monolithic(bytes: &[u8]) -> Result<Self> {
        let mut reader = BlockReader::open_exact(SNAPSHOT_BLOCK, bytes)?;
        let metadata = LayerMetadataBlock::from_bytes(reader.take_block(METADATA_BLOCK)?)?;
        let schema = AttributeSchema::from_bytes(reader.take_block(SCHEMA_BLOCK)?)?;
        let features = LayerFeatures::from_bytes(reader.take_block(FEATURES_BLOCK)?)?;
        let records = AttributeRecords::from_bytes_expecting(
            reader.take_block(RECORDS_BLOCK)?,
            &schema,
            features.len(),
        )?;
        reader.finish()?;

        let snapshot = LayerSnapshot {
            metadata,
            schema,
            features,
            records,
            cache: BufferCache::with_latest(bytes),
        };
        snapshot.validate()?;

        debug!(
            layer = snapshot.name(),
            features = snapshot.feature_count(),
            len = bytes.len(),
            "Decoded monolithic snapshot"
        );
        Ok(snapshot)
    }

    /// Decode four standalone section buffers
    pub fn from_split(sections: &SplitSections) -> Result<Self> {
        let schema = AttributeSchema::from_bytes(&sections.schema)?;
        let features = LayerFeatures::from_bytes(&sections.features)?;
        let records =
            AttributeRecords::from_bytes_expecting(&sections.records, &schema, features.len())?;
        let snapshot = Self::from_sections(
            LayerMetadataBlock::from_bytes(&sections.metadata)?,
            schema,
            features,
            records,
        );
        snapshot.validate()?;

        debug!(
            layer = snapshot.name(),
            features = snapshot.feature_count(),
            len = sections.total_len(),
            "Decoded split snapshot"
        );
        Ok(snapshot)
    }

    /// Layer name
    pub fn name(&self) -> &str {
        self.metadata.name()
    }

    /// Metadata section
    pub fn metadata(&self) -> &LayerMetadataBlock {
        &self.metadata
    }

    /// Schema section
    pub fn schema(&self) -> &AttributeSchema {
        &self.schema
    }

    /// Feature section
    pub fn features(&self) -> &LayerFeatures {
        &self.features
    }

    /// Record section
    pub fn records(&self) -> &AttributeRecords {
        &self.records
    }

    /// Number of features (and, in a consistent snapshot, records)
    pub fn feature_count(&self) -> usize {
        self.features.len()
    }

    /// Mutable metadata section; marks the monolithic buffer stale
    pub fn metadata_mut(&mut self) -> &mut LayerMetadataBlock {
        self.cache.invalidate();
        &mut self.metadata
    }

    /// Mutable schema section; marks the monolithic buffer stale
    pub fn schema_mut(&mut self) -> &mut AttributeSchema {
        self.cache.invalidate();
        &mut self.schema
    }

    /// Mutable feature section; marks the monolithic buffer stale
    pub fn features_mut(&mut self) -> &mut LayerFeatures {
        self.cache.invalidate();
        &mut self.features
    }

    /// Mutable record section; marks the monolithic buffer stale
    pub fn records_mut(&mut self) -> &mut AttributeRecords {
        self.cache.invalidate();
        &mut self.records
    }

    /// Replace the metadata
    pub fn set_metadata(&mut self, metadata: LayerMetadata) {
        self.metadata_mut().set_metadata(metadata);
    }

    /// Replace the schema
    ///
    /// When no records exist yet, the record section adopts the new column
    /// count so rows can be pushed against it.
    pub fn set_schema(&mut self, fields: Vec<FieldSchema>) {
        let count = fields.len();
        self.schema_mut().set_fields(fields);
        self.records.reshape_if_empty(count);
    }

    /// Append a feature together with its attribute row
    ///
    /// The row is checked against the schema first; on error nothing changes.
    pub fn push_feature(&mut self, feature: Feature, row: Vec<AttributeValue>) -> Result<()> {
        if row.len() != self.schema.field_count() {
            return Err(Error::SchemaMismatch(format!(
                "record has {} cells, schema has {} fields",
                row.len(),
                self.schema.field_count()
            )));
        }
        for ((column, cell), field) in row.iter().enumerate().zip(self.schema.fields()) {
            if cell.kind() != field.kind {
                return Err(Error::SchemaMismatch(format!(
                    "column {} ('{}'): expected {}, found {}",
                    column,
                    field.title,
                    field.kind.name(),
                    cell.kind().name()
                )));
            }
        }

        self.cache.invalidate();
        self.records.set_field_count(row.len())?;
        self.records.push_record(row)?;
        self.features.push_feature(feature);
        Ok(())
    }

    /// Replace every section with a fresh capture of a live layer
    pub fn set_from_source<S: LayerSource + ?Sized>(&mut self, source: &S) {
        self.cache.invalidate();
        self.metadata.set_from_source(source);
        self.schema.set_from_source(source);
        self.features.set_from_source(source);
        self.records.set_from_source(source);
    }

    /// Cache state of the monolithic buffer
    pub fn cache_state(&self) -> CacheState {
        self.cache.state()
    }

    /// Check that records match the schema and that there is one per feature
    pub fn validate(&self) -> Result<()> {
        self.records.check_schema(&self.schema)?;
        if self.records.record_count() != self.features.len() {
            return Err(Error::InvalidSnapshot(format!(
                "layer '{}' has {} features but {} records",
                self.name(),
                self.features.len(),
                self.records.record_count()
            )));
        }
        Ok(())
    }

    /// Encode in the requested layout
    pub fn encode(&self, layout: SnapshotLayout) -> Result<EncodedSnapshot> {
        match layout {
            SnapshotLayout::Monolithic => self.to_monolithic().map(EncodedSnapshot::Monolithic),
            SnapshotLayout::Split => self.to_split().map(EncodedSnapshot::Split),
        }
    }

    /// Single-buffer encoding, recomputed only if a section changed
    pub fn to_monolithic(&self) -> Result<Arc<[u8]>> {
        self.cache.get_or_encode(|| {
            let sections = self.to_split()?;
            let bytes = encode_block(SNAPSHOT_BLOCK, |sink| {
                sink.put_slice(&sections.metadata);
                sink.put_slice(&sections.schema);
                sink.put_slice(&sections.features);
                sink.put_slice(&sections.records);
                Ok(())
            })?;
            debug!(
                layer = self.name(),
                features = self.feature_count(),
                len = bytes.len(),
                "Encoded monolithic snapshot"
            );
            Ok(bytes)
        })
    }

    /// Four standalone section buffers, each from its own cache
    pub fn to_split(&self) -> Result<SplitSections> {
        self.validate()?;
        Ok(SplitSections {
            metadata: self.metadata.bytes()?,
            schema: self.schema.bytes()?,
            features: self.features.bytes()?,
            records: self.records.bytes()?,
        })
    }
}

impl PartialEq for LayerSnapshot {
    fn eq(&self, other: &Self) -> bool {
        self.metadata == other.metadata
            && self.schema == other.schema
            && self.features == other.features
            && self.records == other.records
    }
}

impl MemoryLayer {
    /// Rebuild an owned layer from a snapshot, pairing each feature with its row
    pub fn from_snapshot(snapshot: &LayerSnapshot) -> Self {
        let metadata = snapshot.metadata.metadata();
        let spatial_reference_wkt = if metadata.has_spatial_reference() {
            Some(metadata.spatial_reference_wkt.clone())
        } else {
            None
        };
        let features = snapshot
            .features
            .features()
            .iter()
            .zip(snapshot.records.records())
            .map(|(feature, row)| SourceFeature::new(feature.clone(), row.to_vec()))
            .collect();

        MemoryLayer {
            name: metadata.name.clone(),
            geometry_type: metadata.geometry_type,
            spatial_reference_wkt,
            fields: snapshot.schema.fields().to_vec(),
            features,
        }
    }
}
