//! Layer metadata block
//!
//! ## Binary Format
//!
//! ```text
//! [totalLength: i32]
//! [nameLen: i32][name: nameLen bytes, NUL-terminated]
//! [geometryType: i32]
//! [wktLen: i32][wkt: wktLen bytes, NUL-terminated]
//! ```
//!
//! `totalLength` covers the whole block including itself. Decoding requires
//! the consumed offset to equal `totalLength` exactly.

use crate::cache::{BufferCache, CacheState};
use crate::cursor::{encode_block, BlockReader, BlockSink};
use crate::source::LayerSource;
use geostash_core::{Error, GeometryType, LayerMetadata, Result};
use std::sync::Arc;
use tracing::debug;

/// Block name used in errors and logs
pub const METADATA_BLOCK: &str = "metadata";

fn write_metadata(sink: &mut dyn BlockSink, metadata: &LayerMetadata) -> Result<()> {
    sink.put_cstr("layer name", &metadata.name)?;
    sink.put_i32(metadata.geometry_type.code());
    sink.put_cstr("spatial reference", &metadata.spatial_reference_wkt)?;
    Ok(())
}

/// Encode layer metadata as a standalone block
pub fn encode_metadata(metadata: &LayerMetadata) -> Result<Vec<u8>> {
    let bytes = encode_block(METADATA_BLOCK, |sink| write_metadata(sink, metadata))?;
    debug!(layer = %metadata.name, len = bytes.len(), "Encoded metadata block");
    Ok(bytes)
}

/// Decode a standalone metadata block spanning all of `bytes`
pub fn decode_metadata(bytes: &[u8]) -> Result<LayerMetadata> {
    let mut reader = BlockReader::open_exact(METADATA_BLOCK, bytes)?;
    let name = reader.read_cstr("layer name")?;

    let at = reader.position();
    let code = reader.read_i32("geometry type")?;
    let geometry_type = GeometryType::from_code(code).ok_or_else(|| {
        Error::malformed(
            METADATA_BLOCK,
            at,
            format!("unknown geometry type code {}", code),
        )
    })?;

    let spatial_reference_wkt = reader.read_cstr("spatial reference")?;
    reader.finish()?;

    debug!(layer = %name, len = bytes.len(), "Decoded metadata block");
    Ok(LayerMetadata {
        name,
        geometry_type,
        spatial_reference_wkt,
    })
}

/// Layer metadata with its cached encoding
#[derive(Debug, Clone, Default)]
pub struct LayerMetadataBlock {
    metadata: LayerMetadata,
    cache: BufferCache,
}

impl LayerMetadataBlock {
    /// Empty metadata (no name, unknown geometry, no SRS)
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap existing metadata
    pub fn from_metadata(metadata: LayerMetadata) -> Self {
        LayerMetadataBlock {
            metadata,
            cache: BufferCache::new(),
        }
    }

    /// Read metadata from a live layer
    pub fn from_source<S: LayerSource + ?Sized>(source: &S) -> Self {
        Self::from_metadata(metadata_from_source(source))
    }

    /// Decode from a standalone block; the input becomes the cached encoding
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let metadata = decode_metadata(bytes)?;
        Ok(LayerMetadataBlock {
            metadata,
            cache: BufferCache::with_latest(bytes),
        })
    }

    /// Current metadata
    pub fn metadata(&self) -> &LayerMetadata {
        &self.metadata
    }

    /// Layer name
    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    /// Layer geometry type
    pub fn geometry_type(&self) -> GeometryType {
        self.metadata.geometry_type
    }

    /// Spatial reference WKT; empty when none is declared
    pub fn spatial_reference_wkt(&self) -> &str {
        &self.metadata.spatial_reference_wkt
    }

    /// Encoded block, recomputed only if the metadata changed
    pub fn bytes(&self) -> Result<Arc<[u8]>> {
        self.cache.get_or_encode(|| encode_metadata(&self.metadata))
    }

    /// Cache state of the encoded block
    pub fn cache_state(&self) -> CacheState {
        self.cache.state()
    }

    /// Set the layer name
    pub fn set_name(&mut self, name: impl Into<String>) {
        self.metadata.name = name.into();
        self.cache.invalidate();
    }

    /// Set the layer geometry type
    pub fn set_geometry_type(&mut self, geometry_type: GeometryType) {
        self.metadata.geometry_type = geometry_type;
        self.cache.invalidate();
    }

    /// Set the spatial reference WKT
    pub fn set_spatial_reference_wkt(&mut self, wkt: impl Into<String>) {
        self.metadata.spatial_reference_wkt = wkt.into();
        self.cache.invalidate();
    }

    /// Replace all metadata
    pub fn set_metadata(&mut self, metadata: LayerMetadata) {
        self.metadata = metadata;
        self.cache.invalidate();
    }

    /// Replace all metadata from a live layer
    pub fn set_from_source<S: LayerSource + ?Sized>(&mut self, source: &S) {
        self.set_metadata(metadata_from_source(source));
    }

    /// Replace all metadata by decoding `bytes`
    ///
    /// On error the block is left unchanged.
    pub fn set_from_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        *self = Self::from_bytes(bytes)?;
        Ok(())
    }

    /// Take the metadata out
    pub fn into_metadata(self) -> LayerMetadata {
        self.metadata
    }
}

impl PartialEq for LayerMetadataBlock {
    fn eq(&self, other: &Self) -> bool {
        self.metadata == other.metadata
    }
}

impl From<LayerMetadata> for LayerMetadataBlock {
    fn from(metadata: LayerMetadata) -> Self {
        Self::from_metadata(metadata)
    }
}

fn metadata_from_source<S: LayerSource + ?Sized>(source: &S) -> LayerMetadata {
    let spatial_reference_wkt = source.spatial_reference_wkt().unwrap_or_else(|| {
        debug!(layer = source.name(), "No spatial reference declared");
        String::new()
    });
    LayerMetadata {
        name: source.name().to_string(),
        geometry_type: source.geometry_type(),
        spatial_reference_wkt,
    }
}
