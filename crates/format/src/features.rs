//! Feature geometry block
//!
//! ## Binary Format
//!
//! ```text
//! [blockLength: i32][featureCount: i32]
//! featureCount x [geometryType: i32][wkbSize: i32][wkb: wkbSize bytes]
//! ```
//!
//! WKB is copied verbatim; it is never NUL-terminated. Only features carrying
//! a geometry are stored, so `featureCount` can be smaller than the number of
//! features in the source layer.

use crate::cache::{BufferCache, CacheState};
use crate::cursor::{encode_block, try_alloc_items, BlockReader, BlockSink};
use crate::source::LayerSource;
use geostash_core::{Error, Feature, GeometryType, Result};
use std::sync::Arc;
use tracing::{debug, warn};

/// Block name used in errors and logs
pub const FEATURES_BLOCK: &str = "features";

const MIN_FEATURE_SIZE: usize = 4 + 4;

fn write_features(sink: &mut dyn BlockSink, features: &[Feature]) -> Result<()> {
    sink.put_len("feature count", features.len())?;
    for feature in features {
        sink.put_i32(feature.geometry_type.code());
        sink.put_sized_bytes("wkb size", &feature.wkb)?;
    }
    Ok(())
}

/// Encode feature geometries as a standalone block
pub fn encode_features(features: &[Feature]) -> Result<Vec<u8>> {
    let bytes = encode_block(FEATURES_BLOCK, |sink| write_features(sink, features))?;
    debug!(
        features = features.len(),
        len = bytes.len(),
        "Encoded feature block"
    );
    Ok(bytes)
}

/// Decode a standalone feature block spanning all of `bytes`
pub fn decode_features(bytes: &[u8]) -> Result<Vec<Feature>> {
    let mut reader = BlockReader::open_exact(FEATURES_BLOCK, bytes)?;
    let count = reader.read_len("feature count")?;

    let mut features = try_alloc_items(
        "features",
        count,
        reader.remaining() / MIN_FEATURE_SIZE,
    )?;
    for _ in 0..count {
        let at = reader.position();
        let code = reader.read_i32("geometry type")?;
        let geometry_type = GeometryType::from_code(code).ok_or_else(|| {
            Error::malformed(
                FEATURES_BLOCK,
                at,
                format!("unknown geometry type code {}", code),
            )
        })?;
        let wkb = reader.read_sized_bytes("wkb")?;
        features.push(Feature { geometry_type, wkb });
    }
    reader.finish()?;

    debug!(
        features = features.len(),
        len = bytes.len(),
        "Decoded feature block"
    );
    Ok(features)
}

/// Feature geometries in insertion order with their cached encoding
#[derive(Debug, Clone, Default)]
pub struct LayerFeatures {
    features: Vec<Feature>,
    cache: BufferCache,
}

impl LayerFeatures {
    /// Empty collection
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap existing features
    pub fn from_features(features: Vec<Feature>) -> Self {
        LayerFeatures {
            features,
            cache: BufferCache::new(),
        }
    }

    /// Collect the geometry-bearing features of a live layer
    pub fn from_source<S: LayerSource + ?Sized>(source: &S) -> Self {
        Self::from_features(features_from_source(source))
    }

    /// Decode from a standalone block; the input becomes the cached encoding
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let features = decode_features(bytes)?;
        Ok(LayerFeatures {
            features,
            cache: BufferCache::with_latest(bytes),
        })
    }

    /// Number of features
    pub fn len(&self) -> usize {
        self.features.len()
    }

    /// Whether there are no features
    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// All features in order
    pub fn features(&self) -> &[Feature] {
        &self.features
    }

    /// Feature at `index`
    pub fn get(&self, index: usize) -> Option<&Feature> {
        self.features.get(index)
    }

    /// Encoded block, recomputed only if the features changed
    pub fn bytes(&self) -> Result<Arc<[u8]>> {
        self.cache.get_or_encode(|| encode_features(&self.features))
    }

    /// Cache state of the encoded block
    pub fn cache_state(&self) -> CacheState {
        self.cache.state()
    }

    /// Append a feature
    pub fn push_feature(&mut self, feature: Feature) {
        self.features.push(feature);
        self.cache.invalidate();
    }

    /// Replace all features
    pub fn set_features(&mut self, features: Vec<Feature>) {
        self.features = features;
        self.cache.invalidate();
    }

    /// Remove all features
    pub fn clear(&mut self) {
        self.features.clear();
        self.cache.invalidate();
    }

    /// Replace all features with the geometry-bearing features of a live layer
    pub fn set_from_source<S: LayerSource + ?Sized>(&mut self, source: &S) {
        self.set_features(features_from_source(source));
    }

    /// Replace all features by decoding `bytes`
    ///
    /// On error the collection is left unchanged.
    pub fn set_from_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        *self = Self::from_bytes(bytes)?;
        Ok(())
    }

    /// Take the features out
    pub fn into_features(self) -> Vec<Feature> {
        self.features
    }
}

impl PartialEq for LayerFeatures {
    fn eq(&self, other: &Self) -> bool {
        self.features == other.features
    }
}

impl From<Vec<Feature>> for LayerFeatures {
    fn from(features: Vec<Feature>) -> Self {
        Self::from_features(features)
    }
}

fn features_from_source<S: LayerSource + ?Sized>(source: &S) -> Vec<Feature> {
    let mut skipped = 0usize;
    let features: Vec<Feature> = source
        .features()
        .filter_map(|f| {
            if f.geometry.is_none() {
                skipped += 1;
            }
            f.geometry
        })
        .collect();
    if skipped > 0 {
        warn!(
            layer = source.name(),
            skipped, "Dropped features without geometry"
        );
    }
    features
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{MemoryLayer, SourceFeature};
    use byteorder::{ByteOrder, NativeEndian};
    use geostash_core::GeometryKind;

    fn point(x: u8) -> Feature {
        Feature::new(GeometryType::POINT, vec![1, 1, 0, 0, 0, x, 0, 0])
    }

    #[test]
    fn test_empty_collection_is_eight_bytes() {
        let bytes = encode_features(&[]).unwrap();
        assert_eq!(bytes.len(), 8);
        assert_eq!(NativeEndian::read_i32(&bytes[0..4]), 8);
        assert_eq!(NativeEndian::read_i32(&bytes[4..8]), 0);
        assert!(decode_features(&bytes).unwrap().is_empty());
    }

    #[test]
    fn test_layout() {
        let bytes = encode_features(&[point(7)]).unwrap();
        assert_eq!(bytes.len(), 8 + 4 + 4 + 8);
        assert_eq!(NativeEndian::read_i32(&bytes[4..8]), 1);
        assert_eq!(NativeEndian::read_i32(&bytes[8..12]), 1);
        assert_eq!(NativeEndian::read_i32(&bytes[12..16]), 8);
        assert_eq!(&bytes[16..], &[1, 1, 0, 0, 0, 7, 0, 0]);
    }

    #[test]
    fn test_wkb_with_embedded_zeros_roundtrips() {
        let features = vec![
            Feature::new(GeometryType::POLYGON, vec![0u8; 93]),
            Feature::new(GeometryType::POINT, Vec::new()),
            Feature::new(GeometryType::with_z(GeometryKind::LineString), vec![0, 255, 0]),
        ];
        let bytes = encode_features(&features).unwrap();
        assert_eq!(decode_features(&bytes).unwrap(), features);
    }

    #[test]
    fn test_wkb_size_past_end_rejected() {
        let mut bytes = encode_features(&[point(1)]).unwrap();
        NativeEndian::write_i32(&mut bytes[12..16], 9);
        assert!(decode_features(&bytes).unwrap_err().is_malformed());
    }

    #[test]
    fn test_unknown_geometry_code_rejected() {
        let mut bytes = encode_features(&[point(1)]).unwrap();
        NativeEndian::write_i32(&mut bytes[8..12], 55);
        assert!(decode_features(&bytes).unwrap_err().is_malformed());
    }

    #[test]
    fn test_from_source_skips_features_without_geometry() {
        let mut layer = MemoryLayer::new("stops", GeometryType::POINT);
        layer.push_feature(SourceFeature::new(point(1), Vec::new()));
        layer.push_feature(SourceFeature::without_geometry(Vec::new()));
        layer.push_feature(SourceFeature::new(point(2), Vec::new()));

        let features = LayerFeatures::from_source(&layer);
        assert_eq!(features.len(), 2);
        assert_eq!(features.features(), &[point(1), point(2)]);

        let bytes = features.bytes().unwrap();
        assert_eq!(NativeEndian::read_i32(&bytes[4..8]), 2);
    }

    #[test]
    fn test_each_mutator_marks_stale() {
        let mut layer = MemoryLayer::new("stops", GeometryType::POINT);
        layer.push_feature(SourceFeature::new(point(9), Vec::new()));

        let mutators: Vec<(&str, Box<dyn Fn(&mut LayerFeatures)>)> = vec![
            (
                "push_feature",
                Box::new(|f: &mut LayerFeatures| f.push_feature(point(3))),
            ),
            (
                "set_features",
                Box::new(|f: &mut LayerFeatures| f.set_features(vec![point(4)])),
            ),
            ("clear", Box::new(|f: &mut LayerFeatures| f.clear())),
            (
                "set_from_source",
                Box::new(move |f: &mut LayerFeatures| f.set_from_source(&layer)),
            ),
        ];

        for (name, mutate) in mutators {
            let mut features = LayerFeatures::from_features(vec![point(1), point(2)]);
            let before = features.bytes().unwrap();
            mutate(&mut features);
            assert_eq!(features.cache_state(), CacheState::Stale, "{}", name);
            let after = features.bytes().unwrap();
            assert_ne!(before, after, "{}", name);
            assert_eq!(
                decode_features(&after).unwrap(),
                features.features(),
                "{}",
                name
            );
        }
    }

    #[test]
    fn test_from_bytes_caches_input() {
        let bytes = encode_features(&[point(5)]).unwrap();
        let features = LayerFeatures::from_bytes(&bytes).unwrap();
        assert_eq!(features.cache_state(), CacheState::Latest);
        assert!(Arc::ptr_eq(
            &features.bytes().unwrap(),
            &features.bytes().unwrap()
        ));
        assert_eq!(features.get(0), Some(&point(5)));
    }
}
