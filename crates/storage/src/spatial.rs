//! Layer persistence on top of a key-value store
//!
//! ## Key Scheme
//!
//! | What                     | Key                                |
//! |--------------------------|------------------------------------|
//! | Monolithic snapshot      | layer name, or a caller key        |
//! | Metadata section         | `<metadata prefix><layer name>`    |
//! | Metadata section (split) | `<metadata prefix><base>`          |
//! | Schema section (split)   | `<base>:schema`                    |
//! | Feature section (split)  | `<base>:features`                  |
//! | Record section (split)   | `<base>:records`                   |
//!
//! Single sections can also be stored under any caller key with the
//! `put_schema`/`put_features`/`put_records` family.

use crate::config::{StoreConfig, DEFAULT_METADATA_PREFIX};
use crate::kv::KeyValueStore;
use geostash_core::{Error, Result};
use geostash_format::{
    AttributeRecords, AttributeSchema, LayerFeatures, LayerMetadataBlock, LayerSnapshot,
    SplitSections,
};
use std::sync::Arc;
use tracing::{debug, info};

/// Suffix of the schema key in the split layout
pub const SCHEMA_SUFFIX: &str = ":schema";
/// Suffix of the feature key in the split layout
pub const FEATURES_SUFFIX: &str = ":features";
/// Suffix of the record key in the split layout
pub const RECORDS_SUFFIX: &str = ":records";

/// Stores and loads layer snapshots and their sections
#[derive(Debug)]
pub struct SpatialStore<S> {
    store: S,
    metadata_prefix: String,
}

impl<S: KeyValueStore> SpatialStore<S> {
    /// Wrap `store` using the default metadata prefix
    pub fn new(store: S) -> Self {
        SpatialStore {
            store,
            metadata_prefix: DEFAULT_METADATA_PREFIX.to_string(),
        }
    }

    /// Wrap `store` using the metadata prefix from `config`
    pub fn with_config(store: S, config: &StoreConfig) -> Self {
        Self::new(store).with_metadata_prefix(config.metadata_prefix.clone())
    }

    /// Set the metadata key prefix
    pub fn with_metadata_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.metadata_prefix = prefix.into();
        self
    }

    /// Underlying key-value store
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Key under which the metadata of `layer_name` is stored
    pub fn metadata_key(&self, layer_name: &str) -> String {
        format!("{}{}", self.metadata_prefix, layer_name)
    }

    fn put_bytes(&self, key: &str, bytes: &[u8]) -> Result<()> {
        self.store.put(key, bytes)?;
        info!(key, len = bytes.len(), "Stored buffer");
        Ok(())
    }

    fn fetch(&self, key: &str) -> Result<Vec<u8>> {
        let bytes = self
            .store
            .get(key)?
            .ok_or_else(|| Error::KeyNotFound(key.to_string()))?;
        info!(key, len = bytes.len(), "Fetched buffer");
        Ok(bytes)
    }

    /// Store a monolithic snapshot under its layer name
    pub fn put_layer(&self, snapshot: &LayerSnapshot) -> Result<()> {
        self.put_layer_as(snapshot.name(), snapshot)
    }

    /// Store a monolithic snapshot under `key`
    pub fn put_layer_as(&self, key: &str, snapshot: &LayerSnapshot) -> Result<()> {
        let bytes = snapshot.to_monolithic()?;
        self.put_bytes(key, &bytes)
    }

    /// Load a monolithic snapshot
    pub fn get_layer(&self, key: &str) -> Result<LayerSnapshot> {
        LayerSnapshot::from_monolithic(&self.fetch(key)?)
    }

    /// Store a metadata block under the prefixed layer name
    pub fn put_metadata(&self, metadata: &LayerMetadataBlock) -> Result<()> {
        let bytes = metadata.bytes()?;
        self.put_bytes(&self.metadata_key(metadata.name()), &bytes)
    }

    /// Load the metadata block of `layer_name`
    pub fn get_metadata(&self, layer_name: &str) -> Result<LayerMetadataBlock> {
        LayerMetadataBlock::from_bytes(&self.fetch(&self.metadata_key(layer_name))?)
    }

    /// Store a schema block under `key`
    pub fn put_schema(&self, key: &str, schema: &AttributeSchema) -> Result<()> {
        self.put_bytes(key, &schema.bytes()?)
    }

    /// Load a schema block
    pub fn get_schema(&self, key: &str) -> Result<AttributeSchema> {
        AttributeSchema::from_bytes(&self.fetch(key)?)
    }

    /// Store a feature block under `key`
    pub fn put_features(&self, key: &str, features: &LayerFeatures) -> Result<()> {
        self.put_bytes(key, &features.bytes()?)
    }

    /// Load a feature block
    pub fn get_features(&self, key: &str) -> Result<LayerFeatures> {
        LayerFeatures::from_bytes(&self.fetch(key)?)
    }

    /// Store a record block under `key`
    pub fn put_records(&self, key: &str, records: &AttributeRecords) -> Result<()> {
        self.put_bytes(key, &records.bytes()?)
    }

    /// Load a record block, walking its cells with `schema`
    pub fn get_records(&self, key: &str, schema: &AttributeSchema) -> Result<AttributeRecords> {
        AttributeRecords::from_bytes(&self.fetch(key)?, schema)
    }

    /// Store the four sections of a snapshot under separate keys
    ///
    /// Metadata goes under the prefixed `base_key`, the other sections under
    /// `base_key` plus a suffix.
    pub fn put_split(&self, base_key: &str, snapshot: &LayerSnapshot) -> Result<()> {
        let sections = snapshot.to_split()?;
        self.put_bytes(&self.metadata_key(base_key), &sections.metadata)?;
        self.put_bytes(&format!("{}{}", base_key, SCHEMA_SUFFIX), &sections.schema)?;
        self.put_bytes(&format!("{}{}", base_key, FEATURES_SUFFIX), &sections.features)?;
        self.put_bytes(&format!("{}{}", base_key, RECORDS_SUFFIX), &sections.records)?;
        debug!(
            base_key,
            layer = snapshot.name(),
            len = sections.total_len(),
            "Stored split snapshot"
        );
        Ok(())
    }

    /// Load a snapshot stored with [`put_split`](Self::put_split)
    pub fn get_split(&self, base_key: &str) -> Result<LayerSnapshot> {
        let sections = SplitSections {
            metadata: Arc::from(self.fetch(&self.metadata_key(base_key))?),
            schema: Arc::from(self.fetch(&format!("{}{}", base_key, SCHEMA_SUFFIX))?),
            features: Arc::from(self.fetch(&format!("{}{}", base_key, FEATURES_SUFFIX))?),
            records: Arc::from(self.fetch(&format!("{}{}", base_key, RECORDS_SUFFIX))?),
        };
        LayerSnapshot::from_split(&sections)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::MemoryStore;
    use geostash_core::{Feature, FieldKind, FieldSchema, GeometryType, LayerMetadata};
    use geostash_format::{CacheState, MemoryLayer, SourceFeature};

    fn roads_snapshot() -> LayerSnapshot {
        let mut layer = MemoryLayer::new("roads", GeometryType::LINE_STRING)
            .with_field(FieldSchema::new("name", FieldKind::String))
            .with_field(FieldSchema::new("lanes", FieldKind::Integer));
        layer.push_feature(SourceFeature::new(
            Feature::new(GeometryType::LINE_STRING, vec![1, 2, 0, 3]),
            vec!["Main St".into(), 2.into()],
        ));
        LayerSnapshot::from_source(&layer)
    }

    #[test]
    fn test_layer_roundtrip_under_name() {
        let spatial = SpatialStore::new(MemoryStore::new());
        let snapshot = roads_snapshot();
        spatial.put_layer(&snapshot).unwrap();

        let stored = spatial.store().get("roads").unwrap().unwrap();
        assert_eq!(stored.as_slice(), &*snapshot.to_monolithic().unwrap());

        let loaded = spatial.get_layer("roads").unwrap();
        assert_eq!(loaded, snapshot);
        assert_eq!(loaded.cache_state(), CacheState::Latest);
    }

    #[test]
    fn test_layer_under_caller_key() {
        let spatial = SpatialStore::new(MemoryStore::new());
        spatial.put_layer_as("layers/roads/v2", &roads_snapshot()).unwrap();
        assert_eq!(
            spatial.get_layer("layers/roads/v2").unwrap(),
            roads_snapshot()
        );
        assert!(matches!(
            spatial.get_layer("roads"),
            Err(Error::KeyNotFound(key)) if key == "roads"
        ));
    }

    #[test]
    fn test_metadata_uses_prefix_both_ways() {
        let spatial = SpatialStore::new(MemoryStore::new());
        let block = LayerMetadataBlock::from_metadata(LayerMetadata::new(
            "roads",
            GeometryType::LINE_STRING,
        ));
        spatial.put_metadata(&block).unwrap();

        assert!(spatial.store().get("metadata_roads").unwrap().is_some());
        assert!(spatial.store().get("roads").unwrap().is_none());
        assert_eq!(spatial.get_metadata("roads").unwrap(), block);
    }

    #[test]
    fn test_custom_metadata_prefix() {
        let config = StoreConfig::default().with_metadata_prefix("meta:");
        let spatial = SpatialStore::with_config(MemoryStore::new(), &config);
        spatial
            .put_metadata(&LayerMetadataBlock::from_metadata(LayerMetadata::new(
                "rivers",
                GeometryType::MULTI_LINE_STRING,
            )))
            .unwrap();
        assert_eq!(spatial.metadata_key("rivers"), "meta:rivers");
        assert_eq!(spatial.get_metadata("rivers").unwrap().name(), "rivers");
    }

    #[test]
    fn test_sections_under_caller_keys() {
        let spatial = SpatialStore::new(MemoryStore::new());
        let snapshot = roads_snapshot();

        spatial.put_schema("s", snapshot.schema()).unwrap();
        spatial.put_features("f", snapshot.features()).unwrap();
        spatial.put_records("r", snapshot.records()).unwrap();

        let schema = spatial.get_schema("s").unwrap();
        assert_eq!(&schema, snapshot.schema());
        assert_eq!(&spatial.get_features("f").unwrap(), snapshot.features());
        assert_eq!(
            &spatial.get_records("r", &schema).unwrap(),
            snapshot.records()
        );
    }

    #[test]
    fn test_split_keys_and_roundtrip() {
        let spatial = SpatialStore::new(MemoryStore::new());
        let snapshot = roads_snapshot();
        spatial.put_split("gis:roads", &snapshot).unwrap();

        for key in [
            "metadata_gis:roads",
            "gis:roads:schema",
            "gis:roads:features",
            "gis:roads:records",
        ] {
            assert!(spatial.store().get(key).unwrap().is_some(), "{}", key);
        }
        assert_eq!(spatial.store().len(), 4);
        assert_eq!(spatial.get_split("gis:roads").unwrap(), snapshot);
    }

    #[test]
    fn test_split_versions_of_one_layer_stay_separate() {
        let spatial = SpatialStore::new(MemoryStore::new());
        let mut v1 = roads_snapshot();
        v1.metadata_mut().set_spatial_reference_wkt("SRS_V1");
        let mut v2 = roads_snapshot();
        v2.metadata_mut().set_spatial_reference_wkt("SRS_V2");
        v2.metadata_mut().set_geometry_type(GeometryType::POINT);

        spatial.put_split("v1", &v1).unwrap();
        spatial.put_split("v2", &v2).unwrap();

        let loaded = spatial.get_split("v1").unwrap();
        assert_eq!(loaded.metadata().spatial_reference_wkt(), "SRS_V1");
        assert_eq!(loaded.metadata().geometry_type(), GeometryType::LINE_STRING);
        assert_eq!(loaded, v1);
        assert_eq!(spatial.get_split("v2").unwrap(), v2);
    }

    #[test]
    fn test_split_missing_section() {
        let spatial = SpatialStore::new(MemoryStore::new());
        spatial.put_split("gis:roads", &roads_snapshot()).unwrap();
        let err = spatial.get_split("gis:rivers").unwrap_err();
        assert_eq!(err, Error::KeyNotFound("metadata_gis:rivers".to_string()));
    }

    #[test]
    fn test_store_errors_propagate() {
        let store = MemoryStore::new();
        let spatial = SpatialStore::new(&store);
        spatial.put_layer(&roads_snapshot()).unwrap();

        store.disconnect();
        assert!(matches!(
            spatial.get_layer("roads"),
            Err(Error::StoreUnavailable(_))
        ));
        assert!(matches!(
            spatial.put_layer(&roads_snapshot()),
            Err(Error::StoreUnavailable(_))
        ));
    }

    #[test]
    fn test_inconsistent_snapshot_not_stored() {
        let spatial = SpatialStore::new(MemoryStore::new());
        let mut snapshot = roads_snapshot();
        snapshot
            .features_mut()
            .push_feature(Feature::new(GeometryType::LINE_STRING, vec![9]));
        assert!(matches!(
            spatial.put_layer(&snapshot),
            Err(Error::InvalidSnapshot(_))
        ));
        assert!(spatial.store().is_empty());
    }

    #[test]
    fn test_corrupt_stored_bytes_rejected() {
        let store = MemoryStore::new();
        store.put("roads", &[9, 0, 0, 0, 1]).unwrap();
        let spatial = SpatialStore::new(store);
        assert!(spatial.get_layer("roads").unwrap_err().is_malformed());
    }
}
