//! Live layer seam
//!
//! [`LayerSource`] is how a codec entity reads a layer held by the geometry
//! engine. Implementations hand out WKB already produced by that engine; the
//! codecs never interpret it.
//!
//! [`MemoryLayer`] is an owned implementation used to stage layers before
//! snapshotting and to rebuild them after decoding.

use geostash_core::{AttributeValue, Feature, FieldSchema, GeometryType};

/// One feature as read from a live layer
#[derive(Debug, Clone, PartialEq)]
pub struct SourceFeature {
    /// Geometry, or `None` for features without one
    pub geometry: Option<Feature>,
    /// Attribute cells in column order
    pub attributes: Vec<AttributeValue>,
}

impl SourceFeature {
    /// Feature with a geometry
    pub fn new(geometry: Feature, attributes: Vec<AttributeValue>) -> Self {
        SourceFeature {
            geometry: Some(geometry),
            attributes,
        }
    }

    /// Feature without a geometry
    pub fn without_geometry(attributes: Vec<AttributeValue>) -> Self {
        SourceFeature {
            geometry: None,
            attributes,
        }
    }
}

/// Read access to a live layer
pub trait LayerSource {
    /// Layer name
    fn name(&self) -> &str;

    /// Layer-wide geometry type
    fn geometry_type(&self) -> GeometryType;

    /// Spatial reference as WKT, if one is declared
    fn spatial_reference_wkt(&self) -> Option<String>;

    /// Column definitions in order
    fn fields(&self) -> Vec<FieldSchema>;

    /// All features in insertion order, including those without geometry
    fn features(&self) -> Box<dyn Iterator<Item = SourceFeature> + '_>;
}

/// Owned in-memory layer
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MemoryLayer {
    /// Layer name
    pub name: String,
    /// Layer-wide geometry type
    pub geometry_type: GeometryType,
    /// Spatial reference WKT
    pub spatial_reference_wkt: Option<String>,
    /// Column definitions
    pub fields: Vec<FieldSchema>,
    /// Features in insertion order
    pub features: Vec<SourceFeature>,
}

impl MemoryLayer {
    /// Create an empty layer
    pub fn new(name: impl Into<String>, geometry_type: GeometryType) -> Self {
        MemoryLayer {
            name: name.into(),
            geometry_type,
            ..Default::default()
        }
    }

    /// Set the spatial reference WKT
    pub fn with_spatial_reference(mut self, wkt: impl Into<String>) -> Self {
        self.spatial_reference_wkt = Some(wkt.into());
        self
    }

    /// Append a column
    pub fn with_field(mut self, field: FieldSchema) -> Self {
        self.fields.push(field);
        self
    }

    /// Append a feature
    pub fn push_feature(&mut self, feature: SourceFeature) {
        self.features.push(feature);
    }
}

impl LayerSource for MemoryLayer {
    fn name(&self) -> &str {
        &self.name
    }

    fn geometry_type(&self) -> GeometryType {
        self.geometry_type
    }

    fn spatial_reference_wkt(&self) -> Option<String> {
        self.spatial_reference_wkt.clone()
    }

    fn fields(&self) -> Vec<FieldSchema> {
        self.fields.clone()
    }

    fn features(&self) -> Box<dyn Iterator<Item = SourceFeature> + '_> {
        Box::new(self.features.iter().cloned())
    }
}
