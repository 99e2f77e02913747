//! Layer data model
//!
//! This module defines:
//! - GeometryType: geometry type code of a layer or a feature
//! - FieldSchema: one attribute column definition
//! - LayerMetadata: layer name, geometry type, spatial reference
//! - Feature: one geometry as an opaque WKB blob

use serde::{Deserialize, Serialize};

/// Base geometry kind, without the Z flag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GeometryKind {
    /// Mixed or undeclared geometry
    Unknown,
    /// Single point
    Point,
    /// Line string
    LineString,
    /// Polygon
    Polygon,
    /// Collection of points
    MultiPoint,
    /// Collection of line strings
    MultiLineString,
    /// Collection of polygons
    MultiPolygon,
    /// Heterogeneous collection
    GeometryCollection,
    /// Attribute-only layer
    None,
}

impl GeometryKind {
    fn code(&self) -> u32 {
        match self {
            GeometryKind::Unknown => 0,
            GeometryKind::Point => 1,
            GeometryKind::LineString => 2,
            GeometryKind::Polygon => 3,
            GeometryKind::MultiPoint => 4,
            GeometryKind::MultiLineString => 5,
            GeometryKind::MultiPolygon => 6,
            GeometryKind::GeometryCollection => 7,
            GeometryKind::None => 100,
        }
    }

    fn from_code(code: u32) -> Option<Self> {
        Some(match code {
            0 => GeometryKind::Unknown,
            1 => GeometryKind::Point,
            2 => GeometryKind::LineString,
            3 => GeometryKind::Polygon,
            4 => GeometryKind::MultiPoint,
            5 => GeometryKind::MultiLineString,
            6 => GeometryKind::MultiPolygon,
            7 => GeometryKind::GeometryCollection,
            100 => GeometryKind::None,
            _ => return None,
        })
    }
}

/// Geometry type of a layer or feature
///
/// Encoded as an i32: the base code (1-7, 0 unknown, 100 none) with the high
/// bit set for geometries carrying Z coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GeometryType {
    /// Base kind
    pub kind: GeometryKind,
    /// Whether coordinates carry a Z component
    pub has_z: bool,
}

impl GeometryType {
    /// Flag bit marking geometries with Z coordinates
    pub const Z_BIT: u32 = 0x8000_0000;

    /// 2D geometry type
    pub const fn flat(kind: GeometryKind) -> Self {
        GeometryType { kind, has_z: false }
    }

    /// Geometry type with Z coordinates
    pub const fn with_z(kind: GeometryKind) -> Self {
        GeometryType { kind, has_z: true }
    }

    /// Mixed or undeclared geometry
    pub const UNKNOWN: GeometryType = GeometryType::flat(GeometryKind::Unknown);
    /// 2D point
    pub const POINT: GeometryType = GeometryType::flat(GeometryKind::Point);
    /// 2D line string
    pub const LINE_STRING: GeometryType = GeometryType::flat(GeometryKind::LineString);
    /// 2D polygon
    pub const POLYGON: GeometryType = GeometryType::flat(GeometryKind::Polygon);
    /// 2D multi point
    pub const MULTI_POINT: GeometryType = GeometryType::flat(GeometryKind::MultiPoint);
    /// 2D multi line string
    pub const MULTI_LINE_STRING: GeometryType = GeometryType::flat(GeometryKind::MultiLineString);
    /// 2D multi polygon
    pub const MULTI_POLYGON: GeometryType = GeometryType::flat(GeometryKind::MultiPolygon);
    /// 2D geometry collection
    pub const GEOMETRY_COLLECTION: GeometryType =
        GeometryType::flat(GeometryKind::GeometryCollection);

    /// Wire code
    pub fn code(&self) -> i32 {
        let base = self.kind.code();
        let bits = if self.has_z { base | Self::Z_BIT } else { base };
        bits as i32
    }

    /// Parse a wire code; `None` for codes outside the known set
    pub fn from_code(code: i32) -> Option<Self> {
        let bits = code as u32;
        let kind = GeometryKind::from_code(bits & !Self::Z_BIT)?;
        Some(GeometryType {
            kind,
            has_z: bits & Self::Z_BIT != 0,
        })
    }
}

impl Default for GeometryType {
    fn default() -> Self {
        GeometryType::UNKNOWN
    }
}

/// One attribute column definition
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FieldSchema {
    /// Column name
    pub title: String,
    /// Display width
    pub display_width: i32,
    /// Decimal precision
    pub decimal_precision: i32,
    /// Kind of every cell in this column
    pub kind: crate::value::FieldKind,
}

impl FieldSchema {
    /// Create a column with zero width and precision
    pub fn new(title: impl Into<String>, kind: crate::value::FieldKind) -> Self {
        FieldSchema {
            title: title.into(),
            display_width: 0,
            decimal_precision: 0,
            kind,
        }
    }

    /// Set display width
    pub fn with_width(mut self, width: i32) -> Self {
        self.display_width = width;
        self
    }

    /// Set decimal precision
    pub fn with_precision(mut self, precision: i32) -> Self {
        self.decimal_precision = precision;
        self
    }
}

/// Layer-level metadata
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LayerMetadata {
    /// Layer name
    pub name: String,
    /// Layer-wide geometry type
    pub geometry_type: GeometryType,
    /// Spatial reference as WKT; empty means no SRS declared
    pub spatial_reference_wkt: String,
}

impl LayerMetadata {
    /// Create metadata with no spatial reference
    pub fn new(name: impl Into<String>, geometry_type: GeometryType) -> Self {
        LayerMetadata {
            name: name.into(),
            geometry_type,
            spatial_reference_wkt: String::new(),
        }
    }

    /// Set the spatial reference WKT
    pub fn with_spatial_reference(mut self, wkt: impl Into<String>) -> Self {
        self.spatial_reference_wkt = wkt.into();
        self
    }

    /// Whether a spatial reference is declared
    pub fn has_spatial_reference(&self) -> bool {
        !self.spatial_reference_wkt.is_empty()
    }
}

/// One feature geometry
///
/// `wkb` is opaque to geostash: it is produced and consumed by the geometry
/// engine and is never null-terminated.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Feature {
    /// Geometry type of this feature
    pub geometry_type: GeometryType,
    /// Well-known-binary geometry bytes
    pub wkb: Vec<u8>,
}

impl Feature {
    /// Create a feature from its type and WKB bytes
    pub fn new(geometry_type: GeometryType, wkb: impl Into<Vec<u8>>) -> Self {
        Feature {
            geometry_type,
            wkb: wkb.into(),
        }
    }

    /// WKB length in bytes
    pub fn wkb_size(&self) -> usize {
        self.wkb.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::FieldKind;
    use proptest::prelude::*;

    #[test]
    fn test_geometry_codes() {
        assert_eq!(GeometryType::POINT.code(), 1);
        assert_eq!(GeometryType::LINE_STRING.code(), 2);
        assert_eq!(GeometryType::GEOMETRY_COLLECTION.code(), 7);
        assert_eq!(GeometryType::UNKNOWN.code(), 0);
        assert_eq!(GeometryType::flat(GeometryKind::None).code(), 100);

        let point_z = GeometryType::with_z(GeometryKind::Point);
        assert_eq!(point_z.code() as u32, 0x8000_0001);
    }

    #[test]
    fn test_geometry_code_roundtrip() {
        let kinds = [
            GeometryKind::Unknown,
            GeometryKind::Point,
            GeometryKind::LineString,
            GeometryKind::Polygon,
            GeometryKind::MultiPoint,
            GeometryKind::MultiLineString,
            GeometryKind::MultiPolygon,
            GeometryKind::GeometryCollection,
            GeometryKind::None,
        ];
        for kind in kinds {
            for ty in [GeometryType::flat(kind), GeometryType::with_z(kind)] {
                assert_eq!(GeometryType::from_code(ty.code()), Some(ty));
            }
        }
    }

    #[test]
    fn test_geometry_unknown_code() {
        assert_eq!(GeometryType::from_code(8), None);
        assert_eq!(GeometryType::from_code(-1), None);
        assert_eq!(GeometryType::from_code(1003), None);
    }

    #[test]
    fn test_field_schema_builder() {
        let field = FieldSchema::new("length", FieldKind::Real)
            .with_width(12)
            .with_precision(3);
        assert_eq!(field.title, "length");
        assert_eq!(field.display_width, 12);
        assert_eq!(field.decimal_precision, 3);
        assert_eq!(field.kind, FieldKind::Real);
    }

    #[test]
    fn test_metadata_spatial_reference() {
        let meta = LayerMetadata::new("roads", GeometryType::LINE_STRING);
        assert!(!meta.has_spatial_reference());
        assert_eq!(meta.spatial_reference_wkt, "");

        let meta = meta.with_spatial_reference("GEOGCS[\"WGS 84\"]");
        assert!(meta.has_spatial_reference());
    }

    #[test]
    fn test_feature_wkb_size() {
        let feature = Feature::new(GeometryType::POINT, vec![1u8, 0, 0, 0, 0]);
        assert_eq!(feature.wkb_size(), 5);
    }

    proptest! {
        #[test]
        fn prop_parsed_codes_reencode_exactly(code in any::<i32>()) {
            if let Some(ty) = GeometryType::from_code(code) {
                prop_assert_eq!(ty.code(), code);
            }
        }
    }
}
