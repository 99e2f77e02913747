//! Round-trip properties for layer snapshots
//!
//! Arbitrary layers are captured, encoded in both layouts and decoded again.
//! The decoded snapshot must equal the original and re-encode to the same bytes.

use byteorder::{ByteOrder, NativeEndian};
use geostash_core::{
    AttributeValue, DateValue, Feature, FieldKind, FieldSchema, GeometryKind, GeometryType,
};
use geostash_format::{
    BlockReader, CacheState, LayerSnapshot, MemoryLayer, SnapshotLayout, SourceFeature,
};
use proptest::prelude::*;
use std::sync::Arc;

fn geometry_type() -> impl Strategy<Value = GeometryType> {
    let kind = prop_oneof![
        Just(GeometryKind::Unknown),
        Just(GeometryKind::Point),
        Just(GeometryKind::LineString),
        Just(GeometryKind::Polygon),
        Just(GeometryKind::MultiPoint),
        Just(GeometryKind::MultiLineString),
        Just(GeometryKind::MultiPolygon),
        Just(GeometryKind::GeometryCollection),
    ];
    (kind, any::<bool>()).prop_map(|(kind, z)| {
        if z {
            GeometryType::with_z(kind)
        } else {
            GeometryType::flat(kind)
        }
    })
}

fn field_kind() -> impl Strategy<Value = FieldKind> {
    prop_oneof![
        4 => Just(FieldKind::Integer),
        4 => Just(FieldKind::Real),
        4 => Just(FieldKind::String),
        2 => Just(FieldKind::Binary),
        2 => Just(FieldKind::Date),
        1 => Just(FieldKind::from_code(1)),
        1 => Just(FieldKind::from_code(11)),
    ]
}

fn date() -> impl Strategy<Value = DateValue> {
    (any::<[i32; 6]>(), any::<i32>()).prop_map(|(p, tz)| {
        DateValue::from_array([p[0], p[1], p[2], p[3], p[4], p[5], tz])
    })
}

fn cell(kind: FieldKind) -> BoxedStrategy<AttributeValue> {
    match kind {
        FieldKind::Integer => any::<i32>().prop_map(AttributeValue::Integer).boxed(),
        FieldKind::Real => any::<f64>().prop_map(AttributeValue::Real).boxed(),
        // No control characters, so the only NUL is the terminator
        FieldKind::String => "\\PC{0,16}".prop_map(AttributeValue::String).boxed(),
        FieldKind::Binary => proptest::collection::vec(any::<u8>(), 0..24)
            .prop_map(AttributeValue::Binary)
            .boxed(),
        FieldKind::Date => date().prop_map(AttributeValue::Date).boxed(),
        FieldKind::Unsupported(code) => Just(AttributeValue::Unsupported(code)).boxed(),
    }
}

fn row(kinds: Vec<FieldKind>) -> BoxedStrategy<Vec<AttributeValue>> {
    kinds
        .into_iter()
        .map(cell)
        .collect::<Vec<_>>()
        .boxed()
}

fn layer() -> impl Strategy<Value = MemoryLayer> {
    let fields = proptest::collection::vec(
        ("[a-z_]{0,10}", field_kind(), any::<i32>(), any::<i32>()),
        0..6,
    );
    (
        "[A-Za-z0-9_ ]{0,20}",
        geometry_type(),
        proptest::option::of("[ -~]{1,40}"),
        fields,
    )
        .prop_flat_map(|(name, layer_type, srs, fields)| {
            let schema: Vec<FieldSchema> = fields
                .into_iter()
                .map(|(title, kind, width, precision)| {
                    FieldSchema::new(title, kind)
                        .with_width(width)
                        .with_precision(precision)
                })
                .collect();
            let kinds: Vec<FieldKind> = schema.iter().map(|f| f.kind).collect();
            let feature = (
                geometry_type(),
                proptest::collection::vec(any::<u8>(), 0..64),
                row(kinds),
            );
            (
                Just(name),
                Just(layer_type),
                Just(srs),
                Just(schema),
                proptest::collection::vec(feature, 0..8),
            )
        })
        .prop_map(|(name, layer_type, srs, schema, features)| {
            let mut layer = MemoryLayer::new(name, layer_type);
            layer.spatial_reference_wkt = srs;
            layer.fields = schema;
            for (feature_type, wkb, attributes) in features {
                layer.push_feature(SourceFeature::new(
                    Feature::new(feature_type, wkb),
                    attributes,
                ));
            }
            layer
        })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn prop_monolithic_roundtrip(layer in layer()) {
        let snapshot = LayerSnapshot::from_source(&layer);
        let bytes = snapshot.to_monolithic().unwrap();

        prop_assert_eq!(NativeEndian::read_i32(&bytes[0..4]) as usize, bytes.len());

        let decoded = LayerSnapshot::from_monolithic(&bytes).unwrap();
        prop_assert_eq!(&decoded, &snapshot);
        prop_assert_eq!(MemoryLayer::from_snapshot(&decoded), layer);

        let fresh = LayerSnapshot::from_sections(
            decoded.metadata().clone(),
            decoded.schema().clone(),
            decoded.features().clone(),
            decoded.records().clone(),
        );
        let reencoded = fresh.to_monolithic().unwrap();
        prop_assert_eq!(&*reencoded, &*bytes);
    }

    #[test]
    fn prop_split_roundtrip(layer in layer()) {
        let snapshot = LayerSnapshot::from_source(&layer);
        let encoded = snapshot.encode(SnapshotLayout::Split).unwrap();
        let decoded = LayerSnapshot::decode(&encoded).unwrap();
        prop_assert_eq!(&decoded, &snapshot);
        prop_assert_eq!(decoded.encode(SnapshotLayout::Split).unwrap(), encoded);
    }

    #[test]
    fn prop_every_block_prefix_matches_length(layer in layer()) {
        let sections = LayerSnapshot::from_source(&layer).to_split().unwrap();
        for block in [&sections.metadata, &sections.schema, &sections.features, &sections.records] {
            let reader = BlockReader::open_exact("block", block).unwrap();
            prop_assert_eq!(reader.declared_len(), block.len());
        }
    }

    #[test]
    fn prop_truncated_snapshot_rejected(layer in layer(), cut in any::<prop::sample::Index>()) {
        let bytes = LayerSnapshot::from_source(&layer).to_monolithic().unwrap();
        let cut = cut.index(bytes.len());
        prop_assert!(LayerSnapshot::from_monolithic(&bytes[..cut]).is_err());
    }
}

#[test]
fn test_repeated_encode_returns_same_buffer() {
    let mut layer = MemoryLayer::new("roads", GeometryType::LINE_STRING)
        .with_field(FieldSchema::new("name", FieldKind::String));
    layer.push_feature(SourceFeature::new(
        Feature::new(GeometryType::LINE_STRING, vec![1, 2, 3]),
        vec!["Main St".into()],
    ));
    let snapshot = LayerSnapshot::from_source(&layer);

    assert_eq!(snapshot.cache_state(), CacheState::Uninitialized);
    let first = snapshot.to_monolithic().unwrap();
    let second = snapshot.to_monolithic().unwrap();
    assert!(Arc::ptr_eq(&first, &second));

    let split_a = snapshot.to_split().unwrap();
    let split_b = snapshot.to_split().unwrap();
    assert!(Arc::ptr_eq(&split_a.records, &split_b.records));
}

#[test]
fn test_split_sections_decode_independently() {
    let mut layer = MemoryLayer::new("parcels", GeometryType::POLYGON)
        .with_spatial_reference("PROJCS[\"UTM 33N\"]")
        .with_field(FieldSchema::new("area", FieldKind::Real).with_precision(2));
    layer.push_feature(SourceFeature::new(
        Feature::new(GeometryType::POLYGON, vec![0u8; 41]),
        vec![12.5.into()],
    ));
    let sections = LayerSnapshot::from_source(&layer).to_split().unwrap();

    let metadata = geostash_format::decode_metadata(&sections.metadata).unwrap();
    assert_eq!(metadata.name, "parcels");
    assert_eq!(metadata.spatial_reference_wkt, "PROJCS[\"UTM 33N\"]");

    let fields = geostash_format::decode_schema(&sections.schema).unwrap();
    assert_eq!(fields, layer.fields);

    let features = geostash_format::decode_features(&sections.features).unwrap();
    assert_eq!(features.len(), 1);
    assert_eq!(features[0].wkb_size(), 41);
}
