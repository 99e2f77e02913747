//! Attribute schema block
//!
//! ## Binary Format
//!
//! ```text
//! [blockLength: i32][fieldCount: i32]
//! fieldCount x [titleLen: i32][title: NUL-terminated]
//!              [displayWidth: i32][decimalPrecision: i32][kind: u8]
//! ```
//!
//! Kind codes outside the supported set are kept as-is so the schema
//! round-trips bit-exactly; the record codec skips those columns.

use crate::cache::{BufferCache, CacheState};
use crate::cursor::{encode_block, try_alloc_items, BlockReader, BlockSink};
use crate::source::LayerSource;
use geostash_core::{FieldKind, FieldSchema, Result};
use std::sync::Arc;
use tracing::debug;

/// Block name used in errors and logs
pub const SCHEMA_BLOCK: &str = "schema";

/// Smallest encoding of one field: empty title length, width, precision, kind
const MIN_FIELD_SIZE: usize = 4 + 4 + 4 + 1;

fn write_schema(sink: &mut dyn BlockSink, fields: &[FieldSchema]) -> Result<()> {
    sink.put_len("field count", fields.len())?;
    for field in fields {
        sink.put_cstr("field title", &field.title)?;
        sink.put_i32(field.display_width);
        sink.put_i32(field.decimal_precision);
        sink.put_u8(field.kind.code());
    }
    Ok(())
}

/// Encode an ordered list of columns as a standalone block
pub fn encode_schema(fields: &[FieldSchema]) -> Result<Vec<u8>> {
    let bytes = encode_block(SCHEMA_BLOCK, |sink| write_schema(sink, fields))?;
    debug!(fields = fields.len(), len = bytes.len(), "Encoded schema block");
    Ok(bytes)
}

/// Decode a standalone schema block spanning all of `bytes`
pub fn decode_schema(bytes: &[u8]) -> Result<Vec<FieldSchema>> {
    let mut reader = BlockReader::open_exact(SCHEMA_BLOCK, bytes)?;
    let count = reader.read_len("field count")?;

    let mut fields = try_alloc_items(
        "schema fields",
        count,
        reader.remaining() / MIN_FIELD_SIZE,
    )?;
    for _ in 0..count {
        let title = reader.read_cstr("field title")?;
        let display_width = reader.read_i32("display width")?;
        let decimal_precision = reader.read_i32("decimal precision")?;
        let kind = FieldKind::from_code(reader.read_u8("field kind")?);
        fields.push(FieldSchema {
            title,
            display_width,
            decimal_precision,
            kind,
        });
    }
    reader.finish()?;

    debug!(fields = fields.len(), len = bytes.len(), "Decoded schema block");
    Ok(fields)
}

/// Ordered column definitions with their cached encoding
#[derive(Debug, Clone, Default)]
pub struct AttributeSchema {
    fields: Vec<FieldSchema>,
    cache: BufferCache,
}

impl AttributeSchema {
    /// Schema with no columns
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap existing columns
    pub fn from_fields(fields: Vec<FieldSchema>) -> Self {
        AttributeSchema {
            fields,
            cache: BufferCache::new(),
        }
    }

    /// Read the columns of a live layer
    pub fn from_source<S: LayerSource + ?Sized>(source: &S) -> Self {
        Self::from_fields(source.fields())
    }

    /// Decode from a standalone block; the input becomes the cached encoding
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let fields = decode_schema(bytes)?;
        Ok(AttributeSchema {
            fields,
            cache: BufferCache::with_latest(bytes),
        })
    }

    /// Number of columns
    pub fn field_count(&self) -> usize {
        self.fields.len()
    }

    /// Whether the schema has no columns
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// All columns in order
    pub fn fields(&self) -> &[FieldSchema] {
        &self.fields
    }

    /// Column at `index`
    pub fn field(&self, index: usize) -> Option<&FieldSchema> {
        self.fields.get(index)
    }

    /// Kind of every column in order
    pub fn kinds(&self) -> impl Iterator<Item = FieldKind> + '_ {
        self.fields.iter().map(|f| f.kind)
    }

    /// Encoded block, recomputed only if the columns changed
    pub fn bytes(&self) -> Result<Arc<[u8]>> {
        self.cache.get_or_encode(|| encode_schema(&self.fields))
    }

    /// Cache state of the encoded block
    pub fn cache_state(&self) -> CacheState {
        self.cache.state()
    }

    /// Append a column
    pub fn push_field(&mut self, field: FieldSchema) {
        self.fields.push(field);
        self.cache.invalidate();
    }

    /// Replace the column at `index`, returning the previous one
    ///
    /// Returns `None` and leaves the schema untouched when `index` is out of range.
    pub fn set_field(&mut self, index: usize, field: FieldSchema) -> Option<FieldSchema> {
        let slot = self.fields.get_mut(index)?;
        let previous = std::mem::replace(slot, field);
        self.cache.invalidate();
        Some(previous)
    }

    /// Replace all columns
    pub fn set_fields(&mut self, fields: Vec<FieldSchema>) {
        self.fields = fields;
        self.cache.invalidate();
    }

    /// Remove all columns
    pub fn clear(&mut self) {
        self.fields.clear();
        self.cache.invalidate();
    }

    /// Replace all columns with those of a live layer
    pub fn set_from_source<S: LayerSource + ?Sized>(&mut self, source: &S) {
        self.set_fields(source.fields());
    }

    /// Replace all columns by decoding `bytes`
    ///
    /// On error the schema is left unchanged.
    pub fn set_from_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        *self = Self::from_bytes(bytes)?;
        Ok(())
    }

    /// Take the columns out
    pub fn into_fields(self) -> Vec<FieldSchema> {
        self.fields
    }
}

impl PartialEq for AttributeSchema {
    fn eq(&self, other: &Self) -> bool {
        self.fields == other.fields
    }
}

impl From<Vec<FieldSchema>> for AttributeSchema {
    fn from(fields: Vec<FieldSchema>) -> Self {
        Self::from_fields(fields)
    }
}
