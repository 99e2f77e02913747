//! Attribute record block
//!
//! ## Binary Format
//!
//! ```text
//! [blockLength: i32][recordCount: i32][fieldCount: i32]
//! recordCount x fieldCount cells, row-major:
//!   [kind: u8][payload]
//! ```
//!
//! | Kind    | Payload                                   |
//! |---------|-------------------------------------------|
//! | Integer | `i32`                                     |
//! | Real    | `f64`                                     |
//! | String  | `[len: i32][bytes]`, NUL-terminated        |
//! | Binary  | `[len: i32][bytes]`, exact length          |
//! | Date    | 7 x `i32` (y, m, d, h, min, s, tz flag)   |
//!
//! Cells of an unsupported column kind are written as nothing at all: no kind
//! byte and no payload. The block therefore cannot be walked without the
//! schema, and decoding takes an [`AttributeSchema`].
//!
//! Cell `(r, c)` lives at index `r * fieldCount + c`.

use crate::cache::{BufferCache, CacheState};
use crate::cursor::{encode_block, try_alloc_items, BlockReader, BlockSink};
use crate::schema::AttributeSchema;
use crate::source::LayerSource;
use geostash_core::{AttributeValue, DateValue, Error, FieldKind, FieldSchema, Result};
use std::sync::Arc;
use tracing::{debug, warn};

/// Block name used in errors and logs
pub const RECORDS_BLOCK: &str = "records";

/// Smallest supported cell: kind byte plus a 4-byte payload
const MIN_CELL_SIZE: usize = 1 + 4;

fn write_cell(sink: &mut dyn BlockSink, value: &AttributeValue) -> Result<()> {
    match value {
        AttributeValue::Integer(v) => {
            sink.put_u8(FieldKind::INTEGER_CODE);
            sink.put_i32(*v);
        }
        AttributeValue::Real(v) => {
            sink.put_u8(FieldKind::REAL_CODE);
            sink.put_f64(*v);
        }
        AttributeValue::String(s) => {
            sink.put_u8(FieldKind::STRING_CODE);
            sink.put_cstr("string cell", s)?;
        }
        AttributeValue::Binary(b) => {
            sink.put_u8(FieldKind::BINARY_CODE);
            sink.put_sized_bytes("binary cell", b)?;
        }
        AttributeValue::Date(d) => {
            sink.put_u8(FieldKind::DATE_CODE);
            for part in d.to_array() {
                sink.put_i32(part);
            }
        }
        AttributeValue::Unsupported(_) => {}
    }
    Ok(())
}

fn write_records(
    sink: &mut dyn BlockSink,
    record_count: usize,
    field_count: usize,
    cells: &[AttributeValue],
) -> Result<()> {
    sink.put_len("record count", record_count)?;
    sink.put_len("field count", field_count)?;
    for cell in cells {
        write_cell(sink, cell)?;
    }
    Ok(())
}

fn read_cell(
    reader: &mut BlockReader<'_>,
    kind: FieldKind,
    row: usize,
    column: usize,
) -> Result<AttributeValue> {
    if !kind.is_supported() {
        return Ok(AttributeValue::Unsupported(kind.code()));
    }

    let found = reader.read_u8("cell kind")?;
    if found != kind.code() {
        return Err(Error::SchemaMismatch(format!(
            "record {} column {}: schema says {}, cell has kind code {}",
            row,
            column,
            kind.name(),
            found
        )));
    }

    Ok(match kind {
        FieldKind::Integer => AttributeValue::Integer(reader.read_i32("integer cell")?),
        FieldKind::Real => AttributeValue::Real(reader.read_f64("real cell")?),
        FieldKind::String => AttributeValue::String(reader.read_cstr("string cell")?),
        FieldKind::Binary => AttributeValue::Binary(reader.read_sized_bytes("binary cell")?),
        FieldKind::Date => {
            let mut parts = [0i32; 7];
            for part in parts.iter_mut() {
                *part = reader.read_i32("date cell")?;
            }
            AttributeValue::Date(DateValue::from_array(parts))
        }
        FieldKind::Unsupported(code) => AttributeValue::Unsupported(code),
    })
}

/// Decode a standalone record block spanning all of `bytes`
///
/// The declared record count is checked against `expected_records` and
/// against the bytes left before cells are allocated.
/// Returns `(record_count, field_count, cells)`.
fn decode_records(
    bytes: &[u8],
    schema: &[FieldSchema],
    expected_records: Option<usize>,
) -> Result<(usize, usize, Vec<AttributeValue>)> {
    let mut reader = BlockReader::open_exact(RECORDS_BLOCK, bytes)?;
    let record_count = reader.read_len("record count")?;
    let field_count = reader.read_len("field count")?;

    if field_count != schema.len() {
        return Err(Error::SchemaMismatch(format!(
            "record block has {} fields, schema has {}",
            field_count,
            schema.len()
        )));
    }
    if let Some(expected) = expected_records {
        if record_count != expected {
            return Err(Error::InvalidSnapshot(format!(
                "record block has {} records, feature block has {} features",
                record_count, expected
            )));
        }
    }

    let total = record_count.checked_mul(field_count).ok_or_else(|| {
        Error::malformed(
            RECORDS_BLOCK,
            4,
            format!("{} x {} cells overflows", record_count, field_count),
        )
    })?;
    let supported = schema.iter().filter(|f| f.kind.is_supported()).count();
    if supported > 0 {
        let row_min = MIN_CELL_SIZE * supported;
        if record_count > reader.remaining() / row_min {
            return Err(Error::malformed(
                RECORDS_BLOCK,
                4,
                format!(
                    "{} records need at least {} bytes each, {} bytes remain",
                    record_count,
                    row_min,
                    reader.remaining()
                ),
            ));
        }
    }

    let mut cells = try_alloc_items("record cells", total, total)?;
    for row in 0..record_count {
        for (column, field) in schema.iter().enumerate() {
            cells.push(read_cell(&mut reader, field.kind, row, column)?);
        }
    }
    reader.finish()?;

    debug!(
        records = record_count,
        fields = field_count,
        len = bytes.len(),
        "Decoded record block"
    );
    Ok((record_count, field_count, cells))
}

/// Attribute rows stored as one flat row-major cell list
#[derive(Debug, Clone, Default)]
pub struct AttributeRecords {
    record_count: usize,
    field_count: usize,
    cells: Vec<AttributeValue>,
    cache: BufferCache,
}

impl AttributeRecords {
    /// No rows and no columns
    pub fn new() -> Self {
        Self::default()
    }

    /// No rows, `field_count` columns
    pub fn with_field_count(field_count: usize) -> Self {
        AttributeRecords {
            field_count,
            ..Self::default()
        }
    }

    /// Build from rows, each of which must have `field_count` cells
    pub fn from_rows(field_count: usize, rows: Vec<Vec<AttributeValue>>) -> Result<Self> {
        let mut records = Self::with_field_count(field_count);
        records.set_records(field_count, rows)?;
        Ok(records)
    }

    /// Collect the rows of a live layer's geometry-bearing features
    ///
    /// Rows are fitted to the layer's columns: missing cells get the column's
    /// default value and cells of unsupported columns become placeholders.
    pub fn from_source<S: LayerSource + ?Sized>(source: &S) -> Self {
        let mut records = Self::new();
        records.load_source(source);
        records
    }

    /// Decode from a standalone block using `schema` to walk the cells
    ///
    /// The input becomes the cached encoding.
    pub fn from_bytes(bytes: &[u8], schema: &AttributeSchema) -> Result<Self> {
        Self::decode_with(bytes, schema, None)
    }

    /// Decode a record block that must hold exactly `expected_records` rows
    ///
    /// The row count is checked before any cell is allocated.
    pub fn from_bytes_expecting(
        bytes: &[u8],
        schema: &AttributeSchema,
        expected_records: usize,
    ) -> Result<Self> {
        Self::decode_with(bytes, schema, Some(expected_records))
    }

    fn decode_with(
        bytes: &[u8],
        schema: &AttributeSchema,
        expected_records: Option<usize>,
    ) -> Result<Self> {
        let (record_count, field_count, cells) =
            decode_records(bytes, schema.fields(), expected_records)?;
        Ok(AttributeRecords {
            record_count,
            field_count,
            cells,
            cache: BufferCache::with_latest(bytes),
        })
    }

    /// Number of rows
    pub fn record_count(&self) -> usize {
        self.record_count
    }

    /// Number of cells per row
    pub fn field_count(&self) -> usize {
        self.field_count
    }

    /// Whether there are no rows
    pub fn is_empty(&self) -> bool {
        self.record_count == 0
    }

    /// Linear index of cell `(row, column)`, if both are in range
    pub fn cell_index(&self, row: usize, column: usize) -> Option<usize> {
        if row < self.record_count && column < self.field_count {
            Some(row * self.field_count + column)
        } else {
            None
        }
    }

    /// Cell at `(row, column)`
    pub fn cell(&self, row: usize, column: usize) -> Option<&AttributeValue> {
        self.cell_index(row, column).map(|i| &self.cells[i])
    }

    /// Row `row` as a slice of `field_count` cells
    pub fn record(&self, row: usize) -> Option<&[AttributeValue]> {
        if row < self.record_count {
            let start = row * self.field_count;
            Some(&self.cells[start..start + self.field_count])
        } else {
            None
        }
    }

    /// All rows in order
    pub fn records(&self) -> impl Iterator<Item = &[AttributeValue]> + '_ {
        (0..self.record_count).filter_map(move |row| self.record(row))
    }

    /// All cells, row-major
    pub fn cells(&self) -> &[AttributeValue] {
        &self.cells
    }

    /// Check arity and every cell kind against `schema`
    pub fn check_schema(&self, schema: &AttributeSchema) -> Result<()> {
        if self.field_count != schema.field_count() {
            return Err(Error::SchemaMismatch(format!(
                "records have {} fields, schema has {}",
                self.field_count,
                schema.field_count()
            )));
        }
        for (row, cells) in self.records().enumerate() {
            for (column, (cell, field)) in cells.iter().zip(schema.fields()).enumerate() {
                if cell.kind() != field.kind {
                    return Err(Error::SchemaMismatch(format!(
                        "record {} column {} ('{}'): expected {}, found {}",
                        row,
                        column,
                        field.title,
                        field.kind.name(),
                        cell.kind().name()
                    )));
                }
            }
        }
        Ok(())
    }

    /// Encoded block, recomputed only if the rows changed
    pub fn bytes(&self) -> Result<Arc<[u8]>> {
        self.cache.get_or_encode(|| self.encode())
    }

    /// Cache state of the encoded block
    pub fn cache_state(&self) -> CacheState {
        self.cache.state()
    }

    fn encode(&self) -> Result<Vec<u8>> {
        let bytes = encode_block(RECORDS_BLOCK, |sink| {
            write_records(sink, self.record_count, self.field_count, &self.cells)
        })?;

        let skipped = self
            .cells
            .iter()
            .filter(|c| matches!(c, AttributeValue::Unsupported(_)))
            .count();
        if skipped > 0 {
            warn!(skipped, "Skipped cells of unsupported kind");
        }
        debug!(
            records = self.record_count,
            fields = self.field_count,
            len = bytes.len(),
            "Encoded record block"
        );
        Ok(bytes)
    }

    fn arity_error(&self, got: usize) -> Error {
        Error::SchemaMismatch(format!(
            "record has {} cells, expected {}",
            got, self.field_count
        ))
    }

    /// Append a row of exactly `field_count` cells
    pub fn push_record(&mut self, row: Vec<AttributeValue>) -> Result<()> {
        if row.len() != self.field_count {
            return Err(self.arity_error(row.len()));
        }
        self.cells.extend(row);
        self.record_count += 1;
        self.cache.invalidate();
        Ok(())
    }

    /// Replace one cell, returning the previous value
    ///
    /// Returns `None` and leaves the rows untouched when out of range.
    pub fn set_cell(
        &mut self,
        row: usize,
        column: usize,
        value: AttributeValue,
    ) -> Option<AttributeValue> {
        let index = self.cell_index(row, column)?;
        let previous = std::mem::replace(&mut self.cells[index], value);
        self.cache.invalidate();
        Some(previous)
    }

    /// Replace all rows and the column count
    ///
    /// Fails without changing anything if any row has the wrong arity.
    pub fn set_records(
        &mut self,
        field_count: usize,
        rows: Vec<Vec<AttributeValue>>,
    ) -> Result<()> {
        if let Some(bad) = rows.iter().find(|r| r.len() != field_count) {
            return Err(Error::SchemaMismatch(format!(
                "record has {} cells, expected {}",
                bad.len(),
                field_count
            )));
        }
        let total = rows.len().saturating_mul(field_count);
        let mut cells = try_alloc_items("record cells", total, total)?;
        self.record_count = rows.len();
        for row in rows {
            cells.extend(row);
        }
        self.cells = cells;
        self.field_count = field_count;
        self.cache.invalidate();
        Ok(())
    }

    /// Change the column count of an empty record set
    pub fn set_field_count(&mut self, field_count: usize) -> Result<()> {
        if field_count == self.field_count || self.reshape_if_empty(field_count) {
            return Ok(());
        }
        Err(Error::SchemaMismatch(format!(
            "cannot change field count from {} to {} with {} records present",
            self.field_count, field_count, self.record_count
        )))
    }

    /// Adopt `field_count` columns; returns false when rows already exist
    pub fn reshape_if_empty(&mut self, field_count: usize) -> bool {
        if self.record_count > 0 {
            return false;
        }
        if field_count != self.field_count {
            self.field_count = field_count;
            self.cache.invalidate();
        }
        true
    }

    /// Remove all rows, keeping the column count
    pub fn clear(&mut self) {
        self.cells.clear();
        self.record_count = 0;
        self.cache.invalidate();
    }

    /// Replace all rows with those of a live layer
    pub fn set_from_source<S: LayerSource + ?Sized>(&mut self, source: &S) {
        self.load_source(source);
        self.cache.invalidate();
    }

    /// Replace all rows by decoding `bytes`
    ///
    /// On error the rows are left unchanged.
    pub fn set_from_bytes(&mut self, bytes: &[u8], schema: &AttributeSchema) -> Result<()> {
        *self = Self::from_bytes(bytes, schema)?;
        Ok(())
    }

    fn load_source<S: LayerSource + ?Sized>(&mut self, source: &S) {
        let fields = source.fields();
        let unsupported: Vec<&str> = fields
            .iter()
            .filter(|f| !f.kind.is_supported())
            .map(|f| f.title.as_str())
            .collect();
        if !unsupported.is_empty() {
            warn!(
                layer = source.name(),
                columns = ?unsupported,
                "Columns of unsupported kind will not be stored"
            );
        }

        let mut cells = Vec::new();
        let mut record_count = 0;
        for feature in source.features().filter(|f| f.geometry.is_some()) {
            let mut attributes = feature.attributes.into_iter();
            for field in &fields {
                let cell = match attributes.next() {
                    _ if !field.kind.is_supported() => {
                        AttributeValue::Unsupported(field.kind.code())
                    }
                    Some(value) => value,
                    None => AttributeValue::default_for(field.kind),
                };
                cells.push(cell);
            }
            record_count += 1;
        }

        self.record_count = record_count;
        self.field_count = fields.len();
        self.cells = cells;
    }
}

impl PartialEq for AttributeRecords {
    fn eq(&self, other: &Self) -> bool {
        self.record_count == other.record_count
            && self.field_count == other.field_count
            && self.cells == other.cells
    }
}
