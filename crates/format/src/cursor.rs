//! Bounds-checked block reader and writer
//!
//! Every section of the format is a *block*: a self-describing byte range whose
//! first four bytes hold its total length (including those four bytes).
//!
//! ## Writing
//!
//! Block bodies are written against the [`BlockSink`] trait. [`encode_block`]
//! runs the same body twice: once into a [`SizeCounter`] to learn the exact
//! length, then into a [`BlockWriter`] holding a buffer reserved up front.
//! Because both passes share one code path, the length prefix always equals
//! the number of bytes written.
//!
//! ## Reading
//!
//! [`BlockReader`] wraps exactly the declared byte range of one block. Every
//! read checks the remaining length first, so truncated input yields
//! `MalformedInput` instead of reading past the end.
//!
//! ## Byte Order
//!
//! All integers and floats use the host's native byte order. Buffers are only
//! portable between machines of the same endianness.

use byteorder::{ByteOrder, NativeEndian};
use geostash_core::{Error, Result};

/// Size of every length and count field
pub const LEN_SIZE: usize = 4;

/// Destination for block bodies
pub trait BlockSink {
    /// Write a native-endian i32
    fn put_i32(&mut self, value: i32);

    /// Write one byte
    fn put_u8(&mut self, value: u8);

    /// Write a native-endian f64
    fn put_f64(&mut self, value: f64);

    /// Write raw bytes
    fn put_slice(&mut self, bytes: &[u8]);

    /// Write a length or count as i32
    fn put_len(&mut self, context: &'static str, len: usize) -> Result<()> {
        let value = i32::try_from(len).map_err(|_| Error::LengthOverflow {
            context,
            length: len,
        })?;
        self.put_i32(value);
        Ok(())
    }

    /// Write `[len:i32][bytes]` with the exact byte length
    fn put_sized_bytes(&mut self, context: &'static str, bytes: &[u8]) -> Result<()> {
        self.put_len(context, bytes.len())?;
        self.put_slice(bytes);
        Ok(())
    }

    /// Write `[len:i32][bytes][0]`; the declared length includes the terminator
    fn put_cstr(&mut self, context: &'static str, value: &str) -> Result<()> {
        self.put_len(context, value.len().saturating_add(1))?;
        self.put_slice(value.as_bytes());
        self.put_u8(0);
        Ok(())
    }
}

/// Sink that only counts bytes
#[derive(Debug, Default)]
pub struct SizeCounter {
    len: usize,
}

impl SizeCounter {
    /// Bytes counted so far
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether nothing has been counted
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl BlockSink for SizeCounter {
    fn put_i32(&mut self, _value: i32) {
        self.len = self.len.saturating_add(4);
    }

    fn put_u8(&mut self, _value: u8) {
        self.len = self.len.saturating_add(1);
    }

    fn put_f64(&mut self, _value: f64) {
        self.len = self.len.saturating_add(8);
    }

    fn put_slice(&mut self, bytes: &[u8]) {
        self.len = self.len.saturating_add(bytes.len());
    }
}

/// Sink appending to a pre-reserved buffer
#[derive(Debug)]
pub struct BlockWriter {
    buf: Vec<u8>,
}

impl BlockWriter {
    /// Create a writer with exactly `capacity` bytes reserved
    pub fn with_capacity(context: &'static str, capacity: usize) -> Result<Self> {
        Ok(BlockWriter {
            buf: try_alloc(context, capacity)?,
        })
    }

    /// Bytes written so far
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Whether nothing has been written
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Finish writing and return the buffer
    pub fn into_inner(self) -> Vec<u8> {
        self.buf
    }
}

impl BlockSink for BlockWriter {
    fn put_i32(&mut self, value: i32) {
        let mut raw = [0u8; 4];
        NativeEndian::write_i32(&mut raw, value);
        self.buf.extend_from_slice(&raw);
    }

    fn put_u8(&mut self, value: u8) {
        self.buf.push(value);
    }

    fn put_f64(&mut self, value: f64) {
        let mut raw = [0u8; 8];
        NativeEndian::write_f64(&mut raw, value);
        self.buf.extend_from_slice(&raw);
    }

    fn put_slice(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }
}

/// Encode one block: `[totalLength:i32][body]`
///
/// `body` is run once to size the block and once to write it.
pub fn encode_block<F>(block: &'static str, body: F) -> Result<Vec<u8>>
where
    F: Fn(&mut dyn BlockSink) -> Result<()>,
{
    let mut counter = SizeCounter::default();
    counter.put_i32(0);
    body(&mut counter)?;
    let total = counter.len();

    let mut writer = BlockWriter::with_capacity(block, total)?;
    writer.put_len(block, total)?;
    body(&mut writer)?;

    if writer.len() != total {
        return Err(Error::malformed(
            block,
            writer.len(),
            format!("encoder wrote {} bytes, sized {}", writer.len(), total),
        ));
    }
    Ok(writer.into_inner())
}

/// Allocate an empty buffer with `capacity` bytes reserved
pub fn try_alloc(context: &'static str, capacity: usize) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    buf.try_reserve_exact(capacity)
        .map_err(|_| Error::AllocationFailure {
            context,
            requested: capacity,
        })?;
    Ok(buf)
}

/// Reserve room for up to `count` items, bounded by what the input could hold
pub fn try_alloc_items<T>(context: &'static str, count: usize, bound: usize) -> Result<Vec<T>> {
    let capacity = count.min(bound);
    let mut items = Vec::new();
    items
        .try_reserve_exact(capacity)
        .map_err(|_| Error::AllocationFailure {
            context,
            requested: capacity.saturating_mul(std::mem::size_of::<T>()),
        })?;
    Ok(items)
}

/// Read the length prefix at the start of `bytes` without consuming anything
pub fn peek_block_len(block: &'static str, bytes: &[u8]) -> Result<usize> {
    if bytes.len() < LEN_SIZE {
        return Err(Error::malformed(
            block,
            0,
            format!(
                "need {} bytes for length prefix, have {}",
                LEN_SIZE,
                bytes.len()
            ),
        ));
    }
    let declared = NativeEndian::read_i32(&bytes[..LEN_SIZE]);
    if declared < LEN_SIZE as i32 {
        return Err(Error::malformed(
            block,
            0,
            format!("declared length {} is smaller than its own prefix", declared),
        ));
    }
    Ok(declared as usize)
}

/// Cursor over exactly one block
#[derive(Debug)]
pub struct BlockReader<'a> {
    data: &'a [u8],
    pos: usize,
    block: &'static str,
}

impl<'a> BlockReader<'a> {
    /// Open the block at the start of `bytes`, which may extend past it
    pub fn open(block: &'static str, bytes: &'a [u8]) -> Result<Self> {
        let declared = peek_block_len(block, bytes)?;
        if declared > bytes.len() {
            return Err(Error::malformed(
                block,
                0,
                format!(
                    "declared {} bytes, only {} available",
                    declared,
                    bytes.len()
                ),
            ));
        }
        Ok(BlockReader {
            data: &bytes[..declared],
            pos: LEN_SIZE,
            block,
        })
    }

    /// Open a block that must span all of `bytes`
    pub fn open_exact(block: &'static str, bytes: &'a [u8]) -> Result<Self> {
        let reader = Self::open(block, bytes)?;
        if reader.declared_len() != bytes.len() {
            return Err(Error::malformed(
                block,
                reader.declared_len(),
                format!(
                    "declared {} bytes, buffer holds {}",
                    reader.declared_len(),
                    bytes.len()
                ),
            ));
        }
        Ok(reader)
    }

    /// Declared total length of the block
    pub fn declared_len(&self) -> usize {
        self.data.len()
    }

    /// Current offset from the start of the block
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Bytes left before the declared end
    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    fn take(&mut self, n: usize, what: &str) -> Result<&'a [u8]> {
        if n > self.remaining() {
            return Err(Error::malformed(
                self.block,
                self.pos,
                format!(
                    "{} needs {} bytes, only {} remain",
                    what,
                    n,
                    self.remaining()
                ),
            ));
        }
        let data: &'a [u8] = self.data;
        let slice = &data[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    /// Read a native-endian i32
    pub fn read_i32(&mut self, what: &str) -> Result<i32> {
        Ok(NativeEndian::read_i32(self.take(4, what)?))
    }

    /// Read one byte
    pub fn read_u8(&mut self, what: &str) -> Result<u8> {
        Ok(self.take(1, what)?[0])
    }

    /// Read a native-endian f64
    pub fn read_f64(&mut self, what: &str) -> Result<f64> {
        Ok(NativeEndian::read_f64(self.take(8, what)?))
    }

    /// Read a non-negative length or count
    pub fn read_len(&mut self, what: &str) -> Result<usize> {
        let at = self.pos;
        let value = self.read_i32(what)?;
        usize::try_from(value)
            .map_err(|_| Error::malformed(self.block, at, format!("negative {}: {}", what, value)))
    }

    /// Read `[len:i32][bytes]` into an owned buffer of exactly `len` bytes
    pub fn read_sized_bytes(&mut self, what: &'static str) -> Result<Vec<u8>> {
        let len = self.read_len(what)?;
        let raw = self.take(len, what)?;
        let mut owned = try_alloc(what, len)?;
        owned.extend_from_slice(raw);
        Ok(owned)
    }

    /// Read `[len:i32][bytes]` as text, dropping one trailing terminator if present
    pub fn read_cstr(&mut self, what: &'static str) -> Result<String> {
        let len = self.read_len(what)?;
        let at = self.pos;
        let raw = self.take(len, what)?;
        let text = match raw.split_last() {
            Some((&0, head)) => head,
            _ => raw,
        };
        let mut owned = try_alloc(what, text.len())?;
        owned.extend_from_slice(text);
        String::from_utf8(owned)
            .map_err(|_| Error::malformed(self.block, at, format!("{} is not valid UTF-8", what)))
    }

    /// Take the nested block starting at the current position
    pub fn take_block(&mut self, inner: &'static str) -> Result<&'a [u8]> {
        let data: &'a [u8] = self.data;
        let rest = &data[self.pos..];
        let declared = peek_block_len(inner, rest).map_err(|_| {
            Error::malformed(
                self.block,
                self.pos,
                format!("no room for {} block prefix", inner),
            )
        })?;
        self.take(declared, inner)
    }

    /// Check that the whole declared length was consumed
    pub fn finish(self) -> Result<()> {
        if self.pos != self.data.len() {
            return Err(Error::malformed(
                self.block,
                self.pos,
                format!(
                    "declared {} bytes, consumed {}",
                    self.data.len(),
                    self.pos
                ),
            ));
        }
        Ok(())
    }
}
