// holocron-parsers/src/binary.rs
//! Field-level readers and writers for leaf payloads.
//!
//! Container envelopes are big-endian while most payload fields are
//! little-endian, often inside the same file. Every numeric accessor
//! therefore takes the byte order as a type parameter
//! (`reader.u32::<LittleEndian>()`) instead of relying on a reader-wide
//! setting.

use byteorder::ByteOrder;
pub use byteorder::{BigEndian, LittleEndian};

use holocron_core::Tag;

use crate::traits::{ParseError, ParseResult};

/// Bounds-checked cursor over a borrowed byte slice
///
/// `base` is the absolute file offset of `data[0]`; it only feeds error
/// messages so failures point at the right place in the original file.
#[derive(Debug, Clone)]
pub struct ByteReader<'a> {
    data: &'a [u8],
    pos: usize,
    base: usize,
}

impl<'a> ByteReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self::with_base(data, 0)
    }

    pub fn with_base(data: &'a [u8], base: usize) -> Self {
        Self { data, pos: 0, base }
    }

    /// Position relative to the start of the slice
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Position in the original file
    pub fn absolute_offset(&self) -> usize {
        self.base + self.pos
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    /// Borrow the next `len` bytes and advance past them
    pub fn take(&mut self, len: usize) -> ParseResult<&'a [u8]> {
        if self.remaining() < len {
            return Err(ParseError::TruncatedData {
                offset: self.absolute_offset(),
                requested: len,
                available: self.remaining(),
            });
        }
        let slice = &self.data[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    pub fn skip(&mut self, len: usize) -> ParseResult<()> {
        self.take(len).map(|_| ())
    }

    pub fn u8(&mut self) -> ParseResult<u8> {
        Ok(self.take(1)?[0])
    }

    pub fn u16<E: ByteOrder>(&mut self) -> ParseResult<u16> {
        Ok(E::read_u16(self.take(2)?))
    }

    pub fn u32<E: ByteOrder>(&mut self) -> ParseResult<u32> {
        Ok(E::read_u32(self.take(4)?))
    }

    pub fn i32<E: ByteOrder>(&mut self) -> ParseResult<i32> {
        Ok(E::read_i32(self.take(4)?))
    }

    pub fn f32<E: ByteOrder>(&mut self) -> ParseResult<f32> {
        Ok(E::read_f32(self.take(4)?))
    }

    /// Four raw bytes as a tag
    pub fn tag(&mut self) -> ParseResult<Tag> {
        let bytes = self.take(4)?;
        Ok(Tag::new([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    /// Read a signed count and reject negative or implausible values
    ///
    /// `element_size` bounds the count by the bytes still available so a
    /// corrupt count cannot trigger a huge allocation.
    pub fn count<E: ByteOrder>(&mut self, element_size: usize) -> ParseResult<usize> {
        let offset = self.absolute_offset();
        let raw = self.i32::<E>()?;
        let count = usize::try_from(raw)
            .map_err(|_| ParseError::invalid_data(offset, format!("negative element count {raw}")))?;
        let needed = count.saturating_mul(element_size);
        if needed > self.remaining() {
            return Err(ParseError::TruncatedData {
                offset: self.absolute_offset(),
                requested: needed,
                available: self.remaining(),
            });
        }
        Ok(count)
    }

    /// Read `count` consecutive u32 values
    pub fn u32_array<E: ByteOrder>(&mut self, count: usize) -> ParseResult<Vec<u32>> {
        let raw = self.take(count.saturating_mul(4))?;
        Ok(raw.chunks_exact(4).map(E::read_u32).collect())
    }

    /// Read a null-terminated UTF-8 string, consuming the terminator
    pub fn cstring(&mut self, max_len: usize) -> ParseResult<String> {
        let offset = self.absolute_offset();
        let rest = &self.data[self.pos..];
        let end = rest.iter().position(|&b| b == 0).ok_or(ParseError::TruncatedData {
            offset,
            requested: rest.len() + 1,
            available: rest.len(),
        })?;
        if end > max_len {
            return Err(ParseError::invalid_data(
                offset,
                format!("string length {end} exceeds limit {max_len}"),
            ));
        }
        let text = std::str::from_utf8(&rest[..end])
            .map_err(|e| ParseError::invalid_data(offset, format!("string is not UTF-8: {e}")))?
            .to_owned();
        self.pos += end + 1;
        Ok(text)
    }

    /// Fail if any bytes are left unread
    pub fn expect_end(&self, what: &str) -> ParseResult<()> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(ParseError::invalid_data(
                self.absolute_offset(),
                format!("{} trailing bytes after {what}", self.remaining()),
            ))
        }
    }
}

/// Append-only little helper around a `Vec<u8>`
#[derive(Debug, Default, Clone)]
pub struct ByteWriter {
    buf: Vec<u8>,
}

impl ByteWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
        }
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn bytes(&mut self, data: &[u8]) -> &mut Self {
        self.buf.extend_from_slice(data);
        self
    }

    pub fn u8(&mut self, value: u8) -> &mut Self {
        self.buf.push(value);
        self
    }

    pub fn u16<E: ByteOrder>(&mut self, value: u16) -> &mut Self {
        let mut raw = [0u8; 2];
        E::write_u16(&mut raw, value);
        self.bytes(&raw)
    }

    pub fn u32<E: ByteOrder>(&mut self, value: u32) -> &mut Self {
        let mut raw = [0u8; 4];
        E::write_u32(&mut raw, value);
        self.bytes(&raw)
    }

    pub fn i32<E: ByteOrder>(&mut self, value: i32) -> &mut Self {
        let mut raw = [0u8; 4];
        E::write_i32(&mut raw, value);
        self.bytes(&raw)
    }

    pub fn f32<E: ByteOrder>(&mut self, value: f32) -> &mut Self {
        let mut raw = [0u8; 4];
        E::write_f32(&mut raw, value);
        self.bytes(&raw)
    }

    pub fn tag(&mut self, tag: Tag) -> &mut Self {
        self.bytes(tag.as_bytes())
    }

    /// Write a string followed by a null terminator
    pub fn cstring(&mut self, text: &str) -> &mut Self {
        self.bytes(text.as_bytes()).u8(0)
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.buf
    }
}

/// Convert an in-memory length into a 32-bit on-disk field
pub fn len_u32(len: usize, what: &str) -> ParseResult<u32> {
    u32::try_from(len).map_err(|_| ParseError::invalid_value(format!("{what} {len} does not fit in 32 bits")))
}

/// Convert an in-memory count into a signed 32-bit on-disk field
pub fn len_i32(len: usize, what: &str) -> ParseResult<i32> {
    i32::try_from(len).map_err(|_| ParseError::invalid_value(format!("{what} {len} does not fit in 31 bits")))
}
