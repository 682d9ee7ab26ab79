// holocron-parsers/src/lookup/mod.rs
//! CRC String Table Parser
//!
//! Maps engine CRCs back to the paths they were computed from. Readers
//! binary-search the CRC array, so entries are always written in
//! ascending unsigned CRC order.
//!
//! # Format Structure
//! ```text
//! FORM CSTB
//! └── FORM 0000
//!     ├── DATA   entry count (u32 LE)
//!     ├── CRCT   count × CRC (u32 LE), ascending
//!     ├── STRT   count × offset into STNG (u32 LE)
//!     └── STNG   null-terminated paths, same order as CRCT
//! ```

mod table;

pub use table::{LookupEntry, SortedLookupTable};

use bytes::Bytes;
use holocron_core::Tag;

use crate::binary::{len_u32, ByteReader, ByteWriter, LittleEndian};
use crate::iff::{self, ChildCursor, ChunkNode};
use crate::logging::instrument_parse;
use crate::traits::{ParseError, ParseOptions, ParseResult, Parser, Serializer};

pub const CSTB: Tag = Tag::new(*b"CSTB");
pub const VERSION_0000: Tag = Tag::new(*b"0000");
const DATA: Tag = Tag::new(*b"DATA");
const CRCT: Tag = Tag::new(*b"CRCT");
const STRT: Tag = Tag::new(*b"STRT");
const STNG: Tag = Tag::new(*b"STNG");

/// Parse a lookup table with default options
pub fn parse_table(data: &[u8]) -> ParseResult<SortedLookupTable> {
    parse_table_with_options(data, &ParseOptions::default())
}

/// Parse a lookup table
///
/// Entries need not be sorted on disk; they are ordered on load.
pub fn parse_table_with_options(data: &[u8], options: &ParseOptions) -> ParseResult<SortedLookupTable> {
    let tree = iff::parse_container_with_options(data, options)?;
    let version = iff::open_versioned(&tree, CSTB, &[VERSION_0000])?;

    let mut cursor = ChildCursor::new(version, "FORM CSTB/FORM 0000");
    let count_chunk = cursor.expect_leaf(DATA)?;
    let crc_chunk = cursor.expect_leaf(CRCT)?;
    let offset_chunk = cursor.expect_leaf(STRT)?;
    let string_chunk = cursor.expect_leaf(STNG)?;
    cursor.finish()?;

    let mut reader = ByteReader::new(&count_chunk.data);
    let count = reader.u32::<LittleEndian>()? as usize;
    reader.expect_end("DATA")?;

    let crcs = read_array(&crc_chunk.data, count, "CRCT")?;
    let offsets = read_array(&offset_chunk.data, count, "STRT")?;
    tracing::debug!(count, strings = string_chunk.data.len(), "lookup table chunks");

    let strings = &string_chunk.data;
    let mut table = SortedLookupTable::new();
    for (crc, offset) in crcs.into_iter().zip(offsets) {
        let start = offset as usize;
        if start >= strings.len() {
            return Err(ParseError::invalid_data(
                start,
                format!("STNG offset {start} is outside the {}-byte string chunk", strings.len()),
            ));
        }
        let path = ByteReader::with_base(&strings[start..], start)
            .cstring(options.max_string_length)
            .map_err(|e| e.with_context("STNG"))?;
        table.insert_entry(crc, path)?;
    }

    Ok(table)
}

fn read_array(data: &[u8], count: usize, what: &str) -> ParseResult<Vec<u32>> {
    if data.len() != count.saturating_mul(4) {
        return Err(ParseError::invalid_data(
            0,
            format!("{what} holds {} bytes, expected {} for {count} entries", data.len(), count * 4),
        ));
    }
    ByteReader::new(data).u32_array::<LittleEndian>(count)
}

/// Build the container tree for a lookup table
pub fn table_to_tree(table: &SortedLookupTable) -> ParseResult<ChunkNode> {
    let count = len_u32(table.len(), "entry count")?;
    let max_len = ParseOptions::default().max_string_length;

    let mut crcs = ByteWriter::with_capacity(table.len() * 4);
    let mut offsets = ByteWriter::with_capacity(table.len() * 4);
    let mut strings = ByteWriter::new();

    let mut ordered: Vec<&LookupEntry> = table.iter().collect();
    ordered.sort_unstable_by_key(|entry| entry.crc);

    for entry in ordered {
        if entry.path.len() > max_len {
            return Err(ParseError::invalid_value(format!(
                "path of {} bytes under CRC 0x{:08X} is too long",
                entry.path.len(),
                entry.crc
            )));
        }
        crcs.u32::<LittleEndian>(entry.crc);
        offsets.u32::<LittleEndian>(len_u32(strings.len(), "string offset")?);
        strings.cstring(&entry.path);
    }

    let mut count_chunk = ByteWriter::with_capacity(4);
    count_chunk.u32::<LittleEndian>(count);

    Ok(ChunkNode::form(
        CSTB,
        vec![ChunkNode::form(
            VERSION_0000,
            vec![
                ChunkNode::leaf(DATA, Bytes::from(count_chunk.into_inner())),
                ChunkNode::leaf(CRCT, Bytes::from(crcs.into_inner())),
                ChunkNode::leaf(STRT, Bytes::from(offsets.into_inner())),
                ChunkNode::leaf(STNG, Bytes::from(strings.into_inner())),
            ],
        )],
    ))
}

/// Encode a lookup table in ascending CRC order with fresh offsets
pub fn serialize_table(table: &SortedLookupTable) -> ParseResult<Vec<u8>> {
    iff::serialize_container(&table_to_tree(table)?)
}

/// CRC string table codec
#[derive(Debug, Default)]
pub struct CrcTableParser;

impl CrcTableParser {
    pub fn new() -> Self {
        Self
    }
}

impl Parser for CrcTableParser {
    type Output = SortedLookupTable;

    fn extensions(&self) -> &[&str] {
        &["iff"]
    }

    fn name(&self) -> &str {
        "CRC String Table Parser"
    }

    fn parse_with_options(&self, data: &[u8], options: &ParseOptions) -> ParseResult<Self::Output> {
        instrument_parse(self.name(), data.len(), || parse_table_with_options(data, options))
    }
}

impl Serializer for CrcTableParser {
    fn serialize(&self, value: &Self::Output) -> ParseResult<Vec<u8>> {
        serialize_table(value)
    }
}
