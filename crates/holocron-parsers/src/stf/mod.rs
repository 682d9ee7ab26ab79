// holocron-parsers/src/stf/mod.rs
//! String Table Parser
//!
//! Localized strings live in a flat little-endian file with two sections
//! that are ordered independently: values by numeric index, ids in
//! whatever order the authoring tool wrote them.
//!
//! # Format Structure
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │ magic 0xABCD (u16) │ pad (2) │ version (u8) │ next uid (u32) │
//! │ entry count (u32)                                           │
//! ├─────────────────────────────────────────────────────────────┤
//! │ Value section, ascending index                              │
//! │   index (u32) │ key (u32) │ units (u32) │ UTF-16LE units    │
//! ├─────────────────────────────────────────────────────────────┤
//! │ ID section, tool order                                      │
//! │   index (u32) │ length (u32) │ ASCII bytes                  │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! Entries read from a file remember their index and legacy key so an
//! unmodified table is written back byte for byte. Entries without a
//! remembered index are numbered after the highest known index; a table
//! with none at all is numbered `1..=N` in list order.

mod table;

pub use table::{StringEntry, StringTable};

use std::collections::{HashMap, HashSet};

use crate::binary::{len_u32, ByteReader, ByteWriter, LittleEndian};
use crate::logging::instrument_parse;
use crate::traits::{ParseError, ParseOptions, ParseResult, Parser, Serializer};

/// Leading magic as a little-endian u16
pub const STF_MAGIC: u16 = 0xABCD;

/// Legacy key written for entries that carry none
pub const DEFAULT_KEY: u32 = 0xFFFF_FFFF;

const STF_MAGIC_BYTES: &[u8] = &[0xCD, 0xAB];

/// Parse a string table with default options
pub fn parse_table(data: &[u8]) -> ParseResult<StringTable> {
    parse_table_with_options(data, &ParseOptions::default())
}

/// Parse a string table
pub fn parse_table_with_options(data: &[u8], options: &ParseOptions) -> ParseResult<StringTable> {
    let mut reader = ByteReader::new(data);

    let magic = reader.u16::<LittleEndian>().map_err(|_| ParseError::InvalidMagic {
        expected: STF_MAGIC_BYTES.to_vec(),
        found: data.to_vec(),
    })?;
    if magic != STF_MAGIC {
        return Err(ParseError::InvalidMagic {
            expected: STF_MAGIC_BYTES.to_vec(),
            found: magic.to_le_bytes().to_vec(),
        });
    }
    reader.skip(2)?;

    let version = reader.u8()?;
    let next_uid = reader.u32::<LittleEndian>()?;
    let count = reader.u32::<LittleEndian>()? as usize;

    // Each entry needs at least 12 value bytes and 8 id bytes
    if count.saturating_mul(20) > reader.remaining() {
        return Err(ParseError::TruncatedData {
            offset: reader.absolute_offset(),
            requested: count.saturating_mul(20),
            available: reader.remaining(),
        });
    }
    tracing::debug!(version, next_uid, count, "string table header");

    let mut values: HashMap<u32, (u32, String)> = HashMap::with_capacity(count);
    for _ in 0..count {
        let offset = reader.absolute_offset();
        let index = reader.u32::<LittleEndian>()?;
        let key = reader.u32::<LittleEndian>()?;
        let value = read_utf16(&mut reader, options.max_string_length)?;
        if values.insert(index, (key, value)).is_some() {
            return Err(ParseError::invalid_data(offset, format!("value index {index} appears twice")));
        }
    }

    let mut seen_ids = HashSet::with_capacity(count);
    let mut entries = Vec::with_capacity(count);
    for _ in 0..count {
        let offset = reader.absolute_offset();
        let index = reader.u32::<LittleEndian>()?;
        let id = read_ascii(&mut reader, options.max_string_length)?;

        let (key, value) = values
            .remove(&index)
            .ok_or_else(|| ParseError::invalid_data(offset, format!("id {id:?} refers to missing value index {index}")))?;
        if !seen_ids.insert(id.clone()) {
            return Err(ParseError::DuplicateKey(format!("string id {id}")));
        }

        entries.push(StringEntry {
            id,
            value,
            original_index: Some(index),
            original_key: Some(key),
        });
    }

    reader.expect_end("id section")?;

    Ok(StringTable {
        version,
        next_uid,
        entries,
    })
}

fn read_utf16(reader: &mut ByteReader<'_>, max_len: usize) -> ParseResult<String> {
    let offset = reader.absolute_offset();
    let units = reader.u32::<LittleEndian>()? as usize;
    if units > max_len {
        return Err(ParseError::invalid_data(
            offset,
            format!("string of {units} code units exceeds limit {max_len}"),
        ));
    }

    let raw = reader.take(units * 2)?;
    let decoded: Vec<u16> = raw.chunks_exact(2).map(|c| u16::from_le_bytes([c[0], c[1]])).collect();
    String::from_utf16(&decoded).map_err(|e| ParseError::invalid_data(offset, format!("invalid UTF-16 value: {e}")))
}

fn read_ascii(reader: &mut ByteReader<'_>, max_len: usize) -> ParseResult<String> {
    let offset = reader.absolute_offset();
    let len = reader.u32::<LittleEndian>()? as usize;
    if len > max_len {
        return Err(ParseError::invalid_data(
            offset,
            format!("id of {len} bytes exceeds limit {max_len}"),
        ));
    }

    let raw = reader.take(len)?;
    if !raw.is_ascii() {
        return Err(ParseError::invalid_data(offset, "string id is not ASCII"));
    }
    Ok(raw.iter().map(|&b| b as char).collect())
}

/// Assign the index each entry is written with
///
/// Preserved indices are kept; the rest continue after the highest one.
fn effective_indices(table: &StringTable) -> ParseResult<Vec<u32>> {
    let mut next = table
        .entries
        .iter()
        .filter_map(|e| e.original_index)
        .max()
        .unwrap_or(0);

    let mut seen = HashSet::with_capacity(table.entries.len());
    let mut indices = Vec::with_capacity(table.entries.len());
    for entry in &table.entries {
        let index = match entry.original_index {
            Some(index) => index,
            None => {
                next = next
                    .checked_add(1)
                    .ok_or_else(|| ParseError::invalid_value("string index overflow"))?;
                next
            }
        };
        if !seen.insert(index) {
            return Err(ParseError::invalid_value(format!(
                "string index {index} is used by more than one entry"
            )));
        }
        indices.push(index);
    }
    Ok(indices)
}

/// Encode a string table
pub fn serialize_table(table: &StringTable) -> ParseResult<Vec<u8>> {
    let max_len = ParseOptions::default().max_string_length;
    let indices = effective_indices(table)?;

    let mut ids = HashSet::with_capacity(table.entries.len());
    for entry in &table.entries {
        if !ids.insert(entry.id.as_str()) {
            return Err(ParseError::invalid_value(format!("string id {:?} appears twice", entry.id)));
        }
        if !entry.id.is_ascii() {
            return Err(ParseError::invalid_value(format!("string id {:?} is not ASCII", entry.id)));
        }
        if entry.id.len() > max_len {
            return Err(ParseError::invalid_value(format!("string id of {} bytes is too long", entry.id.len())));
        }
    }

    let mut writer = ByteWriter::new();
    writer
        .u16::<LittleEndian>(STF_MAGIC)
        .u16::<LittleEndian>(0)
        .u8(table.version)
        .u32::<LittleEndian>(table.next_uid)
        .u32::<LittleEndian>(len_u32(table.entries.len(), "entry count")?);

    let mut by_index: Vec<(u32, &StringEntry)> = indices.iter().copied().zip(&table.entries).collect();
    by_index.sort_by_key(|(index, _)| *index);

    for (index, entry) in by_index {
        let units: Vec<u16> = entry.value.encode_utf16().collect();
        if units.len() > max_len {
            return Err(ParseError::invalid_value(format!(
                "value of {:?} has {} code units",
                entry.id,
                units.len()
            )));
        }
        writer
            .u32::<LittleEndian>(index)
            .u32::<LittleEndian>(entry.original_key.unwrap_or(DEFAULT_KEY))
            .u32::<LittleEndian>(len_u32(units.len(), "value length")?);
        for unit in units {
            writer.u16::<LittleEndian>(unit);
        }
    }

    for (index, entry) in indices.iter().zip(&table.entries) {
        writer
            .u32::<LittleEndian>(*index)
            .u32::<LittleEndian>(len_u32(entry.id.len(), "id length")?)
            .bytes(entry.id.as_bytes());
    }

    Ok(writer.into_inner())
}

/// String table codec
#[derive(Debug, Default)]
pub struct StfParser;

impl StfParser {
    /// Create a new string table parser
    pub fn new() -> Self {
        Self
    }
}

impl Parser for StfParser {
    type Output = StringTable;

    fn extensions(&self) -> &[&str] {
        &["stf"]
    }

    fn magic_bytes(&self) -> Option<&[u8]> {
        Some(STF_MAGIC_BYTES)
    }

    fn name(&self) -> &str {
        "String Table Parser"
    }

    fn parse_with_options(&self, data: &[u8], options: &ParseOptions) -> ParseResult<Self::Output> {
        instrument_parse(self.name(), data.len(), || parse_table_with_options(data, options))
    }
}

impl Serializer for StfParser {
    fn serialize(&self, value: &Self::Output) -> ParseResult<Vec<u8>> {
        serialize_table(value)
    }
}
