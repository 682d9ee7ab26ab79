// holocron-parsers/src/tre/mod.rs
//! Archive Catalog Parser
//!
//! Archives bundle many asset files behind a flat table of contents.
//! Only the catalog is decoded here; file payloads stay where they are.
//!
//! # Format Structure
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  Header (36 bytes, little-endian u32 fields)                │
//! │  - Magic "EERT" (0x54524545)    - Version "5000" → "0005"   │
//! │  - Record count                 - Record block offset       │
//! │  - Record block compression     - Record block stored size  │
//! │  - Name block compression       - Name block stored size    │
//! │  - Name block uncompressed size                             │
//! ├─────────────────────────────────────────────────────────────┤
//! │  File payloads ...                                          │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Record block: count × 24 bytes                             │
//! │  crc │ size │ offset │ compression │ compressed │ name off  │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Name block: null-terminated UTF-8 paths                    │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! Each block is either stored (type 0) or zlib-compressed (type 2). The
//! name block immediately follows the record block.

mod catalog;
mod compression;

pub use catalog::{ArchiveCatalog, BlockInfo, CatalogHeader, CatalogStatistics, FileRecord};
pub use compression::{decode_block, CompressionType, Decompressor, ZlibDecompressor};

use byteorder::ByteOrder;
use rayon::prelude::*;

use crate::binary::{ByteReader, LittleEndian};
use crate::logging::instrument_parse;
use crate::traits::{ParseError, ParseOptions, ParseResult, Parser};

/// Archive magic as a little-endian u32
pub const TRE_MAGIC: u32 = 0x5452_4545;

/// Fixed header length
pub const HEADER_SIZE: usize = 36;

/// Fixed record length
pub const RECORD_SIZE: usize = 24;

/// On-disk magic bytes
const TRE_MAGIC_BYTES: &[u8] = b"EERT";

/// Read a catalog using the stock zlib decompressor
pub fn read_catalog(data: &[u8]) -> ParseResult<ArchiveCatalog> {
    read_catalog_with(data, &ZlibDecompressor, &ParseOptions::default())
}

/// Read a catalog with an injected decompressor
pub fn read_catalog_with(
    data: &[u8],
    decompressor: &dyn Decompressor,
    options: &ParseOptions,
) -> ParseResult<ArchiveCatalog> {
    let header = read_header(data)?;
    tracing::debug!(
        version = %header.version,
        records = header.record_count,
        record_compression = %header.records.compression,
        name_compression = %header.names.compression,
        "archive header"
    );

    let record_bytes = decode_block(
        block_slice(data, &header.records)?,
        header.records.compression,
        header.records.uncompressed_size as usize,
        decompressor,
    )
    .map_err(|e| e.with_context("record block"))?;

    let names = decode_block(
        block_slice(data, &header.names)?,
        header.names.compression,
        header.names.uncompressed_size as usize,
        decompressor,
    )
    .map_err(|e| e.with_context("name block"))?;

    let raw = read_records(&record_bytes, header.record_count as usize)?;

    // Path lookups are independent of each other
    let records: Vec<FileRecord> = raw
        .into_par_iter()
        .map(|raw| {
            let path = resolve_name(&names, raw.name_offset, options.max_string_length)?;
            Ok(raw.into_record(path))
        })
        .collect::<ParseResult<_>>()?;

    let mismatched = records.iter().filter(|r| !r.crc_matches_path()).count();
    if mismatched > 0 {
        tracing::debug!(mismatched, "records whose CRC differs from the engine CRC of their path");
    }

    ArchiveCatalog::from_records(header, records)
        .map_err(|path| ParseError::DuplicateKey(format!("archive path {path}")))
}

/// Read and validate the fixed header
pub fn read_header(data: &[u8]) -> ParseResult<CatalogHeader> {
    let mut reader = ByteReader::new(data);

    let magic = reader.take(4).map_err(|_| ParseError::InvalidMagic {
        expected: TRE_MAGIC_BYTES.to_vec(),
        found: data.to_vec(),
    })?;
    if LittleEndian::read_u32(magic) != TRE_MAGIC {
        return Err(ParseError::InvalidMagic {
            expected: TRE_MAGIC_BYTES.to_vec(),
            found: magic.to_vec(),
        });
    }

    let version_bytes = reader.u32::<LittleEndian>()?.to_be_bytes();
    let version = String::from_utf8_lossy(&version_bytes).into_owned();

    let record_count = reader.u32::<LittleEndian>()?;
    let record_offset = reader.u32::<LittleEndian>()?;
    let record_compression = CompressionType::from(reader.u32::<LittleEndian>()?);
    let record_compressed = reader.u32::<LittleEndian>()?;
    let name_compression = CompressionType::from(reader.u32::<LittleEndian>()?);
    let name_compressed = reader.u32::<LittleEndian>()?;
    let name_uncompressed = reader.u32::<LittleEndian>()?;

    let record_plain = u32::try_from(u64::from(record_count) * RECORD_SIZE as u64)
        .map_err(|_| ParseError::invalid_data(8, format!("record count {record_count} is implausible")))?;

    let records = BlockInfo {
        offset: record_offset,
        compression: record_compression,
        stored_size: stored_size(record_compression, record_compressed, record_plain),
        uncompressed_size: record_plain,
    };

    let name_offset = u32::try_from(records.end())
        .map_err(|_| ParseError::invalid_data(12, "name block offset does not fit in 32 bits"))?;
    let names = BlockInfo {
        offset: name_offset,
        compression: name_compression,
        stored_size: stored_size(name_compression, name_compressed, name_uncompressed),
        uncompressed_size: name_uncompressed,
    };

    Ok(CatalogHeader {
        version,
        record_count,
        records,
        names,
    })
}

fn stored_size(compression: CompressionType, compressed: u32, plain: u32) -> u32 {
    match compression {
        CompressionType::None => plain,
        _ => compressed,
    }
}

fn block_slice<'a>(data: &'a [u8], block: &BlockInfo) -> ParseResult<&'a [u8]> {
    let start = block.offset as usize;
    let len = block.stored_size as usize;
    let available = data.len().saturating_sub(start);
    if len > available {
        return Err(ParseError::TruncatedData {
            offset: start,
            requested: len,
            available,
        });
    }
    Ok(&data[start..start + len])
}

/// Record fields before the path is known
struct RawRecord {
    crc: u32,
    uncompressed_size: u32,
    file_offset: u32,
    compression: CompressionType,
    compressed_size: u32,
    name_offset: u32,
}

impl RawRecord {
    fn into_record(self, path: String) -> FileRecord {
        FileRecord {
            path,
            crc: self.crc,
            uncompressed_size: self.uncompressed_size,
            file_offset: self.file_offset,
            compression: self.compression,
            compressed_size: self.compressed_size,
            name_offset: self.name_offset,
        }
    }
}

fn read_records(data: &[u8], count: usize) -> ParseResult<Vec<RawRecord>> {
    let mut reader = ByteReader::new(data);
    let mut records = Vec::with_capacity(count);
    for _ in 0..count {
        records.push(RawRecord {
            crc: reader.u32::<LittleEndian>()?,
            uncompressed_size: reader.u32::<LittleEndian>()?,
            file_offset: reader.u32::<LittleEndian>()?,
            compression: CompressionType::from(reader.u32::<LittleEndian>()?),
            compressed_size: reader.u32::<LittleEndian>()?,
            name_offset: reader.u32::<LittleEndian>()?,
        });
    }
    reader.expect_end("record block")?;
    Ok(records)
}

fn resolve_name(names: &[u8], offset: u32, max_len: usize) -> ParseResult<String> {
    let start = offset as usize;
    if start >= names.len() {
        return Err(ParseError::invalid_data(
            start,
            format!("name offset {start} is outside the {}-byte name block", names.len()),
        ));
    }
    ByteReader::with_base(&names[start..], start)
        .cstring(max_len)
        .map_err(|e| e.with_context("name block"))
}

/// Archive catalog parser with a pluggable decompressor
pub struct TreParser {
    decompressor: Box<dyn Decompressor>,
}

impl TreParser {
    /// Create a parser that inflates blocks with zlib
    pub fn new() -> Self {
        Self::with_decompressor(ZlibDecompressor)
    }

    /// Create a parser using the given decompressor
    pub fn with_decompressor(decompressor: impl Decompressor + 'static) -> Self {
        Self {
            decompressor: Box::new(decompressor),
        }
    }
}

impl Default for TreParser {
    fn default() -> Self {
        Self::new()
    }
}

impl Parser for TreParser {
    type Output = ArchiveCatalog;

    fn extensions(&self) -> &[&str] {
        &["tre"]
    }

    fn magic_bytes(&self) -> Option<&[u8]> {
        Some(TRE_MAGIC_BYTES)
    }

    fn name(&self) -> &str {
        "Archive Catalog Parser"
    }

    fn parse_with_options(&self, data: &[u8], options: &ParseOptions) -> ParseResult<Self::Output> {
        instrument_parse(self.name(), data.len(), || read_catalog_with(data, self.decompressor.as_ref(), options))
    }
}
