// holocron-parsers/src/tre/compression.rs
//! Block compression for archive catalogs
//!
//! The catalog's metadata and name blocks are either stored as-is or
//! zlib-compressed. Inflating is delegated to a [`Decompressor`] so the
//! codec itself stays a pure byte transform; [`ZlibDecompressor`] is the
//! stock implementation.

use std::io::Read;

use serde::{Deserialize, Serialize};

use crate::traits::{ParseError, ParseResult};

/// Compression type codes used by archive blocks and records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CompressionType {
    /// Stored without compression (code 0)
    None,
    /// zlib stream (code 2)
    Zlib,
    /// Any other code; kept verbatim
    Other(u32),
}

impl From<u32> for CompressionType {
    fn from(value: u32) -> Self {
        match value {
            0 => CompressionType::None,
            2 => CompressionType::Zlib,
            other => CompressionType::Other(other),
        }
    }
}

impl From<CompressionType> for u32 {
    fn from(value: CompressionType) -> Self {
        match value {
            CompressionType::None => 0,
            CompressionType::Zlib => 2,
            CompressionType::Other(code) => code,
        }
    }
}

impl std::fmt::Display for CompressionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CompressionType::None => write!(f, "none"),
            CompressionType::Zlib => write!(f, "zlib"),
            CompressionType::Other(code) => write!(f, "type {code}"),
        }
    }
}

/// Capability that inflates a compressed block
pub trait Decompressor: Send + Sync {
    /// Inflate `data`, which should expand to `expected_size` bytes
    fn inflate(&self, data: &[u8], expected_size: usize) -> ParseResult<Vec<u8>>;
}

impl<F> Decompressor for F
where
    F: Fn(&[u8], usize) -> ParseResult<Vec<u8>> + Send + Sync,
{
    fn inflate(&self, data: &[u8], expected_size: usize) -> ParseResult<Vec<u8>> {
        self(data, expected_size)
    }
}

/// Largest buffer reserved up front from a header's declared size
const MAX_PREALLOCATION: usize = 16 * 1024 * 1024;

/// zlib decompressor backed by flate2
#[derive(Debug, Default, Clone, Copy)]
pub struct ZlibDecompressor;

impl Decompressor for ZlibDecompressor {
    fn inflate(&self, data: &[u8], expected_size: usize) -> ParseResult<Vec<u8>> {
        // One byte past the declared size is enough to detect an oversized block
        let limit = expected_size as u64 + 1;
        let mut decoder = flate2::read::ZlibDecoder::new(data).take(limit);
        let mut output = Vec::with_capacity(expected_size.min(MAX_PREALLOCATION));

        decoder
            .read_to_end(&mut output)
            .map_err(|e| ParseError::DecompressionFailed(format!("zlib decompression failed: {e}")))?;

        if output.len() > expected_size {
            return Err(ParseError::DecompressionFailed(format!(
                "zlib block inflates past its declared {expected_size} bytes"
            )));
        }
        Ok(output)
    }
}

/// Turn a block's on-disk bytes into its plain bytes
///
/// The result length is checked against `expected_size` for every
/// compression type so a bad header cannot go unnoticed.
pub fn decode_block(
    data: &[u8],
    compression: CompressionType,
    expected_size: usize,
    decompressor: &dyn Decompressor,
) -> ParseResult<Vec<u8>> {
    let output = match compression {
        CompressionType::None => data.to_vec(),
        CompressionType::Zlib => decompressor.inflate(data, expected_size)?,
        CompressionType::Other(code) => return Err(ParseError::UnsupportedCompression(code)),
    };

    if output.len() != expected_size {
        return Err(ParseError::DecompressionFailed(format!(
            "{compression} block size mismatch: expected {expected_size}, got {}",
            output.len()
        )));
    }

    Ok(output)
}
