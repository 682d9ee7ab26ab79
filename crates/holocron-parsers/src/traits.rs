// holocron-parsers/src/traits.rs
//! Core traits defining the codec interface for all file formats.
//!
//! This module establishes a unified interface that enables:
//! - Consistent error handling across all formats
//! - Format discovery by extension and magic bytes
//! - Memory-mapped loading of large files before handing bytes to a codec
//!
//! Codecs themselves never touch the file system: `parse_with_options`
//! and `serialize` operate on in-memory buffers only. The provided
//! `parse_file` helper is the single place where a file is materialised.

use std::path::Path;

use holocron_core::Tag;
use thiserror::Error;

/// Errors that can occur during parsing or serialization
#[derive(Error, Debug)]
pub enum ParseError {
    #[error("read failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid magic bytes: expected {expected:02X?}, found {found:02X?}")]
    InvalidMagic { expected: Vec<u8>, found: Vec<u8> },

    #[error("Malformed container at {location}: expected {expected}, found {found}")]
    MalformedContainer {
        location: String,
        expected: String,
        found: String,
    },

    #[error("Truncated data at offset {offset}: requested {requested} bytes, available {available}")]
    TruncatedData {
        offset: usize,
        requested: usize,
        available: usize,
    },

    #[error("Unrecognized format: FORM {form} with version {version}")]
    UnrecognizedFormat { form: Tag, version: Tag },

    #[error("Duplicate key: {0}")]
    DuplicateKey(String),

    #[error("Invalid data at offset {offset}: {message}")]
    InvalidData { offset: usize, message: String },

    #[error("Invalid value: {0}")]
    InvalidValue(String),

    #[error("Unsupported compression type: {0}")]
    UnsupportedCompression(u32),

    #[error("block did not inflate: {0}")]
    DecompressionFailed(String),

    #[error("{context}: {source}")]
    Nested {
        context: String,
        #[source]
        source: Box<ParseError>,
    },
}

impl ParseError {
    /// Prefix this error with where it happened (a path, a chunk tag)
    pub fn with_context(self, context: impl Into<String>) -> Self {
        ParseError::Nested {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Create an invalid data error
    pub fn invalid_data(offset: usize, message: impl Into<String>) -> Self {
        ParseError::InvalidData {
            offset,
            message: message.into(),
        }
    }

    /// Create a malformed container error
    pub fn malformed(location: impl Into<String>, expected: impl Into<String>, found: impl Into<String>) -> Self {
        ParseError::MalformedContainer {
            location: location.into(),
            expected: expected.into(),
            found: found.into(),
        }
    }

    /// Create an invalid value error
    pub fn invalid_value(message: impl Into<String>) -> Self {
        ParseError::InvalidValue(message.into())
    }

    /// Innermost error, skipping any context wrappers
    pub fn root_cause(&self) -> &ParseError {
        match self {
            ParseError::Nested { source, .. } => source.root_cause(),
            other => other,
        }
    }

    /// Check if this is a duplicate key rejection
    pub fn is_duplicate_key(&self) -> bool {
        matches!(self.root_cause(), ParseError::DuplicateKey(_))
    }
}

/// Result type alias for parsing operations
pub type ParseResult<T> = Result<T, ParseError>;

/// Knobs shared by every codec
#[derive(Debug, Clone)]
pub struct ParseOptions {
    /// Whether to validate cross-references (indices into vertex, node and edge lists)
    pub strict_validation: bool,
    /// Maximum nesting depth for container trees
    pub max_nesting_depth: u32,
    /// Upper bound for any single length-prefixed or null-terminated string
    pub max_string_length: usize,
    /// Map files at or above `memory_mapping_threshold` instead of reading them
    pub use_memory_mapping: bool,
    /// Minimum file size to enable memory mapping
    pub memory_mapping_threshold: u64,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            strict_validation: true,
            max_nesting_depth: 32,
            max_string_length: 1024 * 1024, // 1 MiB
            use_memory_mapping: true,
            memory_mapping_threshold: 10 * 1024 * 1024, // 10 MB
        }
    }
}

/// Core trait for all file format codecs
///
/// Implementors parse one binary format out of an in-memory buffer.
pub trait Parser: Send + Sync {
    /// Decoded value
    type Output: Send + Sync;

    /// Returns the file extensions this parser handles (e.g., ["stf"])
    fn extensions(&self) -> &[&str];

    /// Leading bytes of every file this codec accepts, if it has any
    fn magic_bytes(&self) -> Option<&[u8]> {
        None
    }

    /// Short codec name used in logs and CLI output
    fn name(&self) -> &str;

    /// Parse a buffer with custom options
    fn parse_with_options(&self, data: &[u8], options: &ParseOptions) -> ParseResult<Self::Output>;

    /// Parse a buffer with default options
    fn parse(&self, data: &[u8]) -> ParseResult<Self::Output> {
        self.parse_with_options(data, &ParseOptions::default())
    }

    /// Load a file and parse it
    fn parse_file(&self, path: &Path) -> ParseResult<Self::Output> {
        self.parse_file_with_options(path, &ParseOptions::default())
    }

    /// Load a file and parse it with options
    ///
    /// Large files are memory mapped when enabled; everything else is
    /// read into a buffer.
    fn parse_file_with_options(&self, path: &Path, options: &ParseOptions) -> ParseResult<Self::Output> {
        let file = std::fs::File::open(path)?;

        if options.use_memory_mapping {
            let metadata = file.metadata()?;
            if metadata.len() >= options.memory_mapping_threshold {
                tracing::debug!(path = %path.display(), size = metadata.len(), "memory mapping input");
                // SAFETY: the mapping is read-only and dropped before this call
                // returns; codecs copy whatever they keep out of the buffer.
                #[allow(unsafe_code)]
                let map = unsafe { memmap2::Mmap::map(&file)? };
                return self
                    .parse_with_options(&map, options)
                    .map_err(|e| e.with_context(path.display().to_string()));
            }
        }

        let data = std::fs::read(path)?;
        self.parse_with_options(&data, options)
            .map_err(|e| e.with_context(path.display().to_string()))
    }

    /// Check if this parser can handle the given file name and leading bytes
    fn can_parse(&self, path: &Path, head: &[u8]) -> bool {
        if let Some(magic) = self.magic_bytes() {
            if head.len() >= magic.len() && &head[..magic.len()] == magic {
                return true;
            }
        }

        if let Some(ext) = path.extension() {
            let ext_str = ext.to_string_lossy().to_lowercase();
            return self.extensions().iter().any(|e| e.to_lowercase() == ext_str);
        }

        false
    }
}

/// Codecs that can also write their format back out
pub trait Serializer: Parser {
    /// Encode a value into a freshly allocated buffer
    fn serialize(&self, value: &Self::Output) -> ParseResult<Vec<u8>>;
}
