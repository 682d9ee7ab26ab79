// holocron-parsers/src/tre/catalog.rs
//! Archive catalog structures

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use super::compression::CompressionType;
use crate::crc::engine_crc;

/// Location and encoding of one metadata block
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockInfo {
    /// Absolute byte offset of the block
    pub offset: u32,
    pub compression: CompressionType,
    /// Bytes the block occupies on disk
    pub stored_size: u32,
    /// Bytes after inflating
    pub uncompressed_size: u32,
}

impl BlockInfo {
    /// Offset of the first byte after this block
    pub fn end(&self) -> u64 {
        u64::from(self.offset) + u64::from(self.stored_size)
    }
}

/// Catalog header
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogHeader {
    /// Format version as text, e.g. `"0005"`
    pub version: String,
    pub record_count: u32,
    /// Fixed-size record block
    pub records: BlockInfo,
    /// Null-terminated path block, directly after the record block
    pub names: BlockInfo,
}

/// Descriptor of one archived file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    /// Full path within the archive
    pub path: String,
    /// Engine CRC of the path
    pub crc: u32,
    pub uncompressed_size: u32,
    /// Offset of the file's payload within the archive
    pub file_offset: u32,
    pub compression: CompressionType,
    pub compressed_size: u32,
    /// Offset of the path within the name block
    pub name_offset: u32,
}

impl FileRecord {
    /// Get the filename without path
    pub fn filename(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or(&self.path)
    }

    /// Get the parent directory path
    pub fn parent(&self) -> Option<&str> {
        self.path.rfind('/').map(|idx| &self.path[..idx])
    }

    /// Get the file extension
    pub fn extension(&self) -> Option<&str> {
        let filename = self.filename();
        filename.rfind('.').map(|idx| &filename[idx + 1..])
    }

    /// Payload bytes as stored in the archive
    pub fn stored_size(&self) -> u32 {
        match self.compression {
            CompressionType::None => self.uncompressed_size,
            _ => self.compressed_size,
        }
    }

    /// Calculate compression ratio
    pub fn compression_ratio(&self) -> f64 {
        if self.uncompressed_size == 0 {
            return 1.0;
        }
        f64::from(self.stored_size()) / f64::from(self.uncompressed_size)
    }

    /// Whether the stored CRC matches the engine CRC of the path
    pub fn crc_matches_path(&self) -> bool {
        engine_crc(&self.path) == self.crc
    }
}

/// Table of contents of an archive
///
/// Records keep the order they have on disk; lookups go through a path
/// index built at parse time.
#[derive(Debug, Clone)]
pub struct ArchiveCatalog {
    pub header: CatalogHeader,
    records: Vec<FileRecord>,
    path_index: HashMap<String, usize>,
}

impl ArchiveCatalog {
    /// Build a catalog from records in on-disk order
    ///
    /// Returns the first duplicated path on failure.
    pub(crate) fn from_records(header: CatalogHeader, records: Vec<FileRecord>) -> Result<Self, String> {
        let mut path_index = HashMap::with_capacity(records.len());
        for (idx, record) in records.iter().enumerate() {
            if path_index.insert(record.path.clone(), idx).is_some() {
                return Err(record.path.clone());
            }
        }
        Ok(Self {
            header,
            records,
            path_index,
        })
    }

    /// Records in on-disk order
    pub fn records(&self) -> &[FileRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Get a record by exact path
    pub fn get(&self, path: &str) -> Option<&FileRecord> {
        self.path_index.get(path).map(|&idx| &self.records[idx])
    }

    /// Check if a path exists in the archive
    pub fn contains(&self, path: &str) -> bool {
        self.path_index.contains_key(path)
    }

    /// Records ordered by path, for listings
    pub fn records_sorted_by_path(&self) -> Vec<&FileRecord> {
        let mut sorted: Vec<&FileRecord> = self.records.iter().collect();
        sorted.sort_by(|a, b| a.path.cmp(&b.path));
        sorted
    }

    /// Find records matching a case-insensitive pattern
    ///
    /// `*` matches any run of characters. A pattern without `*` matches any
    /// path containing it.
    pub fn find(&self, pattern: &str) -> Vec<&FileRecord> {
        let pattern = pattern.to_lowercase();
        self.records
            .iter()
            .filter(|record| glob_match(&pattern, &record.path.to_lowercase()))
            .collect()
    }

    /// Find records by extension
    pub fn find_by_extension(&self, ext: &str) -> Vec<&FileRecord> {
        let ext = ext.trim_start_matches('.').to_lowercase();
        self.records
            .iter()
            .filter(|r| r.extension().map(|e| e.to_lowercase() == ext).unwrap_or(false))
            .collect()
    }

    /// Aggregate sizes and counts
    pub fn statistics(&self) -> CatalogStatistics {
        let mut stats = CatalogStatistics {
            record_count: self.records.len(),
            ..Default::default()
        };

        for record in &self.records {
            stats.total_uncompressed += u64::from(record.uncompressed_size);
            stats.total_stored += u64::from(record.stored_size());
            *stats.by_compression.entry(record.compression.to_string()).or_insert(0) += 1;
            if let Some(ext) = record.extension() {
                *stats.extensions.entry(ext.to_lowercase()).or_insert(0) += 1;
            }
        }

        if stats.total_uncompressed > 0 {
            stats.compression_ratio = stats.total_stored as f64 / stats.total_uncompressed as f64;
        }

        stats
    }
}

fn glob_match(pattern: &str, path: &str) -> bool {
    let parts: Vec<&str> = pattern.split('*').collect();
    if parts.len() == 1 {
        return path.contains(pattern);
    }

    let first = parts[0];
    let last = parts[parts.len() - 1];
    if !path.starts_with(first) || path.len() < first.len() + last.len() || !path.ends_with(last) {
        return false;
    }

    // Middle parts must appear in order between the anchored ends
    let mut rest = &path[first.len()..path.len() - last.len()];
    for part in &parts[1..parts.len() - 1] {
        match rest.find(part) {
            Some(idx) => rest = &rest[idx + part.len()..],
            None => return false,
        }
    }
    true
}

/// Archive statistics
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CatalogStatistics {
    pub record_count: usize,
    pub total_uncompressed: u64,
    pub total_stored: u64,
    pub compression_ratio: f64,
    /// Record count per compression type
    pub by_compression: BTreeMap<String, usize>,
    /// Record count per lowercase extension
    pub extensions: BTreeMap<String, usize>,
}
