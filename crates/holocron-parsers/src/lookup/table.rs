// holocron-parsers/src/lookup/table.rs
//! CRC to path lookup table

use serde::{Deserialize, Serialize};

use crate::crc::engine_crc;
use crate::traits::{ParseError, ParseResult};

/// A single CRC/path pair
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LookupEntry {
    pub crc: u32,
    pub path: String,
}

/// Table of paths keyed by their engine CRC
///
/// Entries are held in ascending unsigned CRC order at all times, which
/// is also the order they are written in. Deserialized tables go through
/// [`SortedLookupTable::from_entries`] like any other.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawLookupTable")]
pub struct SortedLookupTable {
    entries: Vec<LookupEntry>,
}

/// Serialized shape of a table, before ordering and duplicate checks
#[derive(Deserialize)]
struct RawLookupTable {
    entries: Vec<LookupEntry>,
}

impl TryFrom<RawLookupTable> for SortedLookupTable {
    type Error = ParseError;

    fn try_from(raw: RawLookupTable) -> ParseResult<Self> {
        Self::from_entries(raw.entries)
    }
}

impl SortedLookupTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a table from arbitrary pairs, rejecting repeated CRCs
    pub fn from_entries(entries: impl IntoIterator<Item = LookupEntry>) -> ParseResult<Self> {
        let mut table = Self::new();
        for entry in entries {
            table.insert_entry(entry.crc, entry.path)?;
        }
        Ok(table)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in ascending CRC order
    pub fn entries(&self) -> &[LookupEntry] {
        &self.entries
    }

    pub fn iter(&self) -> std::slice::Iter<'_, LookupEntry> {
        self.entries.iter()
    }

    fn search(&self, crc: u32) -> Result<usize, usize> {
        self.entries.binary_search_by(|entry| entry.crc.cmp(&crc))
    }

    /// Path stored under `crc`
    pub fn lookup(&self, crc: u32) -> Option<&str> {
        self.search(crc).ok().map(|idx| self.entries[idx].path.as_str())
    }

    /// Entry for `path`, found through its CRC
    pub fn lookup_path(&self, path: &str) -> Option<&LookupEntry> {
        let idx = self.search(engine_crc(path)).ok()?;
        let entry = &self.entries[idx];
        (entry.path == path).then_some(entry)
    }

    pub fn contains(&self, crc: u32) -> bool {
        self.search(crc).is_ok()
    }

    /// Add `path` under its engine CRC
    ///
    /// Fails with `DuplicateKey` if the CRC is already present; the table
    /// is left unchanged in that case.
    pub fn add_entry(&mut self, path: &str) -> ParseResult<LookupEntry> {
        let crc = engine_crc(path);
        self.insert_entry(crc, path.to_string())?;
        Ok(LookupEntry {
            crc,
            path: path.to_string(),
        })
    }

    /// Add a pair with a caller-supplied CRC
    pub fn insert_entry(&mut self, crc: u32, path: String) -> ParseResult<()> {
        if path.contains('\0') {
            return Err(ParseError::invalid_value(format!("path {path:?} contains a null byte")));
        }
        match self.search(crc) {
            Ok(idx) => Err(ParseError::DuplicateKey(format!(
                "CRC 0x{crc:08X} for {path:?} is already used by {:?}",
                self.entries[idx].path
            ))),
            Err(idx) => {
                self.entries.insert(idx, LookupEntry { crc, path });
                Ok(())
            }
        }
    }

    /// Remove the entry stored under `crc`
    pub fn delete_entry(&mut self, crc: u32) -> Option<LookupEntry> {
        let idx = self.search(crc).ok()?;
        Some(self.entries.remove(idx))
    }
}

impl<'a> IntoIterator for &'a SortedLookupTable {
    type Item = &'a LookupEntry;
    type IntoIter = std::slice::Iter<'a, LookupEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(crc: u32, path: &str) -> LookupEntry {
        LookupEntry {
            crc,
            path: path.to_string(),
        }
    }

    #[test]
    fn test_unsigned_ordering() {
        let table = SortedLookupTable::from_entries([
            entry(0x8000_0000, "high.iff"),
            entry(0x0000_0001, "low.iff"),
            entry(0xFFFF_FFFF, "max.iff"),
            entry(0x7FFF_FFFF, "mid.iff"),
        ])
        .unwrap();

        let crcs: Vec<u32> = table.iter().map(|e| e.crc).collect();
        assert_eq!(crcs, vec![0x0000_0001, 0x7FFF_FFFF, 0x8000_0000, 0xFFFF_FFFF]);
    }

    #[test]
    fn test_add_entry_uses_engine_crc() {
        let mut table = SortedLookupTable::new();
        let added = table.add_entry("object/tangible/chair.iff").unwrap();
        assert_eq!(added.crc, engine_crc("object/tangible/chair.iff"));
        assert_eq!(table.lookup(added.crc), Some("object/tangible/chair.iff"));
        assert_eq!(table.lookup_path("object/tangible/chair.iff"), Some(&added));
        assert!(table.lookup_path("object/tangible/table.iff").is_none());
    }

    #[test]
    fn test_duplicate_crc_leaves_table_unchanged() {
        let mut table = SortedLookupTable::from_entries([entry(0x10, "b.iff"), entry(0x05, "a.iff")]).unwrap();
        let before = table.clone();

        let err = table.insert_entry(0x10, "other.iff".into()).unwrap_err();
        assert!(err.is_duplicate_key());
        assert_eq!(table, before);

        table.add_entry("x.iff").unwrap();
        assert!(table.add_entry("x.iff").unwrap_err().is_duplicate_key());
        assert_eq!(table.len(), 3);
    }

    #[test]
    fn test_delete_entry() {
        let mut table = SortedLookupTable::from_entries([entry(0x10, "b.iff"), entry(0x05, "a.iff")]).unwrap();
        assert_eq!(table.delete_entry(0x05), Some(entry(0x05, "a.iff")));
        assert_eq!(table.delete_entry(0x05), None);
        assert!(!table.contains(0x05));
        assert!(table.contains(0x10));
    }

    #[test]
    fn test_null_byte_rejected() {
        let mut table = SortedLookupTable::new();
        assert!(matches!(
            table.insert_entry(1, "a\0b".into()),
            Err(ParseError::InvalidValue(_))
        ));
        assert!(table.is_empty());
    }

    #[test]
    fn test_deserialize_orders_entries() {
        let json = r#"{"entries":[{"crc":16,"path":"b.iff"},{"crc":5,"path":"a.iff"}]}"#;
        let table: SortedLookupTable = serde_json::from_str(json).unwrap();
        let crcs: Vec<u32> = table.iter().map(|e| e.crc).collect();
        assert_eq!(crcs, vec![0x05, 0x10]);
        assert_eq!(table.lookup(0x05), Some("a.iff"));

        let again: SortedLookupTable = serde_json::from_str(&serde_json::to_string(&table).unwrap()).unwrap();
        assert_eq!(again, table);
    }

    #[test]
    fn test_deserialize_rejects_repeated_crc() {
        let json = r#"{"entries":[{"crc":5,"path":"a.iff"},{"crc":5,"path":"b.iff"}]}"#;
        let err = serde_json::from_str::<SortedLookupTable>(json).unwrap_err();
        assert!(err.to_string().contains("Duplicate key"));
    }
}
