// holocron-parsers/src/stf/table.rs
//! In-memory string table

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

/// One localized string
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StringEntry {
    /// ASCII lookup key
    pub id: String,
    pub value: String,
    /// Numeric index this entry had in the file it was read from
    pub original_index: Option<u32>,
    /// Legacy key field as read, normally `0xFFFFFFFF`
    pub original_key: Option<u32>,
}

impl StringEntry {
    /// Create an entry with no preserved numbering
    pub fn new(id: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            value: value.into(),
            original_index: None,
            original_key: None,
        }
    }
}

/// A localized string set
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StringTable {
    pub version: u8,
    pub next_uid: u32,
    pub entries: Vec<StringEntry>,
}

impl StringTable {
    /// Create an empty table
    pub fn new(version: u8) -> Self {
        Self {
            version,
            next_uid: 1,
            entries: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Look up an entry by id
    pub fn get(&self, id: &str) -> Option<&StringEntry> {
        self.entries.iter().find(|e| e.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    /// Replace the value of an existing entry; returns false if `id` is unknown
    pub fn set_value(&mut self, id: &str, value: impl Into<String>) -> bool {
        match self.entries.iter_mut().find(|e| e.id == id) {
            Some(entry) => {
                entry.value = value.into();
                true
            }
            None => false,
        }
    }

    /// Remove an entry by id
    pub fn remove_entry(&mut self, id: &str) -> Option<StringEntry> {
        let idx = self.entries.iter().position(|e| e.id == id)?;
        Some(self.entries.remove(idx))
    }

    /// Append entries whose ids are not present yet
    ///
    /// Returns the number of entries added. When anything was added,
    /// `next_uid` becomes `len + 1`.
    pub fn add_entries(&mut self, new_entries: impl IntoIterator<Item = StringEntry>) -> usize {
        let mut seen: HashSet<String> = self.entries.iter().map(|e| e.id.clone()).collect();
        let mut added = 0;

        for entry in new_entries {
            if !seen.insert(entry.id.clone()) {
                tracing::debug!(id = %entry.id, "skipping existing string id");
                continue;
            }
            self.entries.push(entry);
            added += 1;
        }

        if added > 0 {
            self.next_uid = u32::try_from(self.entries.len() + 1).unwrap_or(u32::MAX);
        }
        added
    }

    /// Whether any entry carries a preserved index
    pub fn has_preserved_numbering(&self) -> bool {
        self.entries.iter().any(|e| e.original_index.is_some())
    }
}

impl Default for StringTable {
    fn default() -> Self {
        Self::new(1)
    }
}
