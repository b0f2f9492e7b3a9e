//! MemTable implementation
//!
//! BTreeMap-based sorted table owned exclusively by the MemtableManager;
//! all synchronization lives in the manager's lock.

use std::collections::BTreeMap;

use super::MemTableEntry;

/// In-memory sorted table for recent writes
pub struct MemTable {
    /// Key → entry, in lexicographic byte order
    entries: BTreeMap<Vec<u8>, MemTableEntry>,

    /// Running serialized footprint: 4-byte length prefix + bytes,
    /// for both key and stored value, summed over all entries
    size_bytes: usize,
}

impl MemTable {
    /// Create a new empty MemTable
    pub fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
            size_bytes: 0,
        }
    }

    /// Get the entry for a key (exact match only)
    pub fn get(&self, key: &[u8]) -> Option<MemTableEntry> {
        self.entries.get(key).cloned()
    }

    /// Insert an entry, overwriting any existing entry for the key.
    ///
    /// A tombstone occupies the same slot as a live value; the footprint is
    /// adjusted by subtracting the replaced entry's size and adding the new
    /// one's.
    pub fn insert(&mut self, key: Vec<u8>, entry: MemTableEntry) {
        let key_len = key.len();
        let new_footprint = Self::footprint(&key, &entry);
        if let Some(old) = self.entries.insert(key, entry) {
            self.size_bytes -= 8 + key_len + old.as_stored().len();
        }
        self.size_bytes += new_footprint;
    }

    /// Serialized footprint of all entries (in bytes)
    pub fn size(&self) -> usize {
        self.size_bytes
    }

    /// Number of entries (live values and tombstones)
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check whether the table holds no entries
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate entries in ascending key order
    pub fn iter(&self) -> impl Iterator<Item = (&Vec<u8>, &MemTableEntry)> {
        self.entries.iter()
    }

    fn footprint(key: &[u8], entry: &MemTableEntry) -> usize {
        8 + key.len() + entry.as_stored().len()
    }
}

impl Default for MemTable {
    fn default() -> Self {
        Self::new()
    }
}
