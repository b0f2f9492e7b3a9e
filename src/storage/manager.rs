//! Storage Manager
//!
//! Read-only facade over the persistent tables tracked by the manifest.
//!
//! ## Responsibilities
//! - Fan a lookup out across all levels, newest data first
//! - Level 0 before deeper levels; within a level, newest table first
//! - Hold the manifest read lock for the whole fan-out so a concurrent
//!   compaction can never unlink a file mid-lookup

use std::sync::Arc;

use crate::error::Result;
use crate::manifest::Manifest;

/// Read-side view of the leveled persistent store
pub struct StorageManager {
    manifest: Arc<Manifest>,
}

impl StorageManager {
    pub fn new(manifest: Arc<Manifest>) -> Self {
        Self { manifest }
    }

    /// Get the stored value for a key, newest occurrence wins.
    ///
    /// Returns raw stored bytes: a tombstone marker is a real result here
    /// (it proves the key was deleted after older levels stored a value);
    /// the engine facade maps it to absent.
    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        self.manifest.with_levels(|levels| {
            for tables in levels.values() {
                for table in tables {
                    if let Some(value) = table.get(key)? {
                        return Ok(Some(value));
                    }
                }
            }
            Ok(None)
        })
    }

    /// Number of tables currently at `level`
    pub fn table_count(&self, level: u32) -> usize {
        self.manifest.tables(level).len()
    }
}
