//! Engine Module
//!
//! The storage engine facade that composes all components.
//!
//! ## Responsibilities
//! - Wire manifest, memtable manager, storage manager, and background jobs
//! - Route reads memtables-first, then levels newest-first
//! - Filter tombstones at the API boundary
//! - Orderly shutdown: stop the schedulers, then drain everything to disk
//!
//! ## Concurrency Model
//!
//! Arbitrary caller threads may put/get/delete concurrently with the two
//! background workers. All shared state sits behind two RwLocks (table set,
//! manifest); whenever one logical operation needs both, the table-set lock
//! is acquired before the manifest lock, everywhere.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use crate::compaction::{Compactor, Scheduler};
use crate::config::Config;
use crate::error::{Result, StrataError};
use crate::manifest::Manifest;
use crate::memtable::{MemTableEntry, MemtableManager, TOMBSTONE};
use crate::storage::StorageManager;

/// The main storage engine
pub struct Engine {
    config: Config,
    manifest: Arc<Manifest>,
    memtables: Arc<MemtableManager>,
    storage: StorageManager,
    compactor: Arc<Compactor>,
    scheduler: Scheduler,
}

impl Engine {
    /// Open or create an engine with the given config.
    ///
    /// On startup:
    /// 1. Load (or initialize) the manifest — the source of truth
    /// 2. Rebuild memtables by replaying the WALs it lists
    /// 3. Start the flush and compaction workers
    pub fn open(config: Config) -> Result<Self> {
        fs::create_dir_all(&config.data_dir)?;

        let manifest = Arc::new(Manifest::open(&config)?);
        let memtables = Arc::new(MemtableManager::open(Arc::clone(&manifest), config.clone())?);
        let storage = StorageManager::new(Arc::clone(&manifest));

        let compactor = Arc::new(Compactor::new(
            Arc::clone(&memtables),
            Arc::clone(&manifest),
            config.clone(),
        ));
        let scheduler = Scheduler::start(Arc::clone(&compactor), &config)?;

        tracing::info!(data_dir = %config.data_dir.display(), "engine opened");

        Ok(Self {
            config,
            manifest,
            memtables,
            storage,
            compactor,
            scheduler,
        })
    }

    /// Open with a path (convenience method using default config)
    pub fn open_path(path: &Path) -> Result<Self> {
        Self::open(Config::builder().data_dir(path).build())
    }

    /// Get a value by key.
    ///
    /// Search order: active memtable, queued memtables (newest first), then
    /// persistent levels (level 0 upward, newest table per level first). The
    /// first occurrence wins; a tombstone occurrence means absent.
    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        if let Some(entry) = self.memtables.get(key) {
            return Ok(match entry {
                MemTableEntry::Value(value) => Some(value),
                MemTableEntry::Tombstone => None,
            });
        }

        match self.storage.get(key)? {
            Some(value) if value == TOMBSTONE => Ok(None),
            other => Ok(other),
        }
    }

    /// Put a key-value pair
    pub fn put(&self, key: &[u8], value: &[u8]) -> Result<()> {
        validate_key(key)?;
        if value == TOMBSTONE {
            return Err(StrataError::InvalidArgument(
                "value collides with the reserved tombstone marker".to_string(),
            ));
        }

        self.memtables.put(key, value)
    }

    /// Delete a key
    pub fn delete(&self, key: &[u8]) -> Result<()> {
        validate_key(key)?;
        self.memtables.delete(key)
    }

    /// Run one flush tick synchronously (also used by tests to force state
    /// through the write path without waiting on the scheduler)
    pub fn flush(&self) -> Result<()> {
        self.compactor.flush_once()
    }

    /// Run one compaction sweep synchronously
    pub fn compact(&self) -> Result<()> {
        self.compactor.compact_once()
    }

    /// Diagnostic dump of the whole engine state
    pub fn display_state(&self) -> String {
        let mut out = String::new();
        out.push_str(&self.memtables.describe());
        out.push_str(&self.manifest.describe());
        out
    }

    /// Close the engine gracefully: stop the background workers, then drain
    /// the active table and the whole flush queue to level-0 tables so no
    /// data is left solely in memory.
    pub fn close(self) -> Result<()> {
        let Self {
            memtables,
            scheduler,
            ..
        } = self;

        scheduler.stop();
        memtables.flush_all_remaining()?;

        tracing::info!("engine closed");
        Ok(())
    }

    // =========================================================================
    // Accessors (for diagnostics and testing)
    // =========================================================================

    /// Get the data directory path
    pub fn data_dir(&self) -> &Path {
        &self.config.data_dir
    }

    /// Current serialized size of the active memtable
    pub fn memtable_size(&self) -> usize {
        self.memtables.active_size()
    }

    /// Entry count of the active memtable
    pub fn memtable_entry_count(&self) -> usize {
        self.memtables.active_len()
    }

    /// Number of immutable memtables awaiting flush
    pub fn flush_queue_len(&self) -> usize {
        self.memtables.flush_queue_len()
    }

    /// Number of SSTables at a level
    pub fn table_count(&self, level: u32) -> usize {
        self.storage.table_count(level)
    }

    /// Highest populated level, if any
    pub fn max_level(&self) -> Option<u32> {
        self.manifest.max_level()
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.config
    }
}

fn validate_key(key: &[u8]) -> Result<()> {
    if key.is_empty() {
        return Err(StrataError::InvalidArgument("empty key".to_string()));
    }
    Ok(())
}
