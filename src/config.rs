//! Configuration for StrataKV
//!
//! Centralized configuration with sensible defaults.

use std::path::PathBuf;
use std::time::Duration;

/// Main configuration for a StrataKV instance
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Storage Configuration
    // -------------------------------------------------------------------------
    /// Root directory for all data files.
    /// Internal structure:
    ///   {data_dir}/
    ///     ├── CURRENT               (name of the active manifest)
    ///     ├── MANIFEST-NNNNNN       (manifest snapshots)
    ///     ├── wal-<nanos>.log       (write-ahead logs, one per memtable)
    ///     └── sstable_<nanos>.sst   (persistent tables)
    pub data_dir: PathBuf,

    // -------------------------------------------------------------------------
    // WAL Configuration
    // -------------------------------------------------------------------------
    /// Sync policy: how often to fsync the WAL
    pub wal_sync: WalSyncPolicy,

    // -------------------------------------------------------------------------
    // MemTable Configuration
    // -------------------------------------------------------------------------
    /// Max serialized size of the active memtable before rotation (in bytes)
    pub memtable_size_limit: usize,

    // -------------------------------------------------------------------------
    // SSTable Configuration
    // -------------------------------------------------------------------------
    /// Block size budget for SSTable data blocks (in bytes)
    pub block_size: usize,

    /// Max accumulated size of a single compaction output table (in bytes)
    pub sstable_size_limit: usize,

    /// Bloom filter capacity (expected entries per table)
    pub bloom_capacity: usize,

    /// Bloom filter target false positive rate
    pub bloom_false_positive_rate: f64,

    // -------------------------------------------------------------------------
    // Compaction Configuration
    // -------------------------------------------------------------------------
    /// Table count a level may hold before compaction: base * growth^level
    pub level_base_capacity: usize,

    /// Geometric growth factor for per-level capacity
    pub level_growth_factor: usize,

    /// Interval between flush-task ticks
    pub flush_interval: Duration,

    /// Interval between compaction-task ticks
    pub compaction_interval: Duration,
}

/// WAL sync policy
#[derive(Debug, Clone, Copy)]
pub enum WalSyncPolicy {
    /// fsync after every append (safest; the durability contract)
    EveryWrite,

    /// fsync after N appends (balanced durability/performance)
    EveryNEntries { count: usize },
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./stratakv_data"),
            wal_sync: WalSyncPolicy::EveryWrite,
            memtable_size_limit: 4 * 1024 * 1024, // 4 MiB
            block_size: 4 * 1024,                 // 4 KiB
            sstable_size_limit: 4 * 1024 * 1024,  // 4 MiB
            bloom_capacity: 36_000,
            bloom_false_positive_rate: 0.03,
            level_base_capacity: 4,
            level_growth_factor: 5,
            flush_interval: Duration::from_millis(200),
            compaction_interval: Duration::from_secs(1),
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the data directory (root for all storage)
    pub fn data_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.data_dir = path.into();
        self
    }

    /// Set the WAL sync policy
    pub fn wal_sync(mut self, policy: WalSyncPolicy) -> Self {
        self.config.wal_sync = policy;
        self
    }

    /// Set the memtable rotation threshold (in bytes)
    pub fn memtable_size_limit(mut self, size: usize) -> Self {
        self.config.memtable_size_limit = size;
        self
    }

    /// Set the SSTable block size budget (in bytes)
    pub fn block_size(mut self, size: usize) -> Self {
        self.config.block_size = size;
        self
    }

    /// Set the max compaction output table size (in bytes)
    pub fn sstable_size_limit(mut self, size: usize) -> Self {
        self.config.sstable_size_limit = size;
        self
    }

    /// Set the bloom filter capacity (expected entries per table)
    pub fn bloom_capacity(mut self, capacity: usize) -> Self {
        self.config.bloom_capacity = capacity;
        self
    }

    /// Set the bloom filter target false positive rate
    pub fn bloom_false_positive_rate(mut self, rate: f64) -> Self {
        self.config.bloom_false_positive_rate = rate;
        self
    }

    /// Set the level-0 table capacity
    pub fn level_base_capacity(mut self, capacity: usize) -> Self {
        self.config.level_base_capacity = capacity;
        self
    }

    /// Set the geometric per-level capacity growth factor
    pub fn level_growth_factor(mut self, factor: usize) -> Self {
        self.config.level_growth_factor = factor;
        self
    }

    /// Set the flush-task tick interval
    pub fn flush_interval(mut self, interval: Duration) -> Self {
        self.config.flush_interval = interval;
        self
    }

    /// Set the compaction-task tick interval
    pub fn compaction_interval(mut self, interval: Duration) -> Self {
        self.config.compaction_interval = interval;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
