//! Compaction Module
//!
//! The two recurring background jobs that move data down the tree:
//!
//! - **Flush**: drain the oldest queued memtable into a level-0 SSTable.
//! - **Compaction**: when a level holds more tables than its capacity
//!   (base × growth^level), merge it with the next level down.
//!
//! Both are best-effort and idempotent per tick: a false precondition makes
//! the tick a no-op. Tick errors are logged by the scheduler and the job is
//! simply retried on its next interval.

mod scheduler;

use std::sync::Arc;

use crate::config::Config;
use crate::error::Result;
use crate::manifest::Manifest;
use crate::memtable::MemtableManager;
use crate::storage::sstable::{build_from_memtable, sorted_run, TableOptions};

pub use scheduler::Scheduler;

/// Executes flush and compaction ticks against shared engine state
pub struct Compactor {
    memtables: Arc<MemtableManager>,
    manifest: Arc<Manifest>,
    config: Config,
}

impl Compactor {
    pub fn new(memtables: Arc<MemtableManager>, manifest: Arc<Manifest>, config: Config) -> Self {
        Self {
            memtables,
            manifest,
            config,
        }
    }

    /// Flush the oldest queued memtable, if any, into a level-0 table.
    ///
    /// The table is built with no locks held (the candidate is immutable);
    /// queue removal and manifest registration then happen atomically in
    /// `complete_flush`. A crash before that point leaves the WAL in place,
    /// so nothing is lost — the table is rebuilt from replay on restart.
    pub fn flush_once(&self) -> Result<()> {
        let candidate = match self.memtables.peek_flushable() {
            Some(candidate) => candidate,
            None => return Ok(()),
        };

        let opts = TableOptions::from(&self.config);
        let table = build_from_memtable(&self.config.data_dir, &candidate.table, &opts)?;
        tracing::debug!(
            entries = table.entry_count(),
            path = %table.path().display(),
            "flushed memtable to level 0"
        );

        self.memtables.complete_flush(&candidate, table)
    }

    /// Sweep levels low-to-high, merging any over-capacity level into the
    /// next one so compaction pressure drains from the top.
    pub fn compact_once(&self) -> Result<()> {
        let max_level = match self.manifest.max_level() {
            Some(level) => level,
            None => return Ok(()),
        };

        for level in 0..=max_level {
            let current = self.manifest.tables(level);
            if current.len() <= self.level_capacity(level) {
                continue;
            }

            // Newest-first merge order: this level's tables (already newest
            // first) ahead of the next level's, so recency breaks ties
            let mut sources = current;
            sources.extend(self.manifest.tables(level + 1));

            let opts = TableOptions::from(&self.config);
            let outputs = sorted_run(&self.config.data_dir, &sources, &opts)?;
            tracing::debug!(
                level,
                inputs = sources.len(),
                outputs = outputs.len(),
                "compacted level into next"
            );

            self.manifest.apply_compaction(level, &sources, outputs)?;
        }

        Ok(())
    }

    /// Table count a level may hold before it is compacted
    fn level_capacity(&self, level: u32) -> usize {
        self.config
            .level_base_capacity
            .saturating_mul(self.config.level_growth_factor.saturating_pow(level))
    }
}
