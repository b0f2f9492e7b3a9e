//! Mutable-Table Manager
//!
//! Owns the one active memtable and its WAL, plus the FIFO queue of
//! immutable memtables awaiting flush.
//!
//! ## Responsibilities
//! - Append to the WAL before every memtable mutation
//! - Rotate the active table once it exceeds the size threshold
//! - Serve reads across active + queued tables, newest data first
//! - Recover all tables from WAL replay on startup
//! - Drain the flush queue synchronously at shutdown
//!
//! ## Locking
//!
//! One RwLock guards the table set (active + queue): reads take the read
//! lock, mutations and rotation the write lock. Where the manifest lock is
//! also needed (rotation registers a WAL, flush completion swaps queue and
//! level state), this manager's lock is acquired **first** and released last.
//! That single ordering holds everywhere both locks are touched.

use std::collections::VecDeque;
use std::fs;
use std::mem;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use parking_lot::RwLock;

use crate::config::Config;
use crate::error::Result;
use crate::manifest::Manifest;
use crate::storage::sstable::{build_from_memtable, SSTable, TableOptions};
use crate::wal::{WalReader, WalWriter};

use super::{MemTable, MemTableEntry};

/// An immutable memtable queued for flush, paired with the WAL that produced
/// it. The pairing is structural: queue order and WAL bookkeeping can never
/// disagree about which log belongs to which table.
#[derive(Clone)]
pub struct FlushCandidate {
    pub table: Arc<MemTable>,
    pub wal_path: PathBuf,
}

/// Owns the active memtable, its WAL, and the flush queue
pub struct MemtableManager {
    state: RwLock<ManagerState>,
    manifest: Arc<Manifest>,
    config: Config,
}

struct ManagerState {
    active: MemTable,
    wal: WalWriter,
    /// Oldest at the front; rotation pushes to the back
    flush_queue: VecDeque<FlushCandidate>,
}

impl MemtableManager {
    /// Open the manager, replaying any WALs listed in the manifest.
    ///
    /// The newest listed WAL becomes the active table and its writer reopens
    /// in append mode; every earlier WAL replays into a queued immutable
    /// table, oldest first.
    pub fn open(manifest: Arc<Manifest>, config: Config) -> Result<Self> {
        let wal_paths = manifest.wal_paths();

        let state = match wal_paths.split_last() {
            None => {
                let wal_path = new_wal_path(&config.data_dir);
                let wal = WalWriter::open(&wal_path, config.wal_sync)?;
                manifest.add_wal(&wal_path)?;

                ManagerState {
                    active: MemTable::new(),
                    wal,
                    flush_queue: VecDeque::new(),
                }
            }
            Some((active_path, older)) => {
                let mut flush_queue = VecDeque::new();
                for path in older {
                    let mut table = MemTable::new();
                    let replayed = WalReader::replay_into(path, &mut table)?;
                    tracing::info!(
                        wal = %path.display(),
                        entries = replayed,
                        "recovered queued memtable from WAL"
                    );
                    flush_queue.push_back(FlushCandidate {
                        table: Arc::new(table),
                        wal_path: path.clone(),
                    });
                }

                let mut active = MemTable::new();
                let replayed = WalReader::replay_into(active_path, &mut active)?;
                tracing::info!(
                    wal = %active_path.display(),
                    entries = replayed,
                    "recovered active memtable from WAL"
                );
                let wal = WalWriter::open(active_path, config.wal_sync)?;

                ManagerState {
                    active,
                    wal,
                    flush_queue,
                }
            }
        };

        Ok(Self {
            state: RwLock::new(state),
            manifest,
            config,
        })
    }

    /// Store a value for a key
    pub fn put(&self, key: &[u8], value: &[u8]) -> Result<()> {
        self.write_entry(key, MemTableEntry::Value(value.to_vec()))
    }

    /// Store a tombstone for a key
    pub fn delete(&self, key: &[u8]) -> Result<()> {
        self.write_entry(key, MemTableEntry::Tombstone)
    }

    /// Look a key up across the active table and the flush queue, most
    /// recent table first. A tombstone is a real answer here; the engine
    /// facade maps it to absent.
    pub fn get(&self, key: &[u8]) -> Option<MemTableEntry> {
        let state = self.state.read();

        if let Some(entry) = state.active.get(key) {
            return Some(entry);
        }

        for candidate in state.flush_queue.iter().rev() {
            if let Some(entry) = candidate.table.get(key) {
                return Some(entry);
            }
        }

        None
    }

    /// Oldest table awaiting flush, without removing it from the queue
    pub fn peek_flushable(&self) -> Option<FlushCandidate> {
        self.state.read().flush_queue.front().cloned()
    }

    /// Complete a flush: remove the candidate from the queue, durably swap
    /// the manifest (table in at level 0, WAL out) in one step, and delete
    /// the obsolete WAL file.
    ///
    /// Queue removal and manifest registration happen under this manager's
    /// write lock, so readers observe either the queued table or the
    /// registered one, never neither.
    pub fn complete_flush(&self, candidate: &FlushCandidate, table: SSTable) -> Result<()> {
        let mut state = self.state.write();

        if let Some(pos) = state
            .flush_queue
            .iter()
            .position(|c| Arc::ptr_eq(&c.table, &candidate.table))
        {
            state.flush_queue.remove(pos);
        }

        self.manifest.record_flush(table, &candidate.wal_path)?;
        drop(state);

        if let Err(e) = fs::remove_file(&candidate.wal_path) {
            tracing::warn!(
                wal = %candidate.wal_path.display(),
                error = %e,
                "failed to delete flushed WAL file"
            );
        }

        Ok(())
    }

    /// Drain everything at shutdown: rotate a non-empty active table, then
    /// synchronously flush the whole queue into level-0 tables.
    pub fn flush_all_remaining(&self) -> Result<()> {
        {
            let mut state = self.state.write();
            if !state.active.is_empty() {
                self.rotate_locked(&mut state)?;
            }
        }

        let opts = TableOptions::from(&self.config);
        while let Some(candidate) = self.peek_flushable() {
            let table = build_from_memtable(&self.config.data_dir, &candidate.table, &opts)?;
            self.complete_flush(&candidate, table)?;
        }

        Ok(())
    }

    /// Current serialized size of the active table
    pub fn active_size(&self) -> usize {
        self.state.read().active.size()
    }

    /// Number of entries in the active table
    pub fn active_len(&self) -> usize {
        self.state.read().active.len()
    }

    /// Depth of the flush queue
    pub fn flush_queue_len(&self) -> usize {
        self.state.read().flush_queue.len()
    }

    /// One-line summary of the mutable state, for diagnostics
    pub fn describe(&self) -> String {
        let state = self.state.read();
        format!(
            "Active memtable: {} entries, {} bytes (WAL {})\nFlush queue: {} table(s)\n",
            state.active.len(),
            state.active.size(),
            state.wal.path().display(),
            state.flush_queue.len()
        )
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    fn write_entry(&self, key: &[u8], entry: MemTableEntry) -> Result<()> {
        let mut state = self.state.write();

        state.wal.append(key, entry.as_stored())?;
        state.active.insert(key.to_vec(), entry);

        if state.active.size() > self.config.memtable_size_limit {
            self.rotate_locked(&mut state)?;
        }

        Ok(())
    }

    /// Rotate under the write lock: queue the full table with its WAL path,
    /// start a fresh table + WAL, and register the new WAL in the manifest.
    fn rotate_locked(&self, state: &mut ManagerState) -> Result<()> {
        let new_wal_path = new_wal_path(&self.config.data_dir);
        let new_wal = WalWriter::open(&new_wal_path, self.config.wal_sync)?;

        let old_wal = mem::replace(&mut state.wal, new_wal);
        let old_wal_path = old_wal.path().to_path_buf();
        old_wal.close()?;

        let full = mem::replace(&mut state.active, MemTable::new());
        tracing::debug!(
            entries = full.len(),
            bytes = full.size(),
            wal = %old_wal_path.display(),
            "rotated memtable"
        );
        state.flush_queue.push_back(FlushCandidate {
            table: Arc::new(full),
            wal_path: old_wal_path,
        });

        self.manifest.add_wal(&new_wal_path)
    }
}

/// Generate a fresh WAL path under `dir`
fn new_wal_path(dir: &Path) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    dir.join(format!("wal-{nanos}.log"))
}
