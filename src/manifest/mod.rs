//! Manifest Module
//!
//! Durable record of which files constitute the current database state: the
//! per-level lists of SSTables and the ordered list of active WAL files. The
//! on-disk manifest is the single source of truth for recovery.
//!
//! ## Persistence Protocol
//!
//! Every mutation serializes the full state to a **new** numbered manifest
//! file (`MANIFEST-NNNNNN`), syncs it, and only then atomically repoints the
//! `CURRENT` file at the new name. A crash mid-write therefore never corrupts
//! the previously valid manifest: the pointer only advances once the new
//! snapshot is complete. Old manifests are left for operational cleanup.
//!
//! ## Locking
//!
//! One RwLock guards the level map and WAL list. Mutators hold the write
//! lock across the in-memory change *and* the persist call, so the durable
//! and in-memory views never diverge for longer than one call. When this lock
//! is combined with the memtable manager's lock, the manager's lock is always
//! acquired first.

mod encoding;

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::config::Config;
use crate::error::{Result, StrataError};
use crate::storage::sstable::{SSTable, TableOptions};

use encoding::ManifestRecord;

/// Name of the pointer file naming the active manifest
const CURRENT_FILE: &str = "CURRENT";

/// Durable metadata store for levels and WALs
pub struct Manifest {
    data_dir: PathBuf,
    table_opts: TableOptions,
    state: RwLock<ManifestState>,
}

struct ManifestState {
    /// Level number → tables, newest first within each level
    levels: BTreeMap<u32, Vec<Arc<SSTable>>>,

    /// Active WAL paths, oldest → newest
    wal_paths: Vec<PathBuf>,

    /// Monotonic number for the next manifest snapshot
    next_manifest_number: u64,
}

impl Manifest {
    /// Open the metadata store under the configured data directory.
    ///
    /// If a `CURRENT` pointer exists, the manifest it names is loaded and the
    /// level map reconstructed; a referenced table file that fails to load is
    /// skipped with a warning rather than failing startup. With no pointer
    /// this is a fresh store: an initial empty manifest is written and the
    /// pointer created.
    pub fn open(config: &Config) -> Result<Self> {
        let data_dir = config.data_dir.clone();
        fs::create_dir_all(&data_dir)?;

        let table_opts = TableOptions::from(config);
        let current_path = data_dir.join(CURRENT_FILE);

        let manifest = if current_path.exists() {
            let manifest_name = fs::read_to_string(&current_path)?.trim().to_string();
            let bytes = fs::read(data_dir.join(&manifest_name))?;
            let record = ManifestRecord::decode(&bytes)?;

            let mut levels = BTreeMap::new();
            for (level, table_paths) in record.levels {
                let mut tables = Vec::with_capacity(table_paths.len());
                for path in table_paths {
                    match SSTable::open(&path, &table_opts) {
                        Ok(table) => tables.push(Arc::new(table)),
                        Err(e) => {
                            tracing::warn!(
                                path = %path.display(),
                                error = %e,
                                "skipping unloadable SSTable referenced by manifest"
                            );
                        }
                    }
                }
                if !tables.is_empty() {
                    levels.insert(level, tables);
                }
            }

            let next_manifest_number = max_manifest_number(&data_dir)? + 1;

            Self {
                data_dir,
                table_opts,
                state: RwLock::new(ManifestState {
                    levels,
                    wal_paths: record.wal_paths,
                    next_manifest_number,
                }),
            }
        } else {
            let store = Self {
                data_dir,
                table_opts,
                state: RwLock::new(ManifestState {
                    levels: BTreeMap::new(),
                    wal_paths: Vec::new(),
                    next_manifest_number: 1,
                }),
            };
            let mut state = store.state.write();
            store.persist_locked(&mut state)?;
            drop(state);
            store
        };

        Ok(manifest)
    }

    // =========================================================================
    // Mutators — each persists before releasing the write lock
    // =========================================================================

    /// Register a newly opened WAL at the end (newest) of the list
    pub fn add_wal(&self, path: &Path) -> Result<()> {
        let mut state = self.state.write();
        state.wal_paths.push(path.to_path_buf());
        self.persist_locked(&mut state)
    }

    /// Drop a WAL from the list
    pub fn remove_wal(&self, path: &Path) -> Result<()> {
        let mut state = self.state.write();
        state.wal_paths.retain(|p| p != path);
        self.persist_locked(&mut state)
    }

    /// Register a table at the front (newest) of a level
    pub fn add_sstable(&self, level: u32, table: SSTable) -> Result<Arc<SSTable>> {
        let mut state = self.state.write();
        let table = Arc::new(table);
        state
            .levels
            .entry(level)
            .or_default()
            .insert(0, Arc::clone(&table));
        self.persist_locked(&mut state)?;
        Ok(table)
    }

    /// Record a completed flush in one durable step: the new table joins
    /// level 0 and the consumed WAL leaves the list, under a single persist.
    pub fn record_flush(&self, table: SSTable, wal_path: &Path) -> Result<()> {
        let mut state = self.state.write();
        state
            .levels
            .entry(0)
            .or_default()
            .insert(0, Arc::new(table));
        state.wal_paths.retain(|p| p != wal_path);
        self.persist_locked(&mut state)
    }

    /// Apply a compaction: remove exactly the merged `inputs` from `level`
    /// and `level + 1`, install `outputs` at the front of `level + 1`, and
    /// delete the superseded files — all under the write lock, so no new
    /// reader can reach the removed tables before their files go away.
    pub fn apply_compaction(
        &self,
        level: u32,
        inputs: &[Arc<SSTable>],
        outputs: Vec<SSTable>,
    ) -> Result<()> {
        let mut state = self.state.write();

        for l in [level, level + 1] {
            if let Some(tables) = state.levels.get_mut(&l) {
                tables.retain(|t| !inputs.iter().any(|i| Arc::ptr_eq(t, i)));
                if tables.is_empty() {
                    state.levels.remove(&l);
                }
            }
        }

        if !outputs.is_empty() {
            let slot = state.levels.entry(level + 1).or_default();
            for table in outputs.into_iter().rev() {
                slot.insert(0, Arc::new(table));
            }
        }

        self.persist_locked(&mut state)?;

        for table in inputs {
            if let Err(e) = table.delete_file() {
                tracing::warn!(
                    path = %table.path().display(),
                    error = %e,
                    "failed to delete superseded SSTable"
                );
            }
        }

        Ok(())
    }

    // =========================================================================
    // Readers
    // =========================================================================

    /// Active WAL paths, oldest → newest
    pub fn wal_paths(&self) -> Vec<PathBuf> {
        self.state.read().wal_paths.clone()
    }

    /// Snapshot of one level's tables, newest first
    pub fn tables(&self, level: u32) -> Vec<Arc<SSTable>> {
        self.state
            .read()
            .levels
            .get(&level)
            .cloned()
            .unwrap_or_default()
    }

    /// Highest populated level, if any
    pub fn max_level(&self) -> Option<u32> {
        self.state.read().levels.keys().next_back().copied()
    }

    /// Run `f` against the level map under the read lock.
    ///
    /// Lookups fan out inside the closure so table files cannot be unlinked
    /// while a read is in flight.
    pub fn with_levels<R>(&self, f: impl FnOnce(&BTreeMap<u32, Vec<Arc<SSTable>>>) -> R) -> R {
        let state = self.state.read();
        f(&state.levels)
    }

    /// Human-readable dump of the manifest contents
    pub fn describe(&self) -> String {
        let state = self.state.read();
        let mut out = String::new();

        out.push_str("===== Manifest Contents =====\n");
        out.push_str("WAL files:\n");
        if state.wal_paths.is_empty() {
            out.push_str("  (none)\n");
        } else {
            for (i, path) in state.wal_paths.iter().enumerate() {
                out.push_str(&format!("  [{i}] {}\n", path.display()));
            }
        }

        out.push_str("===== SSTables by Level =====\n");
        if state.levels.is_empty() {
            out.push_str("  (none)\n");
        }
        for (level, tables) in &state.levels {
            out.push_str(&format!("Level {level}:\n"));
            for (i, table) in tables.iter().enumerate() {
                out.push_str(&format!(
                    "  [{i}] {} ({} entries)\n",
                    table.path().display(),
                    table.entry_count()
                ));
                match table.all_entries() {
                    Ok(entries) => {
                        for (key, value) in entries {
                            out.push_str(&format!(
                                "      key: {}, value: {}\n",
                                String::from_utf8_lossy(&key),
                                String::from_utf8_lossy(&value)
                            ));
                        }
                    }
                    Err(e) => {
                        out.push_str(&format!("      (error reading contents: {e})\n"));
                    }
                }
            }
        }
        out.push_str("=============================\n");

        out
    }

    /// Data directory this store lives in
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Table sizing options used when reopening referenced tables
    pub fn table_options(&self) -> &TableOptions {
        &self.table_opts
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    /// Write a new numbered snapshot, then atomically advance `CURRENT`.
    ///
    /// A failure here aborts the mutating operation: proceeding on an
    /// unwritten manifest would let durable state silently diverge from
    /// memory.
    fn persist_locked(&self, state: &mut ManifestState) -> Result<()> {
        let record = ManifestRecord::from_state(&state.levels, &state.wal_paths);
        let bytes = record.encode()?;

        let manifest_name = format!("MANIFEST-{:06}", state.next_manifest_number);
        let manifest_path = self.data_dir.join(&manifest_name);
        {
            let mut file = File::create(&manifest_path)?;
            file.write_all(&bytes)?;
            file.sync_all()?;
        }
        state.next_manifest_number += 1;

        // Pointer swap: write the new name to a temp file, then rename over
        // CURRENT so the pointer is never observed half-written
        let tmp_path = self.data_dir.join("CURRENT.tmp");
        {
            let mut file = File::create(&tmp_path)?;
            file.write_all(manifest_name.as_bytes())?;
            file.sync_all()?;
        }
        fs::rename(&tmp_path, self.data_dir.join(CURRENT_FILE))?;

        Ok(())
    }
}

/// Highest MANIFEST-NNNNNN number present in the directory
fn max_manifest_number(dir: &Path) -> Result<u64> {
    let mut max = 0u64;

    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if let Some(number) = name.strip_prefix("MANIFEST-") {
            let number: u64 = number.parse().map_err(|_| {
                StrataError::Corruption(format!("invalid manifest file name: {name}"))
            })?;
            max = max.max(number);
        }
    }

    Ok(max)
}
