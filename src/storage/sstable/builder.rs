//! SSTable Builder
//!
//! Writes ascending-key records to a new table file, building the block
//! index, bloom filter, and key bounds in the same pass.

use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::memtable::MemTable;
use crate::storage::bloom::BloomFilter;

use super::{new_table_path, BlockHandle, SSTable, TableOptions};

/// Builder for creating a new SSTable from sorted entries
pub struct SSTableBuilder {
    path: PathBuf,
    writer: BufWriter<File>,
    block_size: u64,

    index: BTreeMap<Vec<u8>, BlockHandle>,
    bloom: BloomFilter,
    min_key: Option<Vec<u8>>,
    max_key: Option<Vec<u8>>,
    entry_count: u64,

    current_offset: u64,
    block_start: u64,
    block_length: u64,
    block_first_key: Option<Vec<u8>>,
}

impl SSTableBuilder {
    /// Start a new table file under `dir`
    pub fn create(dir: &Path, opts: &TableOptions) -> Result<Self> {
        let path = new_table_path(dir);
        let file = OpenOptions::new()
            .create_new(true)
            .write(true)
            .open(&path)?;

        Ok(Self {
            path,
            writer: BufWriter::new(file),
            block_size: opts.block_size as u64,
            index: BTreeMap::new(),
            bloom: BloomFilter::new(opts.bloom_capacity, opts.bloom_false_positive_rate),
            min_key: None,
            max_key: None,
            entry_count: 0,
            current_offset: 0,
            block_start: 0,
            block_length: 0,
            block_first_key: None,
        })
    }

    /// Append one record. Keys must arrive in ascending order; the stored
    /// value form is written verbatim (tombstone markers included, so flushed
    /// deletes are not resurrected by older levels).
    pub fn add(&mut self, key: &[u8], stored_value: &[u8]) -> Result<()> {
        let record_len = 8 + key.len() as u64 + stored_value.len() as u64;

        // Seal the current block when this record would overflow it
        if self.block_length + record_len > self.block_size {
            self.seal_block();
        }

        if self.block_first_key.is_none() {
            self.block_first_key = Some(key.to_vec());
        }

        self.writer.write_all(&(key.len() as u32).to_le_bytes())?;
        self.writer.write_all(key)?;
        self.writer
            .write_all(&(stored_value.len() as u32).to_le_bytes())?;
        self.writer.write_all(stored_value)?;

        self.bloom.insert(key);
        if self.min_key.is_none() {
            self.min_key = Some(key.to_vec());
        }
        self.max_key = Some(key.to_vec());

        self.block_length += record_len;
        self.current_offset += record_len;
        self.entry_count += 1;

        Ok(())
    }

    /// Total bytes written so far
    pub fn written_bytes(&self) -> u64 {
        self.current_offset
    }

    /// Number of records added so far
    pub fn entry_count(&self) -> u64 {
        self.entry_count
    }

    /// Flush, sync, and return the finished immutable table
    pub fn finish(mut self) -> Result<SSTable> {
        self.seal_block();
        self.writer.flush()?;
        self.writer.get_ref().sync_all()?;

        let file_size = self.current_offset;

        Ok(SSTable::from_parts(
            self.path,
            self.index,
            self.bloom,
            self.min_key,
            self.max_key,
            self.entry_count,
            file_size,
        ))
    }

    fn seal_block(&mut self) {
        if let Some(first_key) = self.block_first_key.take() {
            self.index.insert(
                first_key,
                BlockHandle {
                    offset: self.block_start,
                    length: self.block_length,
                },
            );
            self.block_start = self.current_offset;
            self.block_length = 0;
        }
    }
}

/// Build a level-0 table from a memtable's entries (ascending key order).
///
/// Tombstones are written through: flush preserves deletes, only compaction
/// reclaims them.
pub fn build_from_memtable(dir: &Path, table: &MemTable, opts: &TableOptions) -> Result<SSTable> {
    let mut builder = SSTableBuilder::create(dir, opts)?;

    for (key, entry) in table.iter() {
        builder.add(key, entry.as_stored())?;
    }

    builder.finish()
}
