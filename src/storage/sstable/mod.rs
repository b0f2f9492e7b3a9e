//! SSTable Module
//!
//! Sorted String Table — immutable on-disk sorted key-value storage.
//!
//! ## File Format
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │ Block 1 (≤ block_size bytes)                            │
//! │   [KeyLen: u32][Key][ValLen: u32][Value]                │
//! │   ... records, ascending keys, never split ...          │
//! ├─────────────────────────────────────────────────────────┤
//! │ Block 2 ...                                             │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! The file is a pure record stream. The sparse block index (first key of
//! each block → offset/length), the bloom filter, and the min/max bounds are
//! in-memory only: opening a table rebuilds them with one sequential scan, so
//! the durable artifact stays a plain sorted run and the index layout can
//! evolve without a format change.

mod builder;
mod iterator;
mod merge;

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufReader, ErrorKind, Read, Seek, SeekFrom};
use std::ops::Bound;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::config::Config;
use crate::error::{Result, StrataError};
use crate::storage::bloom::BloomFilter;

pub use builder::{build_from_memtable, SSTableBuilder};
pub use iterator::SSTableIterator;
pub use merge::sorted_run;

/// Sizing knobs shared by table construction and reopening
#[derive(Debug, Clone, Copy)]
pub struct TableOptions {
    /// Block size budget for data blocks (in bytes)
    pub block_size: usize,

    /// Bloom filter capacity (expected entries)
    pub bloom_capacity: usize,

    /// Bloom filter target false positive rate
    pub bloom_false_positive_rate: f64,

    /// Max accumulated size of one merge output table (in bytes)
    pub max_table_size: usize,
}

impl From<&Config> for TableOptions {
    fn from(config: &Config) -> Self {
        Self {
            block_size: config.block_size,
            bloom_capacity: config.bloom_capacity,
            bloom_false_positive_rate: config.bloom_false_positive_rate,
            max_table_size: config.sstable_size_limit,
        }
    }
}

/// Location of one data block within the file
#[derive(Debug, Clone, Copy)]
pub(crate) struct BlockHandle {
    pub offset: u64,
    pub length: u64,
}

/// An immutable, sorted, block-structured on-disk table.
///
/// Safe to read from any number of threads without locking; only its
/// membership in a level (tracked by the manifest) ever changes.
pub struct SSTable {
    path: PathBuf,
    /// First key of each block → block location ("floor" search target)
    index: BTreeMap<Vec<u8>, BlockHandle>,
    bloom: BloomFilter,
    min_key: Option<Vec<u8>>,
    max_key: Option<Vec<u8>>,
    entry_count: u64,
    file_size: u64,
}

impl SSTable {
    /// Open an existing table, rebuilding index, bloom filter, and bounds
    /// with a single sequential scan of the data file.
    pub fn open(path: &Path, opts: &TableOptions) -> Result<Self> {
        let file = File::open(path)?;
        let file_size = file.metadata()?.len();
        let mut reader = BufReader::new(file);

        let mut index = BTreeMap::new();
        let mut bloom = BloomFilter::new(opts.bloom_capacity, opts.bloom_false_positive_rate);
        let mut min_key = None;
        let mut max_key = None;
        let mut entry_count = 0u64;

        let mut offset = 0u64;
        let mut block_start = 0u64;
        let mut block_length = 0u64;
        let mut block_first_key: Option<Vec<u8>> = None;

        loop {
            let key = match read_record_field(&mut reader, path)? {
                Some(key) => key,
                None => break,
            };
            let value_len = read_value_len(&mut reader, path)?;
            skip_bytes(&mut reader, value_len, path)?;

            let record_len = 8 + key.len() as u64 + value_len;

            // Seal the current block once the next record would overflow it
            if block_length + record_len > opts.block_size as u64 {
                if let Some(first_key) = block_first_key.take() {
                    index.insert(
                        first_key,
                        BlockHandle {
                            offset: block_start,
                            length: block_length,
                        },
                    );
                    block_start = offset;
                    block_length = 0;
                }
            }

            if block_first_key.is_none() {
                block_first_key = Some(key.clone());
            }

            bloom.insert(&key);
            if min_key.is_none() {
                min_key = Some(key.clone());
            }
            max_key = Some(key);

            block_length += record_len;
            offset += record_len;
            entry_count += 1;
        }

        if let Some(first_key) = block_first_key {
            index.insert(
                first_key,
                BlockHandle {
                    offset: block_start,
                    length: block_length,
                },
            );
        }

        Ok(Self {
            path: path.to_path_buf(),
            index,
            bloom,
            min_key,
            max_key,
            entry_count,
            file_size,
        })
    }

    /// Point lookup.
    ///
    /// Returns the stored value bytes, which may be the tombstone marker;
    /// callers above the engine facade never see it, the facade maps it to
    /// absent. Cheap rejections first: key outside [min, max], then the bloom
    /// filter; only then is one block read and scanned.
    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let (min, max) = match (&self.min_key, &self.max_key) {
            (Some(min), Some(max)) => (min, max),
            _ => return Ok(None),
        };
        if key < min.as_slice() || key > max.as_slice() {
            return Ok(None);
        }

        if !self.bloom.may_contain(key) {
            return Ok(None);
        }

        // Floor search: greatest indexed first-key <= target
        let handle = match self
            .index
            .range::<[u8], _>((Bound::Unbounded, Bound::Included(key)))
            .next_back()
        {
            Some((_, handle)) => *handle,
            None => return Ok(None),
        };

        let block = self.read_block(handle)?;
        self.scan_block(&block, key)
    }

    /// Iterate all records in key order (opens a dedicated cursor)
    pub fn iter(&self) -> Result<SSTableIterator> {
        SSTableIterator::open(&self.path)
    }

    /// Collect all records, in key order
    pub fn all_entries(&self) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        self.iter()?.collect()
    }

    /// Remove the data file. Only valid once the manifest no longer
    /// references this table.
    pub fn delete_file(&self) -> Result<()> {
        fs::remove_file(&self.path)?;
        Ok(())
    }

    /// Quick membership hint: false is a proof of absence
    pub fn might_contain(&self, key: &[u8]) -> bool {
        match (&self.min_key, &self.max_key) {
            (Some(min), Some(max)) => {
                key >= min.as_slice() && key <= max.as_slice() && self.bloom.may_contain(key)
            }
            _ => false,
        }
    }

    /// Path of the data file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of records in the table
    pub fn entry_count(&self) -> u64 {
        self.entry_count
    }

    /// Data file size in bytes
    pub fn file_size(&self) -> u64 {
        self.file_size
    }

    /// Smallest key, if the table is non-empty
    pub fn min_key(&self) -> Option<&[u8]> {
        self.min_key.as_deref()
    }

    /// Largest key, if the table is non-empty
    pub fn max_key(&self) -> Option<&[u8]> {
        self.max_key.as_deref()
    }

    /// Construct a handle directly from build results (no rescan)
    pub(crate) fn from_parts(
        path: PathBuf,
        index: BTreeMap<Vec<u8>, BlockHandle>,
        bloom: BloomFilter,
        min_key: Option<Vec<u8>>,
        max_key: Option<Vec<u8>>,
        entry_count: u64,
        file_size: u64,
    ) -> Self {
        Self {
            path,
            index,
            bloom,
            min_key,
            max_key,
            entry_count,
            file_size,
        }
    }

    fn read_block(&self, handle: BlockHandle) -> Result<Vec<u8>> {
        let mut file = File::open(&self.path)?;
        file.seek(SeekFrom::Start(handle.offset))?;
        let mut block = vec![0u8; handle.length as usize];
        file.read_exact(&mut block)?;
        Ok(block)
    }

    /// Linear scan of one decoded block; blocks are internally sorted, so
    /// the scan stops as soon as a decoded key exceeds the target.
    fn scan_block(&self, block: &[u8], key: &[u8]) -> Result<Option<Vec<u8>>> {
        let mut pos = 0usize;

        while pos < block.len() {
            let (record_key, value, next) = decode_record(block, pos, &self.path)?;

            match record_key.cmp(key) {
                std::cmp::Ordering::Equal => return Ok(Some(value.to_vec())),
                std::cmp::Ordering::Greater => return Ok(None),
                std::cmp::Ordering::Less => pos = next,
            }
        }

        Ok(None)
    }
}

/// Generate a fresh table path under `dir`
pub(crate) fn new_table_path(dir: &Path) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    dir.join(format!("sstable_{nanos}.sst"))
}

/// Decode one record at `pos`; returns (key, value, next position)
fn decode_record<'a>(block: &'a [u8], pos: usize, path: &Path) -> Result<(&'a [u8], &'a [u8], usize)> {
    let key_len = decode_len(block, pos, path)?;
    let key_start = pos + 4;
    let key_end = key_start + key_len;
    let value_len = decode_len(block, key_end, path)?;
    let value_start = key_end + 4;
    let value_end = value_start + value_len;

    if value_end > block.len() {
        return Err(corrupt(path, "record overruns block"));
    }

    Ok((
        &block[key_start..key_end],
        &block[value_start..value_end],
        value_end,
    ))
}

fn decode_len(block: &[u8], pos: usize, path: &Path) -> Result<usize> {
    let end = pos + 4;
    if end > block.len() {
        return Err(corrupt(path, "record overruns block"));
    }
    let mut buf = [0u8; 4];
    buf.copy_from_slice(&block[pos..end]);
    Ok(u32::from_le_bytes(buf) as usize)
}

fn corrupt(path: &Path, what: &str) -> StrataError {
    StrataError::Corruption(format!("{}: {what}", path.display()))
}

/// Read a length-prefixed field; clean EOF before the prefix yields None,
/// EOF anywhere inside a record is corruption (SSTables are written whole).
fn read_record_field(reader: &mut BufReader<File>, path: &Path) -> Result<Option<Vec<u8>>> {
    let mut len_buf = [0u8; 4];
    match reader.read_exact(&mut len_buf) {
        Ok(()) => {}
        Err(e) if e.kind() == ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    }

    let len = u32::from_le_bytes(len_buf) as usize;
    let mut buf = vec![0u8; len];
    reader
        .read_exact(&mut buf)
        .map_err(|e| map_truncation(e, path))?;
    Ok(Some(buf))
}

fn read_value_len(reader: &mut BufReader<File>, path: &Path) -> Result<u64> {
    let mut len_buf = [0u8; 4];
    reader
        .read_exact(&mut len_buf)
        .map_err(|e| map_truncation(e, path))?;
    Ok(u32::from_le_bytes(len_buf) as u64)
}

fn skip_bytes(reader: &mut BufReader<File>, len: u64, path: &Path) -> Result<()> {
    let copied = std::io::copy(&mut reader.by_ref().take(len), &mut std::io::sink())?;
    if copied != len {
        return Err(corrupt(path, "truncated record"));
    }
    Ok(())
}

fn map_truncation(e: std::io::Error, path: &Path) -> StrataError {
    if e.kind() == ErrorKind::UnexpectedEof {
        corrupt(path, "truncated record")
    } else {
        e.into()
    }
}
