//! Manifest binary encoding
//!
//! Explicit versioned binary format with explicit field order and lengths,
//! so the record stays stable across schema evolution.
//!
//! ## Record Format
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │ Magic: "SKVM" (4) | Version: u16 (2)                     │
//! ├──────────────────────────────────────────────────────────┤
//! │ WalCount: u32 | [PathLen: u32][Path (UTF-8)] ...         │
//! ├──────────────────────────────────────────────────────────┤
//! │ LevelCount: u32                                          │
//! │   [Level: u32][TableCount: u32][Path ...] per level      │
//! ├──────────────────────────────────────────────────────────┤
//! │ CRC32 of all preceding bytes: u32                        │
//! └──────────────────────────────────────────────────────────┘
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::{Result, StrataError};
use crate::storage::sstable::SSTable;

/// Magic bytes identifying a StrataKV manifest
const MAGIC: &[u8; 4] = b"SKVM";

/// Current manifest format version
const FORMAT_VERSION: u16 = 1;

/// Serializable snapshot of the metadata state
pub(super) struct ManifestRecord {
    /// Active WAL paths, oldest → newest
    pub wal_paths: Vec<PathBuf>,

    /// (level, table paths newest-first) in ascending level order
    pub levels: Vec<(u32, Vec<PathBuf>)>,
}

impl ManifestRecord {
    pub fn from_state(
        levels: &BTreeMap<u32, Vec<Arc<SSTable>>>,
        wal_paths: &[PathBuf],
    ) -> Self {
        Self {
            wal_paths: wal_paths.to_vec(),
            levels: levels
                .iter()
                .map(|(level, tables)| {
                    let paths = tables.iter().map(|t| t.path().to_path_buf()).collect();
                    (*level, paths)
                })
                .collect(),
        }
    }

    /// Serialize with trailing CRC32
    pub fn encode(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::new();

        buf.extend_from_slice(MAGIC);
        buf.extend_from_slice(&FORMAT_VERSION.to_le_bytes());

        buf.extend_from_slice(&(self.wal_paths.len() as u32).to_le_bytes());
        for path in &self.wal_paths {
            encode_path(&mut buf, path)?;
        }

        buf.extend_from_slice(&(self.levels.len() as u32).to_le_bytes());
        for (level, paths) in &self.levels {
            buf.extend_from_slice(&level.to_le_bytes());
            buf.extend_from_slice(&(paths.len() as u32).to_le_bytes());
            for path in paths {
                encode_path(&mut buf, path)?;
            }
        }

        let crc = crc32fast::hash(&buf);
        buf.extend_from_slice(&crc.to_le_bytes());

        Ok(buf)
    }

    /// Deserialize, verifying magic, version, and checksum
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < MAGIC.len() + 2 + 4 {
            return Err(corrupt("record too short"));
        }

        let (body, crc_bytes) = bytes.split_at(bytes.len() - 4);
        let mut stored_crc = [0u8; 4];
        stored_crc.copy_from_slice(crc_bytes);
        if crc32fast::hash(body) != u32::from_le_bytes(stored_crc) {
            return Err(corrupt("checksum mismatch"));
        }

        let mut cursor = Cursor::new(body);

        if cursor.take_bytes(4)? != MAGIC {
            return Err(corrupt("bad magic"));
        }
        let version = cursor.take_u16()?;
        if version != FORMAT_VERSION {
            return Err(corrupt(&format!("unsupported format version {version}")));
        }

        let wal_count = cursor.take_u32()? as usize;
        let mut wal_paths = Vec::with_capacity(wal_count);
        for _ in 0..wal_count {
            wal_paths.push(cursor.take_path()?);
        }

        let level_count = cursor.take_u32()? as usize;
        let mut levels = Vec::with_capacity(level_count);
        for _ in 0..level_count {
            let level = cursor.take_u32()?;
            let table_count = cursor.take_u32()? as usize;
            let mut paths = Vec::with_capacity(table_count);
            for _ in 0..table_count {
                paths.push(cursor.take_path()?);
            }
            levels.push((level, paths));
        }

        if !cursor.is_exhausted() {
            return Err(corrupt("trailing bytes after record"));
        }

        Ok(Self { wal_paths, levels })
    }
}

fn encode_path(buf: &mut Vec<u8>, path: &Path) -> Result<()> {
    let s = path.to_str().ok_or_else(|| {
        StrataError::InvalidArgument(format!("non-UTF-8 path: {}", path.display()))
    })?;
    buf.extend_from_slice(&(s.len() as u32).to_le_bytes());
    buf.extend_from_slice(s.as_bytes());
    Ok(())
}

fn corrupt(what: &str) -> StrataError {
    StrataError::Corruption(format!("manifest: {what}"))
}

/// Bounds-checked sequential reader over the record body
struct Cursor<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    fn take_bytes(&mut self, len: usize) -> Result<&'a [u8]> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|end| *end <= self.bytes.len())
            .ok_or_else(|| corrupt("record truncated"))?;
        let slice = &self.bytes[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn take_u16(&mut self) -> Result<u16> {
        let bytes = self.take_bytes(2)?;
        let mut buf = [0u8; 2];
        buf.copy_from_slice(bytes);
        Ok(u16::from_le_bytes(buf))
    }

    fn take_u32(&mut self) -> Result<u32> {
        let bytes = self.take_bytes(4)?;
        let mut buf = [0u8; 4];
        buf.copy_from_slice(bytes);
        Ok(u32::from_le_bytes(buf))
    }

    fn take_path(&mut self) -> Result<PathBuf> {
        let len = self.take_u32()? as usize;
        let bytes = self.take_bytes(len)?;
        let s = std::str::from_utf8(bytes).map_err(|_| corrupt("non-UTF-8 path"))?;
        Ok(PathBuf::from(s))
    }

    fn is_exhausted(&self) -> bool {
        self.pos == self.bytes.len()
    }
}
