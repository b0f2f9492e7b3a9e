//! WAL Reader
//!
//! Sequential replay of WAL records for crash recovery.

use std::fs::File;
use std::io::{BufReader, ErrorKind, Read};
use std::path::Path;

use crate::error::Result;
use crate::memtable::{MemTable, MemTableEntry};

/// Reads records from a WAL file, tolerating a truncated trailing record
pub struct WalReader {
    reader: BufReader<File>,
}

impl WalReader {
    /// Open a WAL file for replay
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        Ok(Self {
            reader: BufReader::new(file),
        })
    }

    /// Read the next record.
    ///
    /// Returns `Ok(None)` at end-of-file. A record cut short by a crash mid
    /// write is also end-of-stream: the mutation never finished its `append`,
    /// so discarding it is the crash-safe interpretation.
    pub fn next_entry(&mut self) -> Result<Option<(Vec<u8>, Vec<u8>)>> {
        let key_len = match self.read_len()? {
            Some(len) => len,
            None => return Ok(None),
        };

        let key = match self.read_bytes(key_len)? {
            Some(bytes) => bytes,
            None => return Ok(None),
        };

        let value_len = match self.read_len()? {
            Some(len) => len,
            None => {
                tracing::warn!("discarding truncated trailing WAL record");
                return Ok(None);
            }
        };

        let value = match self.read_bytes(value_len)? {
            Some(bytes) => bytes,
            None => {
                tracing::warn!("discarding truncated trailing WAL record");
                return Ok(None);
            }
        };

        Ok(Some((key, value)))
    }

    /// Replay every record of `path` into `table`, in log order.
    ///
    /// Returns the number of records applied.
    pub fn replay_into(path: &Path, table: &mut MemTable) -> Result<usize> {
        let mut reader = Self::open(path)?;
        let mut count = 0;

        while let Some((key, value)) = reader.next_entry()? {
            table.insert(key, MemTableEntry::from_stored(value));
            count += 1;
        }

        Ok(count)
    }

    fn read_len(&mut self) -> Result<Option<usize>> {
        let mut buf = [0u8; 4];
        match self.reader.read_exact(&mut buf) {
            Ok(()) => Ok(Some(u32::from_le_bytes(buf) as usize)),
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn read_bytes(&mut self, len: usize) -> Result<Option<Vec<u8>>> {
        let mut buf = vec![0u8; len];
        match self.reader.read_exact(&mut buf) {
            Ok(()) => Ok(Some(buf)),
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
