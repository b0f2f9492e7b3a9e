//! SSTable Iterator
//!
//! Sequential cursor over all records of one table file, in key order.
//! Used by compaction merges (one cursor per source) and diagnostics.

use std::fs::File;
use std::io::{BufReader, ErrorKind, Read};
use std::path::{Path, PathBuf};

use crate::error::{Result, StrataError};

/// Iterator over SSTable records in ascending key order
pub struct SSTableIterator {
    path: PathBuf,
    reader: BufReader<File>,
    done: bool,
}

impl SSTableIterator {
    /// Open a dedicated read cursor at the start of the data file
    pub(super) fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            reader: BufReader::new(file),
            done: false,
        })
    }

    /// Read the key field; clean EOF here is the end of the table
    fn read_key(&mut self) -> Result<Option<Vec<u8>>> {
        let mut len_buf = [0u8; 4];
        match self.reader.read_exact(&mut len_buf) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => return Ok(None),
            Err(e) => return Err(e.into()),
        }

        let len = u32::from_le_bytes(len_buf) as usize;
        let mut buf = vec![0u8; len];
        self.reader
            .read_exact(&mut buf)
            .map_err(|e| self.map_err(e))?;
        Ok(Some(buf))
    }

    /// Read the value field; EOF inside a record means a damaged file
    fn read_value(&mut self) -> Result<Vec<u8>> {
        let mut len_buf = [0u8; 4];
        self.reader
            .read_exact(&mut len_buf)
            .map_err(|e| self.map_err(e))?;

        let len = u32::from_le_bytes(len_buf) as usize;
        let mut buf = vec![0u8; len];
        self.reader
            .read_exact(&mut buf)
            .map_err(|e| self.map_err(e))?;
        Ok(buf)
    }

    /// SSTables are written whole; running out of bytes mid-record means the
    /// file is damaged, not merely unfinished.
    fn map_err(&self, e: std::io::Error) -> StrataError {
        if e.kind() == ErrorKind::UnexpectedEof {
            StrataError::Corruption(format!("{}: truncated record", self.path.display()))
        } else {
            e.into()
        }
    }
}

impl Iterator for SSTableIterator {
    type Item = Result<(Vec<u8>, Vec<u8>)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let key = match self.read_key() {
            Ok(Some(key)) => key,
            Ok(None) => {
                self.done = true;
                return None;
            }
            Err(e) => {
                self.done = true;
                return Some(Err(e));
            }
        };

        match self.read_value() {
            Ok(value) => Some(Ok((key, value))),
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}
