//! WAL Writer
//!
//! Handles appending records to a WAL file.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::config::WalSyncPolicy;
use crate::error::Result;

/// Writes length-prefixed key/value records to a WAL file
pub struct WalWriter {
    path: PathBuf,
    writer: BufWriter<File>,
    sync_policy: WalSyncPolicy,
    appends_since_sync: usize,
}

impl WalWriter {
    /// Open a WAL file for appending, creating it if it does not exist
    pub fn open(path: &Path, sync_policy: WalSyncPolicy) -> Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;

        Ok(Self {
            path: path.to_path_buf(),
            writer: BufWriter::new(file),
            sync_policy,
            appends_since_sync: 0,
        })
    }

    /// Append one record and make it durable per the sync policy.
    ///
    /// With `EveryWrite` (the default), the record is on stable storage before
    /// this returns: a crash after `append` must leave the mutation
    /// recoverable by replay.
    pub fn append(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        self.writer.write_all(&(key.len() as u32).to_le_bytes())?;
        self.writer.write_all(key)?;
        self.writer.write_all(&(value.len() as u32).to_le_bytes())?;
        self.writer.write_all(value)?;
        self.writer.flush()?;

        match self.sync_policy {
            WalSyncPolicy::EveryWrite => {
                self.writer.get_ref().sync_data()?;
            }
            WalSyncPolicy::EveryNEntries { count } => {
                self.appends_since_sync += 1;
                if self.appends_since_sync >= count.max(1) {
                    self.writer.get_ref().sync_data()?;
                    self.appends_since_sync = 0;
                }
            }
        }

        Ok(())
    }

    /// Force all buffered records to stable storage
    pub fn sync(&mut self) -> Result<()> {
        self.writer.flush()?;
        self.writer.get_ref().sync_data()?;
        self.appends_since_sync = 0;
        Ok(())
    }

    /// Sync and close the file handle
    pub fn close(mut self) -> Result<()> {
        self.sync()
    }

    /// Path of the underlying log file
    pub fn path(&self) -> &Path {
        &self.path
    }
}
