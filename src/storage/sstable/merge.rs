//! K-way SSTable merge ("sorted run")
//!
//! Compaction's workhorse: merges any number of sorted source tables into a
//! sequence of fresh tables, keeping only the most recent version of each key
//! and physically dropping tombstones. This is the only place deleted keys
//! are reclaimed.

use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;
use std::path::Path;
use std::sync::Arc;

use crate::error::Result;
use crate::memtable::TOMBSTONE;

use super::{SSTable, SSTableBuilder, SSTableIterator, TableOptions};

/// One cursor head in the merge heap.
///
/// Ordered by (key, source index): sources are passed newest-first, so on a
/// duplicate key the lowest source index is popped first and wins.
struct HeapEntry {
    key: Vec<u8>,
    value: Vec<u8>,
    source: usize,
}

impl Ord for HeapEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key
            .cmp(&other.key)
            .then_with(|| self.source.cmp(&other.source))
    }
}

impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for HeapEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for HeapEntry {}

/// Merge `sources` (ordered newest-first) into new tables under `dir`.
///
/// For each distinct key the entry from the most recent source wins; a
/// winning tombstone is dropped from the output entirely. Output is split
/// into a new table whenever the current one would exceed
/// `opts.max_table_size`. Every in-progress output is finalized even if the
/// merge ends mid-table; source cursors are closed on return.
pub fn sorted_run(dir: &Path, sources: &[Arc<SSTable>], opts: &TableOptions) -> Result<Vec<SSTable>> {
    let mut cursors: Vec<SSTableIterator> = Vec::with_capacity(sources.len());
    for table in sources {
        cursors.push(table.iter()?);
    }

    let mut heap: BinaryHeap<Reverse<HeapEntry>> = BinaryHeap::new();
    for (source, cursor) in cursors.iter_mut().enumerate() {
        if let Some(record) = cursor.next() {
            let (key, value) = record?;
            heap.push(Reverse(HeapEntry { key, value, source }));
        }
    }

    let mut outputs = Vec::new();
    let mut builder: Option<SSTableBuilder> = None;
    let mut last_key: Option<Vec<u8>> = None;

    while let Some(Reverse(entry)) = heap.pop() {
        let first_sighting = last_key.as_deref() != Some(entry.key.as_slice());

        if first_sighting {
            last_key = Some(entry.key.clone());

            if entry.value != TOMBSTONE {
                let record_len = 8 + entry.key.len() as u64 + entry.value.len() as u64;

                let split = builder.as_ref().is_some_and(|b| {
                    b.entry_count() > 0 && b.written_bytes() + record_len > opts.max_table_size as u64
                });
                if split {
                    if let Some(full) = builder.take() {
                        outputs.push(full.finish()?);
                    }
                }

                if builder.is_none() {
                    builder = Some(SSTableBuilder::create(dir, opts)?);
                }
                if let Some(out) = builder.as_mut() {
                    out.add(&entry.key, &entry.value)?;
                }
            }
        }

        // Advance the cursor this entry came from
        if let Some(record) = cursors[entry.source].next() {
            let (key, value) = record?;
            heap.push(Reverse(HeapEntry {
                key,
                value,
                source: entry.source,
            }));
        }
    }

    if let Some(tail) = builder {
        outputs.push(tail.finish()?);
    }

    Ok(outputs)
}
