//! Tests for the Write-Ahead Log
//!
//! These tests verify:
//! - Appending and replaying records in order
//! - Tombstone markers surviving the stored form
//! - Truncated trailing records treated as end-of-log
//! - Sync policies

use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;

use stratakv::config::WalSyncPolicy;
use stratakv::memtable::{MemTable, MemTableEntry, TOMBSTONE};
use stratakv::wal::{WalReader, WalWriter};
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn setup_temp_wal() -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let wal_path = temp_dir.path().join("test.log");
    (temp_dir, wal_path)
}

// =============================================================================
// Append / Replay Round Trips
// =============================================================================

#[test]
fn test_append_and_replay_in_order() {
    let (_temp, wal_path) = setup_temp_wal();

    let mut writer = WalWriter::open(&wal_path, WalSyncPolicy::EveryWrite).unwrap();
    writer.append(b"alpha", b"1").unwrap();
    writer.append(b"beta", b"2").unwrap();
    writer.append(b"gamma", b"3").unwrap();
    writer.close().unwrap();

    let mut reader = WalReader::open(&wal_path).unwrap();
    assert_eq!(
        reader.next_entry().unwrap(),
        Some((b"alpha".to_vec(), b"1".to_vec()))
    );
    assert_eq!(
        reader.next_entry().unwrap(),
        Some((b"beta".to_vec(), b"2".to_vec()))
    );
    assert_eq!(
        reader.next_entry().unwrap(),
        Some((b"gamma".to_vec(), b"3".to_vec()))
    );
    assert_eq!(reader.next_entry().unwrap(), None);
}

#[test]
fn test_replay_into_memtable_applies_overwrites() {
    let (_temp, wal_path) = setup_temp_wal();

    let mut writer = WalWriter::open(&wal_path, WalSyncPolicy::EveryWrite).unwrap();
    writer.append(b"key", b"old").unwrap();
    writer.append(b"key", b"new").unwrap();
    writer.close().unwrap();

    let mut table = MemTable::new();
    let replayed = WalReader::replay_into(&wal_path, &mut table).unwrap();

    assert_eq!(replayed, 2);
    assert_eq!(table.len(), 1);
    assert_eq!(
        table.get(b"key"),
        Some(MemTableEntry::Value(b"new".to_vec()))
    );
}

#[test]
fn test_tombstone_survives_stored_form() {
    let (_temp, wal_path) = setup_temp_wal();

    let mut writer = WalWriter::open(&wal_path, WalSyncPolicy::EveryWrite).unwrap();
    writer.append(b"doomed", TOMBSTONE).unwrap();
    writer.close().unwrap();

    let mut table = MemTable::new();
    WalReader::replay_into(&wal_path, &mut table).unwrap();

    assert_eq!(table.get(b"doomed"), Some(MemTableEntry::Tombstone));
}

#[test]
fn test_append_reopens_existing_log() {
    let (_temp, wal_path) = setup_temp_wal();

    {
        let mut writer = WalWriter::open(&wal_path, WalSyncPolicy::EveryWrite).unwrap();
        writer.append(b"first", b"1").unwrap();
        writer.close().unwrap();
    }
    {
        let mut writer = WalWriter::open(&wal_path, WalSyncPolicy::EveryWrite).unwrap();
        writer.append(b"second", b"2").unwrap();
        writer.close().unwrap();
    }

    let mut table = MemTable::new();
    let replayed = WalReader::replay_into(&wal_path, &mut table).unwrap();
    assert_eq!(replayed, 2);
    assert_eq!(table.len(), 2);
}

// =============================================================================
// Crash Tolerance
// =============================================================================

#[test]
fn test_truncated_trailing_record_is_end_of_log() {
    let (_temp, wal_path) = setup_temp_wal();

    let mut writer = WalWriter::open(&wal_path, WalSyncPolicy::EveryWrite).unwrap();
    writer.append(b"complete", b"value").unwrap();
    writer.close().unwrap();

    // Simulate a crash mid-append: a length prefix promising more bytes
    // than were ever written
    let mut file = OpenOptions::new().append(true).open(&wal_path).unwrap();
    file.write_all(&100u32.to_le_bytes()).unwrap();
    file.write_all(b"par").unwrap();
    drop(file);

    let mut table = MemTable::new();
    let replayed = WalReader::replay_into(&wal_path, &mut table).unwrap();

    assert_eq!(replayed, 1);
    assert_eq!(
        table.get(b"complete"),
        Some(MemTableEntry::Value(b"value".to_vec()))
    );
}

#[test]
fn test_truncated_value_field_is_end_of_log() {
    let (_temp, wal_path) = setup_temp_wal();

    let mut writer = WalWriter::open(&wal_path, WalSyncPolicy::EveryWrite).unwrap();
    writer.append(b"ok", b"1").unwrap();
    writer.close().unwrap();

    // Key complete, value length missing entirely
    let mut file = OpenOptions::new().append(true).open(&wal_path).unwrap();
    file.write_all(&4u32.to_le_bytes()).unwrap();
    file.write_all(b"half").unwrap();
    drop(file);

    let mut table = MemTable::new();
    let replayed = WalReader::replay_into(&wal_path, &mut table).unwrap();
    assert_eq!(replayed, 1);
}

#[test]
fn test_empty_log_replays_nothing() {
    let (_temp, wal_path) = setup_temp_wal();

    let writer = WalWriter::open(&wal_path, WalSyncPolicy::EveryWrite).unwrap();
    writer.close().unwrap();

    let mut table = MemTable::new();
    let replayed = WalReader::replay_into(&wal_path, &mut table).unwrap();
    assert_eq!(replayed, 0);
    assert!(table.is_empty());
}

// =============================================================================
// Sync Policies
// =============================================================================

#[test]
fn test_every_n_entries_policy_replays_after_close() {
    let (_temp, wal_path) = setup_temp_wal();

    let mut writer =
        WalWriter::open(&wal_path, WalSyncPolicy::EveryNEntries { count: 10 }).unwrap();
    for i in 0..25 {
        let key = format!("key{i:03}");
        writer.append(key.as_bytes(), b"v").unwrap();
    }
    writer.close().unwrap();

    let mut table = MemTable::new();
    let replayed = WalReader::replay_into(&wal_path, &mut table).unwrap();
    assert_eq!(replayed, 25);
}
