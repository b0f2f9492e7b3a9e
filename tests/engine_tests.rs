//! Integration tests for the Engine facade
//!
//! These tests verify:
//! - Round trips across rotation, flush, and compaction
//! - Tombstone recency over deeper levels
//! - Crash recovery by WAL replay
//! - Orderly shutdown draining everything to disk
//! - Argument validation and diagnostics

use std::path::Path;
use std::time::Duration;

use stratakv::{Config, Engine, StrataError};
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

/// Config with the background workers effectively disabled so tests drive
/// flush/compaction deterministically
fn quiet_config(dir: &Path) -> Config {
    Config::builder()
        .data_dir(dir)
        .flush_interval(Duration::from_secs(3600))
        .compaction_interval(Duration::from_secs(3600))
        .build()
}

/// Like `quiet_config` but rotating the memtable on every write
fn rotate_always_config(dir: &Path) -> Config {
    Config::builder()
        .data_dir(dir)
        .memtable_size_limit(1)
        .flush_interval(Duration::from_secs(3600))
        .compaction_interval(Duration::from_secs(3600))
        .build()
}

/// Run flush ticks until the queue is empty
fn drain_flush_queue(engine: &Engine) {
    while engine.flush_queue_len() > 0 {
        engine.flush().unwrap();
    }
}

// =============================================================================
// Basic Operations
// =============================================================================

#[test]
fn test_put_get_round_trip() {
    let temp = TempDir::new().unwrap();
    let engine = Engine::open(quiet_config(temp.path())).unwrap();

    engine.put(b"hello", b"world").unwrap();
    assert_eq!(engine.get(b"hello").unwrap(), Some(b"world".to_vec()));
    assert_eq!(engine.get(b"missing").unwrap(), None);

    engine.close().unwrap();
}

#[test]
fn test_overwrite_returns_latest() {
    let temp = TempDir::new().unwrap();
    let engine = Engine::open(quiet_config(temp.path())).unwrap();

    engine.put(b"key", b"v1").unwrap();
    engine.put(b"key", b"v2").unwrap();
    assert_eq!(engine.get(b"key").unwrap(), Some(b"v2".to_vec()));

    engine.close().unwrap();
}

#[test]
fn test_delete_makes_key_absent() {
    let temp = TempDir::new().unwrap();
    let engine = Engine::open(quiet_config(temp.path())).unwrap();

    engine.put(b"key", b"value").unwrap();
    engine.delete(b"key").unwrap();
    assert_eq!(engine.get(b"key").unwrap(), None);

    engine.close().unwrap();
}

#[test]
fn test_round_trip_survives_rotation_and_flush() {
    let temp = TempDir::new().unwrap();
    let engine = Engine::open(rotate_always_config(temp.path())).unwrap();

    engine.put(b"key", b"value").unwrap();
    drain_flush_queue(&engine);

    assert_eq!(engine.flush_queue_len(), 0);
    assert!(engine.table_count(0) >= 1);
    assert_eq!(engine.get(b"key").unwrap(), Some(b"value".to_vec()));

    engine.close().unwrap();
}

// =============================================================================
// Tombstone Semantics
// =============================================================================

#[test]
fn test_tombstone_wins_over_deeper_value() {
    let temp = TempDir::new().unwrap();
    let engine = Engine::open(rotate_always_config(temp.path())).unwrap();

    // Old value flushed to level 0 first
    engine.put(b"key", b"old").unwrap();
    drain_flush_queue(&engine);
    assert_eq!(engine.table_count(0), 1);

    // Delete lands in a newer level-0 table
    engine.delete(b"key").unwrap();
    drain_flush_queue(&engine);
    assert_eq!(engine.table_count(0), 2);

    // Recency must win even though an older table still holds the value
    assert_eq!(engine.get(b"key").unwrap(), None);

    engine.close().unwrap();
}

#[test]
fn test_compaction_reclaims_tombstoned_keys() {
    let temp = TempDir::new().unwrap();
    let config = Config::builder()
        .data_dir(temp.path())
        .memtable_size_limit(1)
        .level_base_capacity(1) // compact as soon as level 0 has 2 tables
        .flush_interval(Duration::from_secs(3600))
        .compaction_interval(Duration::from_secs(3600))
        .build();
    let engine = Engine::open(config).unwrap();

    engine.put(b"key", b"value").unwrap();
    engine.delete(b"key").unwrap();
    drain_flush_queue(&engine);
    assert_eq!(engine.table_count(0), 2);

    engine.compact().unwrap();

    // Both the value and its tombstone are gone; the key is simply absent
    assert_eq!(engine.table_count(0), 0);
    assert_eq!(engine.max_level(), None);
    assert_eq!(engine.get(b"key").unwrap(), None);

    engine.close().unwrap();
}

// =============================================================================
// Crash Recovery
// =============================================================================

#[test]
fn test_crash_recovery_replays_wal() {
    let temp = TempDir::new().unwrap();

    {
        let engine = Engine::open(quiet_config(temp.path())).unwrap();
        engine.put(b"a", b"1").unwrap();
        engine.put(b"b", b"2").unwrap();
        engine.put(b"c", b"3").unwrap();
        // Simulated crash: engine dropped without close(), nothing flushed
    }

    let engine = Engine::open(quiet_config(temp.path())).unwrap();
    assert_eq!(engine.get(b"a").unwrap(), Some(b"1".to_vec()));
    assert_eq!(engine.get(b"b").unwrap(), Some(b"2".to_vec()));
    assert_eq!(engine.get(b"c").unwrap(), Some(b"3".to_vec()));

    engine.close().unwrap();
}

#[test]
fn test_crash_recovery_preserves_deletes() {
    let temp = TempDir::new().unwrap();

    {
        let engine = Engine::open(quiet_config(temp.path())).unwrap();
        engine.put(b"key", b"value").unwrap();
        engine.delete(b"key").unwrap();
    }

    let engine = Engine::open(quiet_config(temp.path())).unwrap();
    assert_eq!(engine.get(b"key").unwrap(), None);

    engine.close().unwrap();
}

// =============================================================================
// Orderly Shutdown
// =============================================================================

#[test]
fn test_close_drains_everything_to_disk() {
    let temp = TempDir::new().unwrap();

    {
        let engine = Engine::open(quiet_config(temp.path())).unwrap();
        engine.put(b"key", b"value").unwrap();
        engine.close().unwrap();
    }

    let engine = Engine::open(quiet_config(temp.path())).unwrap();
    // Data now lives in a level-0 table, not just memory
    assert!(engine.table_count(0) >= 1);
    assert_eq!(engine.memtable_entry_count(), 0);
    assert_eq!(engine.get(b"key").unwrap(), Some(b"value".to_vec()));

    engine.close().unwrap();
}

// =============================================================================
// Rotation
// =============================================================================

#[test]
fn test_rotation_starts_fresh_table_and_keeps_data_readable() {
    let temp = TempDir::new().unwrap();
    let config = Config::builder()
        .data_dir(temp.path())
        .memtable_size_limit(128)
        .flush_interval(Duration::from_secs(3600))
        .compaction_interval(Duration::from_secs(3600))
        .build();
    let engine = Engine::open(config).unwrap();

    let mut inserted = 0;
    while engine.flush_queue_len() == 0 {
        let key = format!("key{inserted:04}");
        engine.put(key.as_bytes(), b"some-filler-value").unwrap();
        inserted += 1;
    }

    // A new mutable table took over and the rotated data is still served
    assert!(engine.memtable_size() < 128);
    for i in 0..inserted {
        let key = format!("key{i:04}");
        assert_eq!(
            engine.get(key.as_bytes()).unwrap(),
            Some(b"some-filler-value".to_vec())
        );
    }

    engine.close().unwrap();
}

// =============================================================================
// End-to-End
// =============================================================================

#[test]
fn test_end_to_end_with_deletes_flush_and_compaction() {
    let temp = TempDir::new().unwrap();
    let config = Config::builder()
        .data_dir(temp.path())
        .memtable_size_limit(1024)
        .flush_interval(Duration::from_secs(3600))
        .compaction_interval(Duration::from_secs(3600))
        .build();
    let engine = Engine::open(config).unwrap();

    for i in 0..1000 {
        let key = format!("key{i:04}");
        let value = format!("value{i}");
        engine.put(key.as_bytes(), value.as_bytes()).unwrap();
    }
    for i in (0..1000).step_by(2) {
        let key = format!("key{i:04}");
        engine.delete(key.as_bytes()).unwrap();
    }

    drain_flush_queue(&engine);
    assert!(engine.table_count(0) > 4, "not enough tables to compact");
    engine.compact().unwrap();
    assert!(engine.max_level() >= Some(1));

    for i in 0..1000 {
        let key = format!("key{i:04}");
        let got = engine.get(key.as_bytes()).unwrap();
        if i % 2 == 0 {
            assert_eq!(got, None, "deleted key{i:04} resurfaced");
        } else {
            assert_eq!(got, Some(format!("value{i}").into_bytes()));
        }
    }

    engine.close().unwrap();
}

#[test]
fn test_background_workers_flush_on_their_own() {
    let temp = TempDir::new().unwrap();
    let config = Config::builder()
        .data_dir(temp.path())
        .memtable_size_limit(1)
        .flush_interval(Duration::from_millis(20))
        .compaction_interval(Duration::from_millis(50))
        .build();
    let engine = Engine::open(config).unwrap();

    engine.put(b"key", b"value").unwrap();

    // The flush worker should drain the queue without manual ticks
    let deadline = std::time::Instant::now() + Duration::from_secs(5);
    while engine.flush_queue_len() > 0 {
        assert!(
            std::time::Instant::now() < deadline,
            "flush worker never drained the queue"
        );
        std::thread::sleep(Duration::from_millis(10));
    }

    assert_eq!(engine.get(b"key").unwrap(), Some(b"value".to_vec()));
    engine.close().unwrap();
}

// =============================================================================
// Validation and Diagnostics
// =============================================================================

#[test]
fn test_rejects_empty_key_and_reserved_value() {
    let temp = TempDir::new().unwrap();
    let engine = Engine::open(quiet_config(temp.path())).unwrap();

    assert!(matches!(
        engine.put(b"", b"v"),
        Err(StrataError::InvalidArgument(_))
    ));
    assert!(matches!(
        engine.delete(b""),
        Err(StrataError::InvalidArgument(_))
    ));
    assert!(matches!(
        engine.put(b"k", b"<TOMBSTONE>"),
        Err(StrataError::InvalidArgument(_))
    ));

    engine.close().unwrap();
}

#[test]
fn test_display_state_reports_components() {
    let temp = TempDir::new().unwrap();
    let engine = Engine::open(rotate_always_config(temp.path())).unwrap();

    engine.put(b"shown", b"yes").unwrap();
    drain_flush_queue(&engine);

    let dump = engine.display_state();
    assert!(dump.contains("Active memtable"));
    assert!(dump.contains("Flush queue"));
    assert!(dump.contains("Level 0:"));
    assert!(dump.contains("key: shown, value: yes"));

    engine.close().unwrap();
}
