//! # StrataKV
//!
//! An embedded, single-process key-value storage engine with:
//! - Log-structured merge (LSM) architecture
//! - Write-Ahead Logging (WAL) for durability
//! - Crash recovery with partial write handling
//! - Leveled background compaction
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        Engine                               │
//! │               put / get / delete / close                    │
//! └───────┬─────────────────────────────────────────┬───────────┘
//!         │ writes                                  │ reads
//! ┌───────▼───────────┐                     ┌───────▼───────────┐
//! │  MemtableManager  │                     │  StorageManager   │
//! │ (active + queue)  │                     │ (level fan-out)   │
//! └───┬───────────┬───┘                     └───────┬───────────┘
//!     │           │                                 │
//! ┌───▼────┐ ┌────▼─────┐   flush / compact ┌───────▼───────────┐
//! │  WAL   │ │ MemTable │ ─────────────────▶│     Manifest      │
//! │(append)│ │ (BTree)  │    (Compactor)    │ (levels, SSTables)│
//! └────────┘ └──────────┘                   └───────────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod wal;
pub mod memtable;
pub mod storage;
pub mod manifest;
pub mod compaction;
pub mod engine;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{Result, StrataError};
pub use config::Config;
pub use engine::Engine;
pub use memtable::TOMBSTONE;

// =============================================================================
// Version Info
// =============================================================================

/// Current version of StrataKV
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
