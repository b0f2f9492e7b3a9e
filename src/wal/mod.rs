//! Write-Ahead Log (WAL) Module
//!
//! Provides durability guarantees through append-only logging. Each WAL file
//! belongs to exactly one memtable for that memtable's whole lifetime and is
//! deleted only after the memtable has been durably flushed and the manifest
//! has recorded that fact.
//!
//! ## File Format
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │ Record 1                                    │
//! │ ┌─────────────┬─────┬─────────────┬───────┐ │
//! │ │ KeyLen (4)  │ Key │ ValLen (4)  │ Value │ │
//! │ └─────────────┴─────┴─────────────┴───────┘ │
//! ├─────────────────────────────────────────────┤
//! │ Record 2 ...                                │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! A record truncated by a crash is treated as end-of-log on replay, never as
//! an error.

mod writer;
mod reader;

pub use writer::WalWriter;
pub use reader::WalReader;
