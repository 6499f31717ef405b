//! Storage layer: balance key-value persistence and the append-only
//! transaction log.

pub mod accounts;
pub mod audit;
pub mod kv;

pub use accounts::AccountStore;
pub use audit::{AuditLog, AuditSink, FileAuditSink, MemoryAuditSink};
pub use kv::{KvStore, MemoryKv, SqliteKv};
