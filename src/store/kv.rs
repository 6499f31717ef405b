//! Balance persistence collaborator
//!
//! A minimal key-value contract: `set` is durable before it returns and
//! `keys` reflects every prior `set`. The sqlite implementation backs the
//! real service; the in-memory one is injected by tests and ephemeral runs.

use crate::error::Result;
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::BTreeMap;

pub trait KvStore: Send + Sync {
    /// Stored value for `key`, or `None` if never written.
    fn get(&self, key: &str) -> Result<Option<i64>>;
    /// Write `value` under `key`; durable once this returns Ok.
    fn set(&self, key: &str, value: i64) -> Result<()>;
    /// Every key that has ever been written, in a stable order.
    fn keys(&self) -> Result<Vec<String>>;
}

/// Sqlite-backed store: one `balances` table, connection behind a mutex so a
/// transfer's two writes cannot interleave with another caller's.
pub struct SqliteKv {
    conn: Mutex<Connection>,
}

impl SqliteKv {
    pub fn open(db_path: &str) -> Result<Self> {
        let conn = Connection::open(db_path)?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS balances (
                userid TEXT PRIMARY KEY,
                balance INTEGER NOT NULL DEFAULT 0
            )",
            [],
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// In-memory sqlite database, used by tests that want the real SQL path.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS balances (
                userid TEXT PRIMARY KEY,
                balance INTEGER NOT NULL DEFAULT 0
            )",
            [],
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

impl KvStore for SqliteKv {
    fn get(&self, key: &str) -> Result<Option<i64>> {
        let conn = self.conn.lock();
        let value = conn
            .query_row(
                "SELECT balance FROM balances WHERE userid = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    fn set(&self, key: &str, value: i64) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO balances (userid, balance) VALUES (?1, ?2)
             ON CONFLICT(userid) DO UPDATE SET balance = excluded.balance",
            params![key, value],
        )?;
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare("SELECT userid FROM balances ORDER BY rowid")?;
        let keys = stmt
            .query_map([], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(keys)
    }
}

/// HashMap-backed fake with the same durability contract, minus the disk.
#[derive(Default)]
pub struct MemoryKv {
    // BTreeMap keeps enumeration order stable across runs.
    inner: Mutex<BTreeMap<String, i64>>,
}

impl MemoryKv {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KvStore for MemoryKv {
    fn get(&self, key: &str) -> Result<Option<i64>> {
        Ok(self.inner.lock().get(key).copied())
    }

    fn set(&self, key: &str, value: i64) -> Result<()> {
        self.inner.lock().insert(key.to_string(), value);
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>> {
        Ok(self.inner.lock().keys().cloned().collect())
    }
}
