//! Append-only transaction log
//!
//! Every balance-changing event gets one timestamped line. Lines are never
//! rewritten or deleted; `tail` reads them back newest first.

use crate::error::Result;
use chrono::Utc;
use parking_lot::Mutex;
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

/// Append-only line sink. `append` must not interleave partial lines with
/// concurrent appends; the mutex in both implementations guarantees that.
pub trait AuditSink: Send + Sync {
    fn append(&self, line: &str) -> Result<()>;
    fn read_all(&self) -> Result<String>;
}

/// File-backed sink. The write is flushed before returning so a line that
/// was reported appended survives a crash right after.
pub struct FileAuditSink {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileAuditSink {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        Ok(Self {
            path,
            lock: Mutex::new(()),
        })
    }
}

impl AuditSink for FileAuditSink {
    fn append(&self, line: &str) -> Result<()> {
        let _guard = self.lock.lock();
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(line.as_bytes())?;
        file.write_all(b"\n")?;
        file.flush()?;
        Ok(())
    }

    fn read_all(&self) -> Result<String> {
        let _guard = self.lock.lock();
        match File::open(&self.path) {
            Ok(mut file) => {
                let mut contents = String::new();
                file.read_to_string(&mut contents)?;
                Ok(contents)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(String::new()),
            Err(e) => Err(e.into()),
        }
    }
}

/// In-memory sink for tests.
#[derive(Default)]
pub struct MemoryAuditSink {
    lines: Mutex<Vec<String>>,
}

impl MemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }
}

impl AuditSink for MemoryAuditSink {
    fn append(&self, line: &str) -> Result<()> {
        self.lines.lock().push(line.to_string());
        Ok(())
    }

    fn read_all(&self) -> Result<String> {
        let lines = self.lines.lock();
        if lines.is_empty() {
            Ok(String::new())
        } else {
            Ok(lines.join("\n") + "\n")
        }
    }
}

/// The transaction log proper: timestamps messages on the way in and serves
/// the newest-first tail the staff log command renders.
pub struct AuditLog {
    sink: Box<dyn AuditSink>,
}

impl AuditLog {
    pub fn new(sink: Box<dyn AuditSink>) -> Self {
        Self { sink }
    }

    /// Append one transaction description. A blank message is a no-op.
    pub fn record(&self, message: &str) -> Result<()> {
        if message.trim().is_empty() {
            return Ok(());
        }
        let line = format!("[{}] {}", Utc::now().to_rfc2822(), message);
        self.sink.append(&line)
    }

    /// The most recent `count` entries, newest first.
    pub fn tail(&self, count: usize) -> Result<Vec<String>> {
        let contents = self.sink.read_all()?;
        Ok(contents
            .lines()
            .filter(|l| !l.is_empty())
            .rev()
            .take(count)
            .map(str::to_string)
            .collect())
    }

    /// Total number of entries. Used by tests to assert the 1:1 pairing of
    /// store writes and audit lines.
    pub fn len(&self) -> Result<usize> {
        let contents = self.sink.read_all()?;
        Ok(contents.lines().filter(|l| !l.is_empty()).count())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }
}
