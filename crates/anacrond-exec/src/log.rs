//! Append-only execution log.
//!
//! One multi-line record per attempt, written with a single `write_all` so a
//! concurrent tail reader never observes a partial record. Readers poll by
//! byte offset; there is no push mechanism.

use std::fs::OpenOptions;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LogError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, LogError>;

const SEPARATOR_WIDTH: usize = 50;
const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// One execution attempt as it appears in the log.
#[derive(Debug, Clone)]
pub struct ExecutionRecord {
    pub timestamp: DateTime<Utc>,
    pub job_id: i64,
    pub command: String,
    /// Full combined output; the log never truncates.
    pub output: String,
    /// None when no process ran (missing script, spawn failure, timeout).
    pub exit_code: Option<i32>,
}

impl ExecutionRecord {
    fn render(&self) -> String {
        let mut text = format!(
            "[{}] Job #{} - {}\n",
            self.timestamp.format(TIME_FORMAT),
            self.job_id,
            self.command
        );
        text.push_str(&format!("Output: {}\n", self.output));
        if let Some(code) = self.exit_code {
            text.push_str(&format!("Exit Code: {code}\n"));
        }
        text.push_str(&"─".repeat(SEPARATOR_WIDTH));
        text.push('\n');
        text
    }
}

/// The shared execution log file.
pub struct ExecutionLog {
    path: PathBuf,
}

impl ExecutionLog {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Append one execution record.
    pub fn append(&self, record: &ExecutionRecord) -> Result<()> {
        self.write_chunk(&record.render())
    }

    /// Append a one-line notice (e.g. a job deletion). The timestamp prefix
    /// matches record headers so line-oriented consumers parse both alike.
    pub fn append_notice(&self, timestamp: DateTime<Utc>, text: &str) -> Result<()> {
        self.write_chunk(&format!("[{}] {}\n", timestamp.format(TIME_FORMAT), text))
    }

    fn write_chunk(&self, chunk: &str) -> Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(chunk.as_bytes())?;
        Ok(())
    }

    /// Current byte length; 0 when the file does not exist yet.
    pub fn len(&self) -> Result<u64> {
        match std::fs::metadata(&self.path) {
            Ok(meta) => Ok(meta.len()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(0),
            Err(e) => Err(e.into()),
        }
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Read everything appended at or after `offset`. Returns the content and
    /// the offset to poll from next.
    pub fn read_from(&self, offset: u64) -> Result<(String, u64)> {
        let mut file = match std::fs::File::open(&self.path) {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok((String::new(), 0)),
            Err(e) => return Err(e.into()),
        };
        let end = file.seek(SeekFrom::End(0))?;
        let start = offset.min(end);
        file.seek(SeekFrom::Start(start))?;
        let mut buf = Vec::new();
        file.read_to_end(&mut buf)?;
        Ok((String::from_utf8_lossy(&buf).into_owned(), end))
    }

    /// Last `count` lines of the log.
    pub fn tail(&self, count: usize) -> Result<Vec<String>> {
        let (content, _) = self.read_from(0)?;
        let lines: Vec<&str> = content.lines().collect();
        let start = lines.len().saturating_sub(count);
        Ok(lines[start..].iter().map(|s| s.to_string()).collect())
    }

    /// Bulk-clear the log. The only mutation besides append.
    pub fn clear(&self) -> Result<()> {
        std::fs::write(&self.path, b"")?;
        Ok(())
    }
}
