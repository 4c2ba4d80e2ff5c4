//! anacrond-store: SQLite-backed job and run-state persistence.
//!
//! One database holds the `jobs` table and the `run_state` map (job id →
//! last attempted execution time). Run-state values are stored and returned
//! as opaque text; parsing happens at evaluation time so a corrupt value
//! degrades to "due now" instead of failing a pass.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use rusqlite::Connection;
use thiserror::Error;
use tracing::warn;

use anacrond_types::{Job, JobStatus};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// Job fields before the store assigns an id.
#[derive(Debug, Clone)]
pub struct NewJob {
    pub schedule: String,
    pub command: String,
    pub interval_days: u32,
    pub notifications_enabled: bool,
}

/// A consistent read of everything a scheduler pass needs.
#[derive(Debug, Clone)]
pub struct StoreSnapshot {
    pub jobs: Vec<Job>,
    /// job id (string key) → last attempted execution time, unparsed.
    pub run_state: HashMap<String, String>,
}

/// Persistent storage for jobs and run state.
pub struct JobStore {
    conn: Mutex<Connection>,
}

const SCHEMA: &str = "PRAGMA journal_mode = WAL;

     CREATE TABLE IF NOT EXISTS jobs (
         id INTEGER PRIMARY KEY AUTOINCREMENT,
         schedule TEXT NOT NULL,
         command TEXT NOT NULL,
         interval_days INTEGER NOT NULL,
         notifications_enabled INTEGER NOT NULL DEFAULT 1,
         status TEXT NOT NULL DEFAULT 'active',
         created_at TEXT NOT NULL
     );

     CREATE TABLE IF NOT EXISTS run_state (
         job_id TEXT PRIMARY KEY,
         last_attempt TEXT NOT NULL
     );";

impl JobStore {
    /// Open or create the store. An unreadable database file is moved aside
    /// and replaced with a fresh empty one; scheduling must not be blocked by
    /// a bad file.
    pub fn open(db_path: &Path) -> Result<Self> {
        match Self::open_at(db_path) {
            Ok(store) => Ok(store),
            Err(e) => {
                let backup = db_path.with_extension("db.corrupt");
                warn!(
                    "Job database unreadable ({e}); moving it to {} and starting empty",
                    backup.display()
                );
                std::fs::rename(db_path, &backup)?;
                Self::open_at(db_path)
            }
        }
    }

    fn open_at(db_path: &Path) -> Result<Self> {
        let conn = Connection::open(db_path)?;
        // Runs the first real reads/writes, so garbage files surface here.
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open an in-memory store (for testing).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    // ─── Jobs ───────────────────────────────────

    /// Insert a job and return it with its assigned id.
    pub fn insert_job(&self, new: &NewJob, created_at: DateTime<Utc>) -> Result<Job> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO jobs (schedule, command, interval_days, notifications_enabled, status, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            rusqlite::params![
                new.schedule,
                new.command,
                new.interval_days,
                new.notifications_enabled as i64,
                JobStatus::Active.as_str(),
                created_at.to_rfc3339(),
            ],
        )?;
        let id = conn.last_insert_rowid();
        Ok(Job {
            id,
            schedule: new.schedule.clone(),
            command: new.command.clone(),
            interval_days: new.interval_days,
            notifications_enabled: new.notifications_enabled,
            status: JobStatus::Active,
            created_at,
        })
    }

    /// List all jobs in id order.
    pub fn list_jobs(&self) -> Result<Vec<Job>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, schedule, command, interval_days, notifications_enabled, status, created_at
             FROM jobs ORDER BY id",
        )?;
        let jobs = stmt
            .query_map([], row_to_job)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(jobs)
    }

    /// Get a job by id.
    pub fn get_job(&self, id: i64) -> Result<Option<Job>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, schedule, command, interval_days, notifications_enabled, status, created_at
             FROM jobs WHERE id = ?1",
        )?;
        match stmt.query_row(rusqlite::params![id], row_to_job) {
            Ok(job) => Ok(Some(job)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Update a job's scheduling status.
    pub fn set_status(&self, id: i64, status: JobStatus) -> Result<bool> {
        let conn = self.conn.lock().unwrap();
        let count = conn.execute(
            "UPDATE jobs SET status = ?1 WHERE id = ?2",
            rusqlite::params![status.as_str(), id],
        )?;
        Ok(count > 0)
    }

    /// Delete a job and its run-state entry. Leaving the run-state row behind
    /// would resurrect stale timing if the id were ever reused.
    pub fn delete_job(&self, id: i64) -> Result<bool> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;
        let count = tx.execute("DELETE FROM jobs WHERE id = ?1", rusqlite::params![id])?;
        tx.execute(
            "DELETE FROM run_state WHERE job_id = ?1",
            rusqlite::params![id.to_string()],
        )?;
        tx.commit()?;
        Ok(count > 0)
    }

    // ─── Run State ───────────────────────────────────

    /// Record an attempted execution at the given time.
    pub fn mark_attempt(&self, id: i64, at: DateTime<Utc>) -> Result<()> {
        self.put_run_state(&id.to_string(), &at.to_rfc3339())
    }

    /// Write a raw run-state value. Values are opaque to the store.
    pub fn put_run_state(&self, key: &str, value: &str) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT OR REPLACE INTO run_state (job_id, last_attempt) VALUES (?1, ?2)",
            rusqlite::params![key, value],
        )?;
        Ok(())
    }

    /// Last attempted execution time for a job, unparsed.
    pub fn last_attempt(&self, id: i64) -> Result<Option<String>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt =
            conn.prepare("SELECT last_attempt FROM run_state WHERE job_id = ?1")?;
        match stmt.query_row(rusqlite::params![id.to_string()], |row| row.get(0)) {
            Ok(value) => Ok(Some(value)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Read all jobs plus the run-state map in one lock acquisition.
    pub fn snapshot(&self) -> Result<StoreSnapshot> {
        let conn = self.conn.lock().unwrap();

        let mut stmt = conn.prepare(
            "SELECT id, schedule, command, interval_days, notifications_enabled, status, created_at
             FROM jobs ORDER BY id",
        )?;
        let jobs = stmt
            .query_map([], row_to_job)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let mut stmt = conn.prepare("SELECT job_id, last_attempt FROM run_state")?;
        let run_state = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<std::result::Result<HashMap<String, String>, _>>()?;

        Ok(StoreSnapshot { jobs, run_state })
    }
}

fn row_to_job(row: &rusqlite::Row<'_>) -> std::result::Result<Job, rusqlite::Error> {
    Ok(Job {
        id: row.get(0)?,
        schedule: row.get(1)?,
        command: row.get(2)?,
        interval_days: row.get::<_, i64>(3)?.max(1) as u32,
        notifications_enabled: row.get::<_, i64>(4)? != 0,
        status: JobStatus::parse(&row.get::<_, String>(5)?),
        created_at: row
            .get::<_, String>(6)?
            .parse()
            .unwrap_or_else(|_| Utc::now()),
    })
}
