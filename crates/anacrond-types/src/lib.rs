use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ──────────────────── Job Types ────────────────────

/// Whether a job participates in scheduling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Evaluated on every scheduler pass.
    Active,
    /// Kept in the store but never due.
    Disabled,
}

impl JobStatus {
    /// Storage representation (`jobs.status` column).
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Active => "active",
            JobStatus::Disabled => "disabled",
        }
    }

    /// Parse the storage representation. Unknown values degrade to `Active`,
    /// matching the store's historical default.
    pub fn parse(s: &str) -> Self {
        match s {
            "disabled" => JobStatus::Disabled,
            _ => JobStatus::Active,
        }
    }
}

/// A scheduled job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    /// Store-assigned integer id.
    pub id: i64,
    /// Five-field cron-style schedule (e.g. "0 0 15 * *").
    pub schedule: String,
    /// Script filename (run from the script directory) or a raw shell
    /// command line.
    pub command: String,
    /// Minimum days between runs, derived from `schedule` at creation.
    pub interval_days: u32,
    /// Whether execution outcomes are pushed to the notifier.
    pub notifications_enabled: bool,
    /// Scheduling status.
    pub status: JobStatus,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

impl Job {
    /// Run-state key for this job.
    pub fn state_key(&self) -> String {
        self.id.to_string()
    }
}

// ──────────────────── Notification Types ────────────────────

/// Output preview limit for outbound notifications. The execution log keeps
/// the full output.
pub const NOTIFY_OUTPUT_LIMIT: usize = 500;

/// Payload handed to the notifier after an attempted execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub job_id: i64,
    pub schedule: String,
    pub command: String,
    pub executed_at: DateTime<Utc>,
    /// Combined output, truncated to [`NOTIFY_OUTPUT_LIMIT`] characters.
    pub output: String,
    pub success: bool,
}

impl Notification {
    /// Build a notification for a finished attempt, truncating the output
    /// preview.
    pub fn new(job: &Job, executed_at: DateTime<Utc>, output: &str, success: bool) -> Self {
        let truncated = output.chars().count() > NOTIFY_OUTPUT_LIMIT;
        let mut preview: String = output.chars().take(NOTIFY_OUTPUT_LIMIT).collect();
        if truncated {
            preview.push_str("...");
        }
        Self {
            job_id: job.id,
            schedule: job.schedule.clone(),
            command: job.command.clone(),
            executed_at,
            output: preview,
            success,
        }
    }
}
