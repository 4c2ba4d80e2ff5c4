//! Job management — the interface the job-definition collaborator consumes.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;
use tracing::{info, warn};

use anacrond_exec::{ExecutionLog, Executor, list_scripts, script_exists};
use anacrond_store::{JobStore, NewJob, StoreError};
use anacrond_types::{Job, JobStatus};

use crate::schedule::{ScheduleError, interval_days};

#[derive(Debug, Error)]
pub enum ManageError {
    #[error(transparent)]
    Schedule(#[from] ScheduleError),
    #[error("script '{0}' not found in the script directory")]
    ScriptMissing(String),
    #[error("no job with id {0}")]
    UnknownJob(i64),
    #[error("persistence failure: {0}")]
    Store(#[from] StoreError),
}

/// Create/delete/toggle jobs against the store. Every call goes straight to
/// the store (serialized internally), so management interleaves safely with
/// a running scheduler.
pub struct JobManager {
    store: Arc<JobStore>,
    log: Arc<ExecutionLog>,
    script_dir: PathBuf,
}

impl JobManager {
    pub fn new(store: Arc<JobStore>, log: Arc<ExecutionLog>, script_dir: PathBuf) -> Self {
        Self {
            store,
            log,
            script_dir,
        }
    }

    /// Validate and create a job. The schedule must translate (wrong field
    /// counts never enter the store) and script commands must name an
    /// existing script.
    pub fn create_job(
        &self,
        schedule: &str,
        command: &str,
        notifications_enabled: bool,
    ) -> Result<Job, ManageError> {
        let interval = interval_days(schedule)?;
        if Executor::is_script(command) && !script_exists(&self.script_dir, command) {
            return Err(ManageError::ScriptMissing(command.to_string()));
        }

        let job = self.store.insert_job(
            &NewJob {
                schedule: schedule.to_string(),
                command: command.to_string(),
                interval_days: interval,
                notifications_enabled,
            },
            Utc::now(),
        )?;
        info!(
            job_id = job.id,
            schedule,
            command,
            interval_days = interval,
            "job created"
        );
        Ok(job)
    }

    /// Delete a job and its run state, leaving a notice in the execution log.
    pub fn delete_job(&self, id: i64) -> Result<Job, ManageError> {
        let job = self
            .store
            .get_job(id)?
            .ok_or(ManageError::UnknownJob(id))?;
        self.store.delete_job(id)?;

        let notice = format!(
            "Job #{} DELETED - Schedule: {}, Command: {}",
            job.id, job.schedule, job.command
        );
        if let Err(e) = self.log.append_notice(Utc::now(), &notice) {
            warn!(job_id = job.id, "could not log job deletion: {e}");
        }
        info!(job_id = job.id, "job deleted");
        Ok(job)
    }

    /// Toggle a job between `active` and `disabled`.
    pub fn set_enabled(&self, id: i64, enabled: bool) -> Result<(), ManageError> {
        let status = if enabled {
            JobStatus::Active
        } else {
            JobStatus::Disabled
        };
        if self.store.set_status(id, status)? {
            info!(job_id = id, status = status.as_str(), "job status changed");
            Ok(())
        } else {
            Err(ManageError::UnknownJob(id))
        }
    }

    pub fn list_jobs(&self) -> Result<Vec<Job>, ManageError> {
        Ok(self.store.list_jobs()?)
    }

    pub fn get_job(&self, id: i64) -> Result<Option<Job>, ManageError> {
        Ok(self.store.get_job(id)?)
    }

    /// Validation query for the job-creation form.
    pub fn script_exists(&self, name: &str) -> bool {
        script_exists(&self.script_dir, name)
    }

    /// Scripts available for scheduling.
    pub fn scripts(&self) -> Vec<String> {
        list_scripts(&self.script_dir)
    }
}
