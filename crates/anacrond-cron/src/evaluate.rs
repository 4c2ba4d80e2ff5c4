//! Due-job evaluation — pure catch-up arithmetic over a store snapshot.

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use anacrond_types::{Job, JobStatus};

/// Compute the jobs due at `now`, in store (id) order.
///
/// A job is due when it has never been attempted, when its recorded attempt
/// time does not parse (a corrupt value must never block scheduling), or
/// when at least `interval_days` whole days have elapsed since the last
/// attempt. Pure: persisting updated run state is the caller's job.
pub fn due_jobs(
    now: DateTime<Utc>,
    jobs: &[Job],
    run_state: &HashMap<String, String>,
) -> Vec<Job> {
    jobs.iter()
        .filter(|job| {
            job.status == JobStatus::Active
                && is_due(now, job, run_state.get(&job.state_key()).map(String::as_str))
        })
        .cloned()
        .collect()
}

fn is_due(now: DateTime<Utc>, job: &Job, last_attempt: Option<&str>) -> bool {
    let Some(raw) = last_attempt else {
        return true;
    };
    match raw.parse::<DateTime<Utc>>() {
        Ok(last) => (now - last).num_days() >= i64::from(job.interval_days),
        // Corrupt run state reads as overdue, never as an error.
        Err(_) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn job(id: i64, interval_days: u32, status: JobStatus) -> Job {
        Job {
            id,
            schedule: "0 0 * * *".into(),
            command: format!("job-{id}"),
            interval_days,
            notifications_enabled: false,
            status,
            created_at: Utc::now(),
        }
    }

    fn state_of(entries: &[(i64, &str)]) -> HashMap<String, String> {
        entries
            .iter()
            .map(|(id, ts)| (id.to_string(), ts.to_string()))
            .collect()
    }

    #[test]
    fn test_never_run_is_due() {
        let jobs = vec![job(1, 30, JobStatus::Active)];
        let due = due_jobs(Utc::now(), &jobs, &HashMap::new());
        assert_eq!(due.len(), 1);
    }

    #[test]
    fn test_boundary_at_interval() {
        let now = Utc::now();
        let jobs = vec![job(1, 3, JobStatus::Active)];

        let fresh = state_of(&[(1, &(now - Duration::days(2)).to_rfc3339())]);
        assert!(due_jobs(now, &jobs, &fresh).is_empty());

        let stale = state_of(&[(1, &(now - Duration::days(3)).to_rfc3339())]);
        assert_eq!(due_jobs(now, &jobs, &stale).len(), 1);
    }

    #[test]
    fn test_partial_day_does_not_count() {
        // 23 hours elapsed is still zero whole days.
        let now = Utc::now();
        let jobs = vec![job(1, 1, JobStatus::Active)];
        let state = state_of(&[(1, &(now - Duration::hours(23)).to_rfc3339())]);
        assert!(due_jobs(now, &jobs, &state).is_empty());
    }

    #[test]
    fn test_corrupt_timestamp_is_due() {
        let jobs = vec![job(1, 7, JobStatus::Active)];
        let state = state_of(&[(1, "last tuesday-ish")]);
        assert_eq!(due_jobs(Utc::now(), &jobs, &state).len(), 1);
    }

    #[test]
    fn test_disabled_never_due() {
        let jobs = vec![job(1, 1, JobStatus::Disabled)];
        assert!(due_jobs(Utc::now(), &jobs, &HashMap::new()).is_empty());
    }

    #[test]
    fn test_long_downtime_yields_single_catchup_run() {
        // A year offline produces one due evaluation, not 365 queued runs.
        let now = Utc::now();
        let jobs = vec![job(1, 1, JobStatus::Active)];
        let state = state_of(&[(1, &(now - Duration::days(365)).to_rfc3339())]);
        assert_eq!(due_jobs(now, &jobs, &state).len(), 1);
    }

    #[test]
    fn test_idempotent_without_state_change() {
        let now = Utc::now();
        let jobs = vec![
            job(1, 1, JobStatus::Active),
            job(2, 5, JobStatus::Active),
            job(3, 1, JobStatus::Disabled),
        ];
        let state = state_of(&[
            (1, &(now - Duration::days(2)).to_rfc3339()),
            (2, &(now - Duration::days(2)).to_rfc3339()),
        ]);

        let first = due_jobs(now, &jobs, &state);
        let second = due_jobs(now, &jobs, &state);
        assert_eq!(
            first.iter().map(|j| j.id).collect::<Vec<_>>(),
            second.iter().map(|j| j.id).collect::<Vec<_>>()
        );
        assert_eq!(first.iter().map(|j| j.id).collect::<Vec<_>>(), vec![1]);
    }

    #[test]
    fn test_store_order_preserved() {
        let now = Utc::now();
        let jobs = vec![
            job(2, 1, JobStatus::Active),
            job(5, 1, JobStatus::Active),
            job(9, 1, JobStatus::Active),
        ];
        let due = due_jobs(now, &jobs, &HashMap::new());
        assert_eq!(due.iter().map(|j| j.id).collect::<Vec<_>>(), vec![2, 5, 9]);
    }
}
