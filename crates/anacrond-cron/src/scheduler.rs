//! Scheduler loop — ticks, evaluates, executes, persists.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use anacrond_exec::{ExecutionLog, ExecutionRecord, Executor};
use anacrond_notify::NotifyDispatcher;
use anacrond_store::JobStore;
use anacrond_types::Notification;

use crate::evaluate::due_jobs;

/// Requests an immediate evaluation pass on a running scheduler. Cheap to
/// clone and hand to the management side.
#[derive(Clone)]
pub struct SchedulerHandle {
    trigger_tx: mpsc::Sender<()>,
}

impl SchedulerHandle {
    /// Ask the loop to run a pass now. While a pass is in flight at most one
    /// follow-up queues; further triggers are dropped.
    pub fn force_run_all(&self) {
        let _ = self.trigger_tx.try_send(());
    }
}

/// The recurring driver: one dedicated task that alternates between waiting
/// (tick or manual trigger) and running a single evaluation pass. Passes
/// never overlap.
pub struct Scheduler {
    store: Arc<JobStore>,
    executor: Arc<Executor>,
    log: Arc<ExecutionLog>,
    notify: NotifyDispatcher,
    tick: Duration,
    trigger_tx: mpsc::Sender<()>,
    trigger_rx: mpsc::Receiver<()>,
}

impl Scheduler {
    pub fn new(
        store: Arc<JobStore>,
        executor: Arc<Executor>,
        log: Arc<ExecutionLog>,
        notify: NotifyDispatcher,
        tick: Duration,
    ) -> Self {
        let (trigger_tx, trigger_rx) = mpsc::channel(1);
        Self {
            store,
            executor,
            log,
            notify,
            tick,
            trigger_tx,
            trigger_rx,
        }
    }

    pub fn handle(&self) -> SchedulerHandle {
        SchedulerHandle {
            trigger_tx: self.trigger_tx.clone(),
        }
    }

    /// Drive passes until the token is cancelled. The first tick fires
    /// immediately, so jobs missed during downtime catch up at startup.
    pub async fn run(mut self, cancel: CancellationToken) {
        info!(tick_secs = self.tick.as_secs(), "scheduler started");
        let mut ticker = tokio::time::interval(self.tick);
        loop {
            let evaluating = tokio::select! {
                _ = cancel.cancelled() => false,
                _ = ticker.tick() => true,
                Some(()) = self.trigger_rx.recv() => true,
            };
            if !evaluating {
                break;
            }
            self.run_pass().await;
        }
        info!("scheduler stopped");
    }

    /// One evaluation pass: fresh store snapshot, evaluate, then execute,
    /// log, persist run state, and notify for each due job. No store lock is
    /// held while a command runs.
    pub async fn run_pass(&self) {
        let now = Utc::now();
        let snapshot = match self.store.snapshot() {
            Ok(s) => s,
            Err(e) => {
                warn!("skipping pass, could not read job store: {e}");
                return;
            }
        };

        let due = due_jobs(now, &snapshot.jobs, &snapshot.run_state);
        if due.is_empty() {
            return;
        }
        info!(count = due.len(), "executing due jobs");

        for job in due {
            info!(job_id = job.id, command = %job.command, "executing job");
            let report = self.executor.run(&job).await;

            let record = ExecutionRecord {
                timestamp: now,
                job_id: job.id,
                command: job.command.clone(),
                output: report.output.clone(),
                exit_code: report.exit_code,
            };
            if let Err(e) = self.log.append(&record) {
                warn!(job_id = job.id, "could not append execution record: {e}");
            }

            if !report.attempted() {
                // Missing script: nothing ran, run state stays untouched so
                // the job is retried next tick.
                continue;
            }

            // The attempt is stamped with the pass's evaluation time. A
            // failed write means the job re-runs sooner than necessary,
            // which beats never running it.
            if let Err(e) = self.store.mark_attempt(job.id, now) {
                warn!(job_id = job.id, "could not persist run state: {e}");
            }

            if job.notifications_enabled {
                self.notify
                    .dispatch(Notification::new(&job, now, &report.output, report.success()));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anacrond_notify::Notifier;
    use anacrond_store::NewJob;
    use async_trait::async_trait;
    use chrono::{DateTime, Duration as ChronoDuration};
    use std::path::PathBuf;
    use std::sync::Mutex;

    struct RecordingNotifier {
        seen: Mutex<Vec<Notification>>,
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn notify(&self, n: Notification) {
            self.seen.lock().unwrap().push(n);
        }
    }

    struct Fixture {
        store: Arc<JobStore>,
        log: Arc<ExecutionLog>,
        notifier: Arc<RecordingNotifier>,
        scheduler: Scheduler,
        _dir: tempfile::TempDir,
    }

    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(JobStore::open_in_memory().unwrap());
        let log = Arc::new(ExecutionLog::new(dir.path().join("output.log")));
        let executor = Arc::new(Executor::new(
            dir.path().join("scripts"),
            Some(PathBuf::from("/bin/sh")),
            Duration::from_secs(10),
        ));
        let notifier = Arc::new(RecordingNotifier {
            seen: Mutex::new(Vec::new()),
        });
        let notify = NotifyDispatcher::start(notifier.clone(), 1, 16);
        let scheduler = Scheduler::new(store.clone(), executor, log.clone(), notify, Duration::from_secs(60));
        Fixture {
            store,
            log,
            notifier,
            scheduler,
            _dir: dir,
        }
    }

    fn add_job(store: &JobStore, command: &str, notifications: bool) -> i64 {
        store
            .insert_job(
                &NewJob {
                    schedule: "0 0 * * *".into(),
                    command: command.into(),
                    interval_days: 1,
                    notifications_enabled: notifications,
                },
                Utc::now(),
            )
            .unwrap()
            .id
    }

    #[tokio::test]
    async fn test_pass_executes_and_persists() {
        let f = fixture();
        let id = add_job(&f.store, "echo pass-ran", true);

        let before = Utc::now();
        f.scheduler.run_pass().await;

        let stored = f.store.last_attempt(id).unwrap().unwrap();
        let stamped: DateTime<Utc> = stored.parse().unwrap();
        assert!(stamped >= before - ChronoDuration::seconds(1));

        let (content, _) = f.log.read_from(0).unwrap();
        assert!(content.contains(&format!("Job #{id}")));
        assert!(content.contains("pass-ran"));
        assert!(content.contains("Exit Code: 0"));

        tokio::time::sleep(Duration::from_millis(100)).await;
        let seen = f.notifier.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert!(seen[0].success);
        assert_eq!(seen[0].job_id, id);
    }

    #[tokio::test]
    async fn test_job_not_rerun_until_interval_elapses() {
        let f = fixture();
        add_job(&f.store, "echo once", false);

        f.scheduler.run_pass().await;
        let (_, after_first) = f.log.read_from(0).unwrap();

        f.scheduler.run_pass().await;
        let (new_content, _) = f.log.read_from(after_first).unwrap();
        assert!(new_content.is_empty());
    }

    #[tokio::test]
    async fn test_missing_script_leaves_run_state_untouched() {
        let f = fixture();
        let id = add_job(&f.store, "missing.py", true);

        f.scheduler.run_pass().await;

        assert!(f.store.last_attempt(id).unwrap().is_none());
        let (content, _) = f.log.read_from(0).unwrap();
        assert!(content.contains("Script not found: missing.py"));
        assert!(!content.contains("Exit Code:"));

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(f.notifier.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failed_command_notifies_failure_and_counts_attempt() {
        let f = fixture();
        let id = add_job(&f.store, "exit 2", true);

        f.scheduler.run_pass().await;

        assert!(f.store.last_attempt(id).unwrap().is_some());
        let (content, _) = f.log.read_from(0).unwrap();
        assert!(content.contains("Exit Code: 2"));

        tokio::time::sleep(Duration::from_millis(100)).await;
        let seen = f.notifier.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert!(!seen[0].success);
    }

    #[tokio::test]
    async fn test_run_state_stamped_at_evaluation_time() {
        let f = fixture();
        let id = add_job(&f.store, "sleep 1", false);

        let before = Utc::now();
        f.scheduler.run_pass().await;
        let after = Utc::now();
        assert!((after - before).num_milliseconds() >= 900);

        let stamped: DateTime<Utc> = f
            .store
            .last_attempt(id)
            .unwrap()
            .unwrap()
            .parse()
            .unwrap();
        // Stamped when the pass evaluated, not after the command finished.
        assert!((stamped - before).num_milliseconds().abs() < 500);
    }

    #[tokio::test]
    async fn test_one_failure_does_not_stop_the_pass() {
        let f = fixture();
        add_job(&f.store, "exit 1", false);
        let ok_id = add_job(&f.store, "echo still-runs", false);

        f.scheduler.run_pass().await;

        let (content, _) = f.log.read_from(0).unwrap();
        assert!(content.contains("still-runs"));
        assert!(f.store.last_attempt(ok_id).unwrap().is_some());
    }

    #[tokio::test]
    async fn test_loop_runs_startup_pass_and_honours_trigger() {
        let f = fixture();
        let id = add_job(&f.store, "echo looped", false);

        let handle = f.scheduler.handle();
        let store = f.store.clone();
        let cancel = CancellationToken::new();
        let task = tokio::spawn(f.scheduler.run(cancel.clone()));

        // First tick is immediate; wait for the startup pass to land.
        tokio::time::sleep(Duration::from_millis(300)).await;
        assert!(store.last_attempt(id).unwrap().is_some());

        // Clear run state, then force a pass through the handle.
        store.put_run_state(&id.to_string(), "garbage").unwrap();
        handle.force_run_all();
        tokio::time::sleep(Duration::from_millis(300)).await;
        let stored = store.last_attempt(id).unwrap().unwrap();
        assert!(stored.parse::<DateTime<Utc>>().is_ok());

        cancel.cancel();
        task.await.unwrap();
    }
}
