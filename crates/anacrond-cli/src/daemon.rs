//! Daemon wiring — builds the scheduling stack from configuration and runs
//! it until shutdown.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::info;

use anacrond_config::Config;
use anacrond_cron::Scheduler;
use anacrond_exec::{ExecutionLog, Executor};
use anacrond_notify::{NotifyDispatcher, TracingNotifier};
use anacrond_store::JobStore;

fn build_scheduler(config: &Config) -> anyhow::Result<Scheduler> {
    anacrond_config::ensure_data_dir(config)?;
    let store = Arc::new(JobStore::open(&config.db_path()?)?);
    let log = Arc::new(ExecutionLog::new(config.log_path()?));
    let executor = Arc::new(Executor::new(
        config.script_dir()?,
        config.interpreter.clone(),
        Duration::from_secs(config.exec_timeout_secs),
    ));
    let notify = NotifyDispatcher::start(
        Arc::new(TracingNotifier),
        config.notify.workers,
        config.notify.queue_size,
    );
    Ok(Scheduler::new(
        store,
        executor,
        log,
        notify,
        Duration::from_secs(config.tick_secs),
    ))
}

/// Run the scheduler loop until ctrl-c.
pub async fn run(config: Config) -> anyhow::Result<()> {
    let scheduler = build_scheduler(&config)?;

    let cancel = CancellationToken::new();
    let ctrl_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("shutdown requested");
            ctrl_cancel.cancel();
        }
    });

    scheduler.run(cancel).await;
    Ok(())
}

/// Run one forced evaluation pass and return.
pub async fn run_once(config: Config) -> anyhow::Result<()> {
    let scheduler = build_scheduler(&config)?;
    scheduler.run_pass().await;
    // Notifications are fire-and-forget; give the workers a moment before
    // the process exits.
    tokio::time::sleep(Duration::from_millis(250)).await;
    Ok(())
}
