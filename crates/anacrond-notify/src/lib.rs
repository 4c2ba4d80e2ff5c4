//! anacrond-notify: fire-and-forget execution notifications.
//!
//! Outcomes are pushed through a bounded queue drained by a small fixed pool
//! of workers. Delivery is best-effort: a full queue or a failing backend
//! drops the notification with a warning and never stalls the scheduler.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, mpsc};
use tracing::{debug, info, warn};

use anacrond_types::Notification;

/// Delivery backend for execution notifications (mail, webhook, ...).
///
/// Use `&self` — implementations hold their own state behind interior
/// mutability.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, notification: Notification);
}

/// Notifier that records outcomes to the tracing log. The default backend
/// when no outbound delivery channel is configured.
pub struct TracingNotifier;

#[async_trait]
impl Notifier for TracingNotifier {
    async fn notify(&self, n: Notification) {
        info!(
            job_id = n.job_id,
            command = %n.command,
            success = n.success,
            executed_at = %n.executed_at,
            "job execution notification"
        );
    }
}

/// Enqueue side of the notification pipeline. Cheap to clone.
#[derive(Clone)]
pub struct NotifyDispatcher {
    tx: mpsc::Sender<Notification>,
}

impl NotifyDispatcher {
    /// Spawn `workers` tasks draining a bounded queue into the notifier.
    pub fn start(notifier: Arc<dyn Notifier>, workers: usize, queue_size: usize) -> Self {
        let (tx, rx) = mpsc::channel(queue_size.max(1));
        let rx = Arc::new(Mutex::new(rx));
        for worker in 0..workers.max(1) {
            let rx = rx.clone();
            let notifier = notifier.clone();
            tokio::spawn(async move {
                loop {
                    // The receiver lock is released before delivery, so slow
                    // sends on one worker don't serialize the others.
                    let next = rx.lock().await.recv().await;
                    match next {
                        Some(n) => notifier.notify(n).await,
                        None => break,
                    }
                }
                debug!(worker, "notify worker stopped");
            });
        }
        Self { tx }
    }

    /// Enqueue without blocking. A full queue drops the notification.
    pub fn dispatch(&self, notification: Notification) {
        match self.tx.try_send(notification) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(n)) => {
                warn!(job_id = n.job_id, "notification queue full, dropping");
            }
            Err(mpsc::error::TrySendError::Closed(n)) => {
                warn!(job_id = n.job_id, "notification workers gone, dropping");
            }
        }
    }
}
