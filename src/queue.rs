use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use futures_util::FutureExt;
use serde::Serialize;
use tokio::sync::{Semaphore, mpsc, watch};
use tracing::{debug, error, info};

use crate::error::DispatchError;
use crate::types::Platform;

/// Default number of jobs allowed to run at the same time.
pub const DEFAULT_QUEUE_CONCURRENCY: usize = 2;

type JobFuture = Pin<Box<dyn Future<Output = Result<(), DispatchError>> + Send>>;

/// One delivery attempt to one platform.
pub struct NotificationJob {
    pub platform: Platform,
    /// Short description used in logs (kind and event id).
    pub label: String,
    /// Serialized event, logged when the job fails.
    pub payload: String,
    task: JobFuture,
}

impl NotificationJob {
    pub fn new<F>(platform: Platform, label: String, payload: String, task: F) -> Self
    where
        F: Future<Output = Result<(), DispatchError>> + Send + 'static,
    {
        Self {
            platform,
            label,
            payload,
            task: Box::pin(task),
        }
    }
}

/// Delivery counters exposed on the status route.
#[derive(Debug, Clone, Default, Serialize)]
pub struct NotifyStatus {
    pub total_notified: u64,
    pub total_failed: u64,
    pub last_notified: Option<DateTime<Utc>>,
}

struct Shared {
    pending: watch::Sender<usize>,
    status: Mutex<NotifyStatus>,
}

impl Shared {
    fn record(&self, ok: bool) {
        let mut status = self.status.lock().unwrap_or_else(|e| e.into_inner());
        if ok {
            status.total_notified += 1;
            status.last_notified = Some(Utc::now());
        } else {
            status.total_failed += 1;
        }
    }
}

/// Process-wide FIFO queue of notification jobs with a concurrency bound.
///
/// Jobs start in submission order; at most `concurrency` run at once.
/// Completion order is unspecified. A job that errors or panics is logged and
/// dropped without affecting the queue or other jobs. Cloning yields another
/// handle to the same queue.
#[derive(Clone)]
pub struct DispatchQueue {
    sender: mpsc::UnboundedSender<NotificationJob>,
    shared: Arc<Shared>,
    concurrency: usize,
}

impl DispatchQueue {
    /// Start the queue runner. Must be called from within a tokio runtime.
    pub fn new(concurrency: usize) -> Self {
        let concurrency = concurrency.max(1);
        let (sender, receiver) = mpsc::unbounded_channel();
        let (pending, _) = watch::channel(0usize);
        let shared = Arc::new(Shared {
            pending,
            status: Mutex::new(NotifyStatus::default()),
        });
        let semaphore = Arc::new(Semaphore::new(concurrency));
        tokio::spawn(run_queue(receiver, semaphore, shared.clone()));
        info!("Notification queue started (concurrency: {concurrency})");
        Self {
            sender,
            shared,
            concurrency,
        }
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Submit a job. Returns as soon as the job is queued.
    pub fn push(&self, job: NotificationJob) {
        self.shared.pending.send_modify(|n| *n += 1);
        if let Err(mpsc::error::SendError(job)) = self.sender.send(job) {
            self.shared.pending.send_modify(|n| *n -= 1);
            error!(
                platform = %job.platform,
                job = %job.label,
                "Notification queue closed, dropping job"
            );
        }
    }

    /// Number of jobs queued or running.
    pub fn pending(&self) -> usize {
        *self.shared.pending.borrow()
    }

    /// Wait until every submitted job has finished.
    pub async fn idle(&self) {
        let mut rx = self.shared.pending.subscribe();
        let _ = rx.wait_for(|n| *n == 0).await;
    }

    pub fn status(&self) -> NotifyStatus {
        self.shared
            .status
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

async fn run_queue(
    mut receiver: mpsc::UnboundedReceiver<NotificationJob>,
    semaphore: Arc<Semaphore>,
    shared: Arc<Shared>,
) {
    while let Some(job) = receiver.recv().await {
        // Acquire before spawning so jobs start in FIFO order
        let Ok(permit) = semaphore.clone().acquire_owned().await else {
            break;
        };
        let shared = shared.clone();
        tokio::spawn(async move {
            let ok = run_job(job).await;
            shared.record(ok);
            shared.pending.send_modify(|n| *n -= 1);
            drop(permit);
        });
    }
    debug!("Notification queue runner stopped");
}

/// Run one job, catching both errors and panics.
async fn run_job(job: NotificationJob) -> bool {
    let NotificationJob {
        platform,
        label,
        payload,
        task,
    } = job;

    let result = match AssertUnwindSafe(task).catch_unwind().await {
        Ok(result) => result,
        Err(panic) => Err(DispatchError::Panicked {
            platform,
            message: panic_message(panic.as_ref()),
        }),
    };

    match result {
        Ok(()) => {
            debug!(platform = %platform, job = %label, "Notification delivered");
            true
        }
        Err(e) => {
            error!(
                platform = %platform,
                job = %label,
                payload = %payload,
                "Error occurred when notifying {platform}: {e}"
            );
            false
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
