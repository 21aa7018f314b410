//! The callback job queue.
//!
//! Webhook handlers store a provider notification and enqueue a [`CallbackJob`] for it. A single worker drains the
//! queue in arrival order, so the notifications for one payment are reconciled in the order they were received.
//!
//! Delivery is at-least-once. A job that fails or times out is put back on the queue after a delay, up to
//! [`JobConfig::max_attempts`] times. Reconciling a job is idempotent, so running one twice is harmless. A job that
//! runs out of attempts is dropped from the queue but its callback row stays in the database, and the worker picks
//! up every such row again when it starts.
use std::sync::Arc;

use log::*;
use pos_engine::{payment_objects::CallbackJob, PaymentDomainService};
use tokio::{
    sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender},
    task::JoinHandle,
};

use crate::{config::JobConfig, errors::ServerError};

#[derive(Debug)]
struct QueuedJob {
    job: CallbackJob,
    attempt: u32,
}

#[derive(Debug, Clone)]
pub struct CallbackJobQueue {
    sender: UnboundedSender<QueuedJob>,
}

impl CallbackJobQueue {
    pub fn enqueue(&self, job: CallbackJob) -> Result<(), ServerError> {
        trace!("📬️ Enqueuing {job}");
        self.send(QueuedJob { job, attempt: 0 })
    }

    fn send(&self, job: QueuedJob) -> Result<(), ServerError> {
        self.sender.send(job).map_err(|e| {
            error!("📬️ Could not enqueue {}. The callback worker has stopped.", e.0.job);
            ServerError::QueueClosed
        })
    }
}

/// Starts the callback worker. Do not await the returned JoinHandle, as it will run indefinitely.
pub fn start_callback_worker(
    payments: Arc<PaymentDomainService>,
    config: JobConfig,
) -> (CallbackJobQueue, JoinHandle<()>) {
    let (sender, receiver) = unbounded_channel();
    let queue = CallbackJobQueue { sender };
    let handle = tokio::spawn(run_worker(payments, config, queue.clone(), receiver));
    (queue, handle)
}

async fn run_worker(
    payments: Arc<PaymentDomainService>,
    config: JobConfig,
    queue: CallbackJobQueue,
    mut receiver: UnboundedReceiver<QueuedJob>,
) {
    info!("📬️ Callback worker started");
    match payments.pending_jobs().await {
        Ok(jobs) if jobs.is_empty() => debug!("📬️ No stored callbacks are waiting"),
        Ok(jobs) => {
            info!("📬️ Resuming {} stored callbacks", jobs.len());
            for job in jobs {
                let _ = queue.enqueue(job);
            }
        },
        Err(e) => error!("📬️ Could not load stored callbacks. They will be retried at the next start. {e}"),
    }
    while let Some(queued) = receiver.recv().await {
        run_job(payments.as_ref(), queued, config, &queue).await;
    }
    info!("📬️ Callback worker stopped");
}

async fn run_job(payments: &PaymentDomainService, queued: QueuedJob, config: JobConfig, queue: &CallbackJobQueue) {
    let QueuedJob { job, attempt } = queued;
    let reason = match tokio::time::timeout(config.timeout, payments.process_payment_callback(&job)).await {
        Ok(Ok(result)) => {
            debug!("📬️ {job} done: {result:?}");
            return;
        },
        Ok(Err(e)) => e.to_string(),
        Err(_) => format!("timed out after {:?}", config.timeout),
    };
    let attempt = attempt + 1;
    if attempt >= config.max_attempts {
        error!("📬️ Giving up on {job} after {attempt} attempts. Last error: {reason}");
        return;
    }
    warn!("📬️ {job} failed (attempt {attempt}/{}). {reason}. Retrying in {:?}", config.max_attempts, config.retry_delay);
    let queue = queue.clone();
    let delay = config.retry_delay;
    tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        let _ = queue.send(QueuedJob { job, attempt });
    });
}
