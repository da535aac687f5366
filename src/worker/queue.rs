use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use futures_util::FutureExt;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{Instrument, error, info, info_span, warn};

use super::{JobRunner, QueueStatus};
use crate::book::{Job, JobId};
use crate::db::JobLedger;

/// Ledger reason for jobs that were still waiting when the service stopped
pub const DROPPED_AT_SHUTDOWN: &str = "dropped at shutdown";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum QueueError {
    #[error("fulfillment queue is shut down")]
    Closed,
    #[error("fulfillment worker already started")]
    AlreadyStarted,
}

/// Receipt for an accepted job
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Enqueued {
    pub job_id: JobId,
    /// 1-based place among the jobs waiting to start
    pub position: usize,
}

/// State read by `status()` and written only by the enqueuers and the consumer
struct Shared {
    depth: AtomicUsize,
    processing: AtomicBool,
    worker_alive: AtomicBool,
    accepting: AtomicBool,
    current: watch::Sender<Option<JobId>>,
}

/// Strict FIFO queue drained by exactly one background consumer.
///
/// Jobs may be enqueued before `start()`; they wait until the consumer runs.
pub struct FulfillmentQueue {
    sender: mpsc::UnboundedSender<Job>,
    receiver: Mutex<Option<mpsc::UnboundedReceiver<Job>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
    shutdown_tx: watch::Sender<bool>,
    shared: Arc<Shared>,
    runner: Arc<dyn JobRunner>,
    ledger: Arc<dyn JobLedger>,
}

impl FulfillmentQueue {
    pub fn new(runner: Arc<dyn JobRunner>, ledger: Arc<dyn JobLedger>) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        let (shutdown_tx, _) = watch::channel(false);
        let (current, _) = watch::channel(None);

        Self {
            sender,
            receiver: Mutex::new(Some(receiver)),
            worker: Mutex::new(None),
            shutdown_tx,
            shared: Arc::new(Shared {
                depth: AtomicUsize::new(0),
                processing: AtomicBool::new(false),
                worker_alive: AtomicBool::new(false),
                accepting: AtomicBool::new(true),
                current,
            }),
            runner,
            ledger,
        }
    }

    /// Spawns the consumer task. Only the first call has an effect.
    pub fn start(&self) -> Result<(), QueueError> {
        let receiver = self
            .receiver
            .lock()
            .map_err(|_| QueueError::AlreadyStarted)?
            .take()
            .ok_or(QueueError::AlreadyStarted)?;

        self.shared.worker_alive.store(true, Ordering::SeqCst);
        let consumer = Consumer {
            receiver,
            shutdown_rx: self.shutdown_tx.subscribe(),
            shared: self.shared.clone(),
            runner: self.runner.clone(),
            ledger: self.ledger.clone(),
        };
        let handle = tokio::spawn(consumer.run());

        if let Ok(mut worker) = self.worker.lock() {
            *worker = Some(handle);
        }
        info!("Fulfillment worker started");
        Ok(())
    }

    /// Appends a job. Never blocks and never waits for the consumer.
    pub fn enqueue(&self, job: Job) -> Result<Enqueued, QueueError> {
        if !self.shared.accepting.load(Ordering::SeqCst) {
            return Err(QueueError::Closed);
        }

        let job_id = job.id.clone();
        let position = self.shared.depth.fetch_add(1, Ordering::SeqCst) + 1;
        if self.sender.send(job).is_err() {
            self.shared.depth.fetch_sub(1, Ordering::SeqCst);
            return Err(QueueError::Closed);
        }

        info!(job_id = %job_id, position, "Job enqueued");
        Ok(Enqueued { job_id, position })
    }

    pub fn status(&self) -> QueueStatus {
        QueueStatus {
            queue_depth: self.shared.depth.load(Ordering::SeqCst),
            is_processing: self.shared.processing.load(Ordering::SeqCst),
            current_job_id: self.shared.current.borrow().clone(),
        }
    }

    /// Whether the consumer task is alive
    pub fn is_running(&self) -> bool {
        self.shared.worker_alive.load(Ordering::SeqCst)
    }

    /// Stops accepting jobs, lets the in-flight job finish and fails everything still waiting
    pub async fn shutdown(&self) {
        self.shared.accepting.store(false, Ordering::SeqCst);
        self.shutdown_tx.send_replace(true);

        let worker = self.worker.lock().ok().and_then(|mut worker| worker.take());
        match worker {
            Some(handle) => {
                info!("Waiting for fulfillment worker to finish its current job...");
                if let Err(e) = handle.await {
                    error!("Fulfillment worker terminated abnormally: {:?}", e);
                }
            }
            None => {
                // Never started: whatever was enqueued is still in our receiver.
                let receiver = self.receiver.lock().ok().and_then(|mut receiver| receiver.take());
                if let Some(mut receiver) = receiver {
                    drop_waiting(&mut receiver, &self.shared, self.ledger.as_ref()).await;
                }
            }
        }
        self.shared.worker_alive.store(false, Ordering::SeqCst);
        info!("Fulfillment queue stopped");
    }
}

struct Consumer {
    receiver: mpsc::UnboundedReceiver<Job>,
    shutdown_rx: watch::Receiver<bool>,
    shared: Arc<Shared>,
    runner: Arc<dyn JobRunner>,
    ledger: Arc<dyn JobLedger>,
}

impl Consumer {
    async fn run(mut self) {
        loop {
            if *self.shutdown_rx.borrow() {
                break;
            }

            let job = tokio::select! {
                biased;
                changed = self.shutdown_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    continue;
                }
                job = self.receiver.recv() => match job {
                    Some(job) => job,
                    None => break,
                },
            };

            self.shared.depth.fetch_sub(1, Ordering::SeqCst);
            self.process(job).await;
        }

        drop_waiting(&mut self.receiver, &self.shared, self.ledger.as_ref()).await;
        self.shared.worker_alive.store(false, Ordering::SeqCst);
        info!("Fulfillment worker stopped");
    }

    async fn process(&self, job: Job) {
        let order = job.order();
        let span = info_span!(
            "fulfillment_job",
            job_id = %job.id,
            edition = order.edition.as_str(),
            pages = order.total_pages
        );

        async {
            self.shared.processing.store(true, Ordering::SeqCst);
            self.shared.current.send_replace(Some(job.id.clone()));
            info!(waited_ms = (chrono::Utc::now() - job.enqueued_at).num_milliseconds(), "Job started");

            if let Err(e) = self.ledger.mark_running(&job.id).await {
                warn!("Could not record job as running: {}", e);
            }

            let outcome = AssertUnwindSafe(self.runner.run_job(&job)).catch_unwind().await;
            let recorded = match outcome {
                Ok(Ok(document)) => {
                    info!(content_pages = document.content_page_count(), delivered = document.delivered, "Job completed");
                    self.ledger
                        .mark_completed(&job.id, document.artifact.as_deref(), document.content_page_count() as u32)
                        .await
                }
                Ok(Err(e)) => {
                    error!("Job failed: {}", e);
                    self.ledger.mark_failed(&job.id, &e.to_string()).await
                }
                Err(panic) => {
                    let reason = panic_message(panic.as_ref());
                    error!("Job panicked: {}", reason);
                    self.ledger
                        .mark_failed(&job.id, &format!("unexpected fault: {}", reason))
                        .await
                }
            };
            if let Err(e) = recorded {
                warn!("Could not record job outcome: {}", e);
            }

            self.shared.current.send_replace(None);
            self.shared.processing.store(false, Ordering::SeqCst);
        }
        .instrument(span)
        .await
    }
}

async fn drop_waiting(receiver: &mut mpsc::UnboundedReceiver<Job>, shared: &Shared, ledger: &dyn JobLedger) {
    receiver.close();
    while let Ok(job) = receiver.try_recv() {
        shared.depth.fetch_sub(1, Ordering::SeqCst);
        warn!(job_id = %job.id, "Dropping queued job at shutdown");
        if let Err(e) = ledger.mark_failed(&job.id, DROPPED_AT_SHUTDOWN).await {
            warn!(job_id = %job.id, "Could not record dropped job: {}", e);
        }
    }
}

pub(crate) fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "panic with non-string payload".to_string()
    }
}
