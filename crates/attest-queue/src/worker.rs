//! # Worker Pool
//!
//! `concurrency` tokio tasks pull deliveries from a [`TaskQueue`] and hand
//! them to a [`ProofProcessor`]; one more task periodically reclaims
//! deliveries whose visibility deadline has passed. All of them stop when
//! [`WorkerPoolHandle::shutdown`] is called, after finishing the delivery
//! in hand.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::processor::{ProofProcessor, TaskOutcome};
use crate::queue::{Delivery, NackOutcome, TaskQueue};

/// Default number of concurrent workers.
pub const DEFAULT_CONCURRENCY: usize = 10;

/// Pool sizing and pacing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerConfig {
    pub concurrency: usize,
    /// How long an idle worker sleeps before polling again.
    pub poll_interval: Duration,
    /// How often the reaper sweeps expired deliveries.
    pub reap_interval: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            poll_interval: Duration::from_millis(50),
            reap_interval: Duration::from_secs(1),
        }
    }
}

/// An unstarted pool.
#[derive(Debug)]
pub struct WorkerPool {
    queue: Arc<dyn TaskQueue>,
    processor: ProofProcessor,
    config: WorkerConfig,
}

impl WorkerPool {
    pub fn new(queue: Arc<dyn TaskQueue>, processor: ProofProcessor, config: WorkerConfig) -> Self {
        Self {
            queue,
            processor,
            config,
        }
    }

    /// Start the workers and the reaper on the current tokio runtime.
    pub fn spawn(self) -> WorkerPoolHandle {
        let (tx, rx) = watch::channel(false);
        let concurrency = self.config.concurrency.max(1);
        let mut tasks = Vec::with_capacity(concurrency + 1);

        for worker in 0..concurrency {
            tasks.push(tokio::spawn(run_worker(
                worker,
                Arc::clone(&self.queue),
                self.processor.clone(),
                self.config.poll_interval,
                rx.clone(),
            )));
        }
        tasks.push(tokio::spawn(run_reaper(
            Arc::clone(&self.queue),
            self.processor.clone(),
            self.config.reap_interval,
            rx,
        )));

        tracing::info!(concurrency, "worker pool started");
        WorkerPoolHandle { shutdown: tx, tasks }
    }
}

/// A running pool.
#[derive(Debug)]
pub struct WorkerPoolHandle {
    shutdown: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
}

impl WorkerPoolHandle {
    /// Signal shutdown and wait for every worker to finish its current task.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        for task in self.tasks {
            if let Err(e) = task.await {
                tracing::error!("worker task panicked: {e}");
            }
        }
        tracing::info!("worker pool stopped");
    }
}

async fn run_worker(
    worker: usize,
    queue: Arc<dyn TaskQueue>,
    processor: ProofProcessor,
    poll_interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    tracing::debug!(worker, "worker started");
    while !*shutdown.borrow() {
        match queue.dequeue(processor.clock().now()) {
            Ok(Some(delivery)) => settle(&*queue, &processor, delivery).await,
            Ok(None) => {
                if pause(poll_interval, &mut shutdown).await {
                    break;
                }
            }
            Err(e) => {
                tracing::warn!(worker, "dequeue failed: {e}");
                if pause(poll_interval, &mut shutdown).await {
                    break;
                }
            }
        }
    }
    tracing::debug!(worker, "worker stopped");
}

/// Run one delivery and ack or nack it.
async fn settle(queue: &dyn TaskQueue, processor: &ProofProcessor, delivery: Delivery) {
    let attempt = delivery.attempt;
    let outcome = processor.handle(&delivery).await;
    let settled = match &outcome {
        TaskOutcome::Retry { reason } => {
            match queue.nack(&attempt, reason, processor.clock().now()) {
                Ok(NackOutcome::DeadLettered(envelope)) => {
                    processor.handle_dead_letter(&envelope);
                    Ok(())
                }
                Ok(NackOutcome::Requeued { .. }) => Ok(()),
                Err(e) => Err(e),
            }
        }
        _ => queue.ack(&attempt),
    };
    if let Err(e) = settled {
        tracing::warn!(%attempt, outcome = outcome.label(), "could not settle delivery: {e}");
    }
}

async fn run_reaper(
    queue: Arc<dyn TaskQueue>,
    processor: ProofProcessor,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    while !*shutdown.borrow() {
        if pause(interval, &mut shutdown).await {
            break;
        }
        match queue.reap_expired(processor.clock().now()) {
            Ok(report) => {
                if report.requeued > 0 {
                    tracing::info!(requeued = report.requeued, "reclaimed expired deliveries");
                }
                for envelope in &report.dead_lettered {
                    processor.handle_dead_letter(envelope);
                }
            }
            Err(e) => tracing::warn!("reaper sweep failed: {e}"),
        }
    }
}

/// Sleep for `d` or until shutdown. Returns `true` when the pool is stopping.
async fn pause(d: Duration, shutdown: &mut watch::Receiver<bool>) -> bool {
    tokio::select! {
        _ = tokio::time::sleep(d) => false,
        changed = shutdown.changed() => changed.is_err() || *shutdown.borrow(),
    }
}
