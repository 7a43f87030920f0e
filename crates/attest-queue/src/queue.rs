//! # Task Queue
//!
//! At-least-once delivery with per-delivery visibility deadlines, weighted
//! priority lanes, exponential backoff between retries and a dead-letter
//! list for tasks that exhaust their retry budget.
//!
//! ## Delivery Model
//!
//! Every dequeue hands out a fresh [`AttemptId`]. The task stays in flight
//! until that attempt acks or nacks it, or until its visibility deadline
//! passes and the reaper puts it back. Acking with a stale attempt fails
//! with [`QueueError::UnknownDelivery`], so a worker that stalled past its
//! deadline cannot retire a task that has since been redelivered.
//!
//! ## Lane Fairness
//!
//! Lanes are served from a smooth weighted round-robin schedule (default
//! `high:normal:low = 6:3:1`). A slot whose lane has nothing ready passes
//! to the next lane in the schedule, so every non-empty lane is served at
//! least once per cycle.

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;

use attest_core::{AttemptId, Timestamp};

use crate::error::QueueError;
use crate::task::{Lane, TaskEnvelope};

/// Default lane weights, `high:normal:low`.
pub const DEFAULT_LANE_WEIGHTS: [u32; 3] = [6, 3, 1];

/// Delay before the first retry; doubled on each further attempt.
pub const DEFAULT_BASE_BACKOFF: Duration = Duration::from_secs(1);

/// Backoff ceiling.
pub const DEFAULT_MAX_BACKOFF: Duration = Duration::from_secs(5 * 60);

/// Reason attached to tasks whose visibility deadline passed.
pub const VISIBILITY_EXPIRED: &str = "visibility timeout expired";

/// A task handed to a worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub attempt: AttemptId,
    pub envelope: TaskEnvelope,
    pub deadline: Timestamp,
}

/// What happened to a nacked delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NackOutcome {
    /// Back in its lane, not deliverable before `available_at`.
    Requeued { available_at: Timestamp },
    /// Retry budget exhausted.
    DeadLettered(TaskEnvelope),
}

/// Result of one reaper sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReapReport {
    pub requeued: usize,
    pub dead_lettered: Vec<TaskEnvelope>,
}

/// Point-in-time queue depth.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct QueueStats {
    pub high: usize,
    pub normal: usize,
    pub low: usize,
    pub in_flight: usize,
    pub dead: usize,
}

impl QueueStats {
    pub fn pending(&self) -> usize {
        self.high + self.normal + self.low
    }
}

/// Queue contract.
///
/// Methods take `now` explicitly; the worker pool supplies it from its
/// [`Clock`](attest_core::Clock).
pub trait TaskQueue: Send + Sync + std::fmt::Debug {
    fn enqueue(&self, envelope: TaskEnvelope, now: Timestamp) -> Result<(), QueueError>;

    /// Next ready task by lane schedule, or `None` when nothing is ready.
    fn dequeue(&self, now: Timestamp) -> Result<Option<Delivery>, QueueError>;

    /// Retire a delivery.
    fn ack(&self, attempt: &AttemptId) -> Result<(), QueueError>;

    /// Return a delivery for retry, or dead-letter it if out of retries.
    fn nack(
        &self,
        attempt: &AttemptId,
        error: &str,
        now: Timestamp,
    ) -> Result<NackOutcome, QueueError>;

    /// Requeue in-flight deliveries whose deadline has passed.
    fn reap_expired(&self, now: Timestamp) -> Result<ReapReport, QueueError>;

    fn dead_letters(&self) -> Vec<TaskEnvelope>;

    fn stats(&self) -> QueueStats;
}

// ─── Configuration ───────────────────────────────────────────────────

/// Lane weights and retry backoff.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueConfig {
    pub lane_weights: [u32; 3],
    pub base_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            lane_weights: DEFAULT_LANE_WEIGHTS,
            base_backoff: DEFAULT_BASE_BACKOFF,
            max_backoff: DEFAULT_MAX_BACKOFF,
        }
    }
}

impl QueueConfig {
    /// Delay before redelivering a task that has been delivered
    /// `attempts` times: `base * 2^(attempts - 1)`, capped.
    pub fn backoff(&self, attempts: u32) -> Duration {
        let factor = 1u32
            .checked_shl(attempts.saturating_sub(1))
            .unwrap_or(u32::MAX);
        self.base_backoff.saturating_mul(factor).min(self.max_backoff)
    }

    fn validate(&self) -> Result<(), QueueError> {
        if self.lane_weights.iter().any(|w| *w == 0) {
            return Err(QueueError::Config(
                "a zero lane weight would starve that lane".into(),
            ));
        }
        Ok(())
    }
}

/// Expand weights into a smooth weighted round-robin cycle.
fn build_schedule(weights: [u32; 3]) -> Vec<Lane> {
    let total: i64 = weights.iter().map(|w| i64::from(*w)).sum();
    let mut current = [0i64; 3];
    let mut schedule = Vec::with_capacity(total as usize);
    for _ in 0..total {
        for (i, w) in weights.iter().enumerate() {
            current[i] += i64::from(*w);
        }
        let mut pick = 0;
        for i in 1..3 {
            if current[i] > current[pick] {
                pick = i;
            }
        }
        current[pick] -= total;
        schedule.push(Lane::ALL[pick]);
    }
    schedule
}

// ─── In-memory queue ─────────────────────────────────────────────────

#[derive(Debug, Clone)]
struct Pending {
    envelope: TaskEnvelope,
    available_at: Timestamp,
}

#[derive(Debug, Clone)]
struct InFlight {
    envelope: TaskEnvelope,
    deadline: Timestamp,
}

#[derive(Debug, Default)]
struct Inner {
    lanes: [VecDeque<Pending>; 3],
    in_flight: HashMap<AttemptId, InFlight>,
    dead: Vec<TaskEnvelope>,
    cursor: usize,
}

/// Process-local [`TaskQueue`].
#[derive(Debug)]
pub struct InMemoryQueue {
    config: QueueConfig,
    schedule: Vec<Lane>,
    inner: Mutex<Inner>,
}

impl InMemoryQueue {
    pub fn new(config: QueueConfig) -> Result<Self, QueueError> {
        config.validate()?;
        Ok(Self::with_valid_config(config))
    }

    fn with_valid_config(config: QueueConfig) -> Self {
        Self {
            schedule: build_schedule(config.lane_weights),
            config,
            inner: Mutex::new(Inner::default()),
        }
    }

    pub fn config(&self) -> &QueueConfig {
        &self.config
    }

    /// Put an envelope back or dead-letter it. Caller holds the lock.
    fn settle(
        &self,
        inner: &mut Inner,
        mut envelope: TaskEnvelope,
        error: &str,
        available_at: Timestamp,
    ) -> NackOutcome {
        envelope.last_error = Some(error.to_string());
        if envelope.has_retries_left() {
            inner.lanes[envelope.lane.index()].push_back(Pending {
                envelope,
                available_at,
            });
            NackOutcome::Requeued { available_at }
        } else {
            tracing::error!(
                task = %envelope.id,
                lane = %envelope.lane,
                attempts = envelope.attempts,
                "task dead-lettered: {error}"
            );
            inner.dead.push(envelope.clone());
            NackOutcome::DeadLettered(envelope)
        }
    }
}

impl Default for InMemoryQueue {
    fn default() -> Self {
        Self::with_valid_config(QueueConfig::default())
    }
}

impl TaskQueue for InMemoryQueue {
    fn enqueue(&self, envelope: TaskEnvelope, now: Timestamp) -> Result<(), QueueError> {
        tracing::debug!(task = %envelope.id, lane = %envelope.lane, "task enqueued");
        let mut inner = self.inner.lock();
        inner.lanes[envelope.lane.index()].push_back(Pending {
            envelope,
            available_at: now,
        });
        Ok(())
    }

    fn dequeue(&self, now: Timestamp) -> Result<Option<Delivery>, QueueError> {
        let mut inner = self.inner.lock();
        let slots = self.schedule.len();
        for step in 0..slots {
            let pos = (inner.cursor + step) % slots;
            let lane = self.schedule[pos].index();
            let Some(idx) = inner.lanes[lane]
                .iter()
                .position(|p| p.available_at <= now)
            else {
                continue;
            };
            let Some(Pending { mut envelope, .. }) = inner.lanes[lane].remove(idx) else {
                continue;
            };
            inner.cursor = (pos + 1) % slots;
            envelope.attempts += 1;
            let attempt = AttemptId::new();
            let deadline = now.plus(envelope.timeout());
            inner.in_flight.insert(
                attempt,
                InFlight {
                    envelope: envelope.clone(),
                    deadline,
                },
            );
            return Ok(Some(Delivery {
                attempt,
                envelope,
                deadline,
            }));
        }
        Ok(None)
    }

    fn ack(&self, attempt: &AttemptId) -> Result<(), QueueError> {
        self.inner
            .lock()
            .in_flight
            .remove(attempt)
            .map(|_| ())
            .ok_or(QueueError::UnknownDelivery(*attempt))
    }

    fn nack(
        &self,
        attempt: &AttemptId,
        error: &str,
        now: Timestamp,
    ) -> Result<NackOutcome, QueueError> {
        let mut inner = self.inner.lock();
        let InFlight { envelope, .. } = inner
            .in_flight
            .remove(attempt)
            .ok_or(QueueError::UnknownDelivery(*attempt))?;
        let delay = self.config.backoff(envelope.attempts);
        if envelope.has_retries_left() {
            tracing::warn!(
                task = %envelope.id,
                attempt = envelope.attempts,
                max_retries = envelope.max_retries,
                "task failed, retrying in {delay:?}: {error}"
            );
        }
        Ok(self.settle(&mut inner, envelope, error, now.plus(delay)))
    }

    fn reap_expired(&self, now: Timestamp) -> Result<ReapReport, QueueError> {
        let mut inner = self.inner.lock();
        let expired: Vec<AttemptId> = inner
            .in_flight
            .iter()
            .filter(|(_, f)| f.deadline <= now)
            .map(|(a, _)| *a)
            .collect();

        let mut report = ReapReport::default();
        for attempt in expired {
            let Some(InFlight { envelope, .. }) = inner.in_flight.remove(&attempt) else {
                continue;
            };
            tracing::warn!(task = %envelope.id, %attempt, "delivery expired, reclaiming");
            match self.settle(&mut inner, envelope, VISIBILITY_EXPIRED, now) {
                NackOutcome::Requeued { .. } => report.requeued += 1,
                NackOutcome::DeadLettered(env) => report.dead_lettered.push(env),
            }
        }
        Ok(report)
    }

    fn dead_letters(&self) -> Vec<TaskEnvelope> {
        self.inner.lock().dead.clone()
    }

    fn stats(&self) -> QueueStats {
        let inner = self.inner.lock();
        QueueStats {
            high: inner.lanes[Lane::High.index()].len(),
            normal: inner.lanes[Lane::Normal.index()].len(),
            low: inner.lanes[Lane::Low.index()].len(),
            in_flight: inner.in_flight.len(),
            dead: inner.dead.len(),
        }
    }
}
