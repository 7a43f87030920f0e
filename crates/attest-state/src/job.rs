//! # Job Lifecycle State Machine
//!
//! A job tracks one asynchronous proof generation across queue deliveries.
//!
//! ## States
//!
//! ```text
//! Pending ──claim──▶ Processing ──complete──▶ Completed
//!                     │   ▲  │
//!     retryable failure│   │  └──fail / retries exhausted──▶ Failed
//!      (lease released)└───┘
//!                    re-claim
//! ```
//!
//! ## Attempt leases
//!
//! Exactly one execution attempt owns a processing job at a time. `claim`
//! grants a lease to an [`AttemptId`] until a deadline. Another attempt can
//! take the job over only once the lease is released (after a retryable
//! failure) or expired (the owning worker died or stalled). Completion and
//! retryable failures are accepted only from the lease holder, so a late
//! duplicate delivery can never overwrite a newer attempt's outcome.
//!
//! Forced failure ([`Job::fail`]) ignores leases: it is used when the queue
//! dead-letters a task or the request cannot be dispatched at all.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use attest_core::{AttemptId, JobId, OwnerId, ProofId, Timestamp};

use crate::status::{ProofStatus, StatusTransition, TransitionError};

/// Default number of retries after the first attempt.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// An attempt's exclusive claim on a processing job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lease {
    pub attempt: AttemptId,
    pub until: Timestamp,
}

impl Lease {
    pub fn is_expired(&self, now: Timestamp) -> bool {
        now >= self.until
    }
}

/// How a successful claim was granted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Claim {
    /// `pending -> processing`.
    First,
    /// The job was already processing; the lease moved to a new attempt.
    Redelivery,
}

/// What happened after a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureDisposition {
    /// The job stays processing with its lease released; retry later.
    Retry { retry_count: u32 },
    /// The job is now failed.
    Failed,
}

/// An asynchronous proof generation job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub proof_id: ProofId,
    pub owner: OwnerId,
    pub status: ProofStatus,
    /// `1` high, `0` normal, `-1` low.
    pub priority: i8,
    pub retry_count: u32,
    pub max_retries: u32,
    pub error_message: Option<String>,
    pub created_at: Timestamp,
    pub started_at: Option<Timestamp>,
    pub completed_at: Option<Timestamp>,
    pub lease: Option<Lease>,
    pub transitions: Vec<StatusTransition>,
}

impl Job {
    /// A new pending job.
    pub fn new(
        proof_id: ProofId,
        owner: OwnerId,
        priority: i8,
        max_retries: u32,
        now: Timestamp,
    ) -> Self {
        Self {
            id: JobId::new(),
            proof_id,
            owner,
            status: ProofStatus::Pending,
            priority,
            retry_count: 0,
            max_retries,
            error_message: None,
            created_at: now,
            started_at: None,
            completed_at: None,
            lease: None,
            transitions: Vec::new(),
        }
    }

    /// Grant `attempt` the lease until `now + lease_for`.
    pub fn claim(
        &mut self,
        attempt: AttemptId,
        now: Timestamp,
        lease_for: Duration,
    ) -> Result<Claim, TransitionError> {
        self.claim_until(attempt, now, now.plus(lease_for))
    }

    /// Grant `attempt` the lease until `until`.
    ///
    /// Queue consumers pass the delivery's visibility deadline so the lease
    /// never outlives it: once the queue hands the task to another attempt,
    /// that attempt can claim.
    pub fn claim_until(
        &mut self,
        attempt: AttemptId,
        now: Timestamp,
        until: Timestamp,
    ) -> Result<Claim, TransitionError> {
        let lease = Lease { attempt, until };
        match self.status {
            ProofStatus::Pending => {
                self.started_at = Some(now);
                self.lease = Some(lease);
                self.do_transition(ProofStatus::Processing, now, "claimed");
                Ok(Claim::First)
            }
            ProofStatus::Processing => {
                if let Some(held) = self.lease {
                    if held.attempt != attempt && !held.is_expired(now) {
                        return Err(TransitionError::LeaseHeld {
                            record: self.id.to_string(),
                            holder: held.attempt,
                            until: held.until,
                        });
                    }
                }
                self.lease = Some(lease);
                self.log(ProofStatus::Processing, now, &format!("redelivered to {attempt}"));
                Ok(Claim::Redelivery)
            }
            ProofStatus::Completed | ProofStatus::Failed => Err(TransitionError::Terminal {
                record: self.id.to_string(),
                status: self.status,
            }),
        }
    }

    /// Mark the job completed (PROCESSING → COMPLETED). Lease holder only.
    pub fn complete(&mut self, attempt: AttemptId, now: Timestamp) -> Result<(), TransitionError> {
        self.require_holder(attempt, ProofStatus::Completed)?;
        self.lease = None;
        self.completed_at = Some(now);
        self.error_message = None;
        self.do_transition(ProofStatus::Completed, now, "completed");
        Ok(())
    }

    /// Record a failed attempt. Lease holder only.
    ///
    /// Non-retryable errors fail the job immediately. Retryable errors
    /// increment `retry_count` and release the lease; once `retry_count`
    /// exceeds `max_retries` the job fails.
    pub fn record_failure(
        &mut self,
        attempt: AttemptId,
        error: &str,
        retryable: bool,
        now: Timestamp,
    ) -> Result<FailureDisposition, TransitionError> {
        self.require_holder(attempt, ProofStatus::Failed)?;
        self.error_message = Some(error.to_string());
        self.lease = None;
        if retryable {
            self.retry_count += 1;
            if self.retry_count <= self.max_retries {
                self.log(
                    ProofStatus::Processing,
                    now,
                    &format!("attempt failed, retry {}/{}", self.retry_count, self.max_retries),
                );
                return Ok(FailureDisposition::Retry {
                    retry_count: self.retry_count,
                });
            }
        }
        self.completed_at = Some(now);
        self.do_transition(ProofStatus::Failed, now, error);
        Ok(FailureDisposition::Failed)
    }

    /// Force the job to failed from any live state.
    pub fn fail(&mut self, reason: &str, now: Timestamp) -> Result<(), TransitionError> {
        self.require_live()?;
        self.lease = None;
        self.error_message = Some(reason.to_string());
        self.completed_at = Some(now);
        self.do_transition(ProofStatus::Failed, now, reason);
        Ok(())
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// The attempt currently holding an unexpired lease, if any.
    pub fn lease_holder(&self, now: Timestamp) -> Option<AttemptId> {
        self.lease
            .filter(|l| !l.is_expired(now))
            .map(|l| l.attempt)
    }

    fn require_live(&self) -> Result<(), TransitionError> {
        if self.status.is_terminal() {
            return Err(TransitionError::Terminal {
                record: self.id.to_string(),
                status: self.status,
            });
        }
        Ok(())
    }

    fn require_holder(&self, attempt: AttemptId, to: ProofStatus) -> Result<(), TransitionError> {
        self.require_live()?;
        if self.status != ProofStatus::Processing {
            return Err(TransitionError::InvalidTransition {
                record: self.id.to_string(),
                from: self.status,
                to,
            });
        }
        match self.lease {
            Some(l) if l.attempt == attempt => Ok(()),
            _ => Err(TransitionError::NotLeaseHolder {
                record: self.id.to_string(),
                attempt,
            }),
        }
    }

    fn do_transition(&mut self, to: ProofStatus, now: Timestamp, reason: &str) {
        self.log(to, now, reason);
        self.status = to;
    }

    fn log(&mut self, to: ProofStatus, now: Timestamp, reason: &str) {
        self.transitions.push(StatusTransition {
            from: self.status,
            to,
            at: now,
            reason: reason.to_string(),
        });
    }
}
