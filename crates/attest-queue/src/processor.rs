//! # Proof Task Processor
//!
//! Consumes one `proof:generate` delivery: claims the job lease, runs the
//! backend on a blocking thread and records the result on both the job and
//! the proof record.
//!
//! The lease runs exactly until the delivery's visibility deadline, so by
//! the time the queue hands a task out again the previous lease has lapsed.
//!
//! ## Idempotent Redelivery
//!
//! A delivery for a job that is already terminal is a no-op
//! ([`TaskOutcome::Skipped`]). A delivery whose job lease is held by a
//! live attempt, or whose lease was lost while generating, leaves state
//! untouched ([`TaskOutcome::Superseded`]). The job update is the commit
//! point: the proof record is only written after the job transition
//! succeeds under this attempt's lease.

use std::sync::Arc;

use attest_core::{AttemptId, Clock, Timestamp};
use attest_state::{
    Claim, FailureDisposition, JobRepository, ProofRepository, ProofStatus, StoreError,
    TransitionError,
};
use attest_zkp::{ProofArtifact, ProofError, ProofSystemRegistry};

use crate::queue::Delivery;
use crate::task::{ProofTask, TaskEnvelope, PROOF_GENERATE};

/// Result of handling one delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    /// Proof generated and recorded.
    Completed { generation_time_ms: u64 },
    /// Terminal failure recorded, or the task can never succeed.
    Failed { reason: String },
    /// Retryable failure; the delivery should be nacked.
    Retry { reason: String },
    /// The job was already terminal.
    Skipped,
    /// Another attempt owns the job.
    Superseded,
}

impl TaskOutcome {
    /// Metric label.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Completed { .. } => "completed",
            Self::Failed { .. } => "failed",
            Self::Retry { .. } => "retry",
            Self::Skipped => "skipped",
            Self::Superseded => "superseded",
        }
    }
}

/// Handles `proof:generate` deliveries against shared state.
#[derive(Clone)]
pub struct ProofProcessor {
    registry: Arc<ProofSystemRegistry>,
    proofs: Arc<dyn ProofRepository>,
    jobs: Arc<dyn JobRepository>,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for ProofProcessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProofProcessor")
            .field("registry", &self.registry)
            .field("clock", &self.clock)
            .finish_non_exhaustive()
    }
}

impl ProofProcessor {
    pub fn new(
        registry: Arc<ProofSystemRegistry>,
        proofs: Arc<dyn ProofRepository>,
        jobs: Arc<dyn JobRepository>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            registry,
            proofs,
            jobs,
            clock,
        }
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Process one delivery and report what the queue should do with it.
    pub async fn handle(&self, delivery: &Delivery) -> TaskOutcome {
        let outcome = self.process(delivery).await;
        metrics::counter!("attest_tasks_total", "outcome" => outcome.label()).increment(1);
        outcome
    }

    async fn process(&self, delivery: &Delivery) -> TaskOutcome {
        let envelope = &delivery.envelope;
        let attempt = delivery.attempt;

        if envelope.kind != PROOF_GENERATE {
            tracing::error!(task = %envelope.id, kind = %envelope.kind, "unknown task kind");
            return TaskOutcome::Failed {
                reason: format!("unknown task kind {}", envelope.kind),
            };
        }
        let task = match ProofTask::decode(&envelope.payload) {
            Ok(task) => task,
            Err(e) => {
                tracing::error!(task = %envelope.id, "dropping undecodable task: {e}");
                return TaskOutcome::Failed {
                    reason: e.to_string(),
                };
            }
        };

        // ── Claim ────────────────────────────────────────────────────
        let now = self.clock.now();
        let mut claim = None;
        let claimed = self.jobs.update(&task.job_id, &mut |job| {
            claim = Some(job.claim_until(attempt, now, delivery.deadline)?);
            Ok(())
        });
        match claimed {
            Ok(_) => {}
            Err(StoreError::Transition(TransitionError::Terminal { status, .. })) => {
                tracing::debug!(job_id = %task.job_id, %status, "job already terminal, skipping");
                return TaskOutcome::Skipped;
            }
            Err(StoreError::Transition(TransitionError::LeaseHeld { holder, .. })) => {
                tracing::debug!(job_id = %task.job_id, %holder, "job leased by another attempt");
                return TaskOutcome::Superseded;
            }
            Err(StoreError::NotFound(what)) => {
                tracing::error!(job_id = %task.job_id, "dropping task for missing {what}");
                return TaskOutcome::Failed {
                    reason: format!("{what} not found"),
                };
            }
            Err(e) => return TaskOutcome::Retry { reason: e.to_string() },
        }
        if claim == Some(Claim::Redelivery) {
            tracing::info!(job_id = %task.job_id, %attempt, "job redelivered");
        }

        let started = self.proofs.update(&task.proof_id, &mut |p| match p.status {
            ProofStatus::Pending => p.start(now),
            ProofStatus::Processing => Ok(()),
            status => Err(TransitionError::Terminal {
                record: p.id.to_string(),
                status,
            }),
        });
        match started {
            Ok(_) => {}
            Err(StoreError::Transition(TransitionError::Terminal { status, .. })) => {
                self.align_job(&task, attempt, status, now);
                return TaskOutcome::Skipped;
            }
            Err(e) => return self.release(&task, attempt, &e.to_string(), now),
        }

        // ── Generate ─────────────────────────────────────────────────
        let backend = match self.registry.get(&task.system) {
            Ok(backend) => backend,
            Err(e) => return self.record_failure(&task, attempt, &e.to_string(), false),
        };

        tracing::info!(
            job_id = %task.job_id,
            proof_id = %task.proof_id,
            system = %task.system,
            %attempt,
            "generating proof"
        );
        let request = task.to_request();
        let result = tokio::task::spawn_blocking(move || backend.generate(&request))
            .await
            .unwrap_or_else(|join| {
                Err(ProofError::GenerationFailed(format!(
                    "prover task aborted: {join}"
                )))
            });

        match result {
            Ok(artifact) => self.record_success(&task, attempt, artifact),
            Err(e) => self.record_failure(&task, attempt, &e.to_string(), e.is_retryable()),
        }
    }

    fn record_success(
        &self,
        task: &ProofTask,
        attempt: AttemptId,
        artifact: ProofArtifact,
    ) -> TaskOutcome {
        let now = self.clock.now();
        match self.jobs.update(&task.job_id, &mut |j| j.complete(attempt, now)) {
            Ok(_) => {}
            Err(StoreError::Transition(e)) => {
                tracing::warn!(job_id = %task.job_id, %attempt, "discarding result: {e}");
                return TaskOutcome::Superseded;
            }
            Err(e) => return TaskOutcome::Retry { reason: e.to_string() },
        }

        let generation_time_ms = artifact.generation_time_ms;
        if let Err(e) = self
            .proofs
            .update(&task.proof_id, &mut |p| p.complete(artifact.clone(), now))
        {
            tracing::error!(proof_id = %task.proof_id, "job completed but proof update failed: {e}");
        }

        let system = task.system.to_string();
        metrics::counter!(
            "attest_proofs_generated_total",
            "system" => system.clone(),
            "status" => "completed"
        )
        .increment(1);
        metrics::histogram!("attest_proof_generation_ms", "system" => system)
            .record(generation_time_ms as f64);
        tracing::info!(
            job_id = %task.job_id,
            proof_id = %task.proof_id,
            generation_time_ms,
            "proof generated"
        );
        TaskOutcome::Completed { generation_time_ms }
    }

    fn record_failure(
        &self,
        task: &ProofTask,
        attempt: AttemptId,
        reason: &str,
        retryable: bool,
    ) -> TaskOutcome {
        let now = self.clock.now();
        let mut disposition = None;
        let updated = self.jobs.update(&task.job_id, &mut |j| {
            disposition = Some(j.record_failure(attempt, reason, retryable, now)?);
            Ok(())
        });
        match updated {
            Ok(_) => {}
            Err(StoreError::Transition(e)) => {
                tracing::warn!(job_id = %task.job_id, %attempt, "discarding failure: {e}");
                return TaskOutcome::Superseded;
            }
            Err(e) => return TaskOutcome::Retry { reason: e.to_string() },
        }

        match disposition {
            Some(FailureDisposition::Retry { retry_count }) => {
                if let Err(e) = self.proofs.update(&task.proof_id, &mut |p| p.note_error(reason)) {
                    tracing::warn!(proof_id = %task.proof_id, "could not record error: {e}");
                }
                tracing::warn!(
                    job_id = %task.job_id,
                    retry_count,
                    "proof generation failed, will retry: {reason}"
                );
                TaskOutcome::Retry {
                    reason: reason.to_string(),
                }
            }
            _ => {
                self.fail_proof(task, reason, now);
                tracing::error!(job_id = %task.job_id, system = %task.system, "proof generation failed: {reason}");
                TaskOutcome::Failed {
                    reason: reason.to_string(),
                }
            }
        }
    }

    /// Release the lease after an infrastructure error so the redelivery
    /// can claim immediately. The failure still counts against the job's
    /// retries; an exhausted job takes its proof down with it.
    fn release(
        &self,
        task: &ProofTask,
        attempt: AttemptId,
        reason: &str,
        now: Timestamp,
    ) -> TaskOutcome {
        let mut disposition = None;
        if let Err(e) = self.jobs.update(&task.job_id, &mut |j| {
            disposition = Some(j.record_failure(attempt, reason, true, now)?);
            Ok(())
        }) {
            tracing::warn!(job_id = %task.job_id, "could not release lease: {e}");
        }
        if disposition == Some(FailureDisposition::Failed) {
            self.fail_proof(task, reason, now);
            tracing::error!(job_id = %task.job_id, "job failed after repeated storage errors: {reason}");
            return TaskOutcome::Failed {
                reason: reason.to_string(),
            };
        }
        TaskOutcome::Retry {
            reason: reason.to_string(),
        }
    }

    /// Bring a live job in line with its already-terminal proof record.
    fn align_job(&self, task: &ProofTask, attempt: AttemptId, proof: ProofStatus, now: Timestamp) {
        let result = self.jobs.update(&task.job_id, &mut |j| match proof {
            ProofStatus::Completed => j.complete(attempt, now),
            _ => j.fail("proof record already failed", now),
        });
        if let Err(e) = result {
            tracing::warn!(job_id = %task.job_id, "could not align job with proof: {e}");
        }
    }

    fn fail_proof(&self, task: &ProofTask, reason: &str, now: Timestamp) {
        if let Err(e) = self.proofs.update(&task.proof_id, &mut |p| p.fail(reason, now)) {
            tracing::warn!(proof_id = %task.proof_id, "could not mark proof failed: {e}");
        }
        metrics::counter!(
            "attest_proofs_generated_total",
            "system" => task.system.to_string(),
            "status" => "failed"
        )
        .increment(1);
    }

    /// Drive the job and proof of an exhausted task to `failed`.
    pub fn handle_dead_letter(&self, envelope: &TaskEnvelope) {
        let task = match ProofTask::decode(&envelope.payload) {
            Ok(task) => task,
            Err(e) => {
                tracing::error!(task = %envelope.id, "undecodable dead letter: {e}");
                return;
            }
        };
        let reason = format!(
            "retries exhausted after {} attempts: {}",
            envelope.attempts,
            envelope.last_error.as_deref().unwrap_or("unknown error")
        );
        let now = self.clock.now();
        match self.jobs.update(&task.job_id, &mut |j| j.fail(&reason, now)) {
            Ok(_) => self.fail_proof(&task, &reason, now),
            Err(StoreError::Transition(TransitionError::Terminal { .. })) => {}
            Err(e) => {
                tracing::error!(job_id = %task.job_id, "could not fail dead-lettered job: {e}");
            }
        }
    }
}
