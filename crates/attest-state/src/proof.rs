//! # Proof Record
//!
//! The durable record of one proof request and, once generated, its
//! artifact. Created `pending`; immutable once `completed` or `failed`.

use serde::{Deserialize, Serialize};

use attest_core::{CircuitId, OwnerId, ProofId, ProofSystemId, TemplateId, Timestamp};
use attest_zkp::ProofArtifact;

use crate::status::{ProofStatus, StatusTransition, TransitionError};

/// A proof record and its lifecycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProofRecord {
    pub id: ProofId,
    pub owner: OwnerId,
    pub system: ProofSystemId,
    pub status: ProofStatus,
    pub circuit_id: Option<CircuitId>,
    pub template_id: Option<TemplateId>,
    #[serde(default)]
    pub public_inputs: serde_json::Map<String, serde_json::Value>,
    pub artifact: Option<ProofArtifact>,
    pub error_message: Option<String>,
    pub generation_time_ms: Option<u64>,
    pub created_at: Timestamp,
    pub completed_at: Option<Timestamp>,
    pub transitions: Vec<StatusTransition>,
}

impl ProofRecord {
    /// A new pending record.
    pub fn new(owner: OwnerId, system: ProofSystemId, now: Timestamp) -> Self {
        Self {
            id: ProofId::new(),
            owner,
            system,
            status: ProofStatus::Pending,
            circuit_id: None,
            template_id: None,
            public_inputs: serde_json::Map::new(),
            artifact: None,
            error_message: None,
            generation_time_ms: None,
            created_at: now,
            completed_at: None,
            transitions: Vec::new(),
        }
    }

    /// PENDING → PROCESSING.
    pub fn start(&mut self, now: Timestamp) -> Result<(), TransitionError> {
        self.require(ProofStatus::Pending, ProofStatus::Processing)?;
        self.do_transition(ProofStatus::Processing, now, "generation started");
        Ok(())
    }

    /// PROCESSING → COMPLETED, attaching the artifact.
    pub fn complete(
        &mut self,
        artifact: ProofArtifact,
        now: Timestamp,
    ) -> Result<(), TransitionError> {
        self.require(ProofStatus::Processing, ProofStatus::Completed)?;
        self.generation_time_ms = Some(artifact.generation_time_ms);
        self.artifact = Some(artifact);
        self.error_message = None;
        self.completed_at = Some(now);
        self.do_transition(ProofStatus::Completed, now, "generated");
        Ok(())
    }

    /// PENDING | PROCESSING → FAILED.
    pub fn fail(&mut self, reason: &str, now: Timestamp) -> Result<(), TransitionError> {
        if self.status.is_terminal() {
            return Err(self.terminal_error());
        }
        self.error_message = Some(reason.to_string());
        self.completed_at = Some(now);
        self.do_transition(ProofStatus::Failed, now, reason);
        Ok(())
    }

    /// Record a retryable error without changing status.
    pub fn note_error(&mut self, error: &str) -> Result<(), TransitionError> {
        if self.status.is_terminal() {
            return Err(self.terminal_error());
        }
        self.error_message = Some(error.to_string());
        Ok(())
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    fn require(&self, from: ProofStatus, to: ProofStatus) -> Result<(), TransitionError> {
        if self.status.is_terminal() {
            return Err(self.terminal_error());
        }
        if self.status != from {
            return Err(TransitionError::InvalidTransition {
                record: self.id.to_string(),
                from: self.status,
                to,
            });
        }
        Ok(())
    }

    fn terminal_error(&self) -> TransitionError {
        TransitionError::Terminal {
            record: self.id.to_string(),
            status: self.status,
        }
    }

    fn do_transition(&mut self, to: ProofStatus, now: Timestamp, reason: &str) {
        self.transitions.push(StatusTransition {
            from: self.status,
            to,
            at: now,
            reason: reason.to_string(),
        });
        self.status = to;
    }
}
