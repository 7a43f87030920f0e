//! # Task Payloads and Envelopes
//!
//! A [`ProofTask`] is the typed payload of a `proof:generate` task. It is
//! serialized to JSON inside a [`TaskEnvelope`], which carries the queue's
//! own bookkeeping: lane, delivery count, retry budget and visibility
//! timeout.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use attest_core::{CircuitId, JobId, OwnerId, ProofId, ProofSystemId, TaskId, TemplateId, Timestamp};
use attest_zkp::{CircuitDescriptor, InputData, ProofRequest};

use crate::error::QueueError;

/// Task kind for proof generation.
pub const PROOF_GENERATE: &str = "proof:generate";

/// Default visibility timeout for an in-flight task.
pub const DEFAULT_TASK_TIMEOUT: Duration = Duration::from_secs(10 * 60);

/// Priority lane. Higher lanes are drained more often; none is starved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Lane {
    High,
    Normal,
    Low,
}

impl Lane {
    pub const ALL: [Lane; 3] = [Lane::High, Lane::Normal, Lane::Low];

    /// `1` and above is high, `0` normal, negative low.
    pub fn from_priority(priority: i8) -> Self {
        match priority {
            p if p > 0 => Self::High,
            0 => Self::Normal,
            _ => Self::Low,
        }
    }

    /// Queue name as seen by operators.
    pub fn queue_name(&self) -> &'static str {
        match self {
            Self::High => "proofs:high",
            Self::Normal => "proofs",
            Self::Low => "proofs:low",
        }
    }

    pub(crate) fn index(&self) -> usize {
        match self {
            Self::High => 0,
            Self::Normal => 1,
            Self::Low => 2,
        }
    }
}

impl std::fmt::Display for Lane {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.queue_name())
    }
}

/// Payload of a `proof:generate` task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProofTask {
    pub job_id: JobId,
    pub proof_id: ProofId,
    pub owner: OwnerId,
    pub system: ProofSystemId,
    pub data: InputData,
    #[serde(default)]
    pub public_inputs: serde_json::Map<String, serde_json::Value>,
    #[serde(default)]
    pub circuit_id: Option<CircuitId>,
    #[serde(default)]
    pub template_id: Option<TemplateId>,
    #[serde(default)]
    pub circuit: Option<CircuitDescriptor>,
    #[serde(default)]
    pub options: BTreeMap<String, serde_json::Value>,
    #[serde(default, with = "attest_core::hex::serde_opt_bytes")]
    pub proving_key: Option<Vec<u8>>,
}

impl ProofTask {
    /// The generation request this task asks a backend to run.
    pub fn to_request(&self) -> ProofRequest {
        ProofRequest {
            system: self.system.clone(),
            data: self.data.clone(),
            public_inputs: self.public_inputs.clone(),
            options: self.options.clone(),
            circuit: self.circuit.clone(),
            proving_key: self.proving_key.clone(),
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>, QueueError> {
        serde_json::to_vec(self).map_err(|e| QueueError::Encode(e.to_string()))
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, QueueError> {
        serde_json::from_slice(bytes).map_err(|e| QueueError::Decode(e.to_string()))
    }
}

/// A task as held by the queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskEnvelope {
    pub id: TaskId,
    pub kind: String,
    pub lane: Lane,
    #[serde(with = "attest_core::hex::serde_bytes")]
    pub payload: Vec<u8>,
    /// Deliveries so far, including the current one while in flight.
    pub attempts: u32,
    /// Redeliveries allowed after the first delivery.
    pub max_retries: u32,
    pub timeout_ms: u64,
    pub enqueued_at: Timestamp,
    pub last_error: Option<String>,
}

impl TaskEnvelope {
    /// Wrap a proof task for the lane matching `priority`.
    pub fn proof_generate(
        task: &ProofTask,
        priority: i8,
        max_retries: u32,
        timeout: Duration,
        now: Timestamp,
    ) -> Result<Self, QueueError> {
        Ok(Self {
            id: TaskId::new(),
            kind: PROOF_GENERATE.to_string(),
            lane: Lane::from_priority(priority),
            payload: task.encode()?,
            attempts: 0,
            max_retries,
            timeout_ms: timeout.as_millis() as u64,
            enqueued_at: now,
            last_error: None,
        })
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Whether another delivery is allowed after the current one.
    pub fn has_retries_left(&self) -> bool {
        self.attempts <= self.max_retries
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn task() -> ProofTask {
        ProofTask {
            job_id: JobId::new(),
            proof_id: ProofId::new(),
            owner: OwnerId::new(),
            system: ProofSystemId::stark(),
            data: InputData::json(json!({"value": 1})),
            public_inputs: serde_json::Map::new(),
            circuit_id: None,
            template_id: None,
            circuit: None,
            options: BTreeMap::from([("async".to_string(), json!(true))]),
            proving_key: None,
        }
    }

    #[test]
    fn priority_maps_to_lanes() {
        assert_eq!(Lane::from_priority(1), Lane::High);
        assert_eq!(Lane::from_priority(5), Lane::High);
        assert_eq!(Lane::from_priority(0), Lane::Normal);
        assert_eq!(Lane::from_priority(-1), Lane::Low);
        assert_eq!(Lane::High.queue_name(), "proofs:high");
        assert_eq!(Lane::Normal.queue_name(), "proofs");
        assert_eq!(Lane::Low.queue_name(), "proofs:low");
    }

    #[test]
    fn task_survives_the_envelope() {
        let t = task();
        let env = TaskEnvelope::proof_generate(
            &t,
            -1,
            3,
            DEFAULT_TASK_TIMEOUT,
            Timestamp::from_epoch_millis(0).unwrap(),
        )
        .unwrap();
        assert_eq!(env.kind, PROOF_GENERATE);
        assert_eq!(env.lane, Lane::Low);
        assert_eq!(env.timeout(), DEFAULT_TASK_TIMEOUT);
        assert_eq!(ProofTask::decode(&env.payload).unwrap(), t);
    }

    #[test]
    fn request_carries_options_and_data() {
        let t = task();
        let req = t.to_request();
        assert_eq!(req.system, ProofSystemId::stark());
        assert!(req.option_flag("async"));
        assert_eq!(req.data, t.data);
    }

    #[test]
    fn garbage_payload_fails_to_decode() {
        assert!(matches!(
            ProofTask::decode(b"{not json"),
            Err(QueueError::Decode(_))
        ));
    }

    #[test]
    fn retry_budget_counts_deliveries() {
        let mut env = TaskEnvelope::proof_generate(
            &task(),
            0,
            1,
            DEFAULT_TASK_TIMEOUT,
            Timestamp::from_epoch_millis(0).unwrap(),
        )
        .unwrap();
        env.attempts = 1;
        assert!(env.has_retries_left());
        env.attempts = 2;
        assert!(!env.has_retries_left());
    }
}
