//! Request and response shapes for the orchestration layer.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use attest_core::{CircuitId, JobId, OwnerId, ProofId, ProofSystemId, TemplateId, Timestamp};
use attest_state::ProofStatus;
use attest_zkp::{Capabilities, CircuitDescriptor, InputData, ProofArtifact};

/// Caller-controlled generation options.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerateOptions {
    /// Run as a background job even if the backend could answer inline.
    #[serde(default, rename = "async")]
    pub run_async: bool,
    /// `1` high, `0` normal, `-1` low.
    #[serde(default)]
    pub priority: i8,
    #[serde(default)]
    pub circuit_id: Option<CircuitId>,
    #[serde(default)]
    pub template_id: Option<TemplateId>,
    #[serde(default)]
    pub circuit: Option<CircuitDescriptor>,
    #[serde(default, with = "attest_core::hex::serde_opt_bytes")]
    pub proving_key: Option<Vec<u8>>,
    /// Backend-specific options, passed through untouched.
    #[serde(flatten)]
    pub backend: BTreeMap<String, serde_json::Value>,
}

/// A proof generation request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerateRequest {
    pub owner: OwnerId,
    pub system: ProofSystemId,
    pub data: InputData,
    #[serde(default)]
    pub public_inputs: serde_json::Map<String, serde_json::Value>,
    #[serde(default)]
    pub options: GenerateOptions,
}

impl GenerateRequest {
    pub fn new(owner: OwnerId, system: ProofSystemId, data: InputData) -> Self {
        Self {
            owner,
            system,
            data,
            public_inputs: serde_json::Map::new(),
            options: GenerateOptions::default(),
        }
    }

    pub fn run_async(mut self) -> Self {
        self.options.run_async = true;
        self
    }

    pub fn with_priority(mut self, priority: i8) -> Self {
        self.options.priority = priority;
        self
    }
}

/// Outcome of a generation request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerateResponse {
    pub proof_id: ProofId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_id: Option<JobId>,
    pub status: ProofStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact: Option<ProofArtifact>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generation_time_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// One entry of a batch response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchItemResult {
    pub index: usize,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<GenerateResponse>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchResponse {
    pub results: Vec<BatchItemResult>,
    pub total: usize,
    pub success: usize,
    pub failed: usize,
}

/// A registered backend and what it can do.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemInfo {
    pub id: ProofSystemId,
    pub capabilities: Capabilities,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifyResponse {
    pub valid: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub verified_at: Timestamp,
}
