//! # Request and Artifact Types
//!
//! Everything that flows into and out of a [`crate::ProofSystem`]. Opaque
//! byte fields serialize as lowercase hex so requests and artifacts can be
//! stored and queued as JSON.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use attest_core::{hex, CircuitId, ProofSystemId};

use crate::traits::ProofError;

// ─── Input Payload ───────────────────────────────────────────────────

/// How the `value` of an [`InputData`] is turned into bytes.
///
/// Unknown tags deserialize into [`DataType::Other`] and are rejected at
/// generation time with [`ProofError::UnsupportedDataType`], so a request
/// with a bad tag is still recorded rather than failing to parse.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum DataType {
    /// `value` is a JSON string; bytes are its UTF-8 encoding.
    String,
    /// `value` is any JSON document; bytes are its compact serialization
    /// with object keys sorted. The caller's original spelling (key order,
    /// whitespace, number formatting) is not preserved, so a commitment over
    /// a `json` payload opens against the normalized text only.
    Json,
    /// `value` is a hex string.
    Bytes,
    Other(String),
}

impl DataType {
    pub fn as_str(&self) -> &str {
        match self {
            Self::String => "string",
            Self::Json => "json",
            Self::Bytes => "bytes",
            Self::Other(s) => s,
        }
    }
}

impl From<String> for DataType {
    fn from(s: String) -> Self {
        match s.as_str() {
            "string" => Self::String,
            "json" => Self::Json,
            "bytes" => Self::Bytes,
            _ => Self::Other(s),
        }
    }
}

impl From<DataType> for String {
    fn from(t: DataType) -> Self {
        t.as_str().to_string()
    }
}

impl std::fmt::Display for DataType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A typed input payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputData {
    #[serde(rename = "type")]
    pub data_type: DataType,
    pub value: serde_json::Value,
}

impl InputData {
    pub fn string(s: impl Into<String>) -> Self {
        Self {
            data_type: DataType::String,
            value: serde_json::Value::String(s.into()),
        }
    }

    pub fn json(value: serde_json::Value) -> Self {
        Self {
            data_type: DataType::Json,
            value,
        }
    }

    pub fn bytes(bytes: &[u8]) -> Self {
        Self {
            data_type: DataType::Bytes,
            value: serde_json::Value::String(hex::encode(bytes)),
        }
    }

    /// Normalize the payload to bytes according to its data type.
    pub fn to_bytes(&self) -> Result<Vec<u8>, ProofError> {
        match &self.data_type {
            DataType::String => match &self.value {
                serde_json::Value::String(s) => Ok(s.as_bytes().to_vec()),
                other => Err(ProofError::InvalidInputs(format!(
                    "string data must be a JSON string, got {}",
                    json_kind(other)
                ))),
            },
            DataType::Json => serde_json::to_vec(&self.value)
                .map_err(|e| ProofError::InvalidInputs(format!("json data: {e}"))),
            DataType::Bytes => match &self.value {
                serde_json::Value::String(s) => hex::decode(s)
                    .map_err(|e| ProofError::InvalidInputs(format!("bytes data: {e}"))),
                other => Err(ProofError::InvalidInputs(format!(
                    "bytes data must be a hex string, got {}",
                    json_kind(other)
                ))),
            },
            DataType::Other(t) => Err(ProofError::UnsupportedDataType(t.clone())),
        }
    }

    /// Interpret the payload as a JSON object.
    ///
    /// `json` payloads are used directly; `string` and `bytes` payloads are
    /// parsed from their bytes.
    pub fn to_object(&self) -> Result<serde_json::Map<String, serde_json::Value>, ProofError> {
        let value = match &self.data_type {
            DataType::Json => self.value.clone(),
            _ => {
                let bytes = self.to_bytes()?;
                serde_json::from_slice(&bytes).map_err(|e| {
                    ProofError::InvalidInputs(format!("payload is not a JSON document: {e}"))
                })?
            }
        };
        match value {
            serde_json::Value::Object(map) => Ok(map),
            other => Err(ProofError::InvalidInputs(format!(
                "payload must be a JSON object, got {}",
                json_kind(&other)
            ))),
        }
    }
}

fn json_kind(v: &serde_json::Value) -> &'static str {
    match v {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

// ─── Requests ────────────────────────────────────────────────────────

/// A stored circuit definition, passed to setup and optionally to generate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CircuitDescriptor {
    pub id: CircuitId,
    pub name: String,
    #[serde(default)]
    pub definition: serde_json::Value,
}

/// A request to generate one proof. Immutable once submitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProofRequest {
    pub system: ProofSystemId,
    pub data: InputData,
    #[serde(default)]
    pub public_inputs: serde_json::Map<String, serde_json::Value>,
    /// Backend-specific options (e.g. `circuit_type`, `async`).
    #[serde(default)]
    pub options: BTreeMap<String, serde_json::Value>,
    #[serde(default)]
    pub circuit: Option<CircuitDescriptor>,
    #[serde(default, with = "attest_core::hex::serde_opt_bytes")]
    pub proving_key: Option<Vec<u8>>,
}

impl ProofRequest {
    pub fn new(system: ProofSystemId, data: InputData) -> Self {
        Self {
            system,
            data,
            public_inputs: serde_json::Map::new(),
            options: BTreeMap::new(),
            circuit: None,
            proving_key: None,
        }
    }

    pub fn with_option(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.options.insert(key.into(), value);
        self
    }

    /// A string option, if present and a string.
    pub fn option_str(&self, key: &str) -> Option<&str> {
        self.options.get(key).and_then(|v| v.as_str())
    }

    /// A boolean option; absent or non-boolean reads as `false`.
    pub fn option_flag(&self, key: &str) -> bool {
        self.options
            .get(key)
            .and_then(|v| v.as_bool())
            .unwrap_or(false)
    }
}

/// A stateless request to verify one proof.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationRequest {
    pub system: ProofSystemId,
    #[serde(with = "attest_core::hex::serde_bytes")]
    pub proof: Vec<u8>,
    #[serde(with = "attest_core::hex::serde_bytes")]
    pub verification_key: Vec<u8>,
    #[serde(default, with = "attest_core::hex::serde_opt_bytes")]
    pub public_inputs: Option<Vec<u8>>,
}

impl VerificationRequest {
    /// Build a request that verifies `artifact` with its own key.
    pub fn for_artifact(system: ProofSystemId, artifact: &ProofArtifact) -> Self {
        Self {
            system,
            proof: artifact.proof.clone(),
            verification_key: artifact.verification_key.clone(),
            public_inputs: Some(artifact.public_inputs.clone()),
        }
    }
}

// ─── Results ─────────────────────────────────────────────────────────

/// The output of a successful generation. Never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofArtifact {
    #[serde(with = "attest_core::hex::serde_bytes")]
    pub proof: Vec<u8>,
    #[serde(with = "attest_core::hex::serde_bytes")]
    pub verification_key: Vec<u8>,
    #[serde(with = "attest_core::hex::serde_bytes")]
    pub public_inputs: Vec<u8>,
    pub generation_time_ms: u64,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

/// Key material produced by [`crate::ProofSystem::setup`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetupResult {
    #[serde(with = "attest_core::hex::serde_bytes")]
    pub proving_key: Vec<u8>,
    #[serde(with = "attest_core::hex::serde_bytes")]
    pub verification_key: Vec<u8>,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

/// Result of a verification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifyOutcome {
    pub valid: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl VerifyOutcome {
    pub fn valid() -> Self {
        Self {
            valid: true,
            error_message: None,
        }
    }

    pub fn invalid(reason: impl Into<String>) -> Self {
        Self {
            valid: false,
            error_message: Some(reason.into()),
        }
    }
}
