//! # External SNARK Adapter
//!
//! Groth16 and PLONK circuits are compiled and proven by an external
//! constraint-system library. This module owns the half of that integration
//! that belongs to the engine: circuit-type resolution, witness assembly,
//! key handling and the [`ProofSystem`] contract. The library itself plugs in
//! behind [`SnarkEngine`].
//!
//! ## Circuit resolution
//!
//! The circuit type is the first of:
//!
//! 1. the `circuit_type` request option,
//! 2. a `circuit_type` string in the attached circuit descriptor's definition,
//! 3. detection from the witness field names (see [`detect_circuit_type`]),
//! 4. `simple`.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use serde_json::{Map, Value};
use thiserror::Error;

use attest_core::ProofSystemId;

use crate::traits::{Capabilities, ProofError, ProofSystem, VerifyError};
use crate::types::{
    CircuitDescriptor, ProofArtifact, ProofRequest, SetupResult, VerificationRequest,
    VerifyOutcome,
};

/// Error reported by an external SNARK library.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SnarkEngineError {
    /// The named circuit is not compiled into the library.
    #[error("unknown circuit: {0}")]
    UnknownCircuit(String),
    /// The witness does not satisfy the circuit's shape.
    #[error("invalid witness: {0}")]
    InvalidWitness(String),
    /// Any other library failure.
    #[error("engine failure: {0}")]
    Internal(String),
}

impl From<SnarkEngineError> for ProofError {
    fn from(e: SnarkEngineError) -> Self {
        match e {
            SnarkEngineError::UnknownCircuit(c) => {
                ProofError::InvalidInputs(format!("unknown circuit: {c}"))
            }
            SnarkEngineError::InvalidWitness(w) => ProofError::InvalidInputs(w),
            SnarkEngineError::Internal(msg) => ProofError::GenerationFailed(msg),
        }
    }
}

/// Which pairing-based scheme a backend exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SnarkScheme {
    Groth16,
    Plonk,
}

impl SnarkScheme {
    pub fn id(&self) -> ProofSystemId {
        match self {
            Self::Groth16 => ProofSystemId::groth16(),
            Self::Plonk => ProofSystemId::plonk(),
        }
    }

    pub fn capabilities(&self) -> Capabilities {
        match self {
            Self::Groth16 => Capabilities {
                supports_setup: true,
                requires_trusted_setup: true,
                supports_custom_circuits: true,
                async_only: true,
                typical_generation_ms: 30_000,
                max_proof_size_bytes: 1_024,
                features: vec![
                    "zero-knowledge".into(),
                    "succinct-proofs".into(),
                    "fast-verification".into(),
                    "trusted-setup-required".into(),
                ],
            },
            Self::Plonk => Capabilities {
                supports_setup: true,
                requires_trusted_setup: false,
                supports_custom_circuits: true,
                async_only: true,
                typical_generation_ms: 35_000,
                max_proof_size_bytes: 2_048,
                features: vec![
                    "zero-knowledge".into(),
                    "universal-setup".into(),
                    "no-per-circuit-setup".into(),
                    "flexible".into(),
                    "updatable-srs".into(),
                ],
            },
        }
    }
}

impl std::fmt::Display for SnarkScheme {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Groth16 => f.write_str("groth16"),
            Self::Plonk => f.write_str("plonk"),
        }
    }
}

/// Proving and verification keys for one compiled circuit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnarkKeys {
    pub proving_key: Vec<u8>,
    pub verification_key: Vec<u8>,
}

/// A proof as emitted by the library.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnarkProof {
    pub proof: Vec<u8>,
    pub verification_key: Vec<u8>,
    /// Serialized public part of the witness.
    pub public_witness: Vec<u8>,
}

/// Seam to an external constraint-system library.
pub trait SnarkEngine: Send + Sync + std::fmt::Debug {
    /// Compile `circuit_type` and produce its keys.
    fn setup(&self, scheme: SnarkScheme, circuit_type: &str) -> Result<SnarkKeys, SnarkEngineError>;

    /// Prove `witness` against `circuit_type` with `proving_key`.
    fn prove(
        &self,
        scheme: SnarkScheme,
        circuit_type: &str,
        proving_key: &[u8],
        witness: &Map<String, Value>,
    ) -> Result<SnarkProof, SnarkEngineError>;

    fn verify(
        &self,
        scheme: SnarkScheme,
        verification_key: &[u8],
        proof: &[u8],
        public_witness: &[u8],
    ) -> Result<bool, SnarkEngineError>;
}

/// Guess the circuit from the witness field names.
pub fn detect_circuit_type(witness: &Map<String, Value>) -> &'static str {
    let has = |keys: &[&str]| keys.iter().all(|k| witness.contains_key(*k));
    if has(&["minimum_age", "current_year", "birth_year"]) {
        "aml_age_verification"
    } else if has(&["sanctions_list_root", "user_identifier"]) {
        "aml_sanctions_check"
    } else if has(&["allowed_country_code", "user_country_code"]) {
        "aml_residency_proof"
    } else if has(&["minimum_income", "actual_income"]) {
        "aml_income_verification"
    } else if has(&["age", "min_age"]) {
        "age_verification"
    } else if has(&["min", "max", "value"]) {
        "range_proof"
    } else {
        "simple"
    }
}

/// A [`ProofSystem`] backed by an external SNARK library.
#[derive(Debug)]
pub struct SnarkBackend<E: SnarkEngine + ?Sized> {
    scheme: SnarkScheme,
    engine: Arc<E>,
}

impl<E: SnarkEngine + ?Sized> SnarkBackend<E> {
    pub fn new(scheme: SnarkScheme, engine: Arc<E>) -> Self {
        Self { scheme, engine }
    }

    pub fn scheme(&self) -> SnarkScheme {
        self.scheme
    }

    fn circuit_type(&self, request: &ProofRequest, witness: &Map<String, Value>) -> String {
        if let Some(t) = request.option_str("circuit_type") {
            return t.to_string();
        }
        if let Some(t) = request
            .circuit
            .as_ref()
            .and_then(|c| c.definition.get("circuit_type"))
            .and_then(Value::as_str)
        {
            return t.to_string();
        }
        detect_circuit_type(witness).to_string()
    }
}

fn descriptor_circuit_type(circuit: &CircuitDescriptor) -> String {
    circuit
        .definition
        .get("circuit_type")
        .and_then(Value::as_str)
        .unwrap_or(circuit.name.as_str())
        .to_string()
}

impl<E: SnarkEngine + ?Sized + 'static> ProofSystem for SnarkBackend<E> {
    fn id(&self) -> ProofSystemId {
        self.scheme.id()
    }

    fn setup(&self, circuit: &CircuitDescriptor) -> Result<SetupResult, ProofError> {
        let circuit_type = descriptor_circuit_type(circuit);
        let keys = self
            .engine
            .setup(self.scheme, &circuit_type)
            .map_err(|e| ProofError::SetupFailed(e.to_string()))?;
        Ok(SetupResult {
            proving_key: keys.proving_key,
            verification_key: keys.verification_key,
            metadata: BTreeMap::from([
                ("circuit_type".to_string(), circuit_type),
                ("scheme".to_string(), self.scheme.to_string()),
            ]),
        })
    }

    fn generate(&self, request: &ProofRequest) -> Result<ProofArtifact, ProofError> {
        let started = Instant::now();
        let mut witness = request.data.to_object()?;
        for (k, v) in &request.public_inputs {
            witness.entry(k.clone()).or_insert_with(|| v.clone());
        }
        let circuit_type = self.circuit_type(request, &witness);

        let proving_key = match &request.proving_key {
            Some(pk) => pk.clone(),
            None => {
                tracing::debug!(
                    scheme = %self.scheme,
                    circuit_type = %circuit_type,
                    "no proving key supplied, running setup"
                );
                self.engine
                    .setup(self.scheme, &circuit_type)
                    .map_err(|e| ProofError::SetupFailed(e.to_string()))?
                    .proving_key
            }
        };

        let proof = self
            .engine
            .prove(self.scheme, &circuit_type, &proving_key, &witness)?;

        Ok(ProofArtifact {
            proof: proof.proof,
            verification_key: proof.verification_key,
            public_inputs: proof.public_witness,
            generation_time_ms: started.elapsed().as_millis() as u64,
            metadata: BTreeMap::from([
                ("proof_type".to_string(), self.scheme.to_string()),
                ("circuit_type".to_string(), circuit_type),
            ]),
        })
    }

    fn verify(&self, request: &VerificationRequest) -> Result<VerifyOutcome, VerifyError> {
        if request.proof.is_empty() {
            return Ok(VerifyOutcome::invalid("empty proof"));
        }
        let public_witness = request.public_inputs.as_deref().unwrap_or_default();
        match self.engine.verify(
            self.scheme,
            &request.verification_key,
            &request.proof,
            public_witness,
        ) {
            Ok(true) => Ok(VerifyOutcome::valid()),
            Ok(false) => Ok(VerifyOutcome::invalid("pairing check failed")),
            Err(e) => Ok(VerifyOutcome::invalid(e.to_string())),
        }
    }

    fn capabilities(&self) -> Capabilities {
        self.scheme.capabilities()
    }
}
