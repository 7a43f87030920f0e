//! # Proof System Trait
//!
//! The uniform contract every backend satisfies. Callers hold backends as
//! `Arc<dyn ProofSystem>` and never branch on backend identity except to
//! select one; everything else is read from [`Capabilities`].
//!
//! ## Security Invariant
//!
//! `generate()` is a pure function of the request and supplied key material.
//! The only side inputs are the clock and entropy source a backend was
//! constructed with. `verify()` is stateless.
//!
//! ## Verification outcomes are data
//!
//! A proof that parses but does not check out is `Ok(VerifyOutcome { valid:
//! false, .. })`. [`VerifyError`] is reserved for bytes that are not a
//! document at all, which indicates transport corruption rather than a
//! forged or mismatched proof.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use attest_core::ProofSystemId;

use crate::types::{
    CircuitDescriptor, ProofArtifact, ProofRequest, SetupResult, VerificationRequest,
    VerifyOutcome,
};

/// Error during setup or proof generation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProofError {
    /// The payload's data type tag is not one the backend understands.
    #[error("unsupported data type: {0}")]
    UnsupportedDataType(String),
    /// The payload or options are malformed for this backend.
    #[error("invalid inputs: {0}")]
    InvalidInputs(String),
    /// Circuit setup failed.
    #[error("setup failed: {0}")]
    SetupFailed(String),
    /// The prover failed on well-formed input.
    #[error("generation failed: {0}")]
    GenerationFailed(String),
}

impl ProofError {
    /// Whether another attempt with the same request could succeed.
    ///
    /// Input errors are deterministic and never retried.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::SetupFailed(_) | Self::GenerationFailed(_))
    }
}

/// Hard verification error: the proof or key bytes are not parseable.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VerifyError {
    #[error("malformed proof: {0}")]
    MalformedProof(String),
}

/// What a backend can do, declared once at construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities {
    /// The backend accepts [`ProofSystem::setup`] and benefits from cached keys.
    pub supports_setup: bool,
    /// Setup output is toxic waste that must come from a ceremony.
    pub requires_trusted_setup: bool,
    pub supports_custom_circuits: bool,
    /// Generation is too slow for the request path; always run as a job.
    pub async_only: bool,
    pub typical_generation_ms: u64,
    pub max_proof_size_bytes: u64,
    pub features: Vec<String>,
}

/// Abstract interface for a proof-system backend.
///
/// Object-safe so that backends from external libraries can be registered
/// alongside the built-in ones.
pub trait ProofSystem: Send + Sync + std::fmt::Debug {
    /// Stable, unique backend identifier.
    fn id(&self) -> ProofSystemId;

    /// Produce key material for a circuit. Backends without setup return
    /// empty proving-key material.
    fn setup(&self, circuit: &CircuitDescriptor) -> Result<SetupResult, ProofError>;

    /// Generate a proof.
    fn generate(&self, request: &ProofRequest) -> Result<ProofArtifact, ProofError>;

    /// Verify a proof.
    fn verify(&self, request: &VerificationRequest) -> Result<VerifyOutcome, VerifyError>;

    fn capabilities(&self) -> Capabilities;
}

/// Parse opaque bytes as a JSON document, or fail hard.
pub(crate) fn parse_document(
    what: &str,
    bytes: &[u8],
) -> Result<serde_json::Value, VerifyError> {
    serde_json::from_slice(bytes)
        .map_err(|e| VerifyError::MalformedProof(format!("{what} is not a JSON document: {e}")))
}
