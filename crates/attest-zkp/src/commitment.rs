//! # Signed-Commitment Prover
//!
//! A setup-free attestation that the engine saw some data: a random nonce
//! binds the data into a SHA-256 commitment, and an Ed25519 signature over
//! the commitment binds it to this engine's key.
//!
//! ## Not zero-knowledge
//!
//! This is a commitment-and-attestation scheme. The verifier learns nothing
//! about the data, but it also cannot check any statement about it; it only
//! learns that the holder of the signing key committed to *something*.
//!
//! The committed bytes are the normalized payload bytes: UTF-8 for
//! `string`, decoded bytes for `bytes`, and for `json` the compact
//! serialization with sorted keys rather than the text the caller sent.
//!
//! ## Key management
//!
//! One key pair per process, generated at construction (or derived from a
//! seed in tests) and shared by every proof. There is no rotation and no
//! per-circuit key.
//!
//! ## Wire format
//!
//! ```text
//! proof            {"commitment","nonce","signature","timestamp","public_key"}  (hex fields)
//! verification key {"public_key"}
//! public inputs    {}
//! ```

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};

use attest_core::{
    hex, Clock, EntropySource, OsEntropy, ProofSystemId, Sha256Accumulator, SystemClock,
};
use attest_crypto::{Ed25519KeyPair, Ed25519PublicKey, Ed25519Signature};

use crate::traits::{parse_document, Capabilities, ProofError, ProofSystem, VerifyError};
use crate::types::{
    CircuitDescriptor, ProofArtifact, ProofRequest, SetupResult, VerificationRequest,
    VerifyOutcome,
};

/// Length of the random nonce mixed into every commitment.
pub const NONCE_LEN: usize = 32;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct CommitmentProof {
    commitment: String,
    nonce: String,
    signature: String,
    timestamp: String,
    public_key: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct CommitmentKey {
    public_key: String,
}

/// The signed-commitment backend.
#[derive(Debug)]
pub struct CommitmentProver {
    keypair: Ed25519KeyPair,
    clock: Arc<dyn Clock>,
    entropy: Arc<dyn EntropySource>,
}

impl CommitmentProver {
    /// A prover with a fresh random key, the system clock and OS entropy.
    pub fn new() -> Self {
        Self::with_parts(
            Ed25519KeyPair::from_entropy(&OsEntropy),
            Arc::new(SystemClock),
            Arc::new(OsEntropy),
        )
    }

    pub fn with_parts(
        keypair: Ed25519KeyPair,
        clock: Arc<dyn Clock>,
        entropy: Arc<dyn EntropySource>,
    ) -> Self {
        Self {
            keypair,
            clock,
            entropy,
        }
    }

    /// The public half of the signing key, as embedded in every proof.
    pub fn public_key(&self) -> Ed25519PublicKey {
        self.keypair.public_key()
    }

    fn verification_key_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(&CommitmentKey {
            public_key: self.public_key().to_hex(),
        })
    }
}

impl Default for CommitmentProver {
    fn default() -> Self {
        Self::new()
    }
}

impl ProofSystem for CommitmentProver {
    fn id(&self) -> ProofSystemId {
        ProofSystemId::commitment()
    }

    fn setup(&self, _circuit: &CircuitDescriptor) -> Result<SetupResult, ProofError> {
        let verification_key = self
            .verification_key_bytes()
            .map_err(|e| ProofError::SetupFailed(e.to_string()))?;
        Ok(SetupResult {
            proving_key: Vec::new(),
            verification_key,
            metadata: BTreeMap::new(),
        })
    }

    fn generate(&self, request: &ProofRequest) -> Result<ProofArtifact, ProofError> {
        let started = Instant::now();
        let data = request.data.to_bytes()?;

        let mut nonce = [0u8; NONCE_LEN];
        self.entropy.fill_bytes(&mut nonce);

        let mut acc = Sha256Accumulator::new();
        acc.update(&data).update(nonce);
        let commitment = acc.finalize();
        let signature = self.keypair.sign(&commitment);

        let proof = CommitmentProof {
            commitment: hex::encode(&commitment),
            nonce: hex::encode(&nonce),
            signature: signature.to_hex(),
            timestamp: self.clock.now().to_rfc3339(),
            public_key: self.public_key().to_hex(),
        };
        let proof =
            serde_json::to_vec(&proof).map_err(|e| ProofError::GenerationFailed(e.to_string()))?;
        let verification_key = self
            .verification_key_bytes()
            .map_err(|e| ProofError::GenerationFailed(e.to_string()))?;

        let metadata = BTreeMap::from([
            ("proof_type".to_string(), "commitment".to_string()),
            ("hash_algo".to_string(), "sha256".to_string()),
            ("sig_algo".to_string(), "ed25519".to_string()),
        ]);

        Ok(ProofArtifact {
            proof,
            verification_key,
            public_inputs: b"{}".to_vec(),
            generation_time_ms: started.elapsed().as_millis() as u64,
            metadata,
        })
    }

    fn verify(&self, request: &VerificationRequest) -> Result<VerifyOutcome, VerifyError> {
        let proof = parse_document("proof", &request.proof)?;
        let key = parse_document("verification key", &request.verification_key)?;

        let proof: CommitmentProof = match serde_json::from_value(proof) {
            Ok(p) => p,
            Err(e) => return Ok(VerifyOutcome::invalid(format!("malformed proof: {e}"))),
        };
        let key: CommitmentKey = match serde_json::from_value(key) {
            Ok(k) => k,
            Err(e) => {
                return Ok(VerifyOutcome::invalid(format!(
                    "malformed verification key: {e}"
                )))
            }
        };

        let commitment = match hex::decode_array::<32>(&proof.commitment) {
            Ok(c) => c,
            Err(e) => return Ok(VerifyOutcome::invalid(format!("invalid commitment: {e}"))),
        };
        let signature = match Ed25519Signature::from_hex(&proof.signature) {
            Ok(s) => s,
            Err(e) => return Ok(VerifyOutcome::invalid(format!("invalid signature: {e}"))),
        };
        let public_key = match Ed25519PublicKey::from_hex(&key.public_key) {
            Ok(k) => k,
            Err(e) => return Ok(VerifyOutcome::invalid(format!("invalid public key: {e}"))),
        };

        match attest_crypto::verify(&commitment, &signature, &public_key) {
            Ok(()) => Ok(VerifyOutcome::valid()),
            Err(e) => Ok(VerifyOutcome::invalid(e.to_string())),
        }
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            supports_setup: false,
            requires_trusted_setup: false,
            supports_custom_circuits: false,
            async_only: false,
            typical_generation_ms: 50,
            max_proof_size_bytes: 512,
            features: vec![
                "fast-generation".into(),
                "simple-commitment".into(),
                "digital-signature".into(),
            ],
        }
    }
}
