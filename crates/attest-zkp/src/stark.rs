//! # Simplified STARK-Style Prover
//!
//! A transparent, hash-based proof: an execution trace is committed with
//! SHA-256 and Fiat–Shamir challenges are derived from the commitment and
//! public inputs. No trusted setup, no per-circuit keys.
//!
//! ## Not production-grade
//!
//! There is no low-degree test, no FRI folding and no constraint check: the
//! verifier does not confirm that `a * b = c` for multiplication traces. A
//! proof shows only that the trace, commitment and challenges are mutually
//! consistent and bound to the published inputs.
//!
//! ## Trace construction
//!
//! ```text
//! {"value": v}          → step hex(SHA-256(display(v)))        published: same
//! {"a": a, "b": b, ...} → steps a, b, a*b  (decimal integers)  published: c
//! anything else         → step hex(SHA-256(compact sorted JSON)) published: same
//! ```
//!
//! `value` and `a`/`b`/`c` may both be present; the `value` step comes first.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use attest_core::{hex, sha256, sha256_hex, Clock, ProofSystemId, Sha256Accumulator, SystemClock};

use crate::traits::{parse_document, Capabilities, ProofError, ProofSystem, VerifyError};
use crate::types::{
    CircuitDescriptor, ProofArtifact, ProofRequest, SetupResult, VerificationRequest,
    VerifyOutcome,
};

/// `2^256 - 189`, in decimal.
pub const FIELD_PRIME: &str =
    "115792089237316195423570985008687907853269984665640564039457584007913129639747";

pub const PROOF_VERSION: &str = "1.0";

/// Number of Fiat–Shamir challenges per proof.
pub const CHALLENGE_COUNT: u8 = 3;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct StarkProof {
    trace: Vec<String>,
    commitment: String,
    challenges: Vec<String>,
    public_inputs: Vec<String>,
    timestamp: String,
    field_prime: String,
    proof_version: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct StarkVerifyingKey {
    field_prime: String,
    public_inputs: Vec<String>,
    proof_version: String,
}

/// An execution trace and the values it publishes.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Trace {
    pub steps: Vec<String>,
    pub public_inputs: Vec<String>,
}

/// The simplified STARK backend.
#[derive(Debug)]
pub struct StarkProver {
    clock: Arc<dyn Clock>,
}

impl StarkProver {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }
}

impl Default for StarkProver {
    fn default() -> Self {
        Self::new()
    }
}

/// Build the execution trace for an input object.
pub fn build_trace(input: &Map<String, Value>) -> Result<Trace, ProofError> {
    let mut trace = Trace::default();

    if let Some(value) = input.get("value") {
        let step = sha256_hex(display(value).as_bytes());
        trace.steps.push(step.clone());
        trace.public_inputs.push(step);
    }

    if let (Some(a), Some(b), Some(c)) = (input.get("a"), input.get("b"), input.get("c")) {
        let a = integer_operand("a", a)?;
        let b = integer_operand("b", b)?;
        let c = integer_operand("c", c)?;
        let product = a
            .checked_mul(b)
            .ok_or_else(|| ProofError::InvalidInputs(format!("{a} * {b} overflows")))?;
        trace.steps.push(a.to_string());
        trace.steps.push(b.to_string());
        trace.steps.push(product.to_string());
        trace.public_inputs.push(c.to_string());
    }

    if trace.steps.is_empty() {
        let canonical = serde_json::to_vec(input)
            .map_err(|e| ProofError::InvalidInputs(format!("input encoding: {e}")))?;
        let step = sha256_hex(&canonical);
        trace.steps.push(step.clone());
        trace.public_inputs.push(step);
    }

    Ok(trace)
}

/// `hex(SHA-256(step_0 || step_1 || ...))` over the step strings.
pub fn commit_trace(steps: &[String]) -> String {
    let mut acc = Sha256Accumulator::new();
    for step in steps {
        acc.update(step);
    }
    acc.finalize_hex()
}

/// Fiat–Shamir challenges bound to the commitment and public inputs.
///
/// `transcript = SHA-256(commitment || pi_0 || pi_1 || ...)`, then each
/// challenge is the first 8 bytes of `SHA-256(transcript || i)` in hex.
pub fn derive_challenges(commitment: &str, public_inputs: &[String]) -> Vec<String> {
    let mut acc = Sha256Accumulator::new();
    acc.update(commitment);
    for input in public_inputs {
        acc.update(input);
    }
    let transcript = acc.finalize();

    (0..CHALLENGE_COUNT)
        .map(|i| {
            let mut buf = transcript.to_vec();
            buf.push(i);
            hex::encode(&sha256(&buf)[..8])
        })
        .collect()
}

/// Strings render bare; everything else renders as compact JSON.
fn display(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn integer_operand(name: &str, value: &Value) -> Result<i128, ProofError> {
    let parsed = match value {
        Value::Number(n) => n
            .as_i64()
            .map(i128::from)
            .or_else(|| n.as_u64().map(i128::from)),
        Value::String(s) => s.trim().parse::<i128>().ok(),
        _ => None,
    };
    parsed.ok_or_else(|| {
        ProofError::InvalidInputs(format!("operand {name} must be an integer, got {value}"))
    })
}

impl ProofSystem for StarkProver {
    fn id(&self) -> ProofSystemId {
        ProofSystemId::stark()
    }

    fn setup(&self, _circuit: &CircuitDescriptor) -> Result<SetupResult, ProofError> {
        Ok(SetupResult {
            proving_key: Vec::new(),
            verification_key: Vec::new(),
            metadata: BTreeMap::from([("transparent".to_string(), "true".to_string())]),
        })
    }

    fn generate(&self, request: &ProofRequest) -> Result<ProofArtifact, ProofError> {
        let started = Instant::now();
        let input = request.data.to_object()?;
        let trace = build_trace(&input)?;
        let commitment = commit_trace(&trace.steps);
        let challenges = derive_challenges(&commitment, &trace.public_inputs);

        let vk = StarkVerifyingKey {
            field_prime: FIELD_PRIME.to_string(),
            public_inputs: trace.public_inputs.clone(),
            proof_version: PROOF_VERSION.to_string(),
        };
        let public_inputs = serde_json::to_vec(&trace.public_inputs)
            .map_err(|e| ProofError::GenerationFailed(e.to_string()))?;
        let steps = trace.steps.len();
        let proof = StarkProof {
            trace: trace.steps,
            commitment,
            challenges,
            public_inputs: trace.public_inputs,
            timestamp: self.clock.now().to_rfc3339(),
            field_prime: FIELD_PRIME.to_string(),
            proof_version: PROOF_VERSION.to_string(),
        };

        let proof =
            serde_json::to_vec(&proof).map_err(|e| ProofError::GenerationFailed(e.to_string()))?;
        let verification_key =
            serde_json::to_vec(&vk).map_err(|e| ProofError::GenerationFailed(e.to_string()))?;

        Ok(ProofArtifact {
            proof,
            verification_key,
            public_inputs,
            generation_time_ms: started.elapsed().as_millis() as u64,
            metadata: BTreeMap::from([
                ("proof_type".to_string(), "stark".to_string()),
                ("hash_algo".to_string(), "sha256".to_string()),
                ("trace_length".to_string(), steps.to_string()),
            ]),
        })
    }

    fn verify(&self, request: &VerificationRequest) -> Result<VerifyOutcome, VerifyError> {
        let proof = parse_document("proof", &request.proof)?;
        let vk = parse_document("verification key", &request.verification_key)?;

        let proof: StarkProof = match serde_json::from_value(proof) {
            Ok(p) => p,
            Err(e) => return Ok(VerifyOutcome::invalid(format!("malformed proof: {e}"))),
        };
        let vk: StarkVerifyingKey = match serde_json::from_value(vk) {
            Ok(k) => k,
            Err(e) => {
                return Ok(VerifyOutcome::invalid(format!(
                    "malformed verification key: {e}"
                )))
            }
        };

        if proof.proof_version != PROOF_VERSION || vk.proof_version != PROOF_VERSION {
            return Ok(VerifyOutcome::invalid("unsupported proof version"));
        }
        if proof.field_prime != FIELD_PRIME || vk.field_prime != FIELD_PRIME {
            return Ok(VerifyOutcome::invalid("field prime mismatch"));
        }
        if proof.public_inputs != vk.public_inputs {
            return Ok(VerifyOutcome::invalid("public inputs mismatch"));
        }
        if let Some(bytes) = &request.public_inputs {
            let supplied: Option<Vec<String>> = serde_json::from_slice(bytes).ok();
            if supplied.as_ref() != Some(&proof.public_inputs) {
                return Ok(VerifyOutcome::invalid("public inputs mismatch"));
            }
        }
        if commit_trace(&proof.trace) != proof.commitment {
            return Ok(VerifyOutcome::invalid("commitment mismatch"));
        }
        if derive_challenges(&proof.commitment, &proof.public_inputs) != proof.challenges {
            return Ok(VerifyOutcome::invalid("challenge mismatch"));
        }
        if proof.trace.is_empty() || proof.public_inputs.is_empty() {
            return Ok(VerifyOutcome::invalid("empty trace or public inputs"));
        }

        Ok(VerifyOutcome::valid())
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            supports_setup: false,
            requires_trusted_setup: false,
            supports_custom_circuits: true,
            async_only: true,
            typical_generation_ms: 40_000,
            max_proof_size_bytes: 102_400,
            features: vec![
                "transparent".into(),
                "no-trusted-setup".into(),
                "quantum-resistant".into(),
                "hash-based".into(),
                "fri-commitment".into(),
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::InputData;
    use attest_core::{FixedClock, Timestamp};
    use proptest::prelude::*;
    use serde_json::json;

    fn prover() -> StarkProver {
        StarkProver::with_clock(Arc::new(FixedClock::new(
            Timestamp::parse("2026-02-01T00:00:00.000Z").unwrap(),
        )))
    }

    fn generate(input: Value) -> ProofArtifact {
        prover()
            .generate(&ProofRequest::new(ProofSystemId::stark(), InputData::json(input)))
            .unwrap()
    }

    fn verify(proof: Vec<u8>, vk: Vec<u8>) -> VerifyOutcome {
        prover()
            .verify(&VerificationRequest {
                system: ProofSystemId::stark(),
                proof,
                verification_key: vk,
                public_inputs: None,
            })
            .unwrap()
    }

    fn obj(v: Value) -> Map<String, Value> {
        v.as_object().unwrap().clone()
    }

    // ── Trace construction ───────────────────────────────────────────

    #[test]
    fn multiplication_trace() {
        let trace = build_trace(&obj(json!({"a": 7, "b": 8, "c": 56}))).unwrap();
        assert_eq!(trace.steps, vec!["7", "8", "56"]);
        assert_eq!(trace.public_inputs, vec!["56"]);
    }

    #[test]
    fn multiplication_accepts_decimal_strings() {
        let trace = build_trace(&obj(json!({"a": "3", "b": "-4", "c": "-12"}))).unwrap();
        assert_eq!(trace.steps, vec!["3", "-4", "-12"]);
    }

    #[test]
    fn multiplication_overflow_is_invalid_input() {
        let big = i64::MAX;
        let fits = build_trace(&obj(json!({"a": big, "b": big, "c": 1})));
        assert!(fits.is_ok(), "i64 operands fit in i128 products");
        let huge = "170141183460469231731687303715884105727";
        let err = build_trace(&obj(json!({"a": huge, "b": 2, "c": 1}))).unwrap_err();
        assert!(matches!(err, ProofError::InvalidInputs(_)));
    }

    #[test]
    fn non_integer_operand_is_invalid_input() {
        let err = build_trace(&obj(json!({"a": 1.5, "b": 2, "c": 3}))).unwrap_err();
        assert!(matches!(err, ProofError::InvalidInputs(_)));
    }

    #[test]
    fn value_trace_hashes_display_form() {
        let trace = build_trace(&obj(json!({"value": "hello"}))).unwrap();
        assert_eq!(trace.steps, vec![sha256_hex(b"hello")]);
        assert_eq!(trace.public_inputs, trace.steps);
        let trace = build_trace(&obj(json!({"value": 42}))).unwrap();
        assert_eq!(trace.steps, vec![sha256_hex(b"42")]);
    }

    #[test]
    fn value_and_multiplication_combine() {
        let trace = build_trace(&obj(json!({"value": 1, "a": 2, "b": 3, "c": 6}))).unwrap();
        assert_eq!(trace.steps.len(), 4);
        assert_eq!(trace.steps[0], sha256_hex(b"1"));
        assert_eq!(trace.public_inputs, vec![sha256_hex(b"1"), "6".to_string()]);
    }

    #[test]
    fn fallback_hashes_sorted_compact_json() {
        let trace = build_trace(&obj(json!({"z": 1, "m": [true]}))).unwrap();
        assert_eq!(trace.steps, vec![sha256_hex(br#"{"m":[true],"z":1}"#)]);
    }

    #[test]
    fn partial_multiplication_falls_back() {
        let trace = build_trace(&obj(json!({"a": 1, "b": 2}))).unwrap();
        assert_eq!(trace.steps.len(), 1);
        assert_eq!(trace.steps[0].len(), 64);
    }

    #[test]
    fn challenges_are_eight_bytes_each() {
        let challenges = derive_challenges("abc", &["1".to_string()]);
        assert_eq!(challenges.len(), 3);
        assert!(challenges.iter().all(|c| c.len() == 16));
        assert_ne!(challenges[0], challenges[1]);
    }

    #[test]
    fn non_object_payload_is_invalid_input() {
        let err = prover()
            .generate(&ProofRequest::new(
                ProofSystemId::stark(),
                InputData::string("not json"),
            ))
            .unwrap_err();
        assert!(matches!(err, ProofError::InvalidInputs(_)));
    }

    // ── Verification ─────────────────────────────────────────────────

    #[test]
    fn round_trip_verifies() {
        let artifact = generate(json!({"a": 7, "b": 8, "c": 56}));
        assert_eq!(artifact.public_inputs, br#"["56"]"#);
        assert_eq!(
            verify(artifact.proof, artifact.verification_key),
            VerifyOutcome::valid()
        );
    }

    #[test]
    fn generation_is_deterministic() {
        let a = generate(json!({"value": "same"}));
        let b = generate(json!({"value": "same"}));
        assert_eq!(a.proof, b.proof);
        assert_eq!(a.verification_key, b.verification_key);
    }

    #[test]
    fn tampered_public_input_in_key_is_rejected() {
        let artifact = generate(json!({"a": 7, "b": 8, "c": 56}));
        let mut vk: Value = serde_json::from_slice(&artifact.verification_key).unwrap();
        vk["public_inputs"] = json!(["57"]);
        let outcome = verify(artifact.proof, serde_json::to_vec(&vk).unwrap());
        assert_eq!(outcome, VerifyOutcome::invalid("public inputs mismatch"));
    }

    #[test]
    fn key_from_another_proof_is_rejected() {
        let a = generate(json!({"value": 1}));
        let b = generate(json!({"value": 2}));
        let outcome = verify(a.proof, b.verification_key);
        assert_eq!(outcome, VerifyOutcome::invalid("public inputs mismatch"));
    }

    #[test]
    fn supplied_public_inputs_must_match() {
        let artifact = generate(json!({"value": 1}));
        let outcome = prover()
            .verify(&VerificationRequest {
                system: ProofSystemId::stark(),
                proof: artifact.proof,
                verification_key: artifact.verification_key,
                public_inputs: Some(br#"["nope"]"#.to_vec()),
            })
            .unwrap();
        assert_eq!(outcome, VerifyOutcome::invalid("public inputs mismatch"));
    }

    #[test]
    fn tampered_commitment_is_rejected() {
        let artifact = generate(json!({"value": 1}));
        let mut proof: Value = serde_json::from_slice(&artifact.proof).unwrap();
        proof["commitment"] = json!("00".repeat(32));
        let outcome = verify(serde_json::to_vec(&proof).unwrap(), artifact.verification_key);
        assert_eq!(outcome, VerifyOutcome::invalid("commitment mismatch"));
    }

    #[test]
    fn tampered_trace_is_rejected() {
        let artifact = generate(json!({"a": 7, "b": 8, "c": 56}));
        let mut proof: Value = serde_json::from_slice(&artifact.proof).unwrap();
        proof["trace"][2] = json!("57");
        let outcome = verify(serde_json::to_vec(&proof).unwrap(), artifact.verification_key);
        assert_eq!(outcome, VerifyOutcome::invalid("commitment mismatch"));
    }

    #[test]
    fn tampered_challenge_is_rejected() {
        let artifact = generate(json!({"value": 1}));
        let mut proof: Value = serde_json::from_slice(&artifact.proof).unwrap();
        proof["challenges"][0] = json!("0000000000000000");
        let outcome = verify(serde_json::to_vec(&proof).unwrap(), artifact.verification_key);
        assert_eq!(outcome, VerifyOutcome::invalid("challenge mismatch"));
    }

    #[test]
    fn version_checked_before_field_prime() {
        let artifact = generate(json!({"value": 1}));
        let mut proof: Value = serde_json::from_slice(&artifact.proof).unwrap();
        proof["proof_version"] = json!("2.0");
        proof["field_prime"] = json!("7");
        let outcome = verify(serde_json::to_vec(&proof).unwrap(), artifact.verification_key);
        assert_eq!(outcome, VerifyOutcome::invalid("unsupported proof version"));
    }

    #[test]
    fn wrong_field_prime_is_rejected() {
        let artifact = generate(json!({"value": 1}));
        let mut vk: Value = serde_json::from_slice(&artifact.verification_key).unwrap();
        vk["field_prime"] = json!("7");
        let outcome = verify(artifact.proof, serde_json::to_vec(&vk).unwrap());
        assert_eq!(outcome, VerifyOutcome::invalid("field prime mismatch"));
    }

    #[test]
    fn empty_trace_is_rejected_last() {
        let commitment = commit_trace(&[]);
        let proof = json!({
            "trace": [],
            "commitment": commitment,
            "challenges": derive_challenges(&commitment, &[]),
            "public_inputs": [],
            "timestamp": "2026-02-01T00:00:00.000Z",
            "field_prime": FIELD_PRIME,
            "proof_version": PROOF_VERSION,
        });
        let vk = json!({
            "field_prime": FIELD_PRIME,
            "public_inputs": [],
            "proof_version": PROOF_VERSION,
        });
        let outcome = verify(
            serde_json::to_vec(&proof).unwrap(),
            serde_json::to_vec(&vk).unwrap(),
        );
        assert_eq!(outcome, VerifyOutcome::invalid("empty trace or public inputs"));
    }

    #[test]
    fn non_json_proof_is_a_hard_error() {
        let err = prover()
            .verify(&VerificationRequest {
                system: ProofSystemId::stark(),
                proof: b"\x00garbage".to_vec(),
                verification_key: b"{}".to_vec(),
                public_inputs: None,
            })
            .unwrap_err();
        assert!(matches!(err, VerifyError::MalformedProof(_)));
    }

    #[test]
    fn capabilities_force_async() {
        let caps = prover().capabilities();
        assert!(caps.async_only);
        assert!(caps.supports_custom_circuits);
        assert!(!caps.requires_trusted_setup);
        assert_eq!(caps.typical_generation_ms, 40_000);
    }

    proptest! {
        #[test]
        fn deterministic_for_any_operands(a in -1_000_000i64..1_000_000, b in -1_000_000i64..1_000_000) {
            let input = json!({"a": a, "b": b, "c": a * b});
            let x = generate(input.clone());
            let y = generate(input);
            prop_assert_eq!(&x.proof, &y.proof);
            prop_assert!(verify(x.proof, x.verification_key).valid);
        }
    }
}
