//! End-to-end checks of the helpers the subcommands share.

use std::time::Duration;

use serde_json::json;

use attest_cli::{engine, status_code, wait_for_proof, EXIT_REJECTED};
use attest_core::{OwnerId, ProofSystemId};
use attest_service::{EngineConfig, GenerateRequest};
use attest_state::ProofStatus;
use attest_zkp::{InputData, VerificationRequest};

fn config() -> EngineConfig {
    EngineConfig {
        worker_concurrency: 2,
        worker_poll_interval_ms: 5,
        ..EngineConfig::default()
    }
}

#[tokio::test]
async fn queued_stark_proof_is_awaited_and_verifies() {
    let engine = engine(&config()).unwrap();
    let owner = OwnerId::new();
    let request = GenerateRequest::new(
        owner,
        ProofSystemId::stark(),
        InputData::json(json!({"a": 7, "b": 8, "c": 56})),
    )
    .run_async()
    .with_priority(1);

    let response = engine.proofs.generate(request).await.unwrap();
    assert_eq!(response.status, ProofStatus::Pending);

    let pool = engine.worker_pool().spawn();
    let record = wait_for_proof(&engine, &owner, &response.proof_id, Duration::from_secs(10))
        .await
        .unwrap();
    pool.shutdown().await;

    assert_eq!(record.status, ProofStatus::Completed);
    assert_eq!(status_code(record.status), 0);

    let artifact = record.artifact.unwrap();
    let verified = engine
        .verifier
        .verify(&VerificationRequest::for_artifact(ProofSystemId::stark(), &artifact))
        .unwrap();
    assert!(verified.valid);
}

#[tokio::test]
async fn waiting_without_workers_times_out() {
    let engine = engine(&config()).unwrap();
    let owner = OwnerId::new();
    let response = engine
        .proofs
        .generate(
            GenerateRequest::new(owner, ProofSystemId::commitment(), InputData::string("x"))
                .run_async(),
        )
        .await
        .unwrap();

    let err = wait_for_proof(&engine, &owner, &response.proof_id, Duration::from_millis(30))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("still pending"));
}

#[test]
fn failed_proofs_map_to_the_rejected_exit_code() {
    assert_eq!(status_code(ProofStatus::Failed), EXIT_REJECTED);
}
