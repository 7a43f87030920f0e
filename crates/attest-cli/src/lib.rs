//! # attest-cli — Operator CLI for the Attest Proof Engine
//!
//! Every subcommand builds a fresh in-memory [`Engine`] from the
//! environment, so records live only as long as the process. Proofs
//! produced by `generate` can be written to disk and checked later with
//! `verify`; the verification key carries everything needed.
//!
//! Exit codes: `0` success, `1` error, `2` the proof failed or did not
//! verify.

pub mod config;
pub mod generate;
pub mod run;
pub mod systems;
pub mod verify;

use std::time::Duration;

use anyhow::{bail, Context, Result};

use attest_core::{OwnerId, ProofId};
use attest_service::{BackendDeps, Engine, EngineConfig};
use attest_state::{ProofRecord, ProofStatus};

/// Exit code for a proof that failed generation or verification.
pub const EXIT_REJECTED: u8 = 2;

/// Build the in-memory engine for one CLI invocation.
pub fn engine(config: &EngineConfig) -> Result<Engine> {
    Engine::in_memory(config.clone(), BackendDeps::default()).context("failed to start engine")
}

/// Poll `proof_id` until it reaches a terminal status or `timeout` passes.
///
/// A worker pool must already be draining the engine's queue.
pub async fn wait_for_proof(
    engine: &Engine,
    owner: &OwnerId,
    proof_id: &ProofId,
    timeout: Duration,
) -> Result<ProofRecord> {
    let poll = Duration::from_millis(engine.config.worker_poll_interval_ms.max(10));
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        let record = engine.proofs.get_proof(owner, proof_id)?;
        if record.status.is_terminal() {
            return Ok(record);
        }
        if tokio::time::Instant::now() >= deadline {
            bail!(
                "{proof_id} still {} after {}s",
                record.status,
                timeout.as_secs()
            );
        }
        tokio::time::sleep(poll).await;
    }
}

/// Exit code for a terminal proof status.
pub fn status_code(status: ProofStatus) -> u8 {
    match status {
        ProofStatus::Completed => 0,
        _ => EXIT_REJECTED,
    }
}

/// Print `value` as pretty JSON on stdout.
pub fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
