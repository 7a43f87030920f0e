//! `attest verify`: check a proof against its verification key.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;

use attest_core::ProofSystemId;
use attest_service::EngineConfig;
use attest_zkp::VerificationRequest;

#[derive(Args, Debug)]
pub struct VerifyArgs {
    /// Proof system id the proof was generated with.
    pub system: ProofSystemId,

    /// Path to the proof bytes.
    pub proof: PathBuf,

    /// Path to the verification key bytes.
    pub verification_key: PathBuf,

    /// Path to the public inputs the caller expects.
    #[arg(long)]
    pub public_inputs: Option<PathBuf>,
}

pub fn run_verify(args: &VerifyArgs, config: &EngineConfig) -> Result<u8> {
    let request = VerificationRequest {
        system: args.system.clone(),
        proof: read(&args.proof)?,
        verification_key: read(&args.verification_key)?,
        public_inputs: args.public_inputs.as_deref().map(read).transpose()?,
    };

    let engine = crate::engine(config)?;
    let response = engine.verifier.verify(&request)?;
    crate::print_json(&response)?;
    Ok(if response.valid { 0 } else { crate::EXIT_REJECTED })
}

fn read(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))
}
