//! `attest generate`: generate one proof from command-line input.
//!
//! Inline backends answer immediately. When the request goes to the queue
//! (`--async`, or a backend that only runs as a job) a worker pool is
//! started in-process and the command waits for the job to finish.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;

use attest_core::{OwnerId, ProofSystemId};
use attest_service::{EngineConfig, GenerateRequest};
use attest_zkp::{DataType, InputData, ProofArtifact};

#[derive(Args, Debug)]
pub struct GenerateArgs {
    /// Proof system id (e.g. commitment, stark).
    pub system: ProofSystemId,

    /// Input data type: string, json or bytes (hex).
    #[arg(long = "type", default_value = "string")]
    pub data_type: String,

    /// Input value, interpreted according to --type.
    #[arg(long)]
    pub value: String,

    /// Public inputs as a JSON object.
    #[arg(long)]
    pub public_inputs: Option<String>,

    /// Run as a background job on the in-process worker pool.
    #[arg(long = "async")]
    pub run_async: bool,

    /// Queue priority: 1 high, 0 normal, -1 low.
    #[arg(
        long,
        default_value_t = 0,
        allow_hyphen_values = true,
        value_parser = clap::value_parser!(i8).range(-1..=1)
    )]
    pub priority: i8,

    /// Write proof.json, verification_key.json and public_inputs.json here.
    #[arg(long)]
    pub out: Option<PathBuf>,

    /// Seconds to wait for a queued job.
    #[arg(long, default_value_t = 300)]
    pub timeout: u64,
}

pub async fn run_generate(args: &GenerateArgs, config: &EngineConfig) -> Result<u8> {
    let engine = crate::engine(config)?;
    let owner = OwnerId::new();

    let mut request = GenerateRequest::new(
        owner,
        args.system.clone(),
        input_data(&args.data_type, &args.value)?,
    )
    .with_priority(args.priority);
    if let Some(raw) = &args.public_inputs {
        request.public_inputs =
            serde_json::from_str(raw).context("--public-inputs must be a JSON object")?;
    }
    if args.run_async {
        request = request.run_async();
    }

    let response = engine.proofs.generate(request).await?;
    let record = if response.status.is_terminal() {
        engine.proofs.get_proof(&owner, &response.proof_id)?
    } else {
        tracing::info!(
            proof_id = %response.proof_id,
            job_id = ?response.job_id,
            "queued, waiting for workers"
        );
        let pool = engine.worker_pool().spawn();
        let waited = crate::wait_for_proof(
            &engine,
            &owner,
            &response.proof_id,
            Duration::from_secs(args.timeout),
        )
        .await;
        pool.shutdown().await;
        waited?
    };

    if let (Some(dir), Some(artifact)) = (&args.out, &record.artifact) {
        write_artifact(dir, artifact)?;
    }
    crate::print_json(&record)?;
    Ok(crate::status_code(record.status))
}

/// Build the typed input from the raw `--type` and `--value` pair.
///
/// Unknown types pass through so the backend reports them.
pub fn input_data(data_type: &str, value: &str) -> Result<InputData> {
    match DataType::from(data_type.to_string()) {
        DataType::Json => Ok(InputData::json(
            serde_json::from_str(value).context("--value is not valid JSON")?,
        )),
        other => Ok(InputData {
            data_type: other,
            value: serde_json::Value::String(value.to_string()),
        }),
    }
}

fn write_artifact(dir: &Path, artifact: &ProofArtifact) -> Result<()> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("failed to create {}", dir.display()))?;
    for (name, bytes) in [
        ("proof.json", &artifact.proof),
        ("verification_key.json", &artifact.verification_key),
        ("public_inputs.json", &artifact.public_inputs),
    ] {
        let path = dir.join(name);
        std::fs::write(&path, bytes)
            .with_context(|| format!("failed to write {}", path.display()))?;
    }
    tracing::info!(dir = %dir.display(), "artifact written");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn json_values_are_parsed() {
        let data = input_data("json", r#"{"a":7,"b":8,"c":56}"#).unwrap();
        assert_eq!(data, InputData::json(json!({"a": 7, "b": 8, "c": 56})));
    }

    #[test]
    fn invalid_json_is_rejected_early() {
        let err = input_data("json", "{not json").unwrap_err();
        assert!(format!("{err:#}").contains("--value is not valid JSON"));
    }

    #[test]
    fn other_types_keep_the_raw_string() {
        assert_eq!(input_data("string", "hello").unwrap(), InputData::string("hello"));
        let bytes = input_data("bytes", "deadbeef").unwrap();
        assert_eq!(bytes.data_type, DataType::Bytes);
        assert_eq!(bytes.to_bytes().unwrap(), vec![0xde, 0xad, 0xbe, 0xef]);
        let other = input_data("xml", "<a/>").unwrap();
        assert_eq!(other.data_type, DataType::Other("xml".into()));
    }
}
