//! `attest run`: submit a request file to the in-process worker pool and
//! wait for every proof to finish.
//!
//! The file holds one request or an array of them:
//!
//! ```json
//! {"system": "stark", "data": {"type": "json", "value": {"a": 7, "b": 8, "c": 56}},
//!  "options": {"priority": 1}}
//! ```
//!
//! Every request runs as a queued job regardless of its `async` option.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Args;
use serde::Deserialize;

use attest_core::{OwnerId, ProofSystemId};
use attest_service::{Engine, EngineConfig, GenerateOptions, GenerateRequest};
use attest_state::{ProofRecord, ProofStatus};
use attest_zkp::InputData;

#[derive(Args, Debug)]
pub struct RunArgs {
    /// JSON request file.
    pub requests: PathBuf,

    /// Override WORKER_CONCURRENCY for this run.
    #[arg(long)]
    pub concurrency: Option<usize>,

    /// Seconds to wait for all jobs.
    #[arg(long, default_value_t = 300)]
    pub timeout: u64,
}

/// A request as written in a request file; the owner is assigned per run.
#[derive(Debug, Clone, Deserialize)]
pub struct Submission {
    pub system: ProofSystemId,
    pub data: InputData,
    #[serde(default)]
    pub public_inputs: serde_json::Map<String, serde_json::Value>,
    #[serde(default)]
    pub options: GenerateOptions,
}

impl Submission {
    fn into_request(self, owner: OwnerId) -> GenerateRequest {
        let mut request = GenerateRequest::new(owner, self.system, self.data);
        request.public_inputs = self.public_inputs;
        request.options = self.options;
        request.run_async()
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RequestFile {
    Many(Vec<Submission>),
    One(Submission),
}

/// Parse a request file body.
pub fn parse_requests(body: &str) -> Result<Vec<Submission>> {
    let parsed: RequestFile = serde_json::from_str(body).context("malformed request file")?;
    let submissions = match parsed {
        RequestFile::Many(all) => all,
        RequestFile::One(one) => vec![one],
    };
    if submissions.is_empty() {
        bail!("request file contains no requests");
    }
    Ok(submissions)
}

pub async fn run_run(args: &RunArgs, config: &EngineConfig) -> Result<u8> {
    let submissions = load(&args.requests)?;
    let mut config = config.clone();
    if let Some(concurrency) = args.concurrency {
        config.worker_concurrency = concurrency.max(1);
    }

    let engine = crate::engine(&config)?;
    let owner = OwnerId::new();
    let requests: Vec<GenerateRequest> = submissions
        .into_iter()
        .map(|s| s.into_request(owner))
        .collect();

    let batch = engine.proofs.generate_batch(owner, requests).await?;
    tracing::info!(
        total = batch.total,
        accepted = batch.success,
        rejected = batch.failed,
        "requests submitted"
    );
    for item in batch.results.iter().filter(|r| !r.success) {
        tracing::warn!(
            index = item.index,
            "request rejected: {}",
            item.error.as_deref().unwrap_or("unknown error")
        );
    }

    let pool = engine.worker_pool().spawn();
    let records = wait_all(&engine, &owner, &batch.results, args.timeout).await;
    pool.shutdown().await;
    let records = records?;

    crate::print_json(&records)?;
    let all_completed =
        batch.failed == 0 && records.iter().all(|r| r.status == ProofStatus::Completed);
    Ok(if all_completed { 0 } else { crate::EXIT_REJECTED })
}

async fn wait_all(
    engine: &Engine,
    owner: &OwnerId,
    results: &[attest_service::BatchItemResult],
    timeout: u64,
) -> Result<Vec<ProofRecord>> {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(timeout);
    let mut records = Vec::with_capacity(results.len());
    for response in results.iter().filter_map(|r| r.response.as_ref()) {
        let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
        let record = crate::wait_for_proof(engine, owner, &response.proof_id, remaining).await?;
        tracing::info!(
            proof_id = %record.id,
            system = %record.system,
            status = %record.status,
            "proof finished"
        );
        records.push(record);
    }
    Ok(records)
}

fn load(path: &Path) -> Result<Vec<Submission>> {
    let body = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    parse_requests(&body).with_context(|| format!("in {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn single_request_file() {
        let subs = parse_requests(
            r#"{"system": "stark", "data": {"type": "json", "value": {"a": 7, "b": 8, "c": 56}}}"#,
        )
        .unwrap();
        assert_eq!(subs.len(), 1);
        assert_eq!(subs[0].system, ProofSystemId::stark());
        assert_eq!(subs[0].data, InputData::json(json!({"a": 7, "b": 8, "c": 56})));
    }

    #[test]
    fn array_request_file_keeps_options() {
        let subs = parse_requests(
            r#"[
                {"system": "commitment", "data": {"type": "string", "value": "x"},
                 "options": {"priority": -1}},
                {"system": "stark", "data": {"type": "json", "value": {"a": 1}},
                 "public_inputs": {"k": "v"}}
            ]"#,
        )
        .unwrap();
        assert_eq!(subs.len(), 2);
        assert_eq!(subs[0].options.priority, -1);
        assert_eq!(subs[1].public_inputs["k"], json!("v"));
    }

    #[test]
    fn every_submission_is_forced_async() {
        let sub = parse_requests(r#"{"system": "commitment", "data": {"type": "string", "value": "x"}}"#)
            .unwrap()
            .remove(0);
        let owner = OwnerId::new();
        let req = sub.into_request(owner);
        assert!(req.options.run_async);
        assert_eq!(req.owner, owner);
    }

    #[test]
    fn empty_or_malformed_files_are_rejected() {
        assert!(parse_requests("[]").is_err());
        assert!(parse_requests("{\"system\": \"stark\"}").is_err());
        assert!(parse_requests("not json").is_err());
    }
}
