//! # Proof Service
//!
//! Accepts generation requests and decides, per request, whether to run
//! the backend inline or hand it to the worker pool.
//!
//! ## Dispatch
//!
//! A request runs as a job when the backend declares `async_only` or the
//! caller sets `async`. Otherwise it is generated inline and the proof
//! record moves `pending → processing → completed | failed` within the
//! call; no job is created.
//!
//! ## Validation
//!
//! Unknown backends and undecodable payloads are rejected before any
//! record is written or any cryptographic work is done.

use std::sync::Arc;
use std::time::Duration;

use attest_core::{Clock, JobId, OwnerId, ProofId, Timestamp};
use attest_queue::{ProofTask, TaskEnvelope, TaskQueue};
use attest_state::{Job, JobRepository, Page, ProofRecord, ProofRepository, ProofStatus};
use attest_zkp::{ProofError, ProofRequest, ProofSystem, ProofSystemRegistry};

use crate::config::EngineConfig;
use crate::error::ServiceError;
use crate::setup_cache::SetupCache;
use crate::types::{
    BatchItemResult, BatchResponse, GenerateRequest, GenerateResponse, SystemInfo,
};

/// Orchestrates proof generation and retrieval.
#[derive(Clone)]
pub struct ProofService {
    registry: Arc<ProofSystemRegistry>,
    proofs: Arc<dyn ProofRepository>,
    jobs: Arc<dyn JobRepository>,
    queue: Arc<dyn TaskQueue>,
    clock: Arc<dyn Clock>,
    setup_cache: Arc<SetupCache>,
    max_retries: u32,
    task_timeout: Duration,
    max_batch_size: usize,
}

impl std::fmt::Debug for ProofService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProofService")
            .field("registry", &self.registry)
            .field("queue", &self.queue)
            .field("max_retries", &self.max_retries)
            .field("task_timeout", &self.task_timeout)
            .field("max_batch_size", &self.max_batch_size)
            .finish_non_exhaustive()
    }
}

impl ProofService {
    pub fn new(
        registry: Arc<ProofSystemRegistry>,
        proofs: Arc<dyn ProofRepository>,
        jobs: Arc<dyn JobRepository>,
        queue: Arc<dyn TaskQueue>,
        clock: Arc<dyn Clock>,
        config: &EngineConfig,
    ) -> Self {
        Self {
            registry,
            proofs,
            jobs,
            queue,
            clock,
            setup_cache: Arc::new(SetupCache::new()),
            max_retries: config.job_max_retries,
            task_timeout: config.task_timeout(),
            max_batch_size: config.max_batch_size,
        }
    }

    /// Registered backends and their capabilities, sorted by id.
    pub fn systems(&self) -> Vec<SystemInfo> {
        self.registry
            .list()
            .iter()
            .map(|b| SystemInfo {
                id: b.id(),
                capabilities: b.capabilities(),
            })
            .collect()
    }

    /// Generate a proof inline or enqueue it as a job.
    pub async fn generate(&self, request: GenerateRequest) -> Result<GenerateResponse, ServiceError> {
        let backend = self
            .registry
            .get(&request.system)
            .map_err(|_| ServiceError::UnknownProofSystem(request.system.clone()))?;
        request.data.to_bytes().map_err(|e| match e {
            ProofError::UnsupportedDataType(t) => {
                ServiceError::InvalidInput(format!("unsupported data type: {t}"))
            }
            other => ServiceError::InvalidInput(other.to_string()),
        })?;

        let caps = backend.capabilities();
        let run_async = caps.async_only || request.options.run_async;
        let mut proof_request = build_proof_request(&request);

        if proof_request.proving_key.is_none() && caps.supports_setup {
            if let Some(circuit) = proof_request.circuit.clone() {
                let cache = Arc::clone(&self.setup_cache);
                let b = Arc::clone(&backend);
                let keys = blocking(move || cache.get_or_setup(&*b, &circuit))
                    .await
                    .map_err(ServiceError::Setup)?;
                proof_request.proving_key = Some(keys.proving_key.clone());
            }
        }

        let now = self.clock.now();
        let mut record = ProofRecord::new(request.owner, request.system.clone(), now);
        record.circuit_id = request.options.circuit_id;
        record.template_id = request.options.template_id;
        record.public_inputs = request.public_inputs.clone();

        if run_async {
            self.enqueue(record, &request, proof_request, now)
        } else {
            self.generate_inline(record, backend, proof_request).await
        }
    }

    fn enqueue(
        &self,
        record: ProofRecord,
        request: &GenerateRequest,
        proof_request: ProofRequest,
        now: Timestamp,
    ) -> Result<GenerateResponse, ServiceError> {
        let priority = request.options.priority;
        let job = Job::new(record.id, record.owner, priority, self.max_retries, now);
        let (proof_id, job_id) = (record.id, job.id);

        let task = ProofTask {
            job_id,
            proof_id,
            owner: record.owner,
            system: record.system.clone(),
            data: proof_request.data,
            public_inputs: proof_request.public_inputs,
            circuit_id: record.circuit_id,
            template_id: record.template_id,
            circuit: proof_request.circuit,
            options: proof_request.options,
            proving_key: proof_request.proving_key,
        };
        let envelope =
            TaskEnvelope::proof_generate(&task, priority, self.max_retries, self.task_timeout, now)?;

        self.proofs.create(record)?;
        self.jobs.create(job)?;

        if let Err(e) = self.queue.enqueue(envelope, now) {
            tracing::error!(%proof_id, %job_id, "enqueue failed: {e}");
            let reason = format!("failed to enqueue job: {e}");
            if let Err(e) = self.jobs.update(&job_id, &mut |j| j.fail(&reason, now)) {
                tracing::warn!(%job_id, "could not fail unqueued job: {e}");
            }
            if let Err(e) = self.proofs.update(&proof_id, &mut |p| p.fail(&reason, now)) {
                tracing::warn!(%proof_id, "could not fail unqueued proof: {e}");
            }
            return Err(e.into());
        }

        tracing::info!(%proof_id, %job_id, system = %task.system, priority, "proof job enqueued");
        Ok(GenerateResponse {
            proof_id,
            job_id: Some(job_id),
            status: ProofStatus::Pending,
            artifact: None,
            generation_time_ms: None,
            error_message: None,
            message: Some(format!("proof generation started; poll {proof_id} for status")),
        })
    }

    async fn generate_inline(
        &self,
        mut record: ProofRecord,
        backend: Arc<dyn ProofSystem>,
        proof_request: ProofRequest,
    ) -> Result<GenerateResponse, ServiceError> {
        let proof_id = record.id;
        let system = record.system.to_string();
        record.start(self.clock.now()).map_err(attest_state::StoreError::from)?;
        self.proofs.create(record)?;

        let result = blocking(move || backend.generate(&proof_request)).await;
        let now = self.clock.now();

        match result {
            Ok(artifact) => {
                let generation_time_ms = artifact.generation_time_ms;
                let stored = artifact.clone();
                self.proofs
                    .update(&proof_id, &mut |p| p.complete(stored.clone(), now))?;
                metrics::counter!(
                    "attest_proofs_generated_total",
                    "system" => system.clone(),
                    "status" => "completed"
                )
                .increment(1);
                metrics::histogram!("attest_proof_generation_ms", "system" => system)
                    .record(generation_time_ms as f64);
                tracing::info!(%proof_id, generation_time_ms, "proof generated");
                Ok(GenerateResponse {
                    proof_id,
                    job_id: None,
                    status: ProofStatus::Completed,
                    artifact: Some(artifact),
                    generation_time_ms: Some(generation_time_ms),
                    error_message: None,
                    message: None,
                })
            }
            Err(e) => {
                let reason = e.to_string();
                self.proofs.update(&proof_id, &mut |p| p.fail(&reason, now))?;
                metrics::counter!(
                    "attest_proofs_generated_total",
                    "system" => system,
                    "status" => "failed"
                )
                .increment(1);
                tracing::warn!(%proof_id, "proof generation failed: {reason}");
                Ok(GenerateResponse {
                    proof_id,
                    job_id: None,
                    status: ProofStatus::Failed,
                    artifact: None,
                    generation_time_ms: None,
                    error_message: Some(reason),
                    message: None,
                })
            }
        }
    }

    /// Generate several proofs for one owner, reporting each separately.
    pub async fn generate_batch(
        &self,
        owner: OwnerId,
        requests: Vec<GenerateRequest>,
    ) -> Result<BatchResponse, ServiceError> {
        if requests.is_empty() {
            return Err(ServiceError::InvalidInput("no proofs provided".into()));
        }
        if requests.len() > self.max_batch_size {
            return Err(ServiceError::InvalidInput(format!(
                "maximum batch size is {}",
                self.max_batch_size
            )));
        }

        let total = requests.len();
        let mut results = Vec::with_capacity(total);
        for (index, mut request) in requests.into_iter().enumerate() {
            request.owner = owner;
            let item = match self.generate(request).await {
                Ok(response) => BatchItemResult {
                    index,
                    success: response.status != ProofStatus::Failed,
                    error: response.error_message.clone(),
                    response: Some(response),
                },
                Err(e) => BatchItemResult {
                    index,
                    success: false,
                    response: None,
                    error: Some(e.to_string()),
                },
            };
            results.push(item);
        }

        let success = results.iter().filter(|r| r.success).count();
        tracing::info!(%owner, total, success, "batch processed");
        Ok(BatchResponse {
            results,
            total,
            success,
            failed: total - success,
        })
    }

    /// A proof record, if `owner` owns it.
    pub fn get_proof(&self, owner: &OwnerId, id: &ProofId) -> Result<ProofRecord, ServiceError> {
        let record = self.proofs.get(id)?;
        if record.owner != *owner {
            return Err(ServiceError::Forbidden(format!("{id} belongs to another owner")));
        }
        Ok(record)
    }

    /// `owner`'s proofs, newest first.
    pub fn list_proofs(&self, owner: &OwnerId, page: Page) -> Result<Vec<ProofRecord>, ServiceError> {
        Ok(self.proofs.list_by_owner(owner, page)?)
    }

    /// A job, if `owner` owns it.
    pub fn get_job(&self, owner: &OwnerId, id: &JobId) -> Result<Job, ServiceError> {
        let job = self.jobs.get(id)?;
        if job.owner != *owner {
            return Err(ServiceError::Forbidden(format!("{id} belongs to another owner")));
        }
        Ok(job)
    }

    /// The job tracking an asynchronous proof, if `owner` owns it.
    pub fn get_job_for_proof(&self, owner: &OwnerId, proof_id: &ProofId) -> Result<Job, ServiceError> {
        let job = self.jobs.get_by_proof_id(proof_id)?;
        if job.owner != *owner {
            return Err(ServiceError::Forbidden(format!("{proof_id} belongs to another owner")));
        }
        Ok(job)
    }

    /// `owner`'s jobs, newest first.
    pub fn list_jobs(&self, owner: &OwnerId, page: Page) -> Result<Vec<Job>, ServiceError> {
        Ok(self.jobs.list_by_owner(owner, page)?)
    }
}

/// Translate a service request into the backend's request. Circuit and
/// template references travel as options.
fn build_proof_request(request: &GenerateRequest) -> ProofRequest {
    let opts = &request.options;
    let mut proof_request = ProofRequest::new(request.system.clone(), request.data.clone());
    proof_request.public_inputs = request.public_inputs.clone();
    proof_request.options = opts.backend.clone();
    proof_request
        .options
        .insert("async".into(), serde_json::Value::Bool(opts.run_async));
    if let Some(id) = opts.circuit_id {
        proof_request
            .options
            .insert("circuit_id".into(), serde_json::Value::String(id.as_uuid().to_string()));
    }
    if let Some(id) = opts.template_id {
        proof_request
            .options
            .insert("template_id".into(), serde_json::Value::String(id.as_uuid().to_string()));
    }
    proof_request.circuit = opts.circuit.clone();
    proof_request.proving_key = opts.proving_key.clone();
    proof_request
}

/// Run CPU-bound backend work off the async runtime.
async fn blocking<T, F>(f: F) -> Result<T, ProofError>
where
    F: FnOnce() -> Result<T, ProofError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .unwrap_or_else(|e| Err(ProofError::GenerationFailed(format!("prover task aborted: {e}"))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use attest_core::{CircuitId, ProofSystemId, TemplateId};
    use attest_zkp::InputData;
    use serde_json::json;

    #[test]
    fn references_travel_as_options() {
        let circuit_id = CircuitId::new();
        let template_id = TemplateId::new();
        let mut request = GenerateRequest::new(
            OwnerId::new(),
            ProofSystemId::commitment(),
            InputData::string("x"),
        );
        request.options.circuit_id = Some(circuit_id);
        request.options.template_id = Some(template_id);
        request.options.backend.insert("circuit_type".into(), json!("range_proof"));

        let built = build_proof_request(&request);
        assert_eq!(built.option_str("circuit_id"), Some(circuit_id.as_uuid().to_string().as_str()));
        assert_eq!(
            built.option_str("template_id"),
            Some(template_id.as_uuid().to_string().as_str())
        );
        assert_eq!(built.option_str("circuit_type"), Some("range_proof"));
        assert!(!built.option_flag("async"));
    }
}
