//! Worker pool end to end: tasks go through the in-memory queue, real and
//! scripted backends, and the in-memory store.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use attest_core::{Clock, OwnerId, ProofSystemId, SystemClock};
use attest_queue::{
    InMemoryQueue, ProofProcessor, ProofTask, QueueConfig, TaskEnvelope, TaskQueue, WorkerConfig,
    WorkerPool, DEFAULT_TASK_TIMEOUT,
};
use attest_state::{Job, JobRepository, MemoryStore, ProofRecord, ProofRepository, ProofStatus};
use attest_zkp::{
    Capabilities, CircuitDescriptor, InputData, ProofArtifact, ProofError, ProofRequest,
    ProofSystem, ProofSystemRegistry, SetupResult, StarkProver, VerificationRequest, VerifyError,
    VerifyOutcome,
};
use serde_json::json;

/// Fails the first `failures` calls, then succeeds.
#[derive(Debug)]
struct Flaky {
    failures: u32,
    calls: AtomicU32,
}

impl Flaky {
    fn new(failures: u32) -> Self {
        Self {
            failures,
            calls: AtomicU32::new(0),
        }
    }
}

impl ProofSystem for Flaky {
    fn id(&self) -> ProofSystemId {
        ProofSystemId::from_static("flaky")
    }

    fn setup(&self, _: &CircuitDescriptor) -> Result<SetupResult, ProofError> {
        Err(ProofError::SetupFailed("unsupported".into()))
    }

    fn generate(&self, _: &ProofRequest) -> Result<ProofArtifact, ProofError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call < self.failures {
            return Err(ProofError::GenerationFailed(format!("transient {call}")));
        }
        Ok(ProofArtifact {
            proof: vec![0xAA],
            verification_key: vec![0xBB],
            public_inputs: b"{}".to_vec(),
            generation_time_ms: 1,
            metadata: BTreeMap::new(),
        })
    }

    fn verify(&self, _: &VerificationRequest) -> Result<VerifyOutcome, VerifyError> {
        Ok(VerifyOutcome::valid())
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            supports_setup: false,
            requires_trusted_setup: false,
            supports_custom_circuits: false,
            async_only: true,
            typical_generation_ms: 1,
            max_proof_size_bytes: 1,
            features: vec![],
        }
    }
}

struct Harness {
    store: MemoryStore,
    queue: Arc<InMemoryQueue>,
    registry: Arc<ProofSystemRegistry>,
    clock: Arc<dyn Clock>,
}

impl Harness {
    fn new(backends: Vec<Arc<dyn ProofSystem>>) -> Self {
        let registry = Arc::new(ProofSystemRegistry::new());
        for backend in backends {
            registry.register(backend).unwrap();
        }
        let queue = InMemoryQueue::new(QueueConfig {
            base_backoff: Duration::from_millis(5),
            max_backoff: Duration::from_millis(20),
            ..QueueConfig::default()
        })
        .unwrap();
        Self {
            store: MemoryStore::new(),
            queue: Arc::new(queue),
            registry,
            clock: Arc::new(SystemClock),
        }
    }

    fn submit(&self, system: &str, data: InputData, priority: i8, max_retries: u32) -> ProofTask {
        let owner = OwnerId::new();
        let system = ProofSystemId::new(system).unwrap();
        let record = ProofRecord::new(owner, system.clone(), self.clock.now());
        let job = Job::new(record.id, owner, priority, max_retries, self.clock.now());
        let task = ProofTask {
            job_id: job.id,
            proof_id: record.id,
            owner,
            system,
            data,
            public_inputs: serde_json::Map::new(),
            circuit_id: None,
            template_id: None,
            circuit: None,
            options: BTreeMap::new(),
            proving_key: None,
        };
        ProofRepository::create(&self.store, record).unwrap();
        JobRepository::create(&self.store, job).unwrap();
        let envelope = TaskEnvelope::proof_generate(
            &task,
            priority,
            max_retries,
            DEFAULT_TASK_TIMEOUT,
            self.clock.now(),
        )
        .unwrap();
        self.queue.enqueue(envelope, self.clock.now()).unwrap();
        task
    }

    fn pool(&self, concurrency: usize) -> WorkerPool {
        let processor = ProofProcessor::new(
            Arc::clone(&self.registry),
            Arc::new(self.store.clone()),
            Arc::new(self.store.clone()),
            Arc::clone(&self.clock),
        );
        WorkerPool::new(
            self.queue.clone(),
            processor,
            WorkerConfig {
                concurrency,
                poll_interval: Duration::from_millis(2),
                reap_interval: Duration::from_millis(20),
            },
        )
    }

    async fn wait_terminal(&self, task: &ProofTask) -> Job {
        tokio::time::timeout(Duration::from_secs(20), async {
            loop {
                let job = JobRepository::get(&self.store, &task.job_id).unwrap();
                if job.is_terminal() {
                    return job;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("job did not reach a terminal state")
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn stark_job_completes_and_verifies() {
    let h = Harness::new(vec![Arc::new(StarkProver::new())]);
    let task = h.submit("stark", InputData::json(json!({"a": 7, "b": 8, "c": 56})), 0, 3);
    let pool = h.pool(2).spawn();

    let job = h.wait_terminal(&task).await;
    pool.shutdown().await;

    assert_eq!(job.status, ProofStatus::Completed);
    let proof = ProofRepository::get(&h.store, &task.proof_id).unwrap();
    assert_eq!(proof.status, ProofStatus::Completed);
    let artifact = proof.artifact.unwrap();
    let backend = h.registry.get(&ProofSystemId::stark()).unwrap();
    let outcome = backend
        .verify(&VerificationRequest::for_artifact(ProofSystemId::stark(), &artifact))
        .unwrap();
    assert!(outcome.valid, "{:?}", outcome.error_message);
    assert_eq!(h.queue.stats().in_flight, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn transient_failures_are_retried_until_success() {
    let h = Harness::new(vec![Arc::new(Flaky::new(2))]);
    let task = h.submit("flaky", InputData::string("x"), 0, 3);
    let pool = h.pool(1).spawn();

    let job = h.wait_terminal(&task).await;
    pool.shutdown().await;

    assert_eq!(job.status, ProofStatus::Completed);
    assert_eq!(job.retry_count, 2);
    assert!(job.error_message.is_none());
    assert_eq!(h.queue.stats().dead, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn exhausted_retries_fail_job_and_proof() {
    let h = Harness::new(vec![Arc::new(Flaky::new(u32::MAX))]);
    let task = h.submit("flaky", InputData::string("x"), 0, 1);
    let pool = h.pool(1).spawn();

    let job = h.wait_terminal(&task).await;
    pool.shutdown().await;

    assert_eq!(job.status, ProofStatus::Failed);
    assert_eq!(job.retry_count, 2);
    let proof = ProofRepository::get(&h.store, &task.proof_id).unwrap();
    assert_eq!(proof.status, ProofStatus::Failed);
    assert_eq!(proof.error_message.as_deref(), Some("generation failed: transient 1"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn every_lane_drains() {
    let h = Harness::new(vec![Arc::new(StarkProver::new())]);
    let mut tasks = Vec::new();
    for i in 0..24i64 {
        let priority = (i % 3 - 1) as i8;
        tasks.push(h.submit(
            "stark",
            InputData::json(json!({"a": i, "b": 2, "c": i * 2})),
            priority,
            3,
        ));
    }
    let pool = h.pool(4).spawn();
    for task in &tasks {
        assert_eq!(h.wait_terminal(task).await.status, ProofStatus::Completed);
    }
    pool.shutdown().await;

    let stats = h.queue.stats();
    assert_eq!(stats.pending() + stats.in_flight + stats.dead, 0);
}

#[tokio::test]
async fn shutdown_stops_idle_pool() {
    let h = Harness::new(vec![]);
    let pool = h.pool(3).spawn();
    tokio::time::timeout(Duration::from_secs(5), pool.shutdown())
        .await
        .expect("pool did not stop");
}
