//! # In-Process Engine
//!
//! Wires configuration, registry, in-memory store, queue and services into
//! one value. The worker pool is built on demand so callers decide when
//! and where it runs.

use std::sync::Arc;

use attest_core::Clock;
use attest_queue::{InMemoryQueue, ProofProcessor, QueueError, WorkerPool};
use attest_state::MemoryStore;
use attest_zkp::ProofSystemRegistry;
use thiserror::Error;

use crate::bootstrap::{build_registry, BackendDeps, BootstrapError};
use crate::config::EngineConfig;
use crate::proofs::ProofService;
use crate::verify::VerifyService;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error(transparent)]
    Bootstrap(#[from] BootstrapError),
    #[error(transparent)]
    Queue(#[from] QueueError),
}

#[derive(Debug)]
pub struct Engine {
    pub config: EngineConfig,
    pub registry: Arc<ProofSystemRegistry>,
    pub store: MemoryStore,
    pub queue: Arc<InMemoryQueue>,
    pub proofs: ProofService,
    pub verifier: VerifyService,
    clock: Arc<dyn Clock>,
}

impl Engine {
    pub fn in_memory(config: EngineConfig, deps: BackendDeps) -> Result<Self, EngineError> {
        let clock = Arc::clone(&deps.clock);
        let registry = Arc::new(build_registry(&config, deps)?);
        let store = MemoryStore::new();
        let queue = Arc::new(InMemoryQueue::new(config.queue_config())?);

        let proofs = ProofService::new(
            Arc::clone(&registry),
            Arc::new(store.clone()),
            Arc::new(store.clone()),
            queue.clone(),
            Arc::clone(&clock),
            &config,
        );
        let verifier = VerifyService::new(Arc::clone(&registry), Arc::clone(&clock));

        Ok(Self {
            config,
            registry,
            store,
            queue,
            proofs,
            verifier,
            clock,
        })
    }

    /// A worker pool draining this engine's queue. Call `spawn` to start it.
    pub fn worker_pool(&self) -> WorkerPool {
        let processor = ProofProcessor::new(
            Arc::clone(&self.registry),
            Arc::new(self.store.clone()),
            Arc::new(self.store.clone()),
            Arc::clone(&self.clock),
        );
        WorkerPool::new(self.queue.clone(), processor, self.config.worker_config())
    }
}
