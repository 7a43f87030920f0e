//! # attest-queue — Background Proof Generation
//!
//! Carries asynchronous proof requests from the request path to a pool of
//! workers.
//!
//! - [`task`]: the `proof:generate` payload and its queue envelope.
//! - [`queue`]: the [`TaskQueue`] contract and [`InMemoryQueue`].
//! - [`processor`]: [`ProofProcessor`], which turns one delivery into job
//!   and proof state transitions.
//! - [`worker`]: the tokio [`WorkerPool`].
//!
//! ## Delivery Guarantees
//!
//! At least once. Duplicates are absorbed by the job lease in
//! `attest-state`: each delivery's [`AttemptId`](attest_core::AttemptId)
//! doubles as the lease holder, so a stale delivery can neither claim a
//! live job nor retire a redelivered task.

pub mod error;
pub mod processor;
pub mod queue;
pub mod task;
pub mod worker;

pub use error::QueueError;
pub use processor::{ProofProcessor, TaskOutcome};
pub use queue::{
    Delivery, InMemoryQueue, NackOutcome, QueueConfig, QueueStats, ReapReport, TaskQueue,
    DEFAULT_LANE_WEIGHTS,
};
pub use task::{Lane, ProofTask, TaskEnvelope, DEFAULT_TASK_TIMEOUT, PROOF_GENERATE};
pub use worker::{WorkerConfig, WorkerPool, WorkerPoolHandle, DEFAULT_CONCURRENCY};
