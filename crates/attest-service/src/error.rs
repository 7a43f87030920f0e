//! # Service Errors
//!
//! Request-level failures. Generation failures are not errors at this
//! layer: they are recorded on the proof and reported as a `failed`
//! status.

use thiserror::Error;

use attest_core::ProofSystemId;
use attest_queue::QueueError;
use attest_state::StoreError;
use attest_zkp::{ProofError, VerifyError};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ServiceError {
    /// No backend registered under this id.
    #[error("unsupported proof system: {0}")]
    UnknownProofSystem(ProofSystemId),

    /// Request rejected before any cryptographic work.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("not found: {0}")]
    NotFound(String),

    /// The record belongs to another owner.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Circuit setup for the requested key failed.
    #[error("circuit setup failed: {0}")]
    Setup(ProofError),

    /// Proof or key bytes are not a document at all.
    #[error("verification failed: {0}")]
    Verification(#[from] VerifyError),

    #[error("failed to enqueue job: {0}")]
    Queue(#[from] QueueError),

    #[error("storage error: {0}")]
    Store(StoreError),
}

impl From<StoreError> for ServiceError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(what) => Self::NotFound(what),
            other => Self::Store(other),
        }
    }
}
