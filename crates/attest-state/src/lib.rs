//! # attest-state — Proof and Job Lifecycles
//!
//! Enum-based state machines for proof records and asynchronous jobs, and
//! the persistence contract they are stored through.
//!
//! ## Design Decision
//!
//! Transitions are methods returning `Result<_, TransitionError>` rather
//! than typestates: records round-trip through storage and queues, where
//! the status is data. Every transition takes the current time explicitly
//! and appends to the record's transition log.
//!
//! ## Invariants
//!
//! - Status never decreases (`pending < processing < completed | failed`).
//! - Terminal records never change.
//! - At most one attempt holds a processing job's lease.

pub mod job;
pub mod proof;
pub mod status;
pub mod store;

pub use job::{Claim, FailureDisposition, Job, Lease, DEFAULT_MAX_RETRIES};
pub use proof::ProofRecord;
pub use status::{ProofStatus, StatusTransition, TransitionError};
pub use store::{JobRepository, MemoryStore, Page, ProofRepository, Store, StoreError};
