//! # attest-core — Foundational Types for the Attest Proof Engine
//!
//! Every other crate in the workspace depends on `attest-core`; it depends
//! on nothing internal.
//!
//! ## Key Design Principles
//!
//! 1. **Newtype wrappers for identifiers.** `ProofId`, `JobId`, `OwnerId`,
//!    `TaskId` and friends cannot be confused for one another, and backend
//!    identifiers travel as [`ProofSystemId`] rather than bare strings.
//!
//! 2. **UTC-only timestamps.** [`Timestamp`] is UTC with millisecond
//!    precision and renders with a `Z` suffix.
//!
//! 3. **Injected side inputs.** Proof generation reads the wall clock and
//!    randomness only through the [`Clock`] and [`EntropySource`] traits, so
//!    tests can pin both and assert byte-exact outputs.
//!
//! ## Crate Policy
//!
//! - No dependencies on other `attest-*` crates (this is the leaf of the DAG).
//! - No `unsafe` code.
//! - No `panic!()` or `.unwrap()` outside tests.

pub mod digest;
pub mod effects;
pub mod error;
pub mod hex;
pub mod identity;
pub mod temporal;

// Re-export primary types for ergonomic imports.
pub use digest::{sha256, sha256_hex, Sha256Accumulator};
pub use effects::{Clock, EntropySource, FixedClock, OsEntropy, SeededEntropy, SystemClock};
pub use error::AttestError;
pub use identity::{AttemptId, CircuitId, JobId, OwnerId, ProofId, ProofSystemId, TaskId, TemplateId};
pub use temporal::Timestamp;
