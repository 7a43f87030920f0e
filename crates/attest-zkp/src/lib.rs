//! # attest-zkp — Pluggable Proof-System Engine
//!
//! Defines the [`ProofSystem`] contract every backend satisfies, the
//! [`Capabilities`] model callers dispatch on, and the [`ProofSystemRegistry`]
//! that maps identifiers to live backends.
//!
//! ## Backends
//!
//! | id           | module         | setup | async only |
//! |--------------|----------------|-------|------------|
//! | `commitment` | [`commitment`] | no    | no         |
//! | `stark`      | [`stark`]      | no    | yes        |
//! | `groth16`    | [`snark`]      | trusted | yes      |
//! | `plonk`      | [`snark`]      | universal | yes    |
//!
//! The commitment and STARK backends are implemented here from first
//! principles. Groth16 and PLONK wrap an external constraint-system library
//! through [`snark::SnarkEngine`]; no such library ships in this workspace.

pub mod commitment;
pub mod registry;
pub mod snark;
pub mod stark;
pub mod traits;
pub mod types;

pub use commitment::CommitmentProver;
pub use registry::{ProofSystemRegistry, RegistryError};
pub use snark::{SnarkBackend, SnarkEngine, SnarkEngineError, SnarkKeys, SnarkProof, SnarkScheme};
pub use stark::StarkProver;
pub use traits::{Capabilities, ProofError, ProofSystem, VerifyError};
pub use types::{
    CircuitDescriptor, DataType, InputData, ProofArtifact, ProofRequest, SetupResult,
    VerificationRequest, VerifyOutcome,
};
