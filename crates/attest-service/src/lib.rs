//! # attest-service — Proof Engine Orchestration
//!
//! The request-facing layer of the engine:
//!
//! - [`config`]: [`EngineConfig`] from environment variables.
//! - [`bootstrap`]: builds the [`ProofSystemRegistry`](attest_zkp::ProofSystemRegistry)
//!   from the enabled [`BackendKind`]s.
//! - [`proofs`]: [`ProofService`] for sync/async generation, batches and
//!   owner-scoped retrieval.
//! - [`verify`]: [`VerifyService`] for stateless verification.
//! - [`engine`]: [`Engine`], everything wired together in memory.
//!
//! HTTP routing, authentication and durable storage are out of scope; a
//! host process adapts these services to its own transport and supplies
//! its own repositories and queue.

pub mod bootstrap;
pub mod config;
pub mod engine;
pub mod error;
pub mod proofs;
pub mod setup_cache;
pub mod types;
pub mod verify;

pub use bootstrap::{build_registry, BackendDeps, BackendKind, BootstrapError};
pub use config::{ConfigError, EngineConfig};
pub use engine::{Engine, EngineError};
pub use error::ServiceError;
pub use proofs::ProofService;
pub use setup_cache::SetupCache;
pub use types::{
    BatchItemResult, BatchResponse, GenerateOptions, GenerateRequest, GenerateResponse,
    SystemInfo, VerifyResponse,
};
pub use verify::VerifyService;
