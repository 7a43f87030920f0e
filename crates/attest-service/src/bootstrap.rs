//! # Backend Bootstrap
//!
//! The one place that knows the closed set of built-in backends. Everything
//! downstream sees only `Arc<dyn ProofSystem>` through the registry.

use std::sync::Arc;

use thiserror::Error;

use attest_core::{Clock, EntropySource, OsEntropy, ProofSystemId, SystemClock};
use attest_crypto::Ed25519KeyPair;
use attest_zkp::{
    CommitmentProver, ProofSystem, ProofSystemRegistry, RegistryError, SnarkBackend,
    SnarkEngine, SnarkScheme, StarkProver,
};

use crate::config::EngineConfig;

/// Built-in backend kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Commitment,
    Stark,
    Groth16,
    Plonk,
}

impl BackendKind {
    pub const ALL: [BackendKind; 4] = [
        BackendKind::Commitment,
        BackendKind::Stark,
        BackendKind::Groth16,
        BackendKind::Plonk,
    ];

    pub fn id(&self) -> ProofSystemId {
        match self {
            Self::Commitment => ProofSystemId::commitment(),
            Self::Stark => ProofSystemId::stark(),
            Self::Groth16 => ProofSystemId::groth16(),
            Self::Plonk => ProofSystemId::plonk(),
        }
    }

    pub fn is_enabled(&self, config: &EngineConfig) -> bool {
        match self {
            Self::Commitment => config.enable_commitment,
            Self::Stark => config.enable_stark,
            Self::Groth16 => config.enable_groth16,
            Self::Plonk => config.enable_plonk,
        }
    }
}

/// Bootstrap errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BootstrapError {
    /// A SNARK backend was enabled but no constraint-system engine was supplied.
    #[error("{0} is enabled but no SNARK engine is available")]
    MissingSnarkEngine(ProofSystemId),

    #[error(transparent)]
    Registry(#[from] RegistryError),
}

/// Side inputs shared by the built-in backends.
#[derive(Debug)]
pub struct BackendDeps {
    pub clock: Arc<dyn Clock>,
    pub entropy: Arc<dyn EntropySource>,
    /// Commitment signing key; drawn from `entropy` when absent.
    pub signing_key: Option<Ed25519KeyPair>,
    /// Engine behind Groth16 and PLONK.
    pub snark_engine: Option<Arc<dyn SnarkEngine>>,
}

impl Default for BackendDeps {
    fn default() -> Self {
        Self {
            clock: Arc::new(SystemClock),
            entropy: Arc::new(OsEntropy),
            signing_key: None,
            snark_engine: None,
        }
    }
}

/// Register every backend `config` enables.
pub fn build_registry(
    config: &EngineConfig,
    deps: BackendDeps,
) -> Result<ProofSystemRegistry, BootstrapError> {
    let BackendDeps {
        clock,
        entropy,
        mut signing_key,
        snark_engine,
    } = deps;
    let registry = ProofSystemRegistry::new();

    for kind in BackendKind::ALL {
        if !kind.is_enabled(config) {
            continue;
        }
        let backend: Arc<dyn ProofSystem> = match kind {
            BackendKind::Commitment => Arc::new(CommitmentProver::with_parts(
                signing_key
                    .take()
                    .unwrap_or_else(|| Ed25519KeyPair::from_entropy(entropy.as_ref())),
                Arc::clone(&clock),
                Arc::clone(&entropy),
            )),
            BackendKind::Stark => Arc::new(StarkProver::with_clock(Arc::clone(&clock))),
            BackendKind::Groth16 | BackendKind::Plonk => {
                let engine = snark_engine
                    .clone()
                    .ok_or_else(|| BootstrapError::MissingSnarkEngine(kind.id()))?;
                let scheme = if kind == BackendKind::Groth16 {
                    SnarkScheme::Groth16
                } else {
                    SnarkScheme::Plonk
                };
                Arc::new(SnarkBackend::new(scheme, engine))
            }
        };
        registry.register(backend)?;
    }

    let ids: Vec<String> = registry.list().iter().map(|b| b.id().to_string()).collect();
    tracing::info!(systems = ?ids, "proof systems registered");
    Ok(registry)
}
