//! # Backend Registry
//!
//! Maps backend identifiers to live backend instances. Built explicitly at
//! process start and shared by reference; there is no global instance.
//!
//! Reads take a shared lock and never block each other. Registration takes
//! the write lock and is expected only during bootstrap.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use thiserror::Error;

use attest_core::ProofSystemId;

use crate::traits::ProofSystem;

/// Registry lookup and registration errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// A backend with this id is already registered.
    #[error("proof system {0} is already registered")]
    AlreadyRegistered(ProofSystemId),
    /// No backend with this id is registered.
    #[error("proof system {0} not found")]
    NotFound(ProofSystemId),
}

/// Runtime map of `ProofSystemId -> Arc<dyn ProofSystem>`.
#[derive(Debug, Default)]
pub struct ProofSystemRegistry {
    backends: RwLock<HashMap<ProofSystemId, Arc<dyn ProofSystem>>>,
}

impl ProofSystemRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a backend under its own id.
    pub fn register(&self, backend: Arc<dyn ProofSystem>) -> Result<(), RegistryError> {
        let id = backend.id();
        let mut guard = self.backends.write();
        if guard.contains_key(&id) {
            return Err(RegistryError::AlreadyRegistered(id));
        }
        tracing::info!(system = %id, "registered proof system");
        guard.insert(id, backend);
        Ok(())
    }

    pub fn get(&self, id: &ProofSystemId) -> Result<Arc<dyn ProofSystem>, RegistryError> {
        self.backends
            .read()
            .get(id)
            .cloned()
            .ok_or_else(|| RegistryError::NotFound(id.clone()))
    }

    /// All registered backends, sorted by id.
    pub fn list(&self) -> Vec<Arc<dyn ProofSystem>> {
        let mut all: Vec<_> = self.backends.read().values().cloned().collect();
        all.sort_by_key(|b| b.id());
        all
    }

    pub fn is_supported(&self, id: &ProofSystemId) -> bool {
        self.backends.read().contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.backends.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
