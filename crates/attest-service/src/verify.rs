//! # Verification Service
//!
//! Stateless: resolves the backend, verifies, and stamps the result.
//! A proof that fails to verify is a successful call with `valid: false`.

use std::sync::Arc;

use attest_core::Clock;
use attest_zkp::{ProofSystemRegistry, VerificationRequest};

use crate::error::ServiceError;
use crate::types::VerifyResponse;

#[derive(Debug, Clone)]
pub struct VerifyService {
    registry: Arc<ProofSystemRegistry>,
    clock: Arc<dyn Clock>,
}

impl VerifyService {
    pub fn new(registry: Arc<ProofSystemRegistry>, clock: Arc<dyn Clock>) -> Self {
        Self { registry, clock }
    }

    pub fn verify(&self, request: &VerificationRequest) -> Result<VerifyResponse, ServiceError> {
        let backend = self
            .registry
            .get(&request.system)
            .map_err(|_| ServiceError::UnknownProofSystem(request.system.clone()))?;
        let outcome = backend.verify(request)?;

        metrics::counter!(
            "attest_verifications_total",
            "system" => request.system.to_string(),
            "valid" => if outcome.valid { "true" } else { "false" }
        )
        .increment(1);
        if !outcome.valid {
            tracing::debug!(
                system = %request.system,
                reason = outcome.error_message.as_deref().unwrap_or(""),
                "proof rejected"
            );
        }

        Ok(VerifyResponse {
            valid: outcome.valid,
            error_message: outcome.error_message,
            verified_at: self.clock.now(),
        })
    }
}
