//! # attest-crypto — Signing Primitives
//!
//! Ed25519 key pairs, public keys and signatures used by the commitment
//! prover to attest that a commitment was produced by this engine.
//!
//! ## Crate Policy
//!
//! - Depends only on `attest-core` internally.
//! - No mocking of cryptographic operations in tests. All tests use real
//!   Ed25519.

pub mod ed25519;

pub use attest_core::error::CryptoError;
pub use ed25519::{verify, Ed25519KeyPair, Ed25519PublicKey, Ed25519Signature};
