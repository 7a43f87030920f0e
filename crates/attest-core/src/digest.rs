//! # SHA-256 Digests
//!
//! Thin helpers over `sha2` for the two shapes the provers need: a one-shot
//! digest over a byte slice and an accumulator that hashes a sequence of
//! chunks as if they were concatenated.

use sha2::{Digest, Sha256};

/// SHA-256 of `data`.
pub fn sha256(data: &[u8]) -> [u8; 32] {
    Sha256::digest(data).into()
}

/// SHA-256 of `data`, rendered as lowercase hex.
pub fn sha256_hex(data: &[u8]) -> String {
    crate::hex::encode(&sha256(data))
}

/// Incremental SHA-256 over concatenated chunks.
#[derive(Clone, Default)]
pub struct Sha256Accumulator {
    hasher: Sha256,
}

impl std::fmt::Debug for Sha256Accumulator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Sha256Accumulator(..)")
    }
}

impl Sha256Accumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk. Chunks are not length-prefixed.
    pub fn update(&mut self, chunk: impl AsRef<[u8]>) -> &mut Self {
        self.hasher.update(chunk.as_ref());
        self
    }

    pub fn finalize(self) -> [u8; 32] {
        self.hasher.finalize().into()
    }

    pub fn finalize_hex(self) -> String {
        crate::hex::encode(&self.finalize())
    }
}
