//! # Error Types — Foundational Errors
//!
//! Errors raised by the leaf types of the workspace. Domain crates define
//! their own `thiserror` enums and convert into or wrap these where needed.

use thiserror::Error;

/// Top-level error type for the foundational layer.
#[derive(Error, Debug)]
pub enum AttestError {
    /// A hex string could not be decoded.
    #[error("hex decode error: {0}")]
    Hex(#[from] HexError),

    /// A timestamp string was rejected.
    #[error("invalid timestamp: {0}")]
    Timestamp(String),

    /// An identifier failed validation.
    #[error("invalid identifier: {0}")]
    Identifier(String),

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Error decoding a hex string.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HexError {
    /// The input had an odd number of characters.
    #[error("hex string must have even length, got {0}")]
    OddLength(usize),

    /// A character pair was not valid hex.
    #[error("invalid hex at position {position}")]
    InvalidDigit {
        /// Byte offset of the offending pair.
        position: usize,
    },

    /// Decoded length did not match the expected fixed size.
    #[error("expected {expected} bytes, got {actual}")]
    WrongLength {
        /// Required number of bytes.
        expected: usize,
        /// Number of bytes decoded.
        actual: usize,
    },
}

/// Error in cryptographic operations.
#[derive(Error, Debug)]
pub enum CryptoError {
    /// Signature verification failed.
    #[error("signature verification failed: {0}")]
    VerificationFailed(String),

    /// Key generation or parsing failed.
    #[error("key error: {0}")]
    KeyError(String),
}
