//! # Identity Newtypes
//!
//! Newtype wrappers for every identifier that crosses a crate boundary.
//! You cannot pass a `JobId` where a `ProofId` is expected.
//!
//! ## Security Invariant
//!
//! Ownership checks compare [`OwnerId`] values, never raw strings, so an
//! identifier from another namespace cannot be substituted for an owner.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AttestError;

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            /// Generate a new random identifier.
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Access the inner UUID.
            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl From<Uuid> for $name {
            fn from(id: Uuid) -> Self {
                Self(id)
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, concat!($prefix, ":{}"), self.0)
            }
        }
    };
}

uuid_id!(
    /// Identifier of a proof record.
    ProofId,
    "proof"
);
uuid_id!(
    /// Identifier of an asynchronous generation job.
    JobId,
    "job"
);
uuid_id!(
    /// Identifier of the caller that owns proofs and jobs.
    OwnerId,
    "owner"
);
uuid_id!(
    /// Identifier of a stored circuit definition.
    CircuitId,
    "circuit"
);
uuid_id!(
    /// Identifier of a proof template.
    TemplateId,
    "template"
);
uuid_id!(
    /// Identifier of one execution attempt. A job lease names the attempt
    /// that holds it.
    AttemptId,
    "attempt"
);
uuid_id!(
    /// Identifier of a queued task envelope. Distinct from the job it
    /// carries: one job may be delivered under several task ids.
    TaskId,
    "task"
);

/// Stable string identifier of a proof-system backend.
///
/// Backends declare their own id; the four built-in ids are exposed as
/// constants. Ids are lowercase ASCII with `-` or `_` separators.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProofSystemId(String);

impl ProofSystemId {
    pub const COMMITMENT: &'static str = "commitment";
    pub const STARK: &'static str = "stark";
    pub const GROTH16: &'static str = "groth16";
    pub const PLONK: &'static str = "plonk";

    /// Validate and wrap a backend identifier.
    pub fn new(id: impl Into<String>) -> Result<Self, AttestError> {
        let id = id.into();
        let valid = !id.is_empty()
            && id
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_');
        if !valid {
            return Err(AttestError::Identifier(format!(
                "proof system id must be non-empty lowercase ascii, got {id:?}"
            )));
        }
        Ok(Self(id))
    }

    /// Wrap a compile-time constant id.
    pub fn from_static(id: &'static str) -> Self {
        Self(id.to_string())
    }

    pub fn commitment() -> Self {
        Self::from_static(Self::COMMITMENT)
    }

    pub fn stark() -> Self {
        Self::from_static(Self::STARK)
    }

    pub fn groth16() -> Self {
        Self::from_static(Self::GROTH16)
    }

    pub fn plonk() -> Self {
        Self::from_static(Self::PLONK)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ProofSystemId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for ProofSystemId {
    type Err = AttestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl PartialEq<&str> for ProofSystemId {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_unique() {
        assert_ne!(ProofId::new(), ProofId::new());
        assert_ne!(JobId::new(), JobId::new());
    }

    #[test]
    fn display_carries_namespace_prefix() {
        let id = ProofId::new();
        assert_eq!(id.to_string(), format!("proof:{}", id.as_uuid()));
        let job = JobId::new();
        assert!(job.to_string().starts_with("job:"));
    }

    #[test]
    fn ids_serialize_as_bare_uuid() {
        let id = OwnerId::new();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{}\"", id.as_uuid()));
        let back: OwnerId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn proof_system_id_accepts_builtin_names() {
        for name in ["commitment", "stark", "groth16", "plonk", "my-backend_2"] {
            assert_eq!(ProofSystemId::new(name).unwrap(), name);
        }
    }

    #[test]
    fn proof_system_id_rejects_bad_names() {
        assert!(ProofSystemId::new("").is_err());
        assert!(ProofSystemId::new("Stark").is_err());
        assert!(ProofSystemId::new("has space").is_err());
    }

    #[test]
    fn proof_system_id_parses_from_str() {
        let id: ProofSystemId = "stark".parse().unwrap();
        assert_eq!(id, ProofSystemId::stark());
    }
}
