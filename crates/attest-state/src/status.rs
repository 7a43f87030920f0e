//! # Lifecycle Status
//!
//! The status shared by proof records and jobs, the transition log entry,
//! and the error raised when a transition is rejected.
//!
//! ```text
//! pending ──▶ processing ──▶ completed
//!    │             │
//!    └─────────────┴──────▶ failed
//! ```
//!
//! Statuses are ordered by [`ProofStatus::rank`] and never decrease.
//! `completed` and `failed` are terminal.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use attest_core::{AttemptId, Timestamp};

/// Lifecycle status of a proof record or job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProofStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl ProofStatus {
    /// Position in the lifecycle. Terminal states share the top rank.
    pub fn rank(&self) -> u8 {
        match self {
            Self::Pending => 0,
            Self::Processing => 1,
            Self::Completed | Self::Failed => 2,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

impl std::fmt::Display for ProofStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Record of one status transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusTransition {
    pub from: ProofStatus,
    pub to: ProofStatus,
    pub at: Timestamp,
    pub reason: String,
}

/// A rejected lifecycle transition.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransitionError {
    /// The record is not in a state the transition starts from.
    #[error("invalid transition for {record}: {from} -> {to}")]
    InvalidTransition {
        record: String,
        from: ProofStatus,
        to: ProofStatus,
    },

    /// The record is terminal and cannot change.
    #[error("{record} is {status} and cannot transition")]
    Terminal { record: String, status: ProofStatus },

    /// Another attempt holds an unexpired lease on the job.
    #[error("{record} is leased by {holder} until {until}")]
    LeaseHeld {
        record: String,
        holder: AttemptId,
        until: Timestamp,
    },

    /// The caller's attempt does not hold the job's lease.
    #[error("{attempt} does not hold the lease on {record}")]
    NotLeaseHolder { record: String, attempt: AttemptId },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ranks_are_monotone_along_the_lifecycle() {
        assert!(ProofStatus::Pending.rank() < ProofStatus::Processing.rank());
        assert!(ProofStatus::Processing.rank() < ProofStatus::Completed.rank());
        assert_eq!(ProofStatus::Completed.rank(), ProofStatus::Failed.rank());
    }

    #[test]
    fn terminal_states() {
        assert!(!ProofStatus::Pending.is_terminal());
        assert!(!ProofStatus::Processing.is_terminal());
        assert!(ProofStatus::Completed.is_terminal());
        assert!(ProofStatus::Failed.is_terminal());
    }

    #[test]
    fn serializes_snake_case() {
        assert_eq!(
            serde_json::to_string(&ProofStatus::Processing).unwrap(),
            "\"processing\""
        );
        let s: ProofStatus = serde_json::from_str("\"failed\"").unwrap();
        assert_eq!(s, ProofStatus::Failed);
    }
}
