//! Error types for the drift coordinator.

use thiserror::Error;

/// Errors surfaced by drift core operations.
///
/// Failed combinations and failed discoveries are not errors; they come
/// back as [`Outcome::Failure`](crate::registry::Outcome::Failure).
#[derive(Debug, Error)]
pub enum DriftError {
    /// Combination input outside the accepted token count
    #[error("Invalid arity: {given} tokens (expected 2..=5)")]
    InvalidArity { given: usize },

    /// A debit would drive a ledger counter negative
    #[error("Insufficient {resource}: required {required}, available {available}")]
    InsufficientResource {
        resource: &'static str,
        required: u64,
        available: u64,
    },

    /// Snapshot file could not be read or written
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// Snapshot decoded but violates a field invariant, or did not decode
    #[error("Corrupt snapshot: {0}")]
    CorruptSnapshot(String),

    /// Configuration value out of range
    #[error("Invalid config: {0}")]
    InvalidConfig(String),
}

impl DriftError {
    /// Creates a corrupt-snapshot error.
    pub fn corrupt(msg: impl Into<String>) -> Self {
        Self::CorruptSnapshot(msg.into())
    }

    /// Creates an invalid-config error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }
}

impl From<std::io::Error> for DriftError {
    fn from(err: std::io::Error) -> Self {
        Self::Persistence(err.to_string())
    }
}

impl From<serde_json::Error> for DriftError {
    fn from(err: serde_json::Error) -> Self {
        Self::CorruptSnapshot(err.to_string())
    }
}
