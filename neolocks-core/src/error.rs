//! Error types for the NeoLocks core library.

use thiserror::Error;

use crate::types::{EntityRef, PositionKey};

/// Top-level error type for all NeoLocks operations.
///
/// Absent keys are not errors: lookups return `None` / `false` and drains
/// return an empty list.
#[derive(Error, Debug)]
pub enum NeoLocksError {
    /// An auxiliary entity referenced by a registry no longer exists in the
    /// host entity store.
    #[error("Stale entity reference: {0}")]
    StaleEntity(EntityRef),

    /// The host failed to spawn a hologram line.
    #[error("Failed to spawn hologram at {position}: {reason}")]
    SpawnFailed {
        /// Anchor the line belonged to.
        position: PositionKey,
        /// Host-provided reason.
        reason: String,
    },

    /// A stored row could not be decoded.
    #[error("Corrupt record: {0}")]
    CorruptRecord(String),

    /// Serialization or deserialization failure (UI payloads, config).
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// SQLite persistence error.
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Generic I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience Result type alias.
pub type Result<T> = std::result::Result<T, NeoLocksError>;
