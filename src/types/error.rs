//! Error types for the karma library.

use thiserror::Error;

/// All errors that can occur in the karma library.
#[derive(Error, Debug)]
pub enum KarmaError {
    /// A configuration value or strategy name was rejected.
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    /// The user modified this term too recently.
    #[error("'{term}' is cooling down for {remaining_secs} more second(s)")]
    CooldownActive { term: String, remaining_secs: u64 },

    /// One of the terms is below the link threshold.
    #[error("Both terms must have at least {threshold} karma to be linked")]
    ThresholdNotMet { threshold: i64 },

    /// Term has no score entry.
    #[error("Term '{0}' not found")]
    TermNotFound(String),

    /// The user directory has no entry for this id.
    #[error("User '{0}' not found")]
    UserNotFound(String),

    /// A term cannot be linked to itself.
    #[error("Term '{0}' cannot be linked to itself")]
    SelfLink(String),

    /// The backing store could not serve the request.
    #[error("Score store unavailable: {0}")]
    StoreUnavailable(String),

    /// Key holds a different kind of data than the operation expects.
    #[error("Key '{key}' does not hold a {expected}")]
    WrongKind { key: String, expected: &'static str },

    /// An entry in the action log could not be decoded.
    #[error("Corrupt action entry: {0}")]
    CorruptAction(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encoding or decoding failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Compression error.
    #[error("Compression error: {0}")]
    Compression(String),

    /// Invalid magic bytes in snapshot header.
    #[error("Invalid magic bytes in snapshot header")]
    InvalidMagic,

    /// Unsupported snapshot format version.
    #[error("Unsupported snapshot version: {0}")]
    UnsupportedVersion(u32),

    /// Snapshot file is empty or truncated.
    #[error("Snapshot is empty or truncated")]
    Truncated,
}

/// Convenience result type for karma operations.
pub type KarmaResult<T> = Result<T, KarmaError>;
