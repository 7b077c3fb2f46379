//! Error types for locker-core.
//!
//! Only failures that abort an operation live here: the store could not be
//! reached, a stored record could not be decoded, or the caller supplied an
//! invalid name or configuration. Refusals such as "already locked" are
//! typed outcomes of the individual operations, not errors.

use thiserror::Error;

use crate::subject::SubjectKind;

/// Core error type for locker operations
#[derive(Debug, Error)]
pub enum Error {
    /// The backing store failed (connection, query, or transaction).
    #[error("Store error: {0}")]
    Store(String),

    /// A stored subject record is not valid JSON or not a known shape.
    #[error("Corrupt record at '{key}': {reason}")]
    CorruptRecord { key: String, reason: String },

    /// A subject name does not satisfy the naming rules for its kind.
    #[error("Invalid {kind} name '{name}': {reason}")]
    InvalidName {
        kind: SubjectKind,
        name: String,
        reason: String,
    },

    /// Configuration values are invalid.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Filesystem access failed.
    #[error("IO error: {0}")]
    Io(String),

    /// A document (config file, event payload) could not be parsed.
    #[error("Parse error: {0}")]
    Parse(String),
}

impl Error {
    /// Stable machine-readable code for this error.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Store(_) => "STORE_ERROR",
            Self::CorruptRecord { .. } => "CORRUPT_RECORD",
            Self::InvalidName { .. } => "INVALID_NAME",
            Self::InvalidConfig(_) => "INVALID_CONFIG",
            Self::Io(_) => "IO_ERROR",
            Self::Parse(_) => "PARSE_ERROR",
        }
    }

    /// Returns the appropriate exit code for this error type.
    ///
    /// Exit code scheme:
    /// - 1: User error (invalid name, bad configuration, unparsable input)
    /// - 2: System error (IO)
    /// - 4: Store failure or corrupt state
    ///
    /// Exit code 3 is reserved by the CLI for refused lock operations.
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::InvalidName { .. } | Self::InvalidConfig(_) | Self::Parse(_) => 1,
            Self::Io(_) => 2,
            Self::Store(_) | Self::CorruptRecord { .. } => 4,
        }
    }
}

impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        Self::Store(err.to_string())
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Parse(err.to_string())
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Self::Parse(format!("Failed to parse config: {err}"))
    }
}

/// Result type alias for locker-core operations
pub type Result<T> = std::result::Result<T, Error>;
