//! Error types for the criteria compiler and adapter.

use thiserror::Error;

/// The main error type for pervasive-sql operations.
#[derive(Debug, Error)]
pub enum PervasiveError {
    /// `groupBy` (or an empty aggregate request) without SUM/AVG/MIN/MAX.
    #[error("Cannot groupBy without a calculation")]
    GroupWithoutCalculation,

    /// A sub-attribute criteria object carried a key that is not a comparator.
    #[error("Unknown comparator: {0}")]
    UnknownComparator(String),

    /// LIKE clauses only accept plain patterns.
    #[error("RegExp not supported in LIKE clauses")]
    RegexNotSupported,

    /// Top-level NOT over a whole predicate group.
    #[error("NOT not supported yet")]
    NotUnsupported,

    /// The criteria object is structurally malformed.
    #[error("Invalid criteria: {0}")]
    InvalidCriteria(String),

    /// No collection with this identity has been registered.
    #[error("Unknown collection: '{0}'")]
    UnknownCollection(String),

    /// The execution service rejected a statement.
    #[error("Execution error: {0}")]
    Execution(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl PervasiveError {
    /// Create an invalid criteria error.
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidCriteria(message.into())
    }

    /// True for deterministic, input-driven errors raised while compiling.
    ///
    /// These never succeed on retry; the caller should translate them into
    /// its own usage-failure convention.
    pub fn is_usage(&self) -> bool {
        matches!(
            self,
            Self::GroupWithoutCalculation
                | Self::UnknownComparator(_)
                | Self::RegexNotSupported
                | Self::NotUnsupported
                | Self::InvalidCriteria(_)
        )
    }
}

/// Result type alias for pervasive-sql operations.
pub type PervasiveResult<T> = Result<T, PervasiveError>;
