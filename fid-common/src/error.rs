//! Common error types for facility identifier generation
//!
//! Classification never fails; only the codec, the allocator and the
//! persistence boundary produce errors.

use thiserror::Error;

/// Common result type for FID operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across FID crates
#[derive(Error, Debug)]
pub enum Error {
    /// Identifier string does not match `III-RR-YYYY-NNN`
    #[error("Malformed identifier: {0}")]
    MalformedIdentifier(String),

    /// Sequence allocator hit its retry ceiling
    #[error("Allocation exhausted for partition {partition} after {attempts} attempts")]
    AllocationExhausted { partition: String, attempts: u32 },

    /// External persistence store cannot be reached (or timed out)
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    /// Caller cancelled the request while the store round-trip was pending
    #[error("Operation cancelled")]
    Cancelled,

    /// Partition counter no longer fits the 3-digit sequence segment
    #[error("Sequence {sequence} overflows partition {partition} (max 999)")]
    SequenceOverflow { partition: String, sequence: i64 },

    /// Store uniqueness constraint rejected an identifier
    #[error("Duplicate identifier: {0}")]
    DuplicateIdentifier(String),

    /// Database operation error (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid user input or request parameter
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl Error {
    /// Whether a caller may retry the operation after backoff.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::AllocationExhausted { .. }
            | Error::StoreUnavailable(_)
            | Error::Cancelled
            | Error::DuplicateIdentifier(_) => true,
            Error::Database(db_err) => is_transient_db_error(db_err),
            Error::MalformedIdentifier(_)
            | Error::SequenceOverflow { .. }
            | Error::Io(_)
            | Error::Config(_)
            | Error::InvalidInput(_) => false,
        }
    }

    /// Map a sqlx error from a store call onto the FID taxonomy.
    ///
    /// Connectivity failures become `StoreUnavailable`; everything else is
    /// kept as `Database`.
    pub fn from_store(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::PoolTimedOut => Error::StoreUnavailable("connection pool timed out".into()),
            sqlx::Error::PoolClosed => Error::StoreUnavailable("connection pool closed".into()),
            sqlx::Error::Io(io) => Error::StoreUnavailable(format!("store I/O failure: {}", io)),
            other => Error::Database(other),
        }
    }
}

/// SQLite reports lock contention as an ordinary database error.
pub fn is_lock_error(err: &sqlx::Error) -> bool {
    let msg = err.to_string();
    msg.contains("database is locked") || msg.contains("database table is locked")
}

fn is_transient_db_error(err: &sqlx::Error) -> bool {
    is_lock_error(err)
        || matches!(
            err,
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_)
        )
}
