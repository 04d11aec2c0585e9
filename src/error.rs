use thiserror::Error;

/// Errors returned by every pool, execution and materialization operation.
///
/// Nothing is retried or swallowed internally; each failure is reported once
/// to the immediate caller.
#[derive(Debug, Error)]
pub enum PgPoolError {
    /// The connection descriptor is malformed or names an unsupported option.
    #[error("invalid connection descriptor: {0}")]
    Parse(String),

    /// The requested pool bounds are out of range.
    #[error("invalid pool bounds: {0}")]
    InvalidBounds(String),

    /// The pool could not be established against the target.
    #[error("failed to open pool: {0}")]
    Open(#[source] tokio_postgres::Error),

    /// A connection could not be checked out of the pool.
    #[error("connection checkout failed: {0}")]
    Acquire(String),

    /// The engine rejected a non-query statement or the connection failed mid-flight.
    #[error("exec failed: {0}")]
    Exec(#[source] tokio_postgres::Error),

    /// The engine rejected a query or the row stream failed.
    #[error("query failed: {0}")]
    Query(#[source] tokio_postgres::Error),

    /// A column value could not be interpreted.
    #[error("cannot decode column `{column}` of type `{type_name}`: {reason}")]
    Decode {
        column: String,
        type_name: String,
        reason: String,
    },

    /// A positional argument cannot be sent to the engine.
    #[error("parameter error: {0}")]
    Param(String),

    /// The caller's context was cancelled.
    #[error("operation cancelled")]
    Cancelled,

    /// The caller's context deadline passed.
    #[error("deadline exceeded")]
    DeadlineExceeded,

    /// The pool has been closed.
    #[error("pool is closed")]
    Closed,
}

impl PgPoolError {
    /// True when the failure came from the caller's context rather than the engine.
    #[must_use]
    pub fn is_cancellation(&self) -> bool {
        matches!(self, Self::Cancelled | Self::DeadlineExceeded)
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        matches!(self, Self::Closed)
    }

    /// SQLSTATE reported by the engine, if this error carries one.
    #[must_use]
    pub fn db_code(&self) -> Option<&str> {
        match self {
            Self::Open(e) | Self::Exec(e) | Self::Query(e) => e.code().map(|c| c.code()),
            _ => None,
        }
    }
}

impl From<bb8::RunError<tokio_postgres::Error>> for PgPoolError {
    fn from(err: bb8::RunError<tokio_postgres::Error>) -> Self {
        match err {
            bb8::RunError::User(e) => PgPoolError::Acquire(e.to_string()),
            other => PgPoolError::Acquire(other.to_string()),
        }
    }
}

/// Result alias used throughout the crate.
pub type Result<T, E = PgPoolError> = std::result::Result<T, E>;
