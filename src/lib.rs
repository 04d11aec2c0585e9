//! Bounded PostgreSQL connection pool over `tokio-postgres` and `bb8`.
//!
//! A pool is opened from a single connection descriptor (URL or key/value
//! form) plus explicit bounds. Statements run through [`Pool::exec`] and
//! [`Pool::query`]; query rows come back fully materialized as name-keyed
//! [`Record`]s of dynamically typed [`RowValues`]. Every operation takes a
//! caller-supplied [`Context`] for cancellation and deadlines.

pub mod api;
pub mod config;
pub mod context;
pub mod error;
pub mod pool;
pub mod postgres;
pub mod prelude;
pub mod results;
pub mod types;

#[cfg(feature = "test-utils")]
pub mod test_utils;

pub use config::{ConnectionConfig, QueryExecMode, validate_bounds};
pub use context::Context;
pub use error::{PgPoolError, Result};
pub use pool::{Pool, PoolState, PoolStats};
pub use results::{CommandOutcome, FieldDescriptor, Record};
pub use types::RowValues;
