//! Convenient imports for common functionality.

pub use crate::api;
pub use crate::config::ConnectionConfig;
pub use crate::context::Context;
pub use crate::error::PgPoolError;
pub use crate::pool::{Pool, PoolState, PoolStats};
pub use crate::results::{CommandOutcome, Record};
pub use crate::types::RowValues;

pub use tokio_util::sync::CancellationToken;
