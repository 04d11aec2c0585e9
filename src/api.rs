//! Host-facing entry points.
//!
//! These are the three operations an embedding runtime exposes: open a pool
//! from a descriptor and explicit bounds, run a statement, run a query. They
//! are thin wrappers over [`Pool`] that take the pool by reference.
//!
//! Arguments are declared with the type of their own [`RowValues`] variant
//! (`Text` as `text`, `Int` as `int8`, ...), never a type guessed from the
//! statement. A `Text` argument compared with an `int4` column or stored into
//! a `date` column is rejected by the server; cast the placeholder
//! (`$1::date`) or pass the matching variant (`RowValues::Date`).
//!
//! ```no_run
//! use pgpool_middleware::prelude::*;
//!
//! # async fn demo() -> Result<(), PgPoolError> {
//! let ctx = Context::background();
//! let pool = api::open(&ctx, "postgres://postgres@localhost/app", 1, 4).await?;
//! api::exec(&ctx, &pool, "CREATE TABLE IF NOT EXISTS t (id int)", &[]).await?;
//! let rows = api::query(&ctx, &pool, "SELECT 1 AS id", &[]).await?;
//! assert_eq!(rows[0].get("id"), Some(&RowValues::Int(1)));
//! # Ok(())
//! # }
//! ```

use crate::config::ConnectionConfig;
use crate::context::Context;
use crate::error::Result;
use crate::pool::Pool;
use crate::results::{CommandOutcome, Record};
use crate::types::RowValues;

/// Parse `descriptor`, apply the explicit bounds and open the pool.
///
/// Bounds given here override any `pool_min_conns` / `pool_max_conns` in the
/// descriptor. Bad bounds and unparseable descriptors fail before any
/// connection is attempted.
///
/// # Errors
/// `InvalidBounds` for negative, oversized, zero-max or inverted bounds;
/// `Parse` for a malformed descriptor; otherwise whatever [`Pool::open`] returns.
pub async fn open(ctx: &Context, descriptor: &str, min_conns: i64, max_conns: i64) -> Result<Pool> {
    let config = ConnectionConfig::parse(descriptor)?.with_bounds(min_conns, max_conns)?;
    Pool::open(ctx, config).await
}

/// Run a statement that returns no rows of interest.
///
/// `Text` arguments bound to non-text columns need an explicit cast such as
/// `$1::date` (see the module docs).
///
/// # Errors
/// See [`Pool::exec`].
pub async fn exec(ctx: &Context, pool: &Pool, sql: &str, args: &[RowValues]) -> Result<CommandOutcome> {
    pool.exec(ctx, sql, args).await
}

/// Run a query and collect every row. Argument typing works as for [`exec`].
///
/// # Errors
/// See [`Pool::query`].
pub async fn query(ctx: &Context, pool: &Pool, sql: &str, args: &[RowValues]) -> Result<Vec<Record>> {
    pool.query(ctx, sql, args).await
}
