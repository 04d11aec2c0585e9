use std::time::Instant;

use futures_util::{TryStreamExt, pin_mut};
use tokio_postgres::types::Type;
use tokio_postgres::{Client, NoTls, SimpleQueryMessage};
use tracing::{debug, warn};

use super::manager::PgConnection;
use super::params::typed_params;
use crate::context::Context;
use crate::error::{PgPoolError, Result};
use crate::results::{CommandOutcome, Record, materialize_stream};
use crate::types::RowValues;

/// Run a non-query statement on a checked-out connection.
///
/// Without arguments the text goes through the simple-query protocol, so a
/// `;`-separated script is accepted and the last statement's count is reported.
/// With arguments an unnamed statement is bound with client-declared types.
///
/// The connection is consumed: it goes back to the pool when this returns,
/// whatever the outcome.
///
/// # Errors
/// `Param` if an argument cannot be typed, `Exec` for engine failures,
/// `Cancelled`/`DeadlineExceeded` when `ctx` ends first.
pub async fn exec(
    ctx: &Context,
    conn: PgConnection,
    sql: &str,
    args: &[RowValues],
) -> Result<CommandOutcome> {
    let params = typed_params(args)?;
    let started = Instant::now();
    let result = ctx.run(run_exec(&conn, sql, params)).await;
    let result = release(conn, result);
    if let Ok(outcome) = &result {
        debug!(
            sql,
            command = %outcome,
            rows = outcome.rows_affected(),
            elapsed_ms = elapsed_ms(started),
            "exec finished"
        );
    }
    result
}

/// Run a row-returning statement and collect every row before returning.
///
/// A failure on any row discards the rows read so far.
///
/// # Errors
/// `Param` if an argument cannot be typed, `Query` for engine or transport
/// failures, `Decode` for columns with no value representation,
/// `Cancelled`/`DeadlineExceeded` when `ctx` ends first.
pub async fn query(
    ctx: &Context,
    conn: PgConnection,
    sql: &str,
    args: &[RowValues],
) -> Result<Vec<Record>> {
    let params = typed_params(args)?;
    let started = Instant::now();
    let result = ctx.run(run_query(&conn, sql, params)).await;
    let result = release(conn, result);
    if let Ok(records) = &result {
        debug!(
            sql,
            rows = records.len(),
            elapsed_ms = elapsed_ms(started),
            "query finished"
        );
    }
    result
}

async fn run_exec(client: &Client, sql: &str, params: Vec<(&RowValues, Type)>) -> Result<CommandOutcome> {
    if params.is_empty() {
        let messages = client.simple_query(sql).await.map_err(PgPoolError::Exec)?;
        let rows = messages
            .iter()
            .rev()
            .find_map(|m| match m {
                SimpleQueryMessage::CommandComplete(n) => Some(*n),
                _ => None,
            })
            .unwrap_or(0);
        return Ok(CommandOutcome::from_statement(sql, rows));
    }

    let stream = client
        .query_typed_raw(sql, params)
        .await
        .map_err(PgPoolError::Exec)?;
    pin_mut!(stream);
    let mut returned = 0_u64;
    while stream.try_next().await.map_err(PgPoolError::Exec)?.is_some() {
        returned += 1;
    }
    let rows = stream.rows_affected().unwrap_or(returned);
    Ok(CommandOutcome::from_statement(sql, rows))
}

async fn run_query(client: &Client, sql: &str, params: Vec<(&RowValues, Type)>) -> Result<Vec<Record>> {
    let stream = client
        .query_typed_raw(sql, params)
        .await
        .map_err(PgPoolError::Query)?;
    materialize_stream(stream, PgPoolError::Query).await
}

/// Return `conn` to the pool. When the context ended mid-statement the server
/// is asked to cancel first, in the background, and the connection is only
/// released once that request has been sent.
fn release<T>(conn: PgConnection, result: Result<T>) -> Result<T> {
    match &result {
        Err(e) if e.is_cancellation() => {
            warn!(reason = %e, "statement interrupted, sending cancel request");
            let cancel = conn.cancel_token();
            tokio::spawn(async move {
                if let Err(err) = cancel.cancel_query(NoTls).await {
                    warn!(error = %err, "cancel request failed");
                }
                drop(conn);
            });
        }
        _ => drop(conn),
    }
    result
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}
