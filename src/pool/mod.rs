pub mod types;

pub use types::{PoolState, PoolStats};

use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use bb8::ManageConnection;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::config::ConnectionConfig;
use crate::context::Context;
use crate::error::{PgPoolError, Result};
use crate::postgres::{self, ConnectErrorSink, PgConnection, PgManager};
use crate::results::{CommandOutcome, Record};
use crate::types::RowValues;

/// Upper bound handed to bb8 for a checkout. Waiting is really bounded by the
/// caller's `Context`; bb8 just requires some finite value.
const CHECKOUT_CEILING: Duration = Duration::from_secs(365 * 24 * 60 * 60);

const CONNECT_FAILURE_BACKLOG: usize = 16;

/// A bounded pool of PostgreSQL connections.
///
/// Cloning is cheap and every clone refers to the same pool. Closing through
/// any clone closes it for all of them.
#[derive(Clone)]
pub struct Pool {
    inner: Arc<Inner>,
}

struct Inner {
    config: ConnectionConfig,
    pool: RwLock<Option<bb8::Pool<PgManager>>>,
    closing: CancellationToken,
    connect_failures: broadcast::Sender<String>,
}

impl std::fmt::Debug for Pool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pool")
            .field("state", &self.state())
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}

impl Pool {
    /// Build the pool and prove the target is reachable.
    ///
    /// `min_conns` connections are established up front. With `min_conns == 0`
    /// a single test connection is made and closed again, so bad credentials or
    /// an unreachable host surface here rather than on first use. Connection
    /// attempts are not retried.
    ///
    /// # Errors
    /// `InvalidBounds` if the descriptor asked for more idle than total
    /// connections, `Open` when a connection cannot be established, `Cancelled` /
    /// `DeadlineExceeded` when `ctx` ends first.
    pub async fn open(ctx: &Context, config: ConnectionConfig) -> Result<Self> {
        let min_conns = config.min_conns();
        let max_conns = config.max_conns();
        if min_conns > max_conns {
            return Err(PgPoolError::InvalidBounds(format!(
                "min_conns ({min_conns}) exceeds max_conns ({max_conns})"
            )));
        }
        let manager = PgManager::new(config.pg_config().clone());
        let (connect_failures, _) = broadcast::channel(CONNECT_FAILURE_BACKLOG);

        let mut builder = bb8::Pool::builder()
            .max_size(max_conns)
            .min_idle((min_conns > 0).then_some(min_conns))
            .max_lifetime(non_zero(config.max_conn_lifetime()))
            .idle_timeout(non_zero(config.max_conn_idle_time()))
            .connection_timeout(CHECKOUT_CEILING)
            .retry_connection(false)
            .test_on_check_out(false)
            .error_sink(Box::new(ConnectErrorSink::new(connect_failures.clone())));
        if let Some(period) = non_zero(config.health_check_period()) {
            builder = builder.reaper_rate(period);
        }

        let pool = ctx
            .run(async move {
                if min_conns == 0 {
                    // bb8 connects lazily here, so nothing would reach the target yet.
                    let first = manager.connect().await.map_err(PgPoolError::Open)?;
                    drop(first);
                }
                builder.build(manager).await.map_err(PgPoolError::Open)
            })
            .await?;

        info!(
            min_conns,
            max_conns,
            database = config.database().unwrap_or_default(),
            "pool opened"
        );
        Ok(Self {
            inner: Arc::new(Inner {
                config,
                pool: RwLock::new(Some(pool)),
                closing: CancellationToken::new(),
                connect_failures,
            }),
        })
    }

    #[must_use]
    pub fn config(&self) -> &ConnectionConfig {
        &self.inner.config
    }

    #[must_use]
    pub fn state(&self) -> PoolState {
        if self.is_closed() {
            PoolState::Closed
        } else {
            PoolState::Open
        }
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.closing.is_cancelled()
    }

    #[must_use]
    pub fn stats(&self) -> PoolStats {
        let min = self.inner.config.min_conns();
        let max = self.inner.config.max_conns();
        match self.handle() {
            Ok(pool) => PoolStats::from_state(&pool.state(), min, max),
            Err(_) => PoolStats::closed(min, max),
        }
    }

    /// Close the pool. Idle connections are dropped now; connections still in
    /// use are dropped as they come back. Waiters for a connection fail with
    /// `Closed`. Calling this more than once is harmless.
    pub fn close(&self) {
        if self.inner.closing.is_cancelled() {
            return;
        }
        self.inner.closing.cancel();
        let pool = self
            .inner
            .pool
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(pool) = pool {
            let stats = PoolStats::from_state(&pool.state(), 0, 0);
            info!(
                idle_conns = stats.idle_conns,
                acquired_conns = stats.acquired_conns,
                "pool closed"
            );
        }
    }

    /// Check a connection out of the pool, waiting for one to free up if
    /// `max_conns` are already in use.
    ///
    /// A connection attempt that fails while the caller waits ends the wait
    /// with that failure; the attempt is not retried.
    ///
    /// # Errors
    /// `Closed` if the pool is or becomes closed, `Acquire` if a new
    /// connection cannot be established, `Cancelled` / `DeadlineExceeded`
    /// when `ctx` ends first.
    pub async fn acquire(&self, ctx: &Context) -> Result<PgConnection> {
        let pool = self.handle()?;
        let closing = self.inner.closing.clone();
        let mut failures = self.inner.connect_failures.subscribe();
        let conn = ctx
            .run(async move {
                tokio::select! {
                    biased;
                    () = closing.cancelled() => Err(PgPoolError::Closed),
                    res = pool.get_owned() => res.map_err(PgPoolError::from),
                    failure = failures.recv() => {
                        Err(PgPoolError::Acquire(failure.unwrap_or_else(|e| e.to_string())))
                    }
                }
            })
            .await?;
        if self.is_closed() {
            return Err(PgPoolError::Closed);
        }
        Ok(conn)
    }

    /// Round trip to the server on a pooled connection.
    ///
    /// # Errors
    /// Any acquisition error, or `Exec` if the server does not answer cleanly.
    pub async fn ping(&self, ctx: &Context) -> Result<()> {
        let conn = self.acquire(ctx).await?;
        ctx.run(async {
            conn.simple_query("SELECT 1")
                .await
                .map(|_| ())
                .map_err(PgPoolError::Exec)
        })
        .await?;
        debug!("ping ok");
        Ok(())
    }

    /// Run a non-query statement with positional arguments (`$1`, `$2`, ...).
    ///
    /// # Errors
    /// See [`postgres::exec`]; acquisition errors are returned as-is.
    pub async fn exec(&self, ctx: &Context, sql: &str, args: &[RowValues]) -> Result<CommandOutcome> {
        let conn = self.acquire(ctx).await?;
        postgres::exec(ctx, conn, sql, args).await
    }

    /// Run a query and return every row as a name-keyed record.
    ///
    /// # Errors
    /// See [`postgres::query`]; acquisition errors are returned as-is.
    pub async fn query(&self, ctx: &Context, sql: &str, args: &[RowValues]) -> Result<Vec<Record>> {
        let conn = self.acquire(ctx).await?;
        postgres::query(ctx, conn, sql, args).await
    }

    fn handle(&self) -> Result<bb8::Pool<PgManager>> {
        self.inner
            .pool
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or(PgPoolError::Closed)
    }
}

fn non_zero(duration: Duration) -> Option<Duration> {
    (!duration.is_zero()).then_some(duration)
}
