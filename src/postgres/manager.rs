use std::future::Future;

use bb8::{ErrorSink, ManageConnection, PooledConnection};
use tokio::sync::broadcast;
use tokio_postgres::{Client, NoTls};
use tracing::{debug, warn};

/// A client checked out of the pool. Dropping it hands the connection back.
pub type PgConnection = PooledConnection<'static, PgManager>;

/// bb8 manager for `tokio_postgres` clients.
///
/// Each connection's I/O task is spawned onto the runtime at connect time and
/// lives until the server side goes away or the client is dropped.
#[derive(Debug, Clone)]
pub struct PgManager {
    config: tokio_postgres::Config,
}

impl PgManager {
    #[must_use]
    pub fn new(config: tokio_postgres::Config) -> Self {
        Self { config }
    }

    #[must_use]
    pub fn config(&self) -> &tokio_postgres::Config {
        &self.config
    }
}

impl ManageConnection for PgManager {
    type Connection = Client;
    type Error = tokio_postgres::Error;

    #[allow(clippy::manual_async_fn)]
    fn connect(&self) -> impl Future<Output = Result<Self::Connection, Self::Error>> + Send {
        let cfg = self.config.clone();
        async move {
            debug!(
                hosts = ?cfg.get_hosts(),
                dbname = ?cfg.get_dbname(),
                user = ?cfg.get_user(),
                "connecting"
            );
            let (client, connection) = cfg.connect(NoTls).await?;
            debug!("connection established");
            tokio::spawn(async move {
                if let Err(e) = connection.await {
                    warn!(error = %e, "connection terminated");
                }
            });
            Ok(client)
        }
    }

    #[allow(clippy::manual_async_fn)]
    fn is_valid(
        &self,
        conn: &mut Self::Connection,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send {
        async move { conn.simple_query("SELECT 1").await.map(|_| ()) }
    }

    fn has_broken(&self, conn: &mut Self::Connection) -> bool {
        conn.is_closed()
    }
}

/// Hands failed background connects to callers waiting in
/// [`Pool::acquire`](crate::Pool::acquire), and logs them.
#[derive(Debug, Clone)]
pub struct ConnectErrorSink {
    failures: broadcast::Sender<String>,
}

impl ConnectErrorSink {
    #[must_use]
    pub fn new(failures: broadcast::Sender<String>) -> Self {
        Self { failures }
    }
}

impl ErrorSink<tokio_postgres::Error> for ConnectErrorSink {
    fn sink(&self, error: tokio_postgres::Error) {
        warn!(error = %error, "background connection attempt failed");
        // No receivers means nobody is waiting for a connection right now.
        let _ = self.failures.send(error.to_string());
    }

    fn boxed_clone(&self) -> Box<dyn ErrorSink<tokio_postgres::Error>> {
        Box::new(self.clone())
    }
}
