//! Database connections keyed by database name.

use std::collections::HashMap;
use std::future::Future;
use std::str::FromStr;

use rolesync_core::SqlValue;
use sqlx::pool::PoolConnection;
use sqlx::postgres::{PgArguments, PgConnectOptions, PgPool, PgPoolOptions, Postgres};
use sqlx::query::Query;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::config::PostgresConfig;
use crate::error::{Error, Result};
use crate::sync::SyncQuery;

/// Source of connections for the executor.
///
/// Implementations must tolerate concurrent `acquire` calls.
pub trait ConnectionPool {
    type Connection;

    /// Gets a connection to `database`, failing fast when `cancel` fires.
    fn acquire(
        &self,
        cancel: &CancellationToken,
        database: &str,
    ) -> impl Future<Output = Result<Self::Connection>>;

    /// Runs one statement, returning the number of affected rows.
    fn execute(
        conn: &mut Self::Connection,
        query: &SyncQuery,
    ) -> impl Future<Output = std::result::Result<u64, sqlx::Error>>;
}

/// One lazy `PgPool` per database, all derived from the same options.
#[derive(Debug)]
pub struct DbPool {
    base: PgConnectOptions,
    max_connections: u32,
    pools: Mutex<HashMap<String, PgPool>>,
}

impl DbPool {
    #[must_use]
    pub fn new(base: PgConnectOptions, max_connections: u32) -> Self {
        Self {
            base,
            max_connections,
            pools: Mutex::new(HashMap::new()),
        }
    }

    /// Builds a pool from configuration. Without a DSN, libpq environment
    /// variables (`PGHOST`, `PGUSER`...) apply.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the DSN is invalid.
    pub fn from_config(config: &PostgresConfig) -> Result<Self> {
        let base = match &config.dsn {
            Some(dsn) => PgConnectOptions::from_str(dsn)
                .map_err(|e| Error::config("postgres.dsn", e.to_string()))?,
            None => PgConnectOptions::new(),
        };
        Ok(Self::new(base, config.max_connections))
    }

    /// Database of the connection options, defaulting to the user name as
    /// libpq does.
    #[must_use]
    pub fn default_database(&self) -> String {
        self.base
            .get_database()
            .unwrap_or_else(|| self.base.get_username())
            .to_string()
    }

    async fn pool(&self, database: &str) -> PgPool {
        let mut pools = self.pools.lock().await;
        pools
            .entry(database.to_string())
            .or_insert_with(|| {
                debug!(database, "Opening connection pool.");
                PgPoolOptions::new()
                    .max_connections(self.max_connections)
                    .connect_lazy_with(self.base.clone().database(database))
            })
            .clone()
    }

    /// Closes every pool.
    pub async fn close(&self) {
        let pools = std::mem::take(&mut *self.pools.lock().await);
        for (database, pool) in pools {
            debug!(database = %database, "Closing connection pool.");
            pool.close().await;
        }
    }
}

impl ConnectionPool for DbPool {
    type Connection = PoolConnection<Postgres>;

    async fn acquire(
        &self,
        cancel: &CancellationToken,
        database: &str,
    ) -> Result<Self::Connection> {
        let pool = self.pool(database).await;
        tokio::select! {
            biased;
            () = cancel.cancelled() => Err(Error::Cancelled),
            conn = pool.acquire() => conn.map_err(|source| Error::DatabaseConnect {
                database: database.to_string(),
                source,
            }),
        }
    }

    async fn execute(
        conn: &mut Self::Connection,
        query: &SyncQuery,
    ) -> std::result::Result<u64, sqlx::Error> {
        let statement = query
            .args
            .iter()
            .fold(sqlx::query(&query.query), bind_value);
        Ok(statement.execute(&mut **conn).await?.rows_affected())
    }
}

fn bind_value<'q>(
    statement: Query<'q, Postgres, PgArguments>,
    value: &'q SqlValue,
) -> Query<'q, Postgres, PgArguments> {
    match value {
        SqlValue::Null => statement.bind(None::<String>),
        SqlValue::Bool(b) => statement.bind(*b),
        SqlValue::Int(n) => statement.bind(*n),
        SqlValue::Float(f) => statement.bind(*f),
        SqlValue::Text(s) => statement.bind(s.as_str()),
        SqlValue::Bytes(b) => statement.bind(b.as_slice()),
    }
}
