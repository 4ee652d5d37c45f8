//! Synchronization executor.
//!
//! [`apply`] consumes reconciliation statements in order from a channel and
//! runs them, stopping at the first failure. In dry-run mode every statement
//! is logged and none is executed.

use std::collections::BTreeMap;

use rolesync_core::{rewrite_query, SqlValue};
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::error::{ApplyError, Error};
use crate::perf::StopWatch;
use crate::pool::ConnectionPool;

/// Target of log events describing a change to the cluster.
pub const CHANGE_TARGET: &str = "rolesync::change";

/// One reconciliation statement.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SyncQuery {
    /// Human description, e.g. `Create role.`
    pub description: String,
    /// Database to run the statement in.
    pub database: String,
    /// Statement with `$N` placeholders.
    pub query: String,
    #[serde(default)]
    pub args: Vec<SqlValue>,
    /// Extra fields for the change log, e.g. the role name.
    #[serde(default)]
    pub context: BTreeMap<String, String>,
}

impl SyncQuery {
    #[must_use]
    pub fn new(
        description: impl Into<String>,
        database: impl Into<String>,
        query: impl Into<String>,
    ) -> Self {
        Self {
            description: description.into(),
            database: database.into(),
            query: query.into(),
            args: Vec::new(),
            context: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn arg(mut self, value: impl Into<SqlValue>) -> Self {
        self.args.push(value.into());
        self
    }

    #[must_use]
    pub fn context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }
}

/// Change log line for `description`, prefixed with `Would` in dry-run.
#[must_use]
pub fn describe(description: &str, real: bool) -> String {
    if real {
        return description.to_string();
    }
    let mut chars = description.chars();
    match chars.next() {
        Some(first) => format!("Would {}{}", first.to_lowercase(), chars.as_str()),
        None => String::from("Would"),
    }
}

/// Runs the statements received on `queries` until the channel closes.
///
/// Returns the number of statements observed. In dry-run mode (`real` is
/// false) no connection is acquired.
///
/// # Errors
///
/// Stops at the first failure, leaving later statements in the channel. The
/// [`ApplyError`] counts the failed statement.
pub async fn apply<P: ConnectionPool>(
    cancel: &CancellationToken,
    watch: &mut StopWatch,
    pool: &P,
    queries: &mut mpsc::Receiver<SyncQuery>,
    real: bool,
) -> Result<usize, ApplyError> {
    let mut count = 0;
    loop {
        let query = tokio::select! {
            biased;
            () = cancel.cancelled() => {
                return Err(ApplyError { count, source: Error::Cancelled });
            }
            query = queries.recv() => match query {
                Some(query) => query,
                None => break,
            },
        };
        count += 1;

        info!(
            target: CHANGE_TARGET,
            database = %query.database,
            context = ?query.context,
            "{}",
            describe(&query.description, real)
        );

        match rewrite_query(&query.query, &query.args) {
            Ok(sql) => debug!(database = %query.database, "{sql}"),
            Err(e) => debug!(
                database = %query.database,
                args = ?query.args,
                error = %e,
                "{}",
                query.query.trim()
            ),
        }

        if !real {
            continue;
        }

        let mut conn = pool
            .acquire(cancel, &query.database)
            .await
            .map_err(|source| ApplyError { count, source })?;
        let (result, duration) = watch.time_it(P::execute(&mut conn, &query)).await;
        let rows = result.map_err(|source| ApplyError {
            count,
            source: Error::Execution {
                database: query.database.clone(),
                description: query.description.clone(),
                source,
            },
        })?;
        debug!(
            duration_ms = duration.as_millis(),
            rows,
            "Query terminated."
        );
    }
    Ok(count)
}
