//! Query executor with bounded retry
//!
//! Every statement the API runs goes through [`QueryExecutor::execute`]. A
//! call obtains the shared handle from the [`ConnectionManager`], probes it
//! once more, runs the statement with bound parameters and resolves the
//! transaction. Connection-class failures discard the handle and consume one
//! retry; query-class failures are returned immediately.

use super::connection::Connection;
use super::error::{DatabaseError, ErrorKind, Result};
use super::manager::{probe_connection, ConnectionManager, Handle};
use super::transaction::TransactionScope;
use super::value::{DatabaseResult, DatabaseRow, DatabaseValue};
use std::sync::Arc;
use std::time::Duration;

const QUERY_PREVIEW_CHARS: usize = 100;

/// Whether a statement reads rows or writes them
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryMode {
    /// Return every row of the result set
    Read,
    /// Run inside a transaction, commit, and return the affected row count
    Write,
}

/// Summary of a committed write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteSummary {
    pub affected_rows: u64,
    /// Auto-increment id generated by the statement, when there is one
    pub last_insert_id: Option<u64>,
}

/// Successful result of [`QueryExecutor::execute`]
#[derive(Debug, Clone, PartialEq)]
pub enum QueryOutcome {
    Rows(DatabaseResult),
    Affected(WriteSummary),
}

impl QueryOutcome {
    /// Rows of a read, empty for a write
    pub fn into_rows(self) -> DatabaseResult {
        match self {
            QueryOutcome::Rows(rows) => rows,
            QueryOutcome::Affected(_) => Vec::new(),
        }
    }

    /// Write summary, `None` for a read
    pub fn write_summary(&self) -> Option<WriteSummary> {
        match self {
            QueryOutcome::Affected(summary) => Some(*summary),
            QueryOutcome::Rows(_) => None,
        }
    }
}

/// Retry budget of the executor
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,
    /// Fixed pause before retrying after a connect or statement failure
    pub backoff: Duration,
    /// Timeout of the single pre-statement liveness probe
    pub probe_timeout: Duration,
    /// Upper bound on one statement, including the wait for the handle and
    /// the transaction round trips
    pub statement_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            backoff: Duration::from_millis(500),
            probe_timeout: Duration::from_secs(2),
            statement_timeout: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// Set the number of retries after the first attempt
    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    /// Set the pause between attempts
    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    /// Set the pre-statement probe timeout
    pub fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }

    /// Set the per-statement timeout
    pub fn with_statement_timeout(mut self, timeout: Duration) -> Self {
        self.statement_timeout = timeout;
        self
    }
}

/// Where an attempt failed
enum Stage {
    Acquire,
    Probe,
    Statement,
}

/// Runs statements against the shared handle with bounded retry
#[derive(Clone)]
pub struct QueryExecutor {
    manager: Arc<ConnectionManager>,
    policy: RetryPolicy,
}

impl QueryExecutor {
    /// Create an executor with the default retry policy
    pub fn new(manager: Arc<ConnectionManager>) -> Self {
        Self::with_policy(manager, RetryPolicy::default())
    }

    /// Create an executor with a custom retry policy
    pub fn with_policy(manager: Arc<ConnectionManager>, policy: RetryPolicy) -> Self {
        Self { manager, policy }
    }

    /// The connection manager this executor draws handles from
    pub fn manager(&self) -> &Arc<ConnectionManager> {
        &self.manager
    }

    /// Retry policy in effect
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Execute one statement with bound parameters
    ///
    /// # Errors
    ///
    /// - a query-class error as soon as the database rejects the statement
    /// - the last connection-class error once the retry budget is spent
    /// - a configuration error, without retrying, when the endpoint is unconfigured
    pub async fn execute(
        &self,
        query: &str,
        params: &[DatabaseValue],
        mode: QueryMode,
    ) -> Result<QueryOutcome> {
        let mut retries = 0u32;

        loop {
            let (error, stage) = match self.attempt(query, params, mode).await {
                Ok(outcome) => return Ok(outcome),
                Err(failure) => failure,
            };

            match error.kind() {
                ErrorKind::Connection => {}
                ErrorKind::Query => {
                    tracing::warn!(
                        query = %preview(query),
                        params = params.len(),
                        error = %error,
                        "database rejected statement"
                    );
                    return Err(error);
                }
                ErrorKind::Configuration => return Err(error),
            }

            if retries >= self.policy.max_retries {
                tracing::error!(
                    query = %preview(query),
                    attempts = retries + 1,
                    error = %error,
                    "giving up on statement after connection failures"
                );
                return Err(error);
            }
            retries += 1;

            tracing::warn!(
                attempt = retries,
                max_retries = self.policy.max_retries,
                error = %error,
                "connection failure, retrying statement"
            );
            // A failed pre-statement probe already cost a round trip; retry straight away.
            if !matches!(stage, Stage::Probe) {
                tokio::time::sleep(self.policy.backoff).await;
            }
        }
    }

    /// Read every row of a query
    pub async fn fetch_all(&self, query: &str, params: &[DatabaseValue]) -> Result<DatabaseResult> {
        self.execute(query, params, QueryMode::Read)
            .await
            .map(QueryOutcome::into_rows)
    }

    /// Read the first row of a query, if any
    pub async fn fetch_optional(
        &self,
        query: &str,
        params: &[DatabaseValue],
    ) -> Result<Option<DatabaseRow>> {
        Ok(self.fetch_all(query, params).await?.into_iter().next())
    }

    /// Run a write statement and commit it
    pub async fn execute_write(&self, query: &str, params: &[DatabaseValue]) -> Result<WriteSummary> {
        match self.execute(query, params, QueryMode::Write).await? {
            QueryOutcome::Affected(summary) => Ok(summary),
            QueryOutcome::Rows(_) => Err(DatabaseError::other("write produced a row set")),
        }
    }

    /// Read with a richer primary query and a reduced fallback
    ///
    /// The fallback runs at most once, and only when the primary fails for
    /// any reason (typically a view or column that has not been migrated yet).
    /// When both fail the fallback's error is returned.
    pub async fn fetch_with_fallback(
        &self,
        primary: &str,
        fallback: &str,
        params: &[DatabaseValue],
    ) -> Result<DatabaseResult> {
        match self.fetch_all(primary, params).await {
            Ok(rows) => Ok(rows),
            Err(primary_err) => {
                tracing::info!(
                    query = %preview(primary),
                    error = %primary_err,
                    "primary query failed, trying fallback"
                );
                self.fetch_all(fallback, params).await.map_err(|fallback_err| {
                    tracing::error!(
                        query = %preview(fallback),
                        error = %fallback_err,
                        "fallback query failed too"
                    );
                    fallback_err
                })
            }
        }
    }

    async fn attempt(
        &self,
        query: &str,
        params: &[DatabaseValue],
        mode: QueryMode,
    ) -> std::result::Result<QueryOutcome, (DatabaseError, Stage)> {
        let handle = self
            .manager
            .acquire()
            .await
            .map_err(|e| (e, Stage::Acquire))?;

        // The handle lock is released at the end of this block, before any
        // call back into the manager, which may need to close this handle.
        let result = {
            match handle.lock(self.policy.statement_timeout).await {
                Err(e) => Err((e, Stage::Probe)),
                Ok(mut guard) => match guard.connection() {
                    Err(e) => Err((e, Stage::Probe)),
                    Ok(conn) => self.probe_and_run(conn, query, params, mode).await,
                },
            }
        };

        let failed_on_connection = matches!(&result, Err((e, _)) if e.is_connection_class());
        // A handle replaced while this statement ran is closed here, once released.
        if failed_on_connection || handle.is_closed() {
            self.discard(&handle).await;
        }
        result
    }

    async fn probe_and_run(
        &self,
        conn: &mut dyn Connection,
        query: &str,
        params: &[DatabaseValue],
        mode: QueryMode,
    ) -> std::result::Result<QueryOutcome, (DatabaseError, Stage)> {
        probe_connection(conn, 1, Duration::ZERO, self.policy.probe_timeout)
            .await
            .map_err(|e| (e, Stage::Probe))?;

        let timeout = self.policy.statement_timeout;
        match tokio::time::timeout(timeout, run_statement(conn, query, params, mode)).await {
            Ok(result) => result.map_err(|e| (e, Stage::Statement)),
            Err(_) => {
                tracing::error!(
                    query = %preview(query),
                    timeout_ms = timeout.as_millis() as u64,
                    "statement timed out, discarding connection"
                );
                Err((
                    DatabaseError::query_timeout(timeout.as_millis() as u64),
                    Stage::Statement,
                ))
            }
        }
    }

    async fn discard(&self, handle: &Handle) {
        self.manager.invalidate(handle).await;
    }
}

async fn run_statement(
    conn: &mut dyn Connection,
    query: &str,
    params: &[DatabaseValue],
    mode: QueryMode,
) -> Result<QueryOutcome> {
    match mode {
        QueryMode::Read => conn
            .query_with_params(query, params)
            .await
            .map(QueryOutcome::Rows),
        QueryMode::Write => {
            let mut tx = TransactionScope::begin(conn).await?;
            match tx.execute_with_params(query, params).await {
                Ok(affected_rows) => {
                    let last_insert_id = tx.last_insert_id();
                    tx.commit().await?;
                    Ok(QueryOutcome::Affected(WriteSummary {
                        affected_rows,
                        last_insert_id,
                    }))
                }
                Err(e) => {
                    tx.rollback_quietly().await;
                    Err(e)
                }
            }
        }
    }
}

/// Single-line, length-bounded rendering of a statement for logs
fn preview(query: &str) -> String {
    let collapsed = query.split_whitespace().collect::<Vec<_>>().join(" ");
    match collapsed.char_indices().nth(QUERY_PREVIEW_CHARS) {
        Some((cut, _)) => format!("{}...", &collapsed[..cut]),
        None => collapsed,
    }
}


#[cfg(all(test, feature = "sqlite"))]
mod sqlite_tests {
    use super::*;
    use crate::backends::sqlite::SqliteConnector;

    fn executor() -> QueryExecutor {
        let manager = ConnectionManager::new(Arc::new(SqliteConnector::new(":memory:")));
        QueryExecutor::with_policy(
            Arc::new(manager),
            RetryPolicy::default().with_backoff(Duration::from_millis(1)),
        )
    }

    #[tokio::test]
    async fn test_write_then_read() -> Result<()> {
        let executor = executor();
        executor
            .execute_write(
                "CREATE TABLE warehouses (warehouse_id INTEGER PRIMARY KEY, name TEXT, location TEXT)",
                &[],
            )
            .await?;

        let summary = executor
            .execute_write(
                "INSERT INTO warehouses (name, location) VALUES (?, ?)",
                &["Central".into(), "Lahore".into()],
            )
            .await?;
        assert_eq!(summary.affected_rows, 1);
        assert_eq!(summary.last_insert_id, Some(1));

        let row = executor
            .fetch_optional("SELECT * FROM warehouses WHERE warehouse_id = ?", &[1i64.into()])
            .await?
            .expect("inserted row");
        assert_eq!(row.get("name").and_then(|v| v.as_str()), Some("Central"));
        Ok(())
    }

    fn assert_send<T: Send>(_: T) {}

    #[test]
    fn test_executor_futures_are_send() {
        let executor = executor();
        assert_send(executor.execute("SELECT 1", &[], QueryMode::Read));
        assert_send(executor.execute_write("DELETE FROM t", &[]));
        assert_send(executor.fetch_with_fallback("SELECT 1", "SELECT 2", &[]));
    }

    #[tokio::test]
    async fn test_syntax_error_is_query_class() {
        let executor = executor();
        let err = executor.fetch_all("SELEC nonsense", &[]).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Query);
        // The handle survives a rejected statement.
        assert_eq!(executor.manager().stats().await.replaced, 0);
    }
}
