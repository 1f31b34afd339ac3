//! SQLite database backend implementation
//!
//! This module provides a SQLite implementation of the [`Connector`] and
//! [`Connection`] traits. rusqlite is blocking, so every call runs on the
//! blocking thread pool under an operation timeout.

use crate::core::{
    connection::Connection, connection::Connector, connection::EndpointConfig,
    database_types::DatabaseType, error::DatabaseError, error::Result, value::DatabaseResult,
    value::DatabaseRow, value::DatabaseValue,
};
use async_trait::async_trait;
use parking_lot::Mutex;
use rusqlite::{params_from_iter, ErrorCode, Row};
use std::sync::Arc;
use std::time::Duration;

/// Default timeout for database operations (30 seconds)
const DEFAULT_OPERATION_TIMEOUT: Duration = Duration::from_secs(30);

/// Opens SQLite connections to a file (or `:memory:`)
#[derive(Debug, Clone)]
pub struct SqliteConnector {
    path: String,
    operation_timeout: Duration,
}

impl SqliteConnector {
    /// Create a connector for the given database path
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            operation_timeout: DEFAULT_OPERATION_TIMEOUT,
        }
    }

    /// Create a connector from an endpoint description
    pub fn from_endpoint(endpoint: &EndpointConfig) -> Self {
        Self::new(endpoint.path.clone().unwrap_or_else(|| ":memory:".to_string()))
    }

    /// Set database operation timeout (for query, execute, etc.)
    pub fn with_operation_timeout(mut self, timeout: Duration) -> Self {
        self.operation_timeout = timeout;
        self
    }
}

#[async_trait]
impl Connector for SqliteConnector {
    fn database_type(&self) -> DatabaseType {
        DatabaseType::Sqlite
    }

    fn endpoint(&self) -> String {
        format!("sqlite://{}", self.path)
    }

    async fn connect(&self) -> Result<Box<dyn Connection>> {
        let path = self.path.clone();
        let endpoint = self.endpoint();

        let mut task = tokio::task::spawn_blocking(move || -> Result<rusqlite::Connection> {
            let conn = rusqlite::Connection::open(&path).map_err(classify)?;
            conn.execute("PRAGMA foreign_keys = ON", []).map_err(classify)?;
            Ok(conn)
        });

        // Use select! to abort task on timeout, preventing resource leaks
        let conn = tokio::select! {
            result = &mut task => {
                result.map_err(|e| DatabaseError::other(format!("Task join error: {}", e)))?
                    .map_err(|e| DatabaseError::connection_failed(endpoint, e.to_string()))?
            }
            _ = tokio::time::sleep(self.operation_timeout) => {
                task.abort();
                return Err(DatabaseError::connection_timeout(self.operation_timeout.as_millis() as u64));
            }
        };

        Ok(Box::new(SqliteConnection {
            conn: Arc::new(Mutex::new(conn)),
            in_transaction: false,
            last_insert_id: None,
            operation_timeout: self.operation_timeout,
        }))
    }
}

/// One open SQLite session
pub struct SqliteConnection {
    conn: Arc<Mutex<rusqlite::Connection>>,
    in_transaction: bool,
    last_insert_id: Option<u64>,
    operation_timeout: Duration,
}

impl SqliteConnection {
    /// Run `f` against the connection on the blocking pool with a timeout
    async fn run_blocking<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut rusqlite::Connection) -> Result<T> + Send + 'static,
    {
        let connection_arc = Arc::clone(&self.conn);
        let mut task = tokio::task::spawn_blocking(move || {
            let mut conn = connection_arc.lock();
            f(&mut conn)
        });

        tokio::select! {
            result = &mut task => {
                result.map_err(|e| DatabaseError::other(format!("Task join error: {}", e)))?
            }
            _ = tokio::time::sleep(self.operation_timeout) => {
                task.abort();
                Err(DatabaseError::query_timeout(self.operation_timeout.as_millis() as u64))
            }
        }
    }

    /// Convert a rusqlite Row to a DatabaseRow
    fn row_to_database_row(row: &Row) -> rusqlite::Result<DatabaseRow> {
        let column_count = row.as_ref().column_count();
        let mut db_row = DatabaseRow::with_capacity(column_count);

        for i in 0..column_count {
            let column_name = row.as_ref().column_name(i)?.to_string();
            let value = match row.get_ref(i)? {
                rusqlite::types::ValueRef::Null => DatabaseValue::Null,
                rusqlite::types::ValueRef::Integer(v) => DatabaseValue::Long(v),
                rusqlite::types::ValueRef::Real(v) => DatabaseValue::Double(v),
                rusqlite::types::ValueRef::Text(v) => {
                    DatabaseValue::String(String::from_utf8_lossy(v).to_string())
                }
                rusqlite::types::ValueRef::Blob(v) => DatabaseValue::Bytes(v.to_vec()),
            };
            db_row.insert(column_name, value);
        }

        Ok(db_row)
    }

    /// Convert DatabaseValue to rusqlite parameter
    fn value_to_param(value: &DatabaseValue) -> Box<dyn rusqlite::ToSql> {
        match value {
            DatabaseValue::Null => Box::new(None::<i64>),
            DatabaseValue::Bool(v) => Box::new(*v),
            DatabaseValue::Int(v) => Box::new(*v),
            DatabaseValue::Long(v) => Box::new(*v),
            DatabaseValue::Float(v) => Box::new(f64::from(*v)),
            DatabaseValue::Double(v) => Box::new(*v),
            DatabaseValue::String(v) => Box::new(v.clone()),
            DatabaseValue::Bytes(v) => Box::new(v.clone()),
            DatabaseValue::Timestamp(v) => Box::new(*v),
        }
    }
}

/// Map a rusqlite error onto the query layer's taxonomy
///
/// Only failures of the database file itself are connection-class; every
/// statement-level failure (syntax, constraint, missing table) is query-class.
fn classify(err: rusqlite::Error) -> DatabaseError {
    match &err {
        rusqlite::Error::SqliteFailure(failure, _)
            if matches!(
                failure.code,
                ErrorCode::CannotOpen | ErrorCode::NotADatabase | ErrorCode::SystemIoFailure
            ) =>
        {
            DatabaseError::connection_lost(None, err.to_string())
        }
        _ => DatabaseError::from(err),
    }
}

#[async_trait]
impl Connection for SqliteConnection {
    fn database_type(&self) -> DatabaseType {
        DatabaseType::Sqlite
    }

    async fn ping(&mut self) -> Result<()> {
        let probe = DatabaseType::Sqlite.probe_statement();
        self.run_blocking(move |conn| {
            conn.query_row(probe, [], |_| Ok(()))
                .map_err(classify)
        })
        .await
    }

    async fn query_with_params(
        &mut self,
        query: &str,
        params: &[DatabaseValue],
    ) -> Result<DatabaseResult> {
        let query = query.to_string();
        let params = params.to_vec();

        self.run_blocking(move |conn| {
            // Convert DatabaseValue to rusqlite parameters
            let rusqlite_params: Vec<Box<dyn rusqlite::ToSql>> =
                params.iter().map(Self::value_to_param).collect();

            let mut stmt = conn.prepare(&query).map_err(classify)?;
            let rows = stmt
                .query_map(
                    params_from_iter(rusqlite_params.iter()),
                    Self::row_to_database_row,
                )
                .map_err(classify)?;

            let mut results = Vec::new();
            for row_result in rows {
                results.push(row_result.map_err(classify)?);
            }

            Ok(results)
        })
        .await
    }

    async fn execute_with_params(&mut self, query: &str, params: &[DatabaseValue]) -> Result<u64> {
        let inserts = inserts_rows(query);
        let query = query.to_string();
        let params = params.to_vec();

        let (affected, inserted) = self
            .run_blocking(move |conn| {
                let rusqlite_params: Vec<Box<dyn rusqlite::ToSql>> =
                    params.iter().map(Self::value_to_param).collect();

                let mut stmt = conn.prepare(&query).map_err(classify)?;
                let affected = stmt
                    .execute(params_from_iter(rusqlite_params.iter()))
                    .map_err(classify)?;
                drop(stmt);

                // last_insert_rowid() is per connection, not per table, so only
                // an INSERT that wrote rows may report it
                let rowid = conn.last_insert_rowid();
                let inserted = (inserts && affected > 0 && rowid > 0).then_some(rowid as u64);
                Ok((affected as u64, inserted))
            })
            .await?;

        self.last_insert_id = inserted;
        Ok(affected)
    }

    fn last_insert_id(&self) -> Option<u64> {
        self.last_insert_id
    }

    async fn begin_transaction(&mut self) -> Result<()> {
        if self.in_transaction {
            return Err(DatabaseError::transaction("Already in a transaction"));
        }
        // Execute SQL first, only set flag on success
        self.run_blocking(|conn| {
            conn.execute_batch("BEGIN TRANSACTION").map_err(classify)
        })
        .await?;
        self.in_transaction = true;
        Ok(())
    }

    async fn commit(&mut self) -> Result<()> {
        if !self.in_transaction {
            return Err(DatabaseError::transaction("Not in a transaction"));
        }
        self.run_blocking(|conn| conn.execute_batch("COMMIT").map_err(classify))
            .await?;
        self.in_transaction = false;
        Ok(())
    }

    async fn rollback(&mut self) -> Result<()> {
        if !self.in_transaction {
            return Err(DatabaseError::transaction("Not in a transaction"));
        }
        // Clear the flag even if ROLLBACK fails; SQLite ends the transaction on most errors.
        self.in_transaction = false;
        self.run_blocking(|conn| conn.execute_batch("ROLLBACK").map_err(classify))
            .await
    }

    fn in_transaction(&self) -> bool {
        self.in_transaction
    }

    async fn close(self: Box<Self>) -> Result<()> {
        let conn = Arc::clone(&self.conn);
        drop(self);
        match Arc::try_unwrap(conn) {
            Ok(mutex) => mutex
                .into_inner()
                .close()
                .map_err(|(_, e)| classify(e)),
            // A timed-out blocking task still owns a reference; the
            // connection closes when that task finishes.
            Err(_) => Ok(()),
        }
    }
}

/// True for statements that add rows and may generate a rowid
fn inserts_rows(query: &str) -> bool {
    let keyword = query.split_whitespace().next().unwrap_or_default();
    keyword.eq_ignore_ascii_case("INSERT") || keyword.eq_ignore_ascii_case("REPLACE")
}

impl Drop for SqliteConnection {
    fn drop(&mut self) {
        // Best-effort rollback of an abandoned transaction; Drop cannot be async
        if self.in_transaction {
            if let Some(conn) = self.conn.try_lock() {
                let _ = conn.execute_batch("ROLLBACK");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_sqlite_connect_and_ping() -> Result<()> {
        let connector = SqliteConnector::new(":memory:");
        assert_eq!(connector.endpoint(), "sqlite://:memory:");

        let mut conn = connector.connect().await?;
        conn.ping().await?;
        assert_eq!(conn.database_type(), DatabaseType::Sqlite);
        conn.close().await
    }

    #[tokio::test]
    async fn test_sqlite_connect_failure_is_connection_class() {
        let connector = SqliteConnector::new("/nonexistent-dir/for/sure/data.db");
        let err = connector.connect().await.err().unwrap();
        assert!(err.is_connection_class());
    }

    #[tokio::test]
    async fn test_sqlite_execute_and_query() -> Result<()> {
        let mut conn = SqliteConnector::new(":memory:").connect().await?;

        conn.execute_with_params("CREATE TABLE test (id INTEGER PRIMARY KEY, name TEXT)", &[])
            .await?;
        assert_eq!(conn.last_insert_id(), None);

        let affected = conn
            .execute_with_params("INSERT INTO test (name) VALUES (?)", &["Alice".into()])
            .await?;
        assert_eq!(affected, 1);
        assert_eq!(conn.last_insert_id(), Some(1));

        conn.execute_with_params("INSERT INTO test (name) VALUES (?)", &["Bob".into()])
            .await?;

        let affected = conn
            .execute_with_params("UPDATE test SET name = ? WHERE id = ?", &["Bobby".into(), 2i64.into()])
            .await?;
        assert_eq!(affected, 1);
        assert_eq!(conn.last_insert_id(), None);

        let results = conn
            .query_with_params("SELECT * FROM test ORDER BY id", &[])
            .await?;
        assert_eq!(results.len(), 2);

        let names: Vec<String> = results
            .iter()
            .map(|row| row.get("name").map(|v| v.as_string()).unwrap_or_default())
            .collect();
        assert_eq!(names, vec!["Alice", "Bobby"]);

        let columns: Vec<&str> = results[0].column_names().collect();
        assert_eq!(columns, vec!["id", "name"]);
        Ok(())
    }

    #[tokio::test]
    async fn test_sqlite_insert_id_per_table() -> Result<()> {
        let mut conn = SqliteConnector::new(":memory:").connect().await?;
        conn.execute_with_params("CREATE TABLE warehouses (id INTEGER PRIMARY KEY, name TEXT)", &[])
            .await?;
        conn.execute_with_params("CREATE TABLE shipments (id INTEGER PRIMARY KEY, qty INTEGER)", &[])
            .await?;

        // Both tables hand out rowid 1, so the connection-wide rowid does not change
        conn.execute_with_params("INSERT INTO warehouses (name) VALUES (?)", &["Central".into()])
            .await?;
        assert_eq!(conn.last_insert_id(), Some(1));
        conn.execute_with_params("  insert INTO shipments (qty) VALUES (?)", &[40i64.into()])
            .await?;
        assert_eq!(conn.last_insert_id(), Some(1));

        // An insert that writes nothing reports no id
        conn.execute_with_params("INSERT INTO shipments (qty) SELECT qty FROM shipments WHERE 0", &[])
            .await?;
        assert_eq!(conn.last_insert_id(), None);
        Ok(())
    }

    #[tokio::test]
    async fn test_sqlite_close_with_open_transaction() -> Result<()> {
        let mut conn = SqliteConnector::new(":memory:").connect().await?;
        conn.begin_transaction().await?;
        conn.close().await
    }

    #[test]
    fn test_inserts_rows() {
        assert!(inserts_rows("INSERT INTO t VALUES (1)"));
        assert!(inserts_rows("\n    replace into t VALUES (1)"));
        assert!(!inserts_rows("UPDATE t SET a = 1"));
        assert!(!inserts_rows(""));
    }

    #[tokio::test]
    async fn test_sqlite_bad_statement_is_query_class() -> Result<()> {
        let mut conn = SqliteConnector::new(":memory:").connect().await?;
        let err = conn
            .query_with_params("SELECT * FROM missing_table", &[])
            .await
            .unwrap_err();
        assert!(!err.is_connection_class());
        assert!(matches!(err, DatabaseError::SqliteError(_)));
        Ok(())
    }

    #[tokio::test]
    async fn test_sqlite_transaction() -> Result<()> {
        let mut conn = SqliteConnector::new(":memory:").connect().await?;

        conn.execute_with_params("CREATE TABLE test (id INTEGER PRIMARY KEY, name TEXT)", &[])
            .await?;

        // Test commit
        conn.begin_transaction().await?;
        assert!(conn.in_transaction());
        conn.execute_with_params("INSERT INTO test (name) VALUES ('Alice')", &[])
            .await?;
        conn.commit().await?;
        assert!(!conn.in_transaction());

        // Test rollback
        conn.begin_transaction().await?;
        conn.execute_with_params("INSERT INTO test (name) VALUES ('Bob')", &[])
            .await?;
        conn.rollback().await?;
        assert!(!conn.in_transaction());

        let results = conn.query_with_params("SELECT * FROM test", &[]).await?;
        assert_eq!(results.len(), 1); // Still only Alice

        assert!(conn.commit().await.is_err());
        Ok(())
    }
}
