//! Shared fixtures for integration tests
//!
//! [`FlakyConnector`] wraps a SQLite connector on a temporary file and fails
//! connects, pings or statements on demand, so the retry and replacement
//! paths can be driven deterministically.

#![allow(dead_code)]

use async_trait::async_trait;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use supply_chain_risk::backends::sqlite::SqliteConnector;
use supply_chain_risk::core::{
    Connection, ConnectionManager, ConnectionPolicy, Connector, DatabaseError, DatabaseResult,
    DatabaseType, DatabaseValue, QueryExecutor, Result, RetryPolicy,
};
use tempfile::TempDir;

/// Tables used by the API, without supplier_metrics or the views
pub const SCHEMA: &[&str] = &[
    "CREATE TABLE suppliers (
        supplier_id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        contact_email TEXT,
        phone TEXT,
        rating REAL DEFAULT 0
    )",
    "CREATE TABLE warehouses (
        warehouse_id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        location TEXT
    )",
    "CREATE TABLE products (
        product_id INTEGER PRIMARY KEY AUTOINCREMENT,
        supplier_id INTEGER NOT NULL REFERENCES suppliers (supplier_id),
        name TEXT NOT NULL,
        sku TEXT,
        category TEXT,
        unit_cost REAL DEFAULT 0,
        lead_time_days INTEGER DEFAULT 0
    )",
    "CREATE TABLE shipments (
        shipment_id INTEGER PRIMARY KEY AUTOINCREMENT,
        supplier_id INTEGER NOT NULL,
        product_id INTEGER NOT NULL,
        warehouse_id INTEGER NOT NULL,
        quantity INTEGER,
        ship_date TEXT,
        expected_arrival_date TEXT,
        actual_arrival_date TEXT,
        status TEXT DEFAULT 'CREATED'
    )",
    "CREATE TABLE shipment_events (
        event_id INTEGER PRIMARY KEY AUTOINCREMENT,
        shipment_id INTEGER NOT NULL,
        event_time TEXT,
        event_type TEXT,
        details TEXT
    )",
    "CREATE TABLE inventory (
        inventory_id INTEGER PRIMARY KEY AUTOINCREMENT,
        product_id INTEGER NOT NULL,
        warehouse_id INTEGER NOT NULL,
        quantity INTEGER NOT NULL DEFAULT 0,
        reorder_threshold INTEGER DEFAULT 0,
        safety_stock INTEGER DEFAULT 0,
        last_updated TEXT DEFAULT CURRENT_TIMESTAMP,
        UNIQUE (product_id, warehouse_id)
    )",
    "CREATE TABLE alerts (
        alert_id INTEGER PRIMARY KEY AUTOINCREMENT,
        created_at TEXT,
        alert_type TEXT,
        severity TEXT,
        entity_type TEXT,
        entity_id INTEGER,
        message TEXT,
        resolved INTEGER NOT NULL DEFAULT 0,
        resolved_at TEXT
    )",
];

/// Fault budget shared by a connector and every connection it opens
#[derive(Default)]
pub struct Faults {
    connect_failures: AtomicU32,
    ping_passes: AtomicU32,
    ping_failures: AtomicU32,
    statement_failures: AtomicU32,
    statement_hangs: AtomicU32,
    rollback_failures: AtomicU32,
    connects: AtomicU32,
    statements: AtomicU32,
}

fn take(counter: &AtomicU32) -> bool {
    counter
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
}

impl Faults {
    /// Fail the next `n` connection attempts
    pub fn fail_connects(&self, n: u32) {
        self.connect_failures.store(n, Ordering::SeqCst);
    }

    /// Let `passes` pings through, then fail the following `failures` pings
    pub fn fail_pings_after(&self, passes: u32, failures: u32) {
        self.ping_passes.store(passes, Ordering::SeqCst);
        self.ping_failures.store(failures, Ordering::SeqCst);
    }

    /// Fail the next `n` pings
    pub fn fail_pings(&self, n: u32) {
        self.fail_pings_after(0, n);
    }

    /// Drop the connection on the next `n` statements
    pub fn fail_statements(&self, n: u32) {
        self.statement_failures.store(n, Ordering::SeqCst);
    }

    /// Never answer the next `n` statements
    pub fn hang_statements(&self, n: u32) {
        self.statement_hangs.store(n, Ordering::SeqCst);
    }

    /// Fail the next `n` rollbacks without rolling back
    pub fn fail_rollbacks(&self, n: u32) {
        self.rollback_failures.store(n, Ordering::SeqCst);
    }

    /// Connection attempts made so far, failed or not
    pub fn connects(&self) -> u32 {
        self.connects.load(Ordering::SeqCst)
    }

    /// Statements sent so far, failed or not
    pub fn statements(&self) -> u32 {
        self.statements.load(Ordering::SeqCst)
    }

    fn ping_should_fail(&self) -> bool {
        if take(&self.ping_passes) {
            return false;
        }
        take(&self.ping_failures)
    }
}

pub struct FlakyConnector {
    inner: SqliteConnector,
    faults: Arc<Faults>,
}

#[async_trait]
impl Connector for FlakyConnector {
    fn database_type(&self) -> DatabaseType {
        DatabaseType::Sqlite
    }

    fn endpoint(&self) -> String {
        self.inner.endpoint()
    }

    async fn connect(&self) -> Result<Box<dyn Connection>> {
        self.faults.connects.fetch_add(1, Ordering::SeqCst);
        if take(&self.faults.connect_failures) {
            return Err(DatabaseError::connection_failed(
                self.endpoint(),
                "Can't connect to server (injected)",
            ));
        }
        let inner = self.inner.connect().await?;
        Ok(Box::new(FlakyConnection {
            inner,
            faults: Arc::clone(&self.faults),
        }))
    }
}

struct FlakyConnection {
    inner: Box<dyn Connection>,
    faults: Arc<Faults>,
}

impl Faults {
    async fn statement(&self) -> Result<()> {
        self.statements.fetch_add(1, Ordering::SeqCst);
        if take(&self.statement_hangs) {
            std::future::pending::<()>().await;
        }
        if take(&self.statement_failures) {
            return Err(DatabaseError::connection_lost(
                Some(2013),
                "Lost connection to server during query (injected)",
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl Connection for FlakyConnection {
    fn database_type(&self) -> DatabaseType {
        self.inner.database_type()
    }

    async fn ping(&mut self) -> Result<()> {
        if self.faults.ping_should_fail() {
            return Err(DatabaseError::connection_lost(Some(2006), "server has gone away (injected)"));
        }
        self.inner.ping().await
    }

    async fn query_with_params(
        &mut self,
        query: &str,
        params: &[DatabaseValue],
    ) -> Result<DatabaseResult> {
        self.faults.statement().await?;
        self.inner.query_with_params(query, params).await
    }

    async fn execute_with_params(&mut self, query: &str, params: &[DatabaseValue]) -> Result<u64> {
        self.faults.statement().await?;
        self.inner.execute_with_params(query, params).await
    }

    fn last_insert_id(&self) -> Option<u64> {
        self.inner.last_insert_id()
    }

    async fn begin_transaction(&mut self) -> Result<()> {
        self.inner.begin_transaction().await
    }

    async fn commit(&mut self) -> Result<()> {
        self.inner.commit().await
    }

    async fn rollback(&mut self) -> Result<()> {
        if take(&self.faults.rollback_failures) {
            return Err(DatabaseError::transaction("rollback refused (injected)"));
        }
        self.inner.rollback().await
    }

    fn in_transaction(&self) -> bool {
        self.inner.in_transaction()
    }

    async fn close(self: Box<Self>) -> Result<()> {
        self.inner.close().await
    }
}

/// A SQLite file in a temporary directory plus its fault switches
pub struct TestDb {
    _dir: TempDir,
    pub path: String,
    pub faults: Arc<Faults>,
}

impl TestDb {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("create temp dir");
        let path = dir.path().join("supply_chain.db").display().to_string();
        Self {
            _dir: dir,
            path,
            faults: Arc::new(Faults::default()),
        }
    }

    pub fn connector(&self) -> Arc<FlakyConnector> {
        Arc::new(FlakyConnector {
            inner: SqliteConnector::new(self.path.clone()),
            faults: Arc::clone(&self.faults),
        })
    }

    /// Manager with one probe attempt and no probe delay
    pub fn manager(&self) -> Arc<ConnectionManager> {
        Arc::new(ConnectionManager::with_policy(
            self.connector(),
            fast_connection_policy(),
        ))
    }

    /// Executor with the default retry budget and a short backoff
    pub fn executor(&self) -> QueryExecutor {
        QueryExecutor::with_policy(self.manager(), fast_retry_policy())
    }

    /// Executor over a fresh manager with the API schema created
    pub async fn executor_with_schema(&self) -> QueryExecutor {
        let executor = self.executor();
        create_schema(&executor).await;
        executor
    }
}

pub fn fast_connection_policy() -> ConnectionPolicy {
    ConnectionPolicy::default()
        .with_probe_attempts(1)
        .with_probe_delay(Duration::ZERO)
        .with_connect_timeout(Duration::from_secs(5))
}

pub fn fast_retry_policy() -> RetryPolicy {
    RetryPolicy::default().with_backoff(Duration::from_millis(10))
}

pub async fn create_schema(executor: &QueryExecutor) {
    for statement in SCHEMA {
        executor
            .execute_write(statement, &[])
            .await
            .expect("create schema");
    }
}

pub async fn insert_supplier(executor: &QueryExecutor, name: &str, email: &str) -> u64 {
    executor
        .execute_write(
            "INSERT INTO suppliers (name, contact_email, phone, rating) VALUES (?, ?, ?, ?)",
            &[name.into(), email.into(), "555-0100".into(), 4.5.into()],
        )
        .await
        .expect("insert supplier")
        .last_insert_id
        .expect("supplier id")
}
