//! # Supply Chain Risk
//!
//! A CRUD API over supply-chain entities (suppliers, products, shipments,
//! inventory, alerts, warehouses) whose interesting part is the query layer
//! underneath it: a single shared database connection that is probed before
//! reuse, replaced when it dies, and driven by an executor with bounded retry.
//!
//! ## Features
//!
//! - **One shared handle**: lazily opened, probed on every acquisition,
//!   replaced exactly once when concurrent callers find it dead
//! - **Bounded retry**: connection-class failures are retried with a fixed
//!   backoff, statement errors are returned immediately
//! - **Transactions per call**: writes commit on success and roll back on
//!   every failure path
//! - **Backends**: MySQL (`mysql_async`) in production, SQLite (`rusqlite`)
//!   for local development and tests
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use supply_chain_risk::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let connector = Arc::new(SqliteConnector::new("supply_chain.db"));
//!     let manager = Arc::new(ConnectionManager::new(connector));
//!     let executor = QueryExecutor::new(manager);
//!
//!     executor
//!         .execute_write("INSERT INTO warehouses (name, location) VALUES (?, ?)", &[
//!             "Central".into(),
//!             "Karachi".into(),
//!         ])
//!         .await?;
//!
//!     for row in executor.fetch_all("SELECT * FROM warehouses", &[]).await? {
//!         if let Some(name) = row.get("name") {
//!             println!("Warehouse: {}", name.as_string());
//!         }
//!     }
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Project Structure
//!
//! ```text
//! src/
//! ├── core/          # Query layer: errors, values, manager, executor
//! ├── backends/      # MySQL and SQLite connectors
//! ├── server/        # axum routes and the response envelope
//! ├── config.rs      # Environment configuration
//! ├── lib.rs
//! └── main.rs        # scri-server binary
//! ```

pub mod backends;
pub mod config;
pub mod core;
pub mod server;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::core::{
        Connection, ConnectionManager, ConnectionPolicy, Connector, DatabaseError,
        DatabaseResult, DatabaseRow, DatabaseType, DatabaseValue, EndpointConfig, ErrorKind,
        QueryExecutor, QueryMode, QueryOutcome, Result, RetryPolicy, WriteSummary,
    };

    #[cfg(feature = "mysql")]
    pub use crate::backends::MysqlConnector;
    #[cfg(feature = "sqlite")]
    pub use crate::backends::SqliteConnector;
}

// Re-export at root level for convenience
pub use crate::core::{
    ConnectionManager, DatabaseError, DatabaseResult, DatabaseRow, DatabaseType, DatabaseValue,
    QueryExecutor, Result,
};
