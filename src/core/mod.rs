//! Core query layer types and traits
//!
//! This module provides the fundamental building blocks of the query layer:
//! error types, value types, the connection traits, the connection manager
//! and the retrying query executor.

pub mod connection;
pub mod database_types;
pub mod error;
pub mod executor;
pub mod manager;
pub mod transaction;
pub mod value;

// Re-export commonly used types
pub use connection::{Connection, Connector, EndpointConfig, UnavailableConnector};
pub use database_types::DatabaseType;
pub use error::{DatabaseError, ErrorKind, Result};
pub use executor::{QueryExecutor, QueryMode, QueryOutcome, RetryPolicy, WriteSummary};
pub use manager::{ConnectionManager, ConnectionPolicy, ConnectionStats, Handle, HandleGuard};
pub use transaction::TransactionScope;
pub use value::{DatabaseResult, DatabaseRow, DatabaseValue};
