//! Database backend implementations
//!
//! This module contains concrete implementations of the [`Connector`] and
//! [`Connection`](crate::core::connection::Connection) traits.

use crate::core::{
    connection::Connector, connection::EndpointConfig, database_types::DatabaseType,
    error::DatabaseError, error::Result,
};
use std::sync::Arc;

#[cfg(feature = "mysql")]
pub mod mysql;
#[cfg(feature = "sqlite")]
pub mod sqlite;

#[cfg(feature = "mysql")]
pub use mysql::{MysqlConnection, MysqlConnector};
#[cfg(feature = "sqlite")]
pub use sqlite::{SqliteConnection, SqliteConnector};

/// Build the connector for an endpoint
///
/// # Errors
///
/// Returns a configuration error when the endpoint is incomplete or its
/// backend was not compiled in
pub fn connector_for(endpoint: &EndpointConfig) -> Result<Arc<dyn Connector>> {
    endpoint.validate()?;

    match endpoint.db_type {
        #[cfg(feature = "mysql")]
        DatabaseType::Mysql => Ok(Arc::new(MysqlConnector::new(endpoint.clone())?)),
        #[cfg(feature = "sqlite")]
        DatabaseType::Sqlite => Ok(Arc::new(SqliteConnector::from_endpoint(endpoint))),
        #[allow(unreachable_patterns)]
        other => Err(DatabaseError::configuration(format!(
            "{} support is not compiled in",
            other
        ))),
    }
}
