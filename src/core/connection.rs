//! Connection traits and endpoint description
//!
//! A [`Connector`] knows how to open a live [`Connection`] to one endpoint.
//! The connection manager owns at most one such connection at a time; the
//! backends in [`crate::backends`] provide the concrete implementations.

use super::database_types::DatabaseType;
use super::error::{DatabaseError, Result};
use super::value::{DatabaseResult, DatabaseValue};
use async_trait::async_trait;

/// A single open session with the backing store
///
/// Methods take `&mut self`: a session runs one statement at a time and the
/// manager serializes access to it.
#[async_trait]
pub trait Connection: Send {
    /// Get the database type
    fn database_type(&self) -> DatabaseType;

    /// Lightweight round trip used to establish liveness
    async fn ping(&mut self) -> Result<()>;

    /// Run a statement with bound parameters and collect every row
    ///
    /// Parameters are always bound by the driver, never spliced into the SQL.
    async fn query_with_params(
        &mut self,
        query: &str,
        params: &[DatabaseValue],
    ) -> Result<DatabaseResult>;

    /// Run a statement with bound parameters and return the affected row count
    async fn execute_with_params(&mut self, query: &str, params: &[DatabaseValue]) -> Result<u64>;

    /// Id generated by the most recent insert on this session, if any
    fn last_insert_id(&self) -> Option<u64>;

    /// Begin a transaction
    async fn begin_transaction(&mut self) -> Result<()>;

    /// Commit the current transaction
    async fn commit(&mut self) -> Result<()>;

    /// Rollback the current transaction
    async fn rollback(&mut self) -> Result<()>;

    /// Check if currently in a transaction
    fn in_transaction(&self) -> bool;

    /// Close the session. Consumes the connection so it cannot be reused.
    async fn close(self: Box<Self>) -> Result<()>;
}

/// Opens connections to a configured endpoint
#[async_trait]
pub trait Connector: Send + Sync {
    /// Get the database type
    fn database_type(&self) -> DatabaseType;

    /// Printable endpoint description. Never contains credentials.
    fn endpoint(&self) -> String;

    /// Open a fresh connection
    async fn connect(&self) -> Result<Box<dyn Connection>>;
}

/// Where and how to connect
#[derive(Clone, PartialEq, Eq)]
pub struct EndpointConfig {
    pub db_type: DatabaseType,
    pub host: String,
    pub port: u16,
    pub database: String,
    pub username: String,
    pub password: Option<String>,
    /// File path for SQLite; `:memory:` when unset
    pub path: Option<String>,
}

impl EndpointConfig {
    /// Create an endpoint description with MySQL-style defaults
    pub fn new(db_type: DatabaseType) -> Self {
        Self {
            db_type,
            host: "localhost".to_string(),
            port: 3306,
            database: "smart_supply_chain".to_string(),
            username: "root".to_string(),
            password: None,
            path: None,
        }
    }

    /// Shorthand for a SQLite file endpoint
    pub fn sqlite(path: impl Into<String>) -> Self {
        Self::new(DatabaseType::Sqlite).path(path)
    }

    /// Set the database host
    pub fn host<S: Into<String>>(mut self, host: S) -> Self {
        self.host = host.into();
        self
    }

    /// Set the database port
    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set the database name
    pub fn database<S: Into<String>>(mut self, database: S) -> Self {
        self.database = database.into();
        self
    }

    /// Set the username
    pub fn username<S: Into<String>>(mut self, username: S) -> Self {
        self.username = username.into();
        self
    }

    /// Set the password
    pub fn password<S: Into<String>>(mut self, password: S) -> Self {
        self.password = Some(password.into());
        self
    }

    /// Set the SQLite file path
    pub fn path<S: Into<String>>(mut self, path: S) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Check that the description is usable for its backend
    pub fn validate(&self) -> Result<()> {
        match self.db_type {
            DatabaseType::Mysql => {
                if self.host.trim().is_empty() {
                    return Err(DatabaseError::configuration("database host is empty"));
                }
                if self.port == 0 {
                    return Err(DatabaseError::configuration("database port must be non-zero"));
                }
                if self.database.trim().is_empty() {
                    return Err(DatabaseError::configuration("database name is empty"));
                }
                if self.username.trim().is_empty() {
                    return Err(DatabaseError::configuration("database user is empty"));
                }
                if self.password.is_none() {
                    return Err(DatabaseError::configuration(
                        "database password is not set",
                    ));
                }
                Ok(())
            }
            DatabaseType::Sqlite => Ok(()),
        }
    }

    /// Endpoint as shown in logs and errors, without the password
    pub fn describe(&self) -> String {
        match self.db_type {
            DatabaseType::Sqlite => format!(
                "sqlite://{}",
                self.path.as_deref().unwrap_or(":memory:")
            ),
            DatabaseType::Mysql => format!(
                "mysql://{}@{}:{}/{}",
                self.username, self.host, self.port, self.database
            ),
        }
    }
}

impl std::fmt::Debug for EndpointConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EndpointConfig")
            .field("db_type", &self.db_type)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("path", &self.path)
            .finish()
    }
}

/// Connector used when the endpoint configuration could not be loaded
///
/// Every connect attempt fails with a configuration error, which keeps the
/// server reachable while reporting why the database is unusable.
pub struct UnavailableConnector {
    db_type: DatabaseType,
    reason: String,
}

impl UnavailableConnector {
    pub fn new(db_type: DatabaseType, reason: impl Into<String>) -> Self {
        Self {
            db_type,
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl Connector for UnavailableConnector {
    fn database_type(&self) -> DatabaseType {
        self.db_type
    }

    fn endpoint(&self) -> String {
        format!("{}://<unconfigured>", self.db_type)
    }

    async fn connect(&self) -> Result<Box<dyn Connection>> {
        Err(DatabaseError::configuration(self.reason.clone()))
    }
}
