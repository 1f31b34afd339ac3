//! Error types for the query layer
//!
//! Every failure crossing the core boundary is a [`DatabaseError`]. Callers
//! that need to branch on the failure category use [`DatabaseError::kind`].

/// Result type alias for database operations
pub type Result<T> = std::result::Result<T, DatabaseError>;

/// Broad failure category surfaced to callers of the core
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Endpoint unreachable, handle lost or timed out. Worth retrying.
    Connection,
    /// The statement itself was rejected. Never retried.
    Query,
    /// Endpoint settings are missing or invalid.
    Configuration,
}

/// Error types for database operations
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    /// Opening a connection failed
    #[error("Connection failed to {endpoint} - {message}")]
    ConnectionFailed {
        endpoint: String,
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// An established connection dropped or the server went away
    #[error("Connection lost{}: {message}", .code.map_or_else(String::new, |c| format!(" ({c})")))]
    ConnectionLost { code: Option<u16>, message: String },

    /// Connection error (generic)
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// Connection timeout
    #[error("Connection timeout after {timeout_ms}ms")]
    ConnectionTimeout { timeout_ms: u64 },

    /// Query execution error
    #[error("Query execution error: {0}")]
    QueryError(String),

    /// Query timeout
    #[error("Query timeout after {timeout_ms}ms")]
    QueryTimeout { timeout_ms: u64 },

    /// Missing or invalid endpoint settings
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Transaction error
    #[error("Transaction error: {0}")]
    TransactionError(String),

    /// SQLite error that is not connection-related
    #[cfg(feature = "sqlite")]
    #[error("SQLite error: {0}")]
    SqliteError(#[from] rusqlite::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl DatabaseError {
    /// Create a connection failed error for an endpoint
    pub fn connection_failed(endpoint: impl Into<String>, message: impl Into<String>) -> Self {
        DatabaseError::ConnectionFailed {
            endpoint: endpoint.into(),
            message: message.into(),
            source: None,
        }
    }

    /// Create a connection failed error with source error
    pub fn connection_failed_with_source(
        endpoint: impl Into<String>,
        message: impl Into<String>,
        source: Box<dyn std::error::Error + Send + Sync>,
    ) -> Self {
        DatabaseError::ConnectionFailed {
            endpoint: endpoint.into(),
            message: message.into(),
            source: Some(source),
        }
    }

    /// Create a connection lost error, optionally carrying the driver code
    pub fn connection_lost(code: Option<u16>, message: impl Into<String>) -> Self {
        DatabaseError::ConnectionLost {
            code,
            message: message.into(),
        }
    }

    /// Create a new connection error (generic)
    pub fn connection<S: Into<String>>(msg: S) -> Self {
        DatabaseError::ConnectionError(msg.into())
    }

    /// Create a connection timeout error
    pub fn connection_timeout(timeout_ms: u64) -> Self {
        DatabaseError::ConnectionTimeout { timeout_ms }
    }

    /// Create a new query error
    pub fn query<S: Into<String>>(msg: S) -> Self {
        DatabaseError::QueryError(msg.into())
    }

    /// Create a query timeout error
    pub fn query_timeout(timeout_ms: u64) -> Self {
        DatabaseError::QueryTimeout { timeout_ms }
    }

    /// Create a configuration error
    pub fn configuration<S: Into<String>>(msg: S) -> Self {
        DatabaseError::Configuration(msg.into())
    }

    /// Create a new transaction error
    pub fn transaction<S: Into<String>>(msg: S) -> Self {
        DatabaseError::TransactionError(msg.into())
    }

    /// Create a generic error
    pub fn other<S: Into<String>>(msg: S) -> Self {
        DatabaseError::Other(msg.into())
    }

    /// Classify this error for the retry policy.
    ///
    /// Backends translate driver errors into the connection variants at the
    /// point where they still have the driver's error code, so this is a
    /// match over variants rather than over message text.
    pub fn kind(&self) -> ErrorKind {
        match self {
            DatabaseError::ConnectionFailed { .. }
            | DatabaseError::ConnectionLost { .. }
            | DatabaseError::ConnectionError(_)
            | DatabaseError::ConnectionTimeout { .. }
            | DatabaseError::QueryTimeout { .. } => ErrorKind::Connection,
            DatabaseError::Configuration(_) => ErrorKind::Configuration,
            _ => ErrorKind::Query,
        }
    }

    /// True for failures caused by losing the session rather than the statement
    pub fn is_connection_class(&self) -> bool {
        self.kind() == ErrorKind::Connection
    }
}
