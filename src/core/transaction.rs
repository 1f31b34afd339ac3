//! Transaction scope for a single statement execution
//!
//! A [`TransactionScope`] borrows a connection for the duration of one
//! transaction. It must be resolved with [`TransactionScope::commit`],
//! [`TransactionScope::rollback`] or [`TransactionScope::rollback_quietly`];
//! dropping it unresolved is logged, since rollback cannot run in `Drop`.

use super::connection::Connection;
use super::error::{DatabaseError, Result};
use super::value::DatabaseValue;

/// An open transaction on a borrowed connection
///
/// # Example
///
/// ```ignore
/// let mut tx = TransactionScope::begin(&mut *conn).await?;
/// match tx.execute_with_params("INSERT INTO warehouses (name) VALUES (?)", &params).await {
///     Ok(_) => tx.commit().await?,
///     Err(e) => {
///         tx.rollback_quietly().await;
///         return Err(e);
///     }
/// }
/// ```
pub struct TransactionScope<'a> {
    conn: &'a mut dyn Connection,
    resolved: bool,
}

impl<'a> TransactionScope<'a> {
    /// Begin a new transaction
    ///
    /// # Errors
    ///
    /// Returns an error if the connection is already in a transaction or the
    /// `BEGIN` round trip fails
    pub async fn begin(conn: &'a mut dyn Connection) -> Result<Self> {
        if conn.in_transaction() {
            return Err(DatabaseError::transaction("Already in a transaction"));
        }
        conn.begin_transaction().await?;

        Ok(Self {
            conn,
            resolved: false,
        })
    }

    /// Execute a parameterized statement within the transaction
    pub async fn execute_with_params(&mut self, query: &str, params: &[DatabaseValue]) -> Result<u64> {
        self.conn.execute_with_params(query, params).await
    }

    /// Id generated by the last insert in this transaction
    pub fn last_insert_id(&self) -> Option<u64> {
        self.conn.last_insert_id()
    }

    /// Commit the transaction
    ///
    /// If the commit itself fails the transaction is rolled back best-effort
    /// and the commit error is returned.
    pub async fn commit(mut self) -> Result<()> {
        self.resolved = true;
        if let Err(e) = self.conn.commit().await {
            if let Err(rollback_err) = self.conn.rollback().await {
                tracing::warn!(error = %rollback_err, "rollback after failed commit also failed");
            }
            return Err(e);
        }
        Ok(())
    }

    /// Explicitly rollback the transaction
    pub async fn rollback(mut self) -> Result<()> {
        self.resolved = true;
        self.conn.rollback().await
    }

    /// Rollback and swallow any rollback failure
    ///
    /// Used on error paths so that a failing rollback never replaces the
    /// error that caused it.
    pub async fn rollback_quietly(self) {
        if let Err(e) = self.rollback().await {
            tracing::warn!(error = %e, "transaction rollback failed");
        }
    }
}

impl Drop for TransactionScope<'_> {
    fn drop(&mut self) {
        if !self.resolved {
            tracing::warn!(
                "transaction scope dropped without commit or rollback; \
                 the server will discard it when the session ends"
            );
        }
    }
}
