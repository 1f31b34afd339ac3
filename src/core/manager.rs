//! Connection manager owning the single shared database handle
//!
//! The manager opens the handle lazily, probes it before every reuse and
//! replaces it when the probe fails. Acquisition, probing and replacement all
//! happen under one async mutex, so concurrent callers that find a dead
//! handle produce exactly one replacement between them.

use super::connection::{Connection, Connector};
use super::database_types::DatabaseType;
use super::error::{DatabaseError, Result};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, MutexGuard};

/// Upper bound on closing a discarded connection
const CLOSE_TIMEOUT: Duration = Duration::from_secs(2);

/// Exclusive access to the connection inside a [`Handle`]
pub struct HandleGuard<'a> {
    handle_id: u64,
    slot: MutexGuard<'a, Option<Box<dyn Connection>>>,
}

impl HandleGuard<'_> {
    /// The locked connection
    ///
    /// # Errors
    ///
    /// Returns a connection error if the handle was closed while locked
    pub fn connection(&mut self) -> Result<&mut (dyn Connection + 'static)> {
        let handle_id = self.handle_id;
        self.slot
            .as_deref_mut()
            .ok_or_else(|| closed_error(handle_id))
    }
}

fn closed_error(handle_id: u64) -> DatabaseError {
    DatabaseError::connection(format!("connection handle #{handle_id} is closed"))
}

/// Timeouts and probe budget for the connection manager
#[derive(Debug, Clone)]
pub struct ConnectionPolicy {
    /// Upper bound on opening a new connection
    pub connect_timeout: Duration,
    /// Upper bound on a single liveness round trip, and on waiting for a
    /// handle another caller is using
    pub probe_timeout: Duration,
    /// Probe attempts before a handle is declared dead
    pub probe_attempts: u32,
    /// Pause between probe attempts
    pub probe_delay: Duration,
}

impl Default for ConnectionPolicy {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            probe_timeout: Duration::from_secs(2),
            probe_attempts: 3,
            probe_delay: Duration::from_secs(1),
        }
    }
}

impl ConnectionPolicy {
    /// Set connection open timeout
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the timeout of one liveness round trip
    pub fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }

    /// Set probe attempts (at least one attempt is always made)
    pub fn with_probe_attempts(mut self, attempts: u32) -> Self {
        self.probe_attempts = attempts.max(1);
        self
    }

    /// Set the pause between probe attempts
    pub fn with_probe_delay(mut self, delay: Duration) -> Self {
        self.probe_delay = delay;
        self
    }
}

/// The shared connection handle
///
/// Once closed, a handle stays closed: its connection has been consumed and
/// [`Handle::lock`] fails, so a stale handle can never run another statement.
pub struct Handle {
    id: u64,
    alive: AtomicBool,
    closed: AtomicBool,
    conn: Mutex<Option<Box<dyn Connection>>>,
}

impl Handle {
    fn new(id: u64, conn: Box<dyn Connection>) -> Self {
        Self {
            id,
            alive: AtomicBool::new(true),
            closed: AtomicBool::new(false),
            conn: Mutex::new(Some(conn)),
        }
    }

    /// Process-unique id; a replacement handle always has a new id
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Result of the most recent probe, false once closed
    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire) && !self.is_closed()
    }

    /// True once the handle has been torn down or replaced
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Lock the connection for exclusive use, waiting at most `wait`
    ///
    /// # Errors
    ///
    /// Returns a connection error if the handle has been closed, or a
    /// connection timeout if another caller holds the connection for longer
    /// than `wait`
    pub async fn lock(&self, wait: Duration) -> Result<HandleGuard<'_>> {
        if self.is_closed() {
            return Err(closed_error(self.id));
        }
        let slot = tokio::time::timeout(wait, self.conn.lock())
            .await
            .map_err(|_| DatabaseError::connection_timeout(wait.as_millis() as u64))?;
        if self.is_closed() || slot.is_none() {
            return Err(closed_error(self.id));
        }
        Ok(HandleGuard {
            handle_id: self.id,
            slot,
        })
    }

    /// Probe liveness with up to `attempts` round trips
    ///
    /// The first successful round trip marks the handle alive. Waiting for the
    /// connection and each attempt are bounded by `timeout`; attempts are
    /// separated by `delay`.
    pub async fn probe(&self, attempts: u32, delay: Duration, timeout: Duration) -> Result<()> {
        let result = match self.lock(timeout).await {
            Ok(mut guard) => match guard.connection() {
                Ok(conn) => probe_connection(conn, attempts, delay, timeout).await,
                Err(e) => Err(e),
            },
            Err(e) => Err(e),
        };
        self.alive.store(result.is_ok(), Ordering::Release);
        result
    }

    /// Close the connection, swallowing close errors. Idempotent.
    ///
    /// A connection still locked by a running statement is only marked
    /// closed here; the executor closes it again once the statement returns.
    async fn close(&self) {
        self.alive.store(false, Ordering::Release);
        self.closed.store(true, Ordering::Release);
        let conn = match self.conn.try_lock() {
            Ok(mut slot) => slot.take(),
            Err(_) => {
                tracing::debug!(handle_id = self.id, "connection busy, deferring close");
                return;
            }
        };
        if let Some(conn) = conn {
            match tokio::time::timeout(CLOSE_TIMEOUT, conn.close()).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    tracing::debug!(handle_id = self.id, error = %e, "error while closing stale connection");
                }
                Err(_) => tracing::debug!(handle_id = self.id, "timed out closing stale connection"),
            }
        }
    }
}

/// Probe a locked connection with up to `attempts` round trips
pub(crate) async fn probe_connection(
    conn: &mut dyn Connection,
    attempts: u32,
    delay: Duration,
    timeout: Duration,
) -> Result<()> {
    let attempts = attempts.max(1);
    let mut last_error = None;

    for attempt in 1..=attempts {
        let error = match tokio::time::timeout(timeout, conn.ping()).await {
            Ok(Ok(())) => return Ok(()),
            Ok(Err(e)) => e,
            Err(_) => DatabaseError::connection_timeout(timeout.as_millis() as u64),
        };
        tracing::debug!(attempt, attempts, error = %error, "liveness probe failed");
        last_error = Some(error);

        if attempt < attempts {
            tokio::time::sleep(delay).await;
        }
    }

    Err(last_error.unwrap_or_else(|| DatabaseError::connection("liveness probe failed")))
}

/// Counters describing the manager's handle lifecycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionStats {
    /// Handles opened since the manager was created
    pub opened: u64,
    /// Handles discarded after failing a probe or a statement
    pub replaced: u64,
    /// Id of the handle currently held, if any
    pub current_handle: Option<u64>,
}

/// Owner of the process-wide database handle
pub struct ConnectionManager {
    connector: Arc<dyn Connector>,
    policy: ConnectionPolicy,
    slot: Mutex<Option<Arc<Handle>>>,
    next_id: AtomicU64,
    opened: AtomicU64,
    replaced: AtomicU64,
}

impl ConnectionManager {
    /// Create a manager with the default policy. No connection is opened yet.
    pub fn new(connector: Arc<dyn Connector>) -> Self {
        Self::with_policy(connector, ConnectionPolicy::default())
    }

    /// Create a manager with a custom policy
    pub fn with_policy(connector: Arc<dyn Connector>, policy: ConnectionPolicy) -> Self {
        Self {
            connector,
            policy,
            slot: Mutex::new(None),
            next_id: AtomicU64::new(0),
            opened: AtomicU64::new(0),
            replaced: AtomicU64::new(0),
        }
    }

    /// Policy in effect
    pub fn policy(&self) -> &ConnectionPolicy {
        &self.policy
    }

    /// Endpoint description of the underlying connector
    pub fn endpoint(&self) -> String {
        self.connector.endpoint()
    }

    /// Backend the connector talks to
    pub fn database_type(&self) -> DatabaseType {
        self.connector.database_type()
    }

    /// Get a live handle, opening or replacing the shared one as needed
    ///
    /// # Errors
    ///
    /// Returns a connection-class error if no live handle could be opened
    /// within the connect timeout, or a configuration error when the
    /// connector is unconfigured. The shared slot is left empty on failure.
    pub async fn acquire(&self) -> Result<Arc<Handle>> {
        let mut slot = self.slot.lock().await;

        if let Some(handle) = slot.as_ref() {
            let probe = handle
                .probe(
                    self.policy.probe_attempts,
                    self.policy.probe_delay,
                    self.policy.probe_timeout,
                )
                .await;

            match probe {
                Ok(()) => return Ok(Arc::clone(handle)),
                Err(e) => {
                    tracing::warn!(
                        handle_id = handle.id(),
                        error = %e,
                        "connection failed liveness probe, replacing it"
                    );
                    if let Some(stale) = slot.take() {
                        stale.close().await;
                        self.replaced.fetch_add(1, Ordering::Relaxed);
                    }
                }
            }
        }

        let handle = self.open().await?;
        *slot = Some(Arc::clone(&handle));
        Ok(handle)
    }

    /// Discard `handle` if it is still the shared one, and close it
    ///
    /// A handle that has already been replaced is left alone in the slot, so
    /// a late invalidation never throws away a fresh replacement.
    pub async fn invalidate(&self, handle: &Handle) {
        let removed = {
            let mut slot = self.slot.lock().await;
            match slot.as_ref() {
                Some(current) if current.id() == handle.id() => slot.take(),
                _ => None,
            }
        };

        if removed.is_some() {
            self.replaced.fetch_add(1, Ordering::Relaxed);
            tracing::info!(handle_id = handle.id(), "discarded shared connection");
        }
        handle.close().await;
    }

    /// Open the shared handle eagerly
    pub async fn warm_up(&self) -> Result<()> {
        self.acquire().await.map(|_| ())
    }

    /// Direct liveness check used by the health endpoint
    pub async fn is_connected(&self) -> bool {
        match self.acquire().await {
            Ok(handle) => handle.is_alive(),
            Err(e) => {
                tracing::debug!(error = %e, "health check could not acquire a connection");
                false
            }
        }
    }

    /// Handle currently held, without probing it
    pub async fn current(&self) -> Option<Arc<Handle>> {
        self.slot.lock().await.clone()
    }

    /// Snapshot of the lifecycle counters
    pub async fn stats(&self) -> ConnectionStats {
        let current_handle = self.slot.lock().await.as_ref().map(|h| h.id());
        ConnectionStats {
            opened: self.opened.load(Ordering::Relaxed),
            replaced: self.replaced.load(Ordering::Relaxed),
            current_handle,
        }
    }

    /// Tear down the shared handle
    pub async fn close(&self) {
        let handle = self.slot.lock().await.take();
        if let Some(handle) = handle {
            handle.close().await;
            tracing::info!(handle_id = handle.id(), "database connection closed");
        }
    }

    async fn open(&self) -> Result<Arc<Handle>> {
        let endpoint = self.connector.endpoint();
        tracing::debug!(%endpoint, "opening database connection");

        let connect = tokio::time::timeout(self.policy.connect_timeout, self.connector.connect());
        let conn = match connect.await {
            Ok(Ok(conn)) => conn,
            Ok(Err(e)) => {
                tracing::error!(%endpoint, error = %e, "failed to open database connection");
                return Err(e);
            }
            Err(_) => {
                let timeout_ms = self.policy.connect_timeout.as_millis() as u64;
                tracing::error!(%endpoint, timeout_ms, "timed out opening database connection");
                return Err(DatabaseError::connection_timeout(timeout_ms));
            }
        };

        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        self.opened.fetch_add(1, Ordering::Relaxed);
        tracing::info!(handle_id = id, %endpoint, "database connection established");

        Ok(Arc::new(Handle::new(id, conn)))
    }
}
