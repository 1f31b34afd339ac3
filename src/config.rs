//! Environment configuration
//!
//! Settings are read once at startup. Every loader takes a lookup function
//! rather than reading the process environment directly, so tests can feed
//! a map instead of mutating global state.

use std::str::FromStr;
use std::time::Duration;

use crate::core::{
    ConnectionPolicy, DatabaseError, DatabaseType, EndpointConfig, Result, RetryPolicy,
};

/// Read a variable from the process environment, treating empty as unset
pub fn env_var(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse<T, F>(lookup: &F, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| DatabaseError::configuration(format!("{key}={raw:?} is invalid: {e}"))),
    }
}

/// Backend selected by `DB_BACKEND`, defaulting to MySQL
pub fn database_type<F>(lookup: &F) -> Result<DatabaseType>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup("DB_BACKEND") {
        None => Ok(DatabaseType::default()),
        Some(raw) => raw.parse().map_err(DatabaseError::configuration),
    }
}

/// Database endpoint from `DB_*` variables
///
/// # Errors
///
/// Returns a configuration error for unparsable values and for a MySQL
/// endpoint without `DB_PASSWORD`
pub fn endpoint<F>(lookup: &F) -> Result<EndpointConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let db_type = database_type(lookup)?;
    let defaults = EndpointConfig::new(db_type);

    let mut endpoint = EndpointConfig {
        db_type,
        host: lookup("DB_HOST").unwrap_or(defaults.host),
        port: parse(lookup, "DB_PORT", defaults.port)?,
        database: lookup("DB_NAME").unwrap_or(defaults.database),
        username: lookup("DB_USER").unwrap_or(defaults.username),
        password: lookup("DB_PASSWORD"),
        path: None,
    };
    if db_type == DatabaseType::Sqlite {
        endpoint.path = Some(lookup("DB_PATH").unwrap_or_else(|| "supply_chain.db".to_string()));
    }

    endpoint.validate()?;
    Ok(endpoint)
}

/// Connection manager timeouts and probe budget
pub fn connection_policy<F>(lookup: &F) -> Result<ConnectionPolicy>
where
    F: Fn(&str) -> Option<String>,
{
    let defaults = ConnectionPolicy::default();
    Ok(ConnectionPolicy::default()
        .with_connect_timeout(Duration::from_secs(parse(
            lookup,
            "DB_CONNECT_TIMEOUT_SECS",
            defaults.connect_timeout.as_secs(),
        )?))
        .with_probe_attempts(parse(lookup, "DB_PROBE_ATTEMPTS", defaults.probe_attempts)?)
        .with_probe_delay(Duration::from_millis(parse(
            lookup,
            "DB_PROBE_DELAY_MS",
            defaults.probe_delay.as_millis() as u64,
        )?))
        .with_probe_timeout(probe_timeout(lookup, defaults.probe_timeout)?))
}

/// Executor retry budget
pub fn retry_policy<F>(lookup: &F) -> Result<RetryPolicy>
where
    F: Fn(&str) -> Option<String>,
{
    let defaults = RetryPolicy::default();
    Ok(RetryPolicy::default()
        .with_max_retries(parse(lookup, "DB_MAX_RETRIES", defaults.max_retries)?)
        .with_backoff(Duration::from_millis(parse(
            lookup,
            "DB_RETRY_BACKOFF_MS",
            defaults.backoff.as_millis() as u64,
        )?))
        .with_probe_timeout(probe_timeout(lookup, defaults.probe_timeout)?)
        .with_statement_timeout(statement_timeout(lookup, defaults.statement_timeout)?))
}

fn statement_timeout<F>(lookup: &F, default: Duration) -> Result<Duration>
where
    F: Fn(&str) -> Option<String>,
{
    let secs = parse(lookup, "DB_STATEMENT_TIMEOUT_SECS", default.as_secs())?;
    if secs == 0 {
        return Err(DatabaseError::configuration(
            "DB_STATEMENT_TIMEOUT_SECS must be greater than zero",
        ));
    }
    Ok(Duration::from_secs(secs))
}

fn probe_timeout<F>(lookup: &F, default: Duration) -> Result<Duration>
where
    F: Fn(&str) -> Option<String>,
{
    let millis = parse(lookup, "DB_PROBE_TIMEOUT_MS", default.as_millis() as u64)?;
    if millis == 0 {
        return Err(DatabaseError::configuration(
            "DB_PROBE_TIMEOUT_MS must be greater than zero",
        ));
    }
    Ok(Duration::from_millis(millis))
}
