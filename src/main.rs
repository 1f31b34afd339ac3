//! scri-server: Supply Chain Risk Intelligence API
//!
//! Usage:
//!   scri-server                        # listen on 0.0.0.0:5000
//!   scri-server --port 8080 --debug    # debug logging
//!   RUST_LOG=supply_chain_risk=debug scri-server
//!
//! The database endpoint comes from `DB_*` environment variables (or `.env`).
//! A missing or invalid endpoint does not stop the server: it starts in a
//! degraded state where every database-backed route answers 500.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use anyhow::{anyhow, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use supply_chain_risk::backends::connector_for;
use supply_chain_risk::config::{self, env_var};
use supply_chain_risk::core::{
    ConnectionManager, Connector, DatabaseType, QueryExecutor, UnavailableConnector,
};
use supply_chain_risk::server::{run_server, AppState};

#[derive(Parser, Debug)]
#[command(name = "scri-server", version, about = "Supply Chain Risk Intelligence API server")]
struct Cli {
    /// Address to listen on
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    host: IpAddr,

    /// Port to listen on
    #[arg(long, env = "PORT", default_value_t = 5000)]
    port: u16,

    /// Debug logging unless RUST_LOG is set
    #[arg(long)]
    debug: bool,

    /// Skip opening the database connection at startup
    #[arg(long)]
    no_warm_up: bool,
}

fn init_tracing(debug: bool) -> Result<()> {
    let default_level = if debug { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(debug)
        .compact()
        .try_init()
        .map_err(|err| anyhow!(err))
}

/// Connector for the configured endpoint, or one that reports why there is none
fn build_connector() -> Arc<dyn Connector> {
    match config::endpoint(&env_var).and_then(|endpoint| {
        tracing::info!(endpoint = %endpoint.describe(), "database endpoint configured");
        connector_for(&endpoint)
    }) {
        Ok(connector) => connector,
        Err(e) => {
            tracing::error!(error = %e, "database is not configured, serving in degraded mode");
            tracing::error!("set DB_HOST, DB_PORT, DB_NAME, DB_USER and DB_PASSWORD to enable it");
            let db_type = config::database_type(&env_var).unwrap_or(DatabaseType::Mysql);
            Arc::new(UnavailableConnector::new(db_type, e.to_string()))
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // .env must be loaded before clap reads HOST and PORT
    let dotenv = dotenvy::dotenv();
    let cli = Cli::parse();
    init_tracing(cli.debug)?;
    match dotenv {
        Ok(path) => tracing::debug!(path = %path.display(), "loaded .env file"),
        Err(e) if e.not_found() => {}
        Err(e) => tracing::warn!(error = %e, "failed to parse .env file"),
    }

    let connection_policy = config::connection_policy(&env_var).unwrap_or_else(|e| {
        tracing::warn!(error = %e, "invalid connection settings, using defaults");
        Default::default()
    });
    let retry_policy = config::retry_policy(&env_var).unwrap_or_else(|e| {
        tracing::warn!(error = %e, "invalid retry settings, using defaults");
        Default::default()
    });

    let manager = Arc::new(ConnectionManager::with_policy(
        build_connector(),
        connection_policy,
    ));

    if !cli.no_warm_up {
        match manager.warm_up().await {
            Ok(()) => tracing::info!(endpoint = %manager.endpoint(), "database connection ready"),
            Err(e) => tracing::warn!(
                error = %e,
                "database unavailable at startup, will connect on first request"
            ),
        }
    }

    let executor = QueryExecutor::with_policy(Arc::clone(&manager), retry_policy);
    let addr = SocketAddr::new(cli.host, cli.port);
    let result = run_server(addr, AppState::new(executor)).await;

    let stats = manager.stats().await;
    tracing::info!(
        opened = stats.opened,
        replaced = stats.replaced,
        "shutting down database connection"
    );
    manager.close().await;

    result
}
