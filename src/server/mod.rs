//! HTTP surface of the supply-chain API
//!
//! Every handler is a thin pass-through: build a statement, run it through the
//! shared [`QueryExecutor`], wrap the rows in the response envelope.

use std::net::SocketAddr;

use anyhow::Context;
use axum::Router;
use tokio::signal;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;

use crate::core::QueryExecutor;

pub mod error;
pub mod models;
mod routes;

pub use routes::build_router;

#[derive(Clone)]
pub struct AppState {
    pub executor: QueryExecutor,
}

impl AppState {
    pub fn new(executor: QueryExecutor) -> Self {
        Self { executor }
    }
}

/// Router with request tracing and permissive CORS
pub fn app(state: AppState) -> Router {
    Router::new()
        .merge(build_router(state))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// Serve until Ctrl-C or SIGTERM
pub async fn run_server(addr: SocketAddr, state: AppState) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(%addr, "starting supply chain risk API");

    axum::serve(listener, app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to install Ctrl-C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                term.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("shutdown signal received");
}
