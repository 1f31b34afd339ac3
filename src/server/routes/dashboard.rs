use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;

use crate::core::DatabaseResult;
use crate::server::{
    error::{ApiResult, DatabaseContext, Envelope},
    AppState,
};

const COUNT_SUPPLIERS: &str = "SELECT COUNT(*) AS count FROM suppliers";
const COUNT_IN_TRANSIT: &str = "SELECT COUNT(*) AS count FROM shipments WHERE status = 'IN_TRANSIT'";
const COUNT_OPEN_ALERTS: &str = "SELECT COUNT(*) AS count FROM alerts WHERE resolved = 0";
const COUNT_CRITICAL_INVENTORY: &str =
    "SELECT COUNT(*) AS count FROM inventory WHERE quantity < safety_stock";

const SUPPLIER_RISK_VIEW: &str = "
    SELECT * FROM supplier_risk_summary
    ORDER BY risk_score DESC";

/// Rebuilds the supplier_risk_summary projection when the view is missing
const SUPPLIER_RISK_DIRECT: &str = "
    SELECT s.supplier_id, s.name,
           COALESCE(m.record_date, CURRENT_DATE) AS record_date,
           COALESCE(m.risk_score, 0) AS risk_score,
           COALESCE(m.risk_level, 'LOW') AS risk_level,
           COALESCE(m.on_time_rate, 1.0) AS on_time_rate,
           COALESCE(m.avg_delay_days, 0) AS avg_delay_days,
           COALESCE(m.defect_rate, 0) AS defect_rate
    FROM suppliers s
    LEFT JOIN supplier_metrics m ON s.supplier_id = m.supplier_id
    AND m.record_date = (
        SELECT MAX(record_date)
        FROM supplier_metrics
        WHERE supplier_id = s.supplier_id
    )
    ORDER BY COALESCE(m.risk_score, 0) DESC";

const DELAYED_SHIPMENTS: &str = "
    SELECT * FROM delayed_shipments_overview
    ORDER BY delay_days DESC";

/// Headline counters; a counter whose query fails is left out
#[derive(Debug, Default, Serialize)]
pub struct DashboardMetrics {
    #[serde(skip_serializing_if = "Option::is_none")]
    suppliers: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    transit: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    alerts: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    inventory: Option<String>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/dashboard/metrics", get(metrics))
        .route("/api/dashboard/supplier-risk", get(supplier_risk))
        .route("/api/dashboard/delayed-shipments", get(delayed_shipments))
}

async fn count(state: &AppState, query: &str) -> Option<i64> {
    match state.executor.fetch_optional(query, &[]).await {
        Ok(row) => row.and_then(|row| row.get("count").and_then(|v| v.as_long())),
        Err(e) => {
            tracing::warn!(error = %e, "dashboard counter unavailable");
            None
        }
    }
}

async fn metrics(State(state): State<AppState>) -> Json<Envelope<DashboardMetrics>> {
    let inventory = count(&state, COUNT_CRITICAL_INVENTORY)
        .await
        .map(|critical| match critical {
            0 => "OK".to_string(),
            n => format!("{n} Critical"),
        });

    Envelope::data(DashboardMetrics {
        suppliers: count(&state, COUNT_SUPPLIERS).await,
        transit: count(&state, COUNT_IN_TRANSIT).await,
        alerts: count(&state, COUNT_OPEN_ALERTS).await,
        inventory,
    })
}

async fn supplier_risk(
    State(state): State<AppState>,
) -> ApiResult<Json<Envelope<DatabaseResult>>> {
    let rows = state
        .executor
        .fetch_with_fallback(SUPPLIER_RISK_VIEW, SUPPLIER_RISK_DIRECT, &[])
        .await
        .context("Database query failed")?;
    Ok(Envelope::data(rows))
}

async fn delayed_shipments(
    State(state): State<AppState>,
) -> ApiResult<Json<Envelope<DatabaseResult>>> {
    let rows = state
        .executor
        .fetch_all(DELAYED_SHIPMENTS, &[])
        .await
        .context("Database query failed")?;
    Ok(Envelope::data(rows))
}
