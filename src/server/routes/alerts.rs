use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;

use crate::core::{DatabaseResult, DatabaseValue};
use crate::server::{
    error::{ApiResult, DatabaseContext, Envelope},
    models::{AlertQuery, AlertRequest},
    AppState,
};

const LIST_ALERTS: &str = "
    SELECT * FROM alerts
    WHERE resolved = ?
    ORDER BY created_at DESC";

const RESOLVE_ALERT: &str = "
    UPDATE alerts
    SET resolved = 1, resolved_at = CURRENT_TIMESTAMP
    WHERE alert_id = ?";

const INSERT_ALERT: &str = "
    INSERT INTO alerts (created_at, alert_type, severity, entity_type, entity_id, message, resolved)
    VALUES (CURRENT_TIMESTAMP, ?, ?, ?, ?, ?, 0)";

/// Demo alerts created by `POST /api/alerts/generate-test`: label, type, severity, entity type, entity id, message
const TEST_ALERTS: [(&str, &str, &str, &str, i64, &str); 3] = [
    (
        "Shipment delay alert",
        "SHIPMENT_DELAY",
        "WARN",
        "SHIPMENT",
        1,
        "Test: Shipment #1 is delayed",
    ),
    (
        "Low inventory alert",
        "LOW_INVENTORY",
        "WARN",
        "INVENTORY",
        1,
        "Test: Inventory low for product at warehouse",
    ),
    (
        "Critical inventory alert",
        "LOW_INVENTORY",
        "CRITICAL",
        "INVENTORY",
        2,
        "Test: CRITICAL - Inventory below safety stock",
    ),
];

#[derive(Serialize)]
pub struct GeneratedAlerts {
    success: bool,
    message: String,
    alerts: Vec<&'static str>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/alerts", get(list_alerts).post(create_alert))
        .route("/api/alerts/{id}/resolve", post(resolve_alert))
        .route("/api/alerts/generate-test", post(generate_test_alerts))
}

async fn list_alerts(
    State(state): State<AppState>,
    Query(query): Query<AlertQuery>,
) -> ApiResult<Json<Envelope<DatabaseResult>>> {
    let resolved = i64::from(query.resolved());
    let rows = state
        .executor
        .fetch_all(LIST_ALERTS, &[resolved.into()])
        .await
        .context("Database query failed")?;
    Ok(Envelope::data(rows))
}

async fn resolve_alert(
    Path(id): Path<i64>,
    State(state): State<AppState>,
) -> ApiResult<Json<Envelope<()>>> {
    state
        .executor
        .execute_write(RESOLVE_ALERT, &[id.into()])
        .await
        .context("Failed to resolve alert")?;
    Ok(Envelope::message("Alert resolved successfully"))
}

async fn create_alert(
    State(state): State<AppState>,
    Json(alert): Json<AlertRequest>,
) -> ApiResult<Json<Envelope<()>>> {
    let params: Vec<DatabaseValue> = vec![
        alert.alert_type.into(),
        alert.severity.into(),
        alert.entity_type.into(),
        alert.entity_id.into(),
        alert.message.into(),
    ];
    state
        .executor
        .execute_write(INSERT_ALERT, &params)
        .await
        .context("Failed to create alert")?;
    Ok(Envelope::message("Alert created successfully"))
}

/// Insert the demo alerts one by one; a failed insert is skipped, not fatal
async fn generate_test_alerts(State(state): State<AppState>) -> Json<GeneratedAlerts> {
    let mut created = Vec::with_capacity(TEST_ALERTS.len());

    for (label, alert_type, severity, entity_type, entity_id, message) in TEST_ALERTS {
        let params: Vec<DatabaseValue> = vec![
            alert_type.into(),
            severity.into(),
            entity_type.into(),
            entity_id.into(),
            message.into(),
        ];
        match state.executor.execute_write(INSERT_ALERT, &params).await {
            Ok(_) => created.push(label),
            Err(e) => tracing::warn!(alert = label, error = %e, "failed to create test alert"),
        }
    }

    Json(GeneratedAlerts {
        success: true,
        message: format!("Created {} test alerts", created.len()),
        alerts: created,
    })
}
