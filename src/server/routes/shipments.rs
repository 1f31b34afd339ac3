use axum::{
    extract::{Path, State},
    routing::{get, put},
    Json, Router,
};

use crate::core::{DatabaseResult, DatabaseValue};
use crate::server::{
    error::{ApiResult, DatabaseContext, Envelope},
    models::ShipmentRequest,
    AppState,
};

/// Shipments with a computed delay against the expected arrival date
const LIST_SHIPMENTS_WITH_DELAY: &str = "
    SELECT sh.*,
           s.name AS supplier_name,
           p.name AS product_name,
           w.name AS warehouse_name,
           GREATEST(DATEDIFF(COALESCE(sh.actual_arrival_date, CURDATE()), sh.expected_arrival_date), 0) AS delay_days
    FROM shipments sh
    JOIN suppliers s ON sh.supplier_id = s.supplier_id
    JOIN products p ON sh.product_id = p.product_id
    JOIN warehouses w ON sh.warehouse_id = w.warehouse_id
    ORDER BY sh.ship_date DESC";

/// Same projection without the date arithmetic
const LIST_SHIPMENTS_PLAIN: &str = "
    SELECT sh.*,
           s.name AS supplier_name,
           p.name AS product_name,
           w.name AS warehouse_name,
           0 AS delay_days
    FROM shipments sh
    JOIN suppliers s ON sh.supplier_id = s.supplier_id
    JOIN products p ON sh.product_id = p.product_id
    JOIN warehouses w ON sh.warehouse_id = w.warehouse_id
    ORDER BY sh.ship_date DESC";

const INSERT_SHIPMENT: &str = "
    INSERT INTO shipments (supplier_id, product_id, warehouse_id, quantity,
                           ship_date, expected_arrival_date, status)
    VALUES (?, ?, ?, ?, ?, ?, ?)";

const UPDATE_SHIPMENT: &str = "
    UPDATE shipments
    SET supplier_id = ?, product_id = ?, warehouse_id = ?, quantity = ?,
        ship_date = ?, expected_arrival_date = ?, actual_arrival_date = ?, status = ?
    WHERE shipment_id = ?";

const INSERT_EVENT: &str = "
    INSERT INTO shipment_events (shipment_id, event_time, event_type, details)
    VALUES (?, CURRENT_TIMESTAMP, ?, ?)";

const LIST_EVENTS: &str = "
    SELECT * FROM shipment_events
    WHERE shipment_id = ?
    ORDER BY event_time DESC";

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/shipments", get(list_shipments).post(create_shipment))
        .route("/api/shipments/{id}", put(update_shipment))
        .route("/api/shipments/{id}/events", get(shipment_events))
}

async fn list_shipments(
    State(state): State<AppState>,
) -> ApiResult<Json<Envelope<DatabaseResult>>> {
    let rows = state
        .executor
        .fetch_with_fallback(LIST_SHIPMENTS_WITH_DELAY, LIST_SHIPMENTS_PLAIN, &[])
        .await
        .context("Database query failed - unable to fetch shipments")?;
    Ok(Envelope::data(rows))
}

async fn create_shipment(
    State(state): State<AppState>,
    Json(body): Json<ShipmentRequest>,
) -> ApiResult<Json<Envelope<()>>> {
    let params: Vec<DatabaseValue> = vec![
        body.supplier_id.into(),
        body.product_id.into(),
        body.warehouse_id.into(),
        body.quantity.into(),
        body.ship_date.into(),
        body.expected_arrival_date.into(),
        body.status.unwrap_or_else(|| "CREATED".to_string()).into(),
    ];
    let summary = state
        .executor
        .execute_write(INSERT_SHIPMENT, &params)
        .await
        .context("Failed to create shipment")?;

    match summary.last_insert_id {
        Some(shipment_id) => {
            record_event(&state, shipment_id as i64, "CREATED", "created").await;
        }
        None => tracing::warn!("shipment insert reported no id, skipping CREATED event"),
    }
    Ok(Envelope::message("Shipment created successfully"))
}

async fn update_shipment(
    Path(id): Path<i64>,
    State(state): State<AppState>,
    Json(body): Json<ShipmentRequest>,
) -> ApiResult<Json<Envelope<()>>> {
    let status = body.status.clone();
    let params: Vec<DatabaseValue> = vec![
        body.supplier_id.into(),
        body.product_id.into(),
        body.warehouse_id.into(),
        body.quantity.into(),
        body.ship_date.into(),
        body.expected_arrival_date.into(),
        body.actual_arrival_date.into(),
        body.status.into(),
        id.into(),
    ];
    state
        .executor
        .execute_write(UPDATE_SHIPMENT, &params)
        .await
        .context("Failed to update shipment")?;

    if let Some(status) = status {
        record_event(&state, id, &status, "status updated").await;
    }
    Ok(Envelope::message("Shipment updated successfully"))
}

async fn shipment_events(
    Path(id): Path<i64>,
    State(state): State<AppState>,
) -> ApiResult<Json<Envelope<DatabaseResult>>> {
    let rows = state
        .executor
        .fetch_all(LIST_EVENTS, &[id.into()])
        .await
        .context("Failed to fetch events")?;
    Ok(Envelope::data(rows))
}

/// Append to the shipment's event log. The shipment write has already
/// committed, so a failure here is logged and not reported to the client.
async fn record_event(state: &AppState, shipment_id: i64, event_type: &str, details: &str) {
    let params: [DatabaseValue; 3] = [shipment_id.into(), event_type.into(), details.into()];
    if let Err(e) = state.executor.execute_write(INSERT_EVENT, &params).await {
        tracing::warn!(shipment_id, event_type, error = %e, "failed to record shipment event");
    }
}
