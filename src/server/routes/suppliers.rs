use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};

use crate::core::{DatabaseResult, DatabaseRow, DatabaseValue};
use crate::server::{
    error::{ApiError, ApiResult, DatabaseContext, Envelope},
    models::SupplierRequest,
    AppState,
};

/// Suppliers with their most recent risk metrics
const LIST_SUPPLIERS_WITH_RISK: &str = "
    SELECT s.*,
           COALESCE(m.risk_score, 0) AS risk_score,
           COALESCE(m.risk_level, 'LOW') AS risk_level
    FROM suppliers s
    LEFT JOIN supplier_metrics m ON s.supplier_id = m.supplier_id
    AND m.record_date = (
        SELECT MAX(record_date)
        FROM supplier_metrics
        WHERE supplier_id = s.supplier_id
    )
    ORDER BY s.supplier_id";

/// Used when supplier_metrics is missing or unreadable
const LIST_SUPPLIERS_PLAIN: &str =
    "SELECT s.*, 0 AS risk_score, 'LOW' AS risk_level FROM suppliers s ORDER BY s.supplier_id";

const GET_SUPPLIER: &str = "SELECT * FROM suppliers WHERE supplier_id = ?";

const INSERT_SUPPLIER: &str = "
    INSERT INTO suppliers (name, contact_email, phone, rating)
    VALUES (?, ?, ?, ?)";

const UPDATE_SUPPLIER: &str = "
    UPDATE suppliers
    SET name = ?, contact_email = ?, phone = ?, rating = ?
    WHERE supplier_id = ?";

const DELETE_SUPPLIER: &str = "DELETE FROM suppliers WHERE supplier_id = ?";

const SUPPLIER_METRICS: &str = "
    SELECT * FROM supplier_metrics
    WHERE supplier_id = ?
    ORDER BY record_date DESC
    LIMIT 30";

const COMPUTE_RISK: &str = "CALL compute_supplier_risk(?)";

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/suppliers", get(list_suppliers).post(create_supplier))
        .route(
            "/api/suppliers/{id}",
            get(get_supplier).put(update_supplier).delete(delete_supplier),
        )
        .route("/api/suppliers/{id}/metrics", get(supplier_metrics))
        .route("/api/suppliers/{id}/compute-risk", post(compute_risk))
}

async fn list_suppliers(
    State(state): State<AppState>,
) -> ApiResult<Json<Envelope<DatabaseResult>>> {
    let rows = state
        .executor
        .fetch_with_fallback(LIST_SUPPLIERS_WITH_RISK, LIST_SUPPLIERS_PLAIN, &[])
        .await
        .context("Database query failed - unable to fetch suppliers")?;
    Ok(Envelope::data(rows))
}

async fn create_supplier(
    State(state): State<AppState>,
    Json(body): Json<SupplierRequest>,
) -> ApiResult<Json<Envelope<()>>> {
    let params: Vec<DatabaseValue> = vec![
        body.name.into(),
        body.contact_email.into(),
        body.phone.into(),
        body.rating.unwrap_or(0.0).into(),
    ];
    state
        .executor
        .execute_write(INSERT_SUPPLIER, &params)
        .await
        .context("Failed to create supplier")?;
    Ok(Envelope::message("Supplier created successfully"))
}

async fn get_supplier(
    Path(id): Path<i64>,
    State(state): State<AppState>,
) -> ApiResult<Json<Envelope<DatabaseRow>>> {
    let row = state
        .executor
        .fetch_optional(GET_SUPPLIER, &[id.into()])
        .await
        .context("Failed to fetch supplier")?
        .ok_or_else(|| ApiError::NotFound("Supplier not found".to_string()))?;
    Ok(Envelope::data(row))
}

async fn update_supplier(
    Path(id): Path<i64>,
    State(state): State<AppState>,
    Json(body): Json<SupplierRequest>,
) -> ApiResult<Json<Envelope<()>>> {
    let params: Vec<DatabaseValue> = vec![
        body.name.into(),
        body.contact_email.into(),
        body.phone.into(),
        body.rating.into(),
        id.into(),
    ];
    state
        .executor
        .execute_write(UPDATE_SUPPLIER, &params)
        .await
        .context("Failed to update supplier")?;
    Ok(Envelope::message("Supplier updated successfully"))
}

async fn delete_supplier(
    Path(id): Path<i64>,
    State(state): State<AppState>,
) -> ApiResult<Json<Envelope<()>>> {
    state
        .executor
        .execute_write(DELETE_SUPPLIER, &[id.into()])
        .await
        .context("Failed to delete supplier")?;
    Ok(Envelope::message("Supplier deleted successfully"))
}

async fn supplier_metrics(
    Path(id): Path<i64>,
    State(state): State<AppState>,
) -> ApiResult<Json<Envelope<DatabaseResult>>> {
    let rows = state
        .executor
        .fetch_all(SUPPLIER_METRICS, &[id.into()])
        .await
        .context("Failed to fetch metrics")?;
    Ok(Envelope::data(rows))
}

/// Risk scoring lives in the database; the procedure is called opaquely
async fn compute_risk(
    Path(id): Path<i64>,
    State(state): State<AppState>,
) -> ApiResult<Json<Envelope<()>>> {
    state
        .executor
        .execute_write(COMPUTE_RISK, &[id.into()])
        .await
        .context("Failed to compute risk score")?;
    Ok(Envelope::message("Risk score computed successfully"))
}
