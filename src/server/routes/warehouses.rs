use axum::{extract::State, routing::get, Json, Router};

use crate::core::DatabaseResult;
use crate::server::{
    error::{ApiResult, DatabaseContext, Envelope},
    models::WarehouseRequest,
    AppState,
};

const LIST_WAREHOUSES: &str = "SELECT * FROM warehouses ORDER BY warehouse_id";
const INSERT_WAREHOUSE: &str = "INSERT INTO warehouses (name, location) VALUES (?, ?)";

pub fn router() -> Router<AppState> {
    Router::new().route("/api/warehouses", get(list_warehouses).post(create_warehouse))
}

async fn list_warehouses(
    State(state): State<AppState>,
) -> ApiResult<Json<Envelope<DatabaseResult>>> {
    let rows = state
        .executor
        .fetch_all(LIST_WAREHOUSES, &[])
        .await
        .context("Database query failed")?;
    Ok(Envelope::data(rows))
}

async fn create_warehouse(
    State(state): State<AppState>,
    Json(body): Json<WarehouseRequest>,
) -> ApiResult<Json<Envelope<()>>> {
    state
        .executor
        .execute_write(INSERT_WAREHOUSE, &[body.name.into(), body.location.into()])
        .await
        .context("Failed to create warehouse")?;
    Ok(Envelope::message("Warehouse created successfully"))
}
