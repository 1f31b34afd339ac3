use axum::{
    extract::{Path, State},
    routing::{get, put},
    Json, Router,
};

use crate::core::{DatabaseResult, DatabaseType, DatabaseValue};
use crate::server::{
    error::{ApiResult, DatabaseContext, Envelope},
    models::InventoryRequest,
    AppState,
};

const LIST_INVENTORY: &str = "
    SELECT i.*,
           p.name AS product_name,
           p.sku,
           w.name AS warehouse_name,
           CASE
               WHEN i.quantity < i.safety_stock THEN 'CRITICAL'
               WHEN i.quantity < i.reorder_threshold THEN 'LOW'
               ELSE 'OK'
           END AS status
    FROM inventory i
    JOIN products p ON i.product_id = p.product_id
    JOIN warehouses w ON i.warehouse_id = w.warehouse_id
    ORDER BY i.last_updated DESC";

const UPSERT_INVENTORY_MYSQL: &str = "
    INSERT INTO inventory (product_id, warehouse_id, quantity, reorder_threshold, safety_stock)
    VALUES (?, ?, ?, ?, ?)
    ON DUPLICATE KEY UPDATE
        quantity = VALUES(quantity),
        reorder_threshold = VALUES(reorder_threshold),
        safety_stock = VALUES(safety_stock),
        last_updated = CURRENT_TIMESTAMP";

const UPSERT_INVENTORY_SQLITE: &str = "
    INSERT INTO inventory (product_id, warehouse_id, quantity, reorder_threshold, safety_stock)
    VALUES (?, ?, ?, ?, ?)
    ON CONFLICT (product_id, warehouse_id) DO UPDATE SET
        quantity = excluded.quantity,
        reorder_threshold = excluded.reorder_threshold,
        safety_stock = excluded.safety_stock,
        last_updated = CURRENT_TIMESTAMP";

const UPDATE_INVENTORY: &str = "
    UPDATE inventory
    SET quantity = ?, reorder_threshold = ?, safety_stock = ?
    WHERE inventory_id = ?";

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/inventory", get(list_inventory).post(upsert_inventory))
        .route("/api/inventory/{id}", put(update_inventory))
}

async fn list_inventory(
    State(state): State<AppState>,
) -> ApiResult<Json<Envelope<DatabaseResult>>> {
    let rows = state
        .executor
        .fetch_all(LIST_INVENTORY, &[])
        .await
        .context("Database query failed")?;
    Ok(Envelope::data(rows))
}

/// Insert a stock level, or overwrite the one for the same product and warehouse
async fn upsert_inventory(
    State(state): State<AppState>,
    Json(body): Json<InventoryRequest>,
) -> ApiResult<Json<Envelope<()>>> {
    let query = match state.executor.manager().database_type() {
        DatabaseType::Mysql => UPSERT_INVENTORY_MYSQL,
        DatabaseType::Sqlite => UPSERT_INVENTORY_SQLITE,
    };
    let params: Vec<DatabaseValue> = vec![
        body.product_id.into(),
        body.warehouse_id.into(),
        body.quantity.into(),
        body.reorder_threshold.into(),
        body.safety_stock.into(),
    ];
    state
        .executor
        .execute_write(query, &params)
        .await
        .context("Failed to update inventory")?;
    Ok(Envelope::message("Inventory updated successfully"))
}

async fn update_inventory(
    Path(id): Path<i64>,
    State(state): State<AppState>,
    Json(body): Json<InventoryRequest>,
) -> ApiResult<Json<Envelope<()>>> {
    let params: Vec<DatabaseValue> = vec![
        body.quantity.into(),
        body.reorder_threshold.into(),
        body.safety_stock.into(),
        id.into(),
    ];
    state
        .executor
        .execute_write(UPDATE_INVENTORY, &params)
        .await
        .context("Failed to update inventory")?;
    Ok(Envelope::message("Inventory updated successfully"))
}
