use axum::{extract::State, routing::get, Json, Router};

use crate::core::{DatabaseResult, DatabaseValue};
use crate::server::{
    error::{ApiResult, DatabaseContext, Envelope},
    models::ProductRequest,
    AppState,
};

const LIST_PRODUCTS: &str = "
    SELECT p.*, s.name AS supplier_name
    FROM products p
    JOIN suppliers s ON p.supplier_id = s.supplier_id
    ORDER BY p.product_id";

const INSERT_PRODUCT: &str = "
    INSERT INTO products (supplier_id, name, sku, category, unit_cost, lead_time_days)
    VALUES (?, ?, ?, ?, ?, ?)";

pub fn router() -> Router<AppState> {
    Router::new().route("/api/products", get(list_products).post(create_product))
}

async fn list_products(State(state): State<AppState>) -> ApiResult<Json<Envelope<DatabaseResult>>> {
    let rows = state
        .executor
        .fetch_all(LIST_PRODUCTS, &[])
        .await
        .context("Database query failed")?;
    Ok(Envelope::data(rows))
}

async fn create_product(
    State(state): State<AppState>,
    Json(body): Json<ProductRequest>,
) -> ApiResult<Json<Envelope<()>>> {
    let params: Vec<DatabaseValue> = vec![
        body.supplier_id.into(),
        body.name.into(),
        body.sku.into(),
        body.category.into(),
        body.unit_cost.into(),
        body.lead_time_days.into(),
    ];
    state
        .executor
        .execute_write(INSERT_PRODUCT, &params)
        .await
        .context("Failed to create product")?;
    Ok(Envelope::message("Product created successfully"))
}
