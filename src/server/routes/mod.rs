use axum::Router;

use super::AppState;

pub mod alerts;
pub mod dashboard;
pub mod health;
pub mod inventory;
pub mod products;
pub mod shipments;
pub mod suppliers;
pub mod warehouses;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(health::router())
        .merge(suppliers::router())
        .merge(products::router())
        .merge(shipments::router())
        .merge(inventory::router())
        .merge(alerts::router())
        .merge(dashboard::router())
        .merge(warehouses::router())
        .with_state(state)
}
