//! Request bodies accepted by the API
//!
//! Every field is optional: a missing field binds as SQL `NULL` unless a
//! default is documented on it, and the database decides whether that is
//! acceptable.

use serde::Deserialize;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SupplierRequest {
    pub name: Option<String>,
    pub contact_email: Option<String>,
    pub phone: Option<String>,
    /// Defaults to 0 on create; an update without it clears the rating
    pub rating: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProductRequest {
    pub supplier_id: Option<i64>,
    pub name: Option<String>,
    pub sku: Option<String>,
    pub category: Option<String>,
    #[serde(default)]
    pub unit_cost: f64,
    #[serde(default)]
    pub lead_time_days: i64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ShipmentRequest {
    pub supplier_id: Option<i64>,
    pub product_id: Option<i64>,
    pub warehouse_id: Option<i64>,
    pub quantity: Option<i64>,
    pub ship_date: Option<String>,
    pub expected_arrival_date: Option<String>,
    pub actual_arrival_date: Option<String>,
    /// `CREATED` when absent on create. On update, its presence also records a shipment event.
    pub status: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct InventoryRequest {
    pub product_id: Option<i64>,
    pub warehouse_id: Option<i64>,
    pub quantity: Option<i64>,
    pub reorder_threshold: Option<i64>,
    pub safety_stock: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AlertRequest {
    pub alert_type: String,
    pub severity: String,
    pub entity_type: String,
    pub entity_id: i64,
    pub message: String,
}

impl Default for AlertRequest {
    fn default() -> Self {
        Self {
            alert_type: "CUSTOM".to_string(),
            severity: "INFO".to_string(),
            entity_type: "SYSTEM".to_string(),
            entity_id: 0,
            message: "Custom alert".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WarehouseRequest {
    pub name: Option<String>,
    pub location: Option<String>,
}

/// Query string of `GET /api/alerts`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AlertQuery {
    pub resolved: Option<String>,
}

impl AlertQuery {
    /// Only a case-insensitive `true` selects resolved alerts
    pub fn resolved(&self) -> bool {
        self.resolved
            .as_deref()
            .is_some_and(|v| v.eq_ignore_ascii_case("true"))
    }
}
