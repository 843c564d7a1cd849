//! Order domain types.

use chrono::{DateTime, Utc};

use trackytronics_core::{CurrencyCode, OrderId, OrderItemId, Price, UserId};

/// A completed purchase. Immutable once created.
#[derive(Debug, Clone)]
pub struct Order {
    pub id: OrderId,
    pub user_id: UserId,
    /// Server-computed total in minor units.
    pub total: Price,
    pub currency: CurrencyCode,
    /// Payment processor charge identifier.
    pub charge_id: String,
    pub items: Vec<OrderItem>,
    pub created_at: DateTime<Utc>,
}

/// A purchased line, copied from the item at checkout time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderItem {
    pub id: OrderItemId,
    pub user_id: UserId,
    pub title: String,
    pub description: String,
    pub image: Option<String>,
    pub large_image: Option<String>,
    pub price: Price,
    pub quantity: i32,
}

/// Data required to persist an order.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub user_id: UserId,
    pub total: Price,
    pub currency: CurrencyCode,
    pub charge_id: String,
    pub lines: Vec<NewOrderLine>,
}

/// An order line before persistence.
///
/// Deliberately carries no item identifier: order lines are snapshots, and
/// keep their content even if the listing is later edited or deleted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOrderLine {
    pub title: String,
    pub description: String,
    pub image: Option<String>,
    pub large_image: Option<String>,
    pub price: Price,
    pub quantity: i32,
}
