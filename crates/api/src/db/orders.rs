//! Order repository for database operations.
//!
//! An order and its line snapshots are written in one transaction, so a
//! partially persisted order is never visible.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use trackytronics_core::{CurrencyCode, OrderId, OrderItemId, Price, UserId};

use super::{RepositoryError, conflict_on_unique};
use crate::models::{NewOrder, Order, OrderItem};

const ORDER_COLUMNS: &str = "id, user_id, total, currency, charge_id, created_at";
const ORDER_ITEM_COLUMNS: &str =
    "id, order_id, user_id, title, description, image, large_image, price, quantity";

#[derive(sqlx::FromRow)]
struct OrderRow {
    id: OrderId,
    user_id: UserId,
    total: Price,
    currency: String,
    charge_id: String,
    created_at: DateTime<Utc>,
}

impl OrderRow {
    fn into_order(self, items: Vec<OrderItem>) -> Result<Order, RepositoryError> {
        let currency: CurrencyCode = self.currency.parse().map_err(|e| {
            RepositoryError::DataCorruption(format!("order {}: {e}", self.id))
        })?;

        Ok(Order {
            id: self.id,
            user_id: self.user_id,
            total: self.total,
            currency,
            charge_id: self.charge_id,
            items,
            created_at: self.created_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct OrderItemRow {
    id: OrderItemId,
    order_id: OrderId,
    user_id: UserId,
    title: String,
    description: String,
    image: Option<String>,
    large_image: Option<String>,
    price: Price,
    quantity: i32,
}

impl From<OrderItemRow> for OrderItem {
    fn from(row: OrderItemRow) -> Self {
        Self {
            id: row.id,
            user_id: row.user_id,
            title: row.title,
            description: row.description,
            image: row.image,
            large_image: row.large_image,
            price: row.price,
            quantity: row.quantity,
        }
    }
}

/// Repository for order database operations.
pub struct OrderRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> OrderRepository<'a> {
    /// Create a new order repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Persist an order and its lines atomically.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the charge ID was already recorded.
    /// Returns `RepositoryError::Database` if any insert fails; nothing is written.
    pub async fn create(&self, order: &NewOrder) -> Result<Order, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let row: OrderRow = sqlx::query_as(&format!(
            "INSERT INTO orders (user_id, total, currency, charge_id) \
             VALUES ($1, $2, $3, $4) \
             RETURNING {ORDER_COLUMNS}"
        ))
        .bind(order.user_id)
        .bind(order.total)
        .bind(order.currency.as_str())
        .bind(&order.charge_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| conflict_on_unique(e, "charge"))?;

        let mut items = Vec::with_capacity(order.lines.len());
        for line in &order.lines {
            let item: OrderItemRow = sqlx::query_as(&format!(
                "INSERT INTO order_items \
                     (order_id, user_id, title, description, image, large_image, price, quantity) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
                 RETURNING {ORDER_ITEM_COLUMNS}"
            ))
            .bind(row.id)
            .bind(order.user_id)
            .bind(&line.title)
            .bind(&line.description)
            .bind(line.image.as_deref())
            .bind(line.large_image.as_deref())
            .bind(line.price)
            .bind(line.quantity)
            .fetch_one(&mut *tx)
            .await?;
            items.push(OrderItem::from(item));
        }

        tx.commit().await?;

        row.into_order(items)
    }

    /// Get an order with its lines.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_id(&self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        let row: Option<OrderRow> =
            sqlx::query_as(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1"))
                .bind(id)
                .fetch_optional(self.pool)
                .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let items: Vec<OrderItemRow> = sqlx::query_as(&format!(
            "SELECT {ORDER_ITEM_COLUMNS} FROM order_items WHERE order_id = $1 ORDER BY id"
        ))
        .bind(id)
        .fetch_all(self.pool)
        .await?;

        row.into_order(items.into_iter().map(OrderItem::from).collect())
            .map(Some)
    }

    /// The user's orders with their lines, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_for_user(&self, user_id: UserId) -> Result<Vec<Order>, RepositoryError> {
        let rows: Vec<OrderRow> = sqlx::query_as(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE user_id = $1 \
             ORDER BY created_at DESC, id DESC"
        ))
        .bind(user_id)
        .fetch_all(self.pool)
        .await?;

        if rows.is_empty() {
            return Ok(Vec::new());
        }

        let order_ids: Vec<i32> = rows.iter().map(|r| r.id.as_i32()).collect();
        let item_rows: Vec<OrderItemRow> = sqlx::query_as(&format!(
            "SELECT {ORDER_ITEM_COLUMNS} FROM order_items WHERE order_id = ANY($1) ORDER BY id"
        ))
        .bind(order_ids)
        .fetch_all(self.pool)
        .await?;

        let mut by_order: HashMap<OrderId, Vec<OrderItem>> = HashMap::new();
        for item in item_rows {
            by_order
                .entry(item.order_id)
                .or_default()
                .push(OrderItem::from(item));
        }

        rows.into_iter()
            .map(|row| {
                let items = by_order.remove(&row.id).unwrap_or_default();
                row.into_order(items)
            })
            .collect()
    }
}
