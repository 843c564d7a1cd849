//! Cart repository for database operations.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use trackytronics_core::{CartItemId, ItemId, Price, UserId};

use super::{RepositoryError, conflict_on_unique};
use crate::models::{CartItem, CartLine, Item};

const CART_COLUMNS: &str = "id, user_id, item_id, quantity";

#[derive(sqlx::FromRow)]
struct CartItemRow {
    id: CartItemId,
    user_id: UserId,
    item_id: ItemId,
    quantity: i32,
}

impl From<CartItemRow> for CartItem {
    fn from(row: CartItemRow) -> Self {
        Self {
            id: row.id,
            user_id: row.user_id,
            item_id: row.item_id,
            quantity: row.quantity,
        }
    }
}

/// A cart line with its item's columns flattened in (all nullable: LEFT JOIN).
#[derive(sqlx::FromRow)]
struct CartLineRow {
    id: CartItemId,
    user_id: UserId,
    item_id: ItemId,
    quantity: i32,
    item_title: Option<String>,
    item_description: Option<String>,
    item_price: Option<Price>,
    item_image: Option<String>,
    item_large_image: Option<String>,
    item_user_id: Option<UserId>,
    item_created_at: Option<DateTime<Utc>>,
    item_updated_at: Option<DateTime<Utc>>,
}

impl From<CartLineRow> for CartLine {
    fn from(row: CartLineRow) -> Self {
        let item = match (
            row.item_title,
            row.item_description,
            row.item_price,
            row.item_user_id,
            row.item_created_at,
            row.item_updated_at,
        ) {
            (
                Some(title),
                Some(description),
                Some(price),
                Some(seller),
                Some(created_at),
                Some(updated_at),
            ) => Some(Item {
                id: row.item_id,
                title,
                description,
                price,
                image: row.item_image,
                large_image: row.item_large_image,
                user_id: seller,
                created_at,
                updated_at,
            }),
            _ => None,
        };

        Self {
            cart_item: CartItem {
                id: row.id,
                user_id: row.user_id,
                item_id: row.item_id,
                quantity: row.quantity,
            },
            item,
        }
    }
}

/// Repository for cart database operations.
pub struct CartRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CartRepository<'a> {
    /// Create a new cart repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Get a cart line by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_id(&self, id: CartItemId) -> Result<Option<CartItem>, RepositoryError> {
        let row: Option<CartItemRow> =
            sqlx::query_as(&format!("SELECT {CART_COLUMNS} FROM cart_items WHERE id = $1"))
                .bind(id)
                .fetch_optional(self.pool)
                .await?;

        Ok(row.map(CartItem::from))
    }

    /// Get the user's line for an item, if any.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_for(
        &self,
        user_id: UserId,
        item_id: ItemId,
    ) -> Result<Option<CartItem>, RepositoryError> {
        let row: Option<CartItemRow> = sqlx::query_as(&format!(
            "SELECT {CART_COLUMNS} FROM cart_items WHERE user_id = $1 AND item_id = $2"
        ))
        .bind(user_id)
        .bind(item_id)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(CartItem::from))
    }

    /// Create a line at quantity 1.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the user already has a line for the item.
    pub async fn create(
        &self,
        user_id: UserId,
        item_id: ItemId,
    ) -> Result<CartItem, RepositoryError> {
        let row: CartItemRow = sqlx::query_as(&format!(
            "INSERT INTO cart_items (user_id, item_id, quantity) VALUES ($1, $2, 1) \
             RETURNING {CART_COLUMNS}"
        ))
        .bind(user_id)
        .bind(item_id)
        .fetch_one(self.pool)
        .await
        .map_err(|e| conflict_on_unique(e, "cart line"))?;

        Ok(CartItem::from(row))
    }

    /// Set a line's quantity.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the line doesn't exist.
    pub async fn set_quantity(
        &self,
        id: CartItemId,
        quantity: i32,
    ) -> Result<CartItem, RepositoryError> {
        let row: Option<CartItemRow> = sqlx::query_as(&format!(
            "UPDATE cart_items SET quantity = $1 WHERE id = $2 RETURNING {CART_COLUMNS}"
        ))
        .bind(quantity)
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        row.map(CartItem::from).ok_or(RepositoryError::NotFound)
    }

    /// Delete one line.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the line doesn't exist.
    pub async fn delete(&self, id: CartItemId) -> Result<CartItem, RepositoryError> {
        let row: Option<CartItemRow> = sqlx::query_as(&format!(
            "DELETE FROM cart_items WHERE id = $1 RETURNING {CART_COLUMNS}"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        row.map(CartItem::from).ok_or(RepositoryError::NotFound)
    }

    /// Delete many lines by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the delete fails.
    pub async fn delete_many(&self, ids: &[CartItemId]) -> Result<u64, RepositoryError> {
        let raw: Vec<i32> = ids.iter().map(CartItemId::as_i32).collect();
        let result = sqlx::query("DELETE FROM cart_items WHERE id = ANY($1)")
            .bind(raw)
            .execute(self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    /// The user's lines joined with their items.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn lines_for_user(&self, user_id: UserId) -> Result<Vec<CartLine>, RepositoryError> {
        let rows: Vec<CartLineRow> = sqlx::query_as(
            "SELECT c.id, c.user_id, c.item_id, c.quantity, \
                    i.title AS item_title, i.description AS item_description, \
                    i.price AS item_price, i.image AS item_image, \
                    i.large_image AS item_large_image, i.user_id AS item_user_id, \
                    i.created_at AS item_created_at, i.updated_at AS item_updated_at \
             FROM cart_items c \
             LEFT JOIN items i ON i.id = c.item_id \
             WHERE c.user_id = $1 \
             ORDER BY c.id",
        )
        .bind(user_id)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(CartLine::from).collect())
    }
}
