//! Item repository for database operations.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use trackytronics_core::{ItemId, Price, UserId};

use super::RepositoryError;
use crate::models::{Item, ItemChanges, ItemOrder, NewItem};

const ITEM_COLUMNS: &str =
    "id, title, description, price, image, large_image, user_id, created_at, updated_at";

#[derive(sqlx::FromRow)]
struct ItemRow {
    id: ItemId,
    title: String,
    description: String,
    price: Price,
    image: Option<String>,
    large_image: Option<String>,
    user_id: UserId,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ItemRow> for Item {
    fn from(row: ItemRow) -> Self {
        Self {
            id: row.id,
            title: row.title,
            description: row.description,
            price: row.price,
            image: row.image,
            large_image: row.large_image,
            user_id: row.user_id,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

const fn order_by_clause(order: ItemOrder) -> &'static str {
    match order {
        ItemOrder::CreatedAtDesc => "created_at DESC, id DESC",
        ItemOrder::CreatedAtAsc => "created_at ASC, id ASC",
        ItemOrder::PriceAsc => "price ASC, id ASC",
        ItemOrder::PriceDesc => "price DESC, id DESC",
    }
}

/// Repository for item database operations.
pub struct ItemRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ItemRepository<'a> {
    /// Create a new item repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// List a page of items.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(
        &self,
        skip: u32,
        first: u32,
        order: ItemOrder,
    ) -> Result<Vec<Item>, RepositoryError> {
        let rows: Vec<ItemRow> = sqlx::query_as(&format!(
            "SELECT {ITEM_COLUMNS} FROM items ORDER BY {} LIMIT $1 OFFSET $2",
            order_by_clause(order)
        ))
        .bind(i64::from(first))
        .bind(i64::from(skip))
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Item::from).collect())
    }

    /// Count all items.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn count(&self) -> Result<i64, RepositoryError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM items")
            .fetch_one(self.pool)
            .await?;
        Ok(count)
    }

    /// Get an item by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_id(&self, id: ItemId) -> Result<Option<Item>, RepositoryError> {
        let row: Option<ItemRow> =
            sqlx::query_as(&format!("SELECT {ITEM_COLUMNS} FROM items WHERE id = $1"))
                .bind(id)
                .fetch_optional(self.pool)
                .await?;

        Ok(row.map(Item::from))
    }

    /// Create an item.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn create(&self, item: &NewItem) -> Result<Item, RepositoryError> {
        let row: ItemRow = sqlx::query_as(&format!(
            "INSERT INTO items (title, description, price, image, large_image, user_id) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             RETURNING {ITEM_COLUMNS}"
        ))
        .bind(&item.title)
        .bind(&item.description)
        .bind(item.price)
        .bind(item.image.as_deref())
        .bind(item.large_image.as_deref())
        .bind(item.user_id)
        .fetch_one(self.pool)
        .await?;

        Ok(Item::from(row))
    }

    /// Apply a partial update.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the item doesn't exist.
    pub async fn update(&self, id: ItemId, changes: &ItemChanges) -> Result<Item, RepositoryError> {
        let row: Option<ItemRow> = sqlx::query_as(&format!(
            "UPDATE items SET \
                 title = COALESCE($1, title), \
                 description = COALESCE($2, description), \
                 price = COALESCE($3, price), \
                 updated_at = now() \
             WHERE id = $4 \
             RETURNING {ITEM_COLUMNS}"
        ))
        .bind(changes.title.as_deref())
        .bind(changes.description.as_deref())
        .bind(changes.price)
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        row.map(Item::from).ok_or(RepositoryError::NotFound)
    }

    /// Delete an item. Cart lines and reviews cascade in the schema.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the item doesn't exist.
    pub async fn delete(&self, id: ItemId) -> Result<Item, RepositoryError> {
        let row: Option<ItemRow> = sqlx::query_as(&format!(
            "DELETE FROM items WHERE id = $1 RETURNING {ITEM_COLUMNS}"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        row.map(Item::from).ok_or(RepositoryError::NotFound)
    }
}
