//! Review repository for database operations.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use trackytronics_core::{ItemId, ReviewId, UserId};

use super::RepositoryError;
use crate::models::{NewReview, Review};

const REVIEW_COLUMNS: &str = "id, author_id, item_id, text, rating, created_at";

#[derive(sqlx::FromRow)]
struct ReviewRow {
    id: ReviewId,
    author_id: UserId,
    item_id: ItemId,
    text: String,
    rating: i32,
    created_at: DateTime<Utc>,
}

impl From<ReviewRow> for Review {
    fn from(row: ReviewRow) -> Self {
        Self {
            id: row.id,
            author_id: row.author_id,
            item_id: row.item_id,
            text: row.text,
            rating: row.rating,
            created_at: row.created_at,
        }
    }
}

/// Repository for review database operations.
pub struct ReviewRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ReviewRepository<'a> {
    /// Create a new review repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Create a review.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the item no longer exists.
    pub async fn create(&self, review: &NewReview) -> Result<Review, RepositoryError> {
        let row: ReviewRow = sqlx::query_as(&format!(
            "INSERT INTO reviews (author_id, item_id, text, rating) \
             VALUES ($1, $2, $3, $4) \
             RETURNING {REVIEW_COLUMNS}"
        ))
        .bind(review.author_id)
        .bind(review.item_id)
        .bind(&review.text)
        .bind(review.rating)
        .fetch_one(self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db_err) if db_err.is_foreign_key_violation() => {
                RepositoryError::NotFound
            }
            other => RepositoryError::Database(other),
        })?;

        Ok(Review::from(row))
    }

    /// Reviews for an item, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_for_item(&self, item_id: ItemId) -> Result<Vec<Review>, RepositoryError> {
        let rows: Vec<ReviewRow> = sqlx::query_as(&format!(
            "SELECT {REVIEW_COLUMNS} FROM reviews WHERE item_id = $1 \
             ORDER BY created_at DESC, id DESC"
        ))
        .bind(item_id)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Review::from).collect())
    }
}
