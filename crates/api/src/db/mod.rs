//! Persistence layer.
//!
//! Every resolver and workflow reaches the data through the [`Store`] trait,
//! which has two implementations:
//!
//! - [`PgStore`] - `PostgreSQL` via sqlx, used by the server binary
//! - [`MemoryStore`] - in-process tables, used by tests and local experiments
//!
//! # Tables
//!
//! - `users` - Accounts, permission tags, outstanding reset token
//! - `items` - Listings, owned by a seller
//! - `cart_items` - (user, item, quantity) lines
//! - `orders` / `order_items` - Completed purchases and their line snapshots
//! - `reviews` - Item reviews
//!
//! # Migrations
//!
//! Migrations are stored in `crates/api/migrations/` and run via:
//! ```bash
//! cargo run -p trackytronics-cli -- migrate
//! ```

pub mod cart;
pub mod items;
pub mod memory;
pub mod orders;
pub mod postgres;
pub mod reviews;
pub mod users;

use std::time::Duration;

use async_trait::async_trait;
use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

use trackytronics_core::{
    CartItemId, Email, ItemId, OrderId, PermissionSet, UserId,
};

use crate::models::{
    CartItem, CartLine, Item, ItemChanges, ItemOrder, NewItem, NewOrder, NewReview, NewUser,
    Order, PasswordReset, Review, User,
};

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., unique email).
    #[error("constraint violation: {0}")]
    Conflict(String),
}

/// Map a unique-violation into `RepositoryError::Conflict`.
pub(crate) fn conflict_on_unique(e: sqlx::Error, what: &str) -> RepositoryError {
    if let sqlx::Error::Database(ref db_err) = e
        && db_err.is_unique_violation()
    {
        return RepositoryError::Conflict(format!("{what} already exists"));
    }
    RepositoryError::Database(e)
}

/// The data store behind every resolver.
///
/// Methods returning a single entity by ID return `Ok(None)` when it does not
/// exist; mutations of a missing entity return `RepositoryError::NotFound`.
#[async_trait]
pub trait Store: Send + Sync {
    /// Check that the store is reachable.
    async fn ping(&self) -> Result<(), RepositoryError>;

    // Users
    async fn user_by_id(&self, id: UserId) -> Result<Option<User>, RepositoryError>;
    async fn user_by_email(&self, email: &Email) -> Result<Option<User>, RepositoryError>;
    async fn user_by_reset_token(&self, token: &str) -> Result<Option<User>, RepositoryError>;
    async fn list_users(&self) -> Result<Vec<User>, RepositoryError>;
    /// Returns `RepositoryError::Conflict` if the email is taken.
    async fn create_user(&self, user: NewUser) -> Result<User, RepositoryError>;
    /// Store or clear the user's outstanding reset token.
    async fn set_password_reset(
        &self,
        id: UserId,
        reset: Option<&PasswordReset>,
    ) -> Result<(), RepositoryError>;
    /// Replace the password hash and clear any outstanding reset token.
    async fn update_password(&self, id: UserId, password_hash: &str)
    -> Result<User, RepositoryError>;
    async fn set_permissions(
        &self,
        id: UserId,
        permissions: &PermissionSet,
    ) -> Result<User, RepositoryError>;

    // Items
    async fn list_items(
        &self,
        skip: u32,
        first: u32,
        order: ItemOrder,
    ) -> Result<Vec<Item>, RepositoryError>;
    async fn count_items(&self) -> Result<i64, RepositoryError>;
    async fn item_by_id(&self, id: ItemId) -> Result<Option<Item>, RepositoryError>;
    async fn create_item(&self, item: NewItem) -> Result<Item, RepositoryError>;
    async fn update_item(&self, id: ItemId, changes: &ItemChanges)
    -> Result<Item, RepositoryError>;
    /// Delete an item together with the cart lines and reviews that reference it.
    async fn delete_item(&self, id: ItemId) -> Result<Item, RepositoryError>;

    // Cart
    async fn cart_item_by_id(&self, id: CartItemId) -> Result<Option<CartItem>, RepositoryError>;
    async fn cart_item_for(
        &self,
        user_id: UserId,
        item_id: ItemId,
    ) -> Result<Option<CartItem>, RepositoryError>;
    /// Create a line at quantity 1.
    async fn create_cart_item(
        &self,
        user_id: UserId,
        item_id: ItemId,
    ) -> Result<CartItem, RepositoryError>;
    async fn set_cart_quantity(
        &self,
        id: CartItemId,
        quantity: i32,
    ) -> Result<CartItem, RepositoryError>;
    async fn delete_cart_item(&self, id: CartItemId) -> Result<CartItem, RepositoryError>;
    /// Delete the given lines; returns how many existed.
    async fn delete_cart_items(&self, ids: &[CartItemId]) -> Result<u64, RepositoryError>;
    /// The user's cart lines joined with their items, oldest first.
    async fn cart_lines(&self, user_id: UserId) -> Result<Vec<CartLine>, RepositoryError>;

    // Orders
    async fn create_order(&self, order: NewOrder) -> Result<Order, RepositoryError>;
    async fn order_by_id(&self, id: OrderId) -> Result<Option<Order>, RepositoryError>;
    /// The user's orders, newest first.
    async fn orders_for_user(&self, user_id: UserId) -> Result<Vec<Order>, RepositoryError>;

    // Reviews
    async fn create_review(&self, review: NewReview) -> Result<Review, RepositoryError>;
    async fn reviews_for_item(&self, item_id: ItemId) -> Result<Vec<Review>, RepositoryError>;
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Arguments
///
/// * `database_url` - `PostgreSQL` connection string (wrapped in `SecretString`)
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}
