//! `PostgreSQL`-backed [`Store`].

use async_trait::async_trait;
use sqlx::PgPool;

use trackytronics_core::{CartItemId, Email, ItemId, OrderId, PermissionSet, UserId};

use super::cart::CartRepository;
use super::items::ItemRepository;
use super::orders::OrderRepository;
use super::reviews::ReviewRepository;
use super::users::UserRepository;
use super::{RepositoryError, Store};
use crate::models::{
    CartItem, CartLine, Item, ItemChanges, ItemOrder, NewItem, NewOrder, NewReview, NewUser,
    Order, PasswordReset, Review, User,
};

/// [`Store`] over a sqlx connection pool.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// The underlying pool, for migrations and admin tooling.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl Store for PgStore {
    async fn ping(&self) -> Result<(), RepositoryError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn user_by_id(&self, id: UserId) -> Result<Option<User>, RepositoryError> {
        UserRepository::new(&self.pool).get_by_id(id).await
    }

    async fn user_by_email(&self, email: &Email) -> Result<Option<User>, RepositoryError> {
        UserRepository::new(&self.pool).get_by_email(email).await
    }

    async fn user_by_reset_token(&self, token: &str) -> Result<Option<User>, RepositoryError> {
        UserRepository::new(&self.pool).get_by_reset_token(token).await
    }

    async fn list_users(&self) -> Result<Vec<User>, RepositoryError> {
        UserRepository::new(&self.pool).list().await
    }

    async fn create_user(&self, user: NewUser) -> Result<User, RepositoryError> {
        UserRepository::new(&self.pool).create(&user).await
    }

    async fn set_password_reset(
        &self,
        id: UserId,
        reset: Option<&PasswordReset>,
    ) -> Result<(), RepositoryError> {
        UserRepository::new(&self.pool).set_reset(id, reset).await
    }

    async fn update_password(
        &self,
        id: UserId,
        password_hash: &str,
    ) -> Result<User, RepositoryError> {
        UserRepository::new(&self.pool)
            .update_password(id, password_hash)
            .await
    }

    async fn set_permissions(
        &self,
        id: UserId,
        permissions: &PermissionSet,
    ) -> Result<User, RepositoryError> {
        UserRepository::new(&self.pool)
            .set_permissions(id, permissions)
            .await
    }

    async fn list_items(
        &self,
        skip: u32,
        first: u32,
        order: ItemOrder,
    ) -> Result<Vec<Item>, RepositoryError> {
        ItemRepository::new(&self.pool).list(skip, first, order).await
    }

    async fn count_items(&self) -> Result<i64, RepositoryError> {
        ItemRepository::new(&self.pool).count().await
    }

    async fn item_by_id(&self, id: ItemId) -> Result<Option<Item>, RepositoryError> {
        ItemRepository::new(&self.pool).get_by_id(id).await
    }

    async fn create_item(&self, item: NewItem) -> Result<Item, RepositoryError> {
        ItemRepository::new(&self.pool).create(&item).await
    }

    async fn update_item(
        &self,
        id: ItemId,
        changes: &ItemChanges,
    ) -> Result<Item, RepositoryError> {
        ItemRepository::new(&self.pool).update(id, changes).await
    }

    async fn delete_item(&self, id: ItemId) -> Result<Item, RepositoryError> {
        ItemRepository::new(&self.pool).delete(id).await
    }

    async fn cart_item_by_id(&self, id: CartItemId) -> Result<Option<CartItem>, RepositoryError> {
        CartRepository::new(&self.pool).get_by_id(id).await
    }

    async fn cart_item_for(
        &self,
        user_id: UserId,
        item_id: ItemId,
    ) -> Result<Option<CartItem>, RepositoryError> {
        CartRepository::new(&self.pool).get_for(user_id, item_id).await
    }

    async fn create_cart_item(
        &self,
        user_id: UserId,
        item_id: ItemId,
    ) -> Result<CartItem, RepositoryError> {
        CartRepository::new(&self.pool).create(user_id, item_id).await
    }

    async fn set_cart_quantity(
        &self,
        id: CartItemId,
        quantity: i32,
    ) -> Result<CartItem, RepositoryError> {
        CartRepository::new(&self.pool)
            .set_quantity(id, quantity)
            .await
    }

    async fn delete_cart_item(&self, id: CartItemId) -> Result<CartItem, RepositoryError> {
        CartRepository::new(&self.pool).delete(id).await
    }

    async fn delete_cart_items(&self, ids: &[CartItemId]) -> Result<u64, RepositoryError> {
        CartRepository::new(&self.pool).delete_many(ids).await
    }

    async fn cart_lines(&self, user_id: UserId) -> Result<Vec<CartLine>, RepositoryError> {
        CartRepository::new(&self.pool).lines_for_user(user_id).await
    }

    async fn create_order(&self, order: NewOrder) -> Result<Order, RepositoryError> {
        OrderRepository::new(&self.pool).create(&order).await
    }

    async fn order_by_id(&self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        OrderRepository::new(&self.pool).get_by_id(id).await
    }

    async fn orders_for_user(&self, user_id: UserId) -> Result<Vec<Order>, RepositoryError> {
        OrderRepository::new(&self.pool).list_for_user(user_id).await
    }

    async fn create_review(&self, review: NewReview) -> Result<Review, RepositoryError> {
        ReviewRepository::new(&self.pool).create(&review).await
    }

    async fn reviews_for_item(&self, item_id: ItemId) -> Result<Vec<Review>, RepositoryError> {
        ReviewRepository::new(&self.pool).list_for_item(item_id).await
    }
}
