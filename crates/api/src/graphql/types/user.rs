use async_graphql::{Context, ID, Object};
use chrono::{DateTime, Utc};

use trackytronics_core::{Permission, UserId};

use super::{CartItem, Order};
use crate::error::ApiError;
use crate::graphql::{GraphqlResultExt, identity, state};
use crate::models;
use crate::services::cart::CartService;
use crate::services::orders::OrderService;

/// A registered user. The password hash and reset token are never exposed.
#[derive(Debug, Clone)]
pub struct User {
    inner: models::User,
}

impl From<models::User> for User {
    fn from(user: models::User) -> Self {
        Self { inner: user }
    }
}

impl User {
    /// Load a related user, who must exist; users are never deleted.
    pub(super) async fn load(ctx: &Context<'_>, id: UserId) -> async_graphql::Result<Self> {
        let state = state(ctx)?;
        let user = state.store().user_by_id(id).await.map_err(ApiError::from);
        user.and_then(|user| user.ok_or(ApiError::NotFound("User")))
            .map(Self::from)
            .graphql()
    }
}

#[Object]
impl User {
    async fn id(&self) -> ID {
        ID(self.inner.id.to_string())
    }

    async fn name(&self) -> &str {
        &self.inner.name
    }

    async fn email(&self) -> &str {
        self.inner.email.as_str()
    }

    async fn permissions(&self) -> Vec<Permission> {
        self.inner.permissions.iter().collect()
    }

    /// The user's cart lines. Only visible to the user.
    async fn cart(&self, ctx: &Context<'_>) -> async_graphql::Result<Vec<CartItem>> {
        let state = state(ctx)?;
        let lines = CartService::new(state.store())
            .lines(identity(ctx), self.inner.id)
            .await
            .graphql()?;
        Ok(lines.into_iter().map(CartItem::from).collect())
    }

    /// Orders placed by the user, newest first. Only visible to the user.
    async fn orders(&self, ctx: &Context<'_>) -> async_graphql::Result<Vec<Order>> {
        let state = state(ctx)?;
        let orders = OrderService::new(state.store())
            .list_for(identity(ctx), self.inner.id)
            .await
            .graphql()?;
        Ok(orders.into_iter().map(Order::from).collect())
    }

    async fn created_at(&self) -> DateTime<Utc> {
        self.inner.created_at
    }
}
