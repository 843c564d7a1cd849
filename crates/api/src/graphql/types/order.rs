use async_graphql::{Context, ID, Object};
use chrono::{DateTime, Utc};

use super::User;
use crate::models;

/// A completed purchase.
#[derive(Debug, Clone)]
pub struct Order {
    inner: models::Order,
}

impl From<models::Order> for Order {
    fn from(order: models::Order) -> Self {
        Self { inner: order }
    }
}

#[Object]
impl Order {
    async fn id(&self) -> ID {
        ID(self.inner.id.to_string())
    }

    /// Total charged, in minor currency units.
    async fn total(&self) -> i64 {
        self.inner.total.minor_units()
    }

    async fn currency(&self) -> &'static str {
        self.inner.currency.as_str()
    }

    /// Payment processor charge ID.
    async fn charge(&self) -> &str {
        &self.inner.charge_id
    }

    async fn items(&self) -> Vec<OrderItem> {
        self.inner.items.iter().cloned().map(OrderItem::from).collect()
    }

    async fn user(&self, ctx: &Context<'_>) -> async_graphql::Result<User> {
        User::load(ctx, self.inner.user_id).await
    }

    async fn created_at(&self) -> DateTime<Utc> {
        self.inner.created_at
    }
}

/// A purchased line, as it was at checkout.
#[derive(Debug, Clone)]
pub struct OrderItem {
    inner: models::OrderItem,
}

impl From<models::OrderItem> for OrderItem {
    fn from(line: models::OrderItem) -> Self {
        Self { inner: line }
    }
}

#[Object]
impl OrderItem {
    async fn id(&self) -> ID {
        ID(self.inner.id.to_string())
    }

    async fn title(&self) -> &str {
        &self.inner.title
    }

    async fn description(&self) -> &str {
        &self.inner.description
    }

    async fn image(&self) -> Option<&str> {
        self.inner.image.as_deref()
    }

    async fn large_image(&self) -> Option<&str> {
        self.inner.large_image.as_deref()
    }

    async fn price(&self) -> i64 {
        self.inner.price.minor_units()
    }

    async fn quantity(&self) -> i32 {
        self.inner.quantity
    }
}
