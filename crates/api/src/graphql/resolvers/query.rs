use async_graphql::{Context, ID, Object};

use trackytronics_core::{ItemId, OrderId};

use crate::error::ApiError;
use crate::graphql::types::{Item, ItemAggregate, ItemConnection, ItemOrderBy, Order, User};
use crate::graphql::{GraphqlResultExt, identity, parse_id, state};
use crate::models::ItemOrder;
use crate::services::guard::require_authenticated;
use crate::services::items::{ItemService, page_size};
use crate::services::orders::OrderService;

/// Root query object.
pub struct Query;

#[Object]
impl Query {
    /// A page of items. `first` defaults to the configured page size and is
    /// capped at 100.
    async fn items(
        &self,
        ctx: &Context<'_>,
        skip: Option<i32>,
        first: Option<i32>,
        order_by: Option<ItemOrderBy>,
    ) -> async_graphql::Result<Vec<Item>> {
        let state = state(ctx)?;
        let first = page_size(first, state.config().page_size);
        let order = order_by.map(ItemOrder::from).unwrap_or_default();
        let items = ItemService::new(state.store())
            .list(skip, first, order)
            .await
            .graphql()?;
        Ok(items.into_iter().map(Item::from).collect())
    }

    async fn item(&self, ctx: &Context<'_>, id: ID) -> async_graphql::Result<Option<Item>> {
        let state = state(ctx)?;
        let id: ItemId = parse_id(&id).graphql()?;
        let item = ItemService::new(state.store()).get(id).await.graphql()?;
        Ok(item.map(Item::from))
    }

    async fn items_connection(&self, ctx: &Context<'_>) -> async_graphql::Result<ItemConnection> {
        let state = state(ctx)?;
        let count = ItemService::new(state.store()).count().await.graphql()?;
        Ok(ItemConnection {
            aggregate: ItemAggregate { count },
        })
    }

    async fn users(&self, ctx: &Context<'_>) -> async_graphql::Result<Vec<User>> {
        let state = state(ctx)?;
        let users = state
            .store()
            .list_users()
            .await
            .map_err(ApiError::from)
            .graphql()?;
        Ok(users.into_iter().map(User::from).collect())
    }

    /// The signed-in user, or `null` without a session.
    async fn me(&self, ctx: &Context<'_>) -> async_graphql::Result<Option<User>> {
        let Some(user_id) = identity(ctx).user_id() else {
            return Ok(None);
        };
        let state = state(ctx)?;
        let user = state
            .store()
            .user_by_id(user_id)
            .await
            .map_err(ApiError::from)
            .graphql()?;
        Ok(user.map(User::from))
    }

    /// One of the caller's orders.
    async fn order(&self, ctx: &Context<'_>, id: ID) -> async_graphql::Result<Order> {
        let state = state(ctx)?;
        let id: OrderId = parse_id(&id).graphql()?;
        let order = OrderService::new(state.store())
            .get(identity(ctx), id)
            .await
            .graphql()?;
        Ok(order.into())
    }

    /// The caller's orders, newest first.
    async fn orders(&self, ctx: &Context<'_>) -> async_graphql::Result<Vec<Order>> {
        let state = state(ctx)?;
        let identity = identity(ctx);
        let user_id = require_authenticated(identity).graphql()?;
        let orders = OrderService::new(state.store())
            .list_for(identity, user_id)
            .await
            .graphql()?;
        Ok(orders.into_iter().map(Order::from).collect())
    }
}
