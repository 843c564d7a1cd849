use async_graphql::{Context, ID, Object};

use super::Item;
use crate::error::ApiError;
use crate::graphql::{GraphqlResultExt, state};
use crate::models;

/// A line in a user's cart.
#[derive(Debug, Clone)]
pub struct CartItem {
    inner: models::CartItem,
}

impl From<models::CartItem> for CartItem {
    fn from(line: models::CartItem) -> Self {
        Self { inner: line }
    }
}

#[Object]
impl CartItem {
    async fn id(&self) -> ID {
        ID(self.inner.id.to_string())
    }

    async fn quantity(&self) -> i32 {
        self.inner.quantity
    }

    /// The carted item; `null` once the listing has been deleted.
    async fn item(&self, ctx: &Context<'_>) -> async_graphql::Result<Option<Item>> {
        let state = state(ctx)?;
        let item = state
            .store()
            .item_by_id(self.inner.item_id)
            .await
            .map_err(ApiError::from)
            .graphql()?;
        Ok(item.map(Item::from))
    }
}
