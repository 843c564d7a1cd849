use async_graphql::{Context, Enum, ID, Object};
use chrono::{DateTime, Utc};

use super::{Review, User};
use crate::graphql::{GraphqlResultExt, state};
use crate::models::{self, ItemOrder};
use crate::services::items::ItemService;

/// Sort order accepted by `items`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Enum)]
pub enum ItemOrderBy {
    #[graphql(name = "createdAt_DESC")]
    CreatedAtDesc,
    #[graphql(name = "createdAt_ASC")]
    CreatedAtAsc,
    #[graphql(name = "price_ASC")]
    PriceAsc,
    #[graphql(name = "price_DESC")]
    PriceDesc,
}

impl From<ItemOrderBy> for ItemOrder {
    fn from(order: ItemOrderBy) -> Self {
        match order {
            ItemOrderBy::CreatedAtDesc => Self::CreatedAtDesc,
            ItemOrderBy::CreatedAtAsc => Self::CreatedAtAsc,
            ItemOrderBy::PriceAsc => Self::PriceAsc,
            ItemOrderBy::PriceDesc => Self::PriceDesc,
        }
    }
}

/// An item listed for sale.
#[derive(Debug, Clone)]
pub struct Item {
    inner: models::Item,
}

impl From<models::Item> for Item {
    fn from(item: models::Item) -> Self {
        Self { inner: item }
    }
}

#[Object]
impl Item {
    async fn id(&self) -> ID {
        ID(self.inner.id.to_string())
    }

    async fn title(&self) -> &str {
        &self.inner.title
    }

    async fn description(&self) -> &str {
        &self.inner.description
    }

    /// Price in minor currency units (cents).
    async fn price(&self) -> i64 {
        self.inner.price.minor_units()
    }

    async fn image(&self) -> Option<&str> {
        self.inner.image.as_deref()
    }

    async fn large_image(&self) -> Option<&str> {
        self.inner.large_image.as_deref()
    }

    /// The seller.
    async fn user(&self, ctx: &Context<'_>) -> async_graphql::Result<User> {
        User::load(ctx, self.inner.user_id).await
    }

    /// Reviews of this item, newest first.
    async fn reviews(&self, ctx: &Context<'_>) -> async_graphql::Result<Vec<Review>> {
        let state = state(ctx)?;
        let reviews = ItemService::new(state.store())
            .reviews(self.inner.id)
            .await
            .graphql()?;
        Ok(reviews.into_iter().map(Review::from).collect())
    }

    async fn created_at(&self) -> DateTime<Utc> {
        self.inner.created_at
    }

    async fn updated_at(&self) -> DateTime<Utc> {
        self.inner.updated_at
    }
}
