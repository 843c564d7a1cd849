use async_graphql::{Context, ID, Object};
use chrono::{DateTime, Utc};

use super::User;
use crate::models;

#[derive(Debug, Clone)]
pub struct Review {
    inner: models::Review,
}

impl From<models::Review> for Review {
    fn from(review: models::Review) -> Self {
        Self { inner: review }
    }
}

#[Object]
impl Review {
    async fn id(&self) -> ID {
        ID(self.inner.id.to_string())
    }

    async fn text(&self) -> &str {
        &self.inner.text
    }

    /// 1 to 5.
    async fn rating(&self) -> i32 {
        self.inner.rating
    }

    async fn author(&self, ctx: &Context<'_>) -> async_graphql::Result<User> {
        User::load(ctx, self.inner.author_id).await
    }

    async fn created_at(&self) -> DateTime<Utc> {
        self.inner.created_at
    }
}
