//! Item listings and their reviews.

use tracing::{info, instrument};

use trackytronics_core::{ItemId, Price};

use super::guard::{
    ITEM_DELETE_PERMISSIONS, ITEM_UPDATE_PERMISSIONS, authorize_owner_or_permission,
    require_authenticated,
};
use super::session::Identity;
use crate::config::MAX_PAGE_SIZE;
use crate::db::Store;
use crate::error::{ApiError, Result};
use crate::models::{Item, ItemChanges, ItemOrder, NewItem, NewReview, Review, User};

/// Fields accepted when listing a new item.
#[derive(Debug, Clone)]
pub struct ItemDraft {
    pub title: String,
    pub description: String,
    pub price: i64,
    pub image: Option<String>,
    pub large_image: Option<String>,
}

/// Clamp a requested page size: `None` means `default`, and nothing exceeds
/// [`MAX_PAGE_SIZE`].
#[must_use]
pub fn page_size(requested: Option<i32>, default: u32) -> u32 {
    requested
        .map_or(default, |n| u32::try_from(n).unwrap_or(0))
        .min(MAX_PAGE_SIZE)
}

fn parse_price(minor_units: i64) -> Result<Price> {
    Price::from_minor_units(minor_units).map_err(|e| ApiError::Validation(e.to_string()))
}

fn require_text(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(ApiError::Validation(format!("{field} is required")));
    }
    Ok(())
}

/// Item operations.
pub struct ItemService<'a> {
    store: &'a dyn Store,
}

impl<'a> ItemService<'a> {
    #[must_use]
    pub const fn new(store: &'a dyn Store) -> Self {
        Self { store }
    }

    /// A page of items.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Repository` if the store fails.
    pub async fn list(&self, skip: Option<i32>, first: u32, order: ItemOrder) -> Result<Vec<Item>> {
        let skip = skip.map_or(0, |n| u32::try_from(n).unwrap_or(0));
        Ok(self.store.list_items(skip, first, order).await?)
    }

    /// An item by ID, if it exists.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Repository` if the store fails.
    pub async fn get(&self, id: ItemId) -> Result<Option<Item>> {
        Ok(self.store.item_by_id(id).await?)
    }

    /// Total number of items.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Repository` if the store fails.
    pub async fn count(&self) -> Result<i64> {
        Ok(self.store.count_items().await?)
    }

    /// Load the signed-in user, who must still exist.
    async fn actor(&self, identity: &Identity) -> Result<User> {
        let user_id = require_authenticated(identity)?;
        self.store
            .user_by_id(user_id)
            .await?
            .ok_or(ApiError::Unauthenticated)
    }

    /// List a new item for sale by the caller.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Unauthenticated` without a session, or
    /// `ApiError::Validation` for a negative price or blank title.
    #[instrument(skip(self, identity, draft), fields(title = %draft.title))]
    pub async fn create(&self, identity: &Identity, draft: ItemDraft) -> Result<Item> {
        let seller = require_authenticated(identity)?;
        require_text("Title", &draft.title)?;
        let price = parse_price(draft.price)?;

        let item = self
            .store
            .create_item(NewItem {
                title: draft.title,
                description: draft.description,
                price,
                image: draft.image,
                large_image: draft.large_image,
                user_id: seller,
            })
            .await?;

        info!(item_id = %item.id, user_id = %seller, "Item created");
        Ok(item)
    }

    /// Edit the supplied fields of an item.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::NotFound` for a missing item and `ApiError::Forbidden`
    /// unless the caller owns it or holds `ADMIN`/`ITEMUPDATE`.
    #[instrument(skip(self, identity, title, description), fields(item_id = %id))]
    pub async fn edit(
        &self,
        identity: &Identity,
        id: ItemId,
        title: Option<String>,
        description: Option<String>,
        price: Option<i64>,
    ) -> Result<Item> {
        let actor = self.actor(identity).await?;
        let item = self
            .store
            .item_by_id(id)
            .await?
            .ok_or(ApiError::NotFound("Item"))?;
        authorize_owner_or_permission(&actor, item.user_id, ITEM_UPDATE_PERMISSIONS)?;

        if let Some(title) = &title {
            require_text("Title", title)?;
        }
        let changes = ItemChanges {
            title,
            description,
            price: price.map(parse_price).transpose()?,
        };
        if changes.is_empty() {
            return Ok(item);
        }

        let updated = self.store.update_item(id, &changes).await?;
        info!(user_id = %actor.id, "Item updated");
        Ok(updated)
    }

    /// Delete an item, returning it.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::NotFound` for a missing item and `ApiError::Forbidden`
    /// unless the caller owns it or holds `ADMIN`/`ITEMDELETE`.
    #[instrument(skip(self, identity), fields(item_id = %id))]
    pub async fn delete(&self, identity: &Identity, id: ItemId) -> Result<Item> {
        let actor = self.actor(identity).await?;
        let item = self
            .store
            .item_by_id(id)
            .await?
            .ok_or(ApiError::NotFound("Item"))?;
        authorize_owner_or_permission(&actor, item.user_id, ITEM_DELETE_PERMISSIONS)?;

        let deleted = self.store.delete_item(id).await?;
        info!(user_id = %actor.id, "Item deleted");
        Ok(deleted)
    }

    /// Review an item.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Validation` unless `rating` is 1 to 5, and
    /// `ApiError::NotFound` for a missing item.
    #[instrument(skip(self, identity, text), fields(item_id = %item_id))]
    pub async fn add_review(
        &self,
        identity: &Identity,
        item_id: ItemId,
        text: String,
        rating: i32,
    ) -> Result<Review> {
        let author = require_authenticated(identity)?;
        if !(1..=5).contains(&rating) {
            return Err(ApiError::Validation(
                "Rating must be between 1 and 5".to_string(),
            ));
        }
        if self.store.item_by_id(item_id).await?.is_none() {
            return Err(ApiError::NotFound("Item"));
        }

        let review = self
            .store
            .create_review(NewReview {
                author_id: author,
                item_id,
                text,
                rating,
            })
            .await?;

        info!(review_id = %review.id, user_id = %author, "Review added");
        Ok(review)
    }

    /// Reviews of an item, newest first.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Repository` if the store fails.
    pub async fn reviews(&self, item_id: ItemId) -> Result<Vec<Review>> {
        Ok(self.store.reviews_for_item(item_id).await?)
    }
}
