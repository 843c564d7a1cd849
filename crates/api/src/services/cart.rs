//! Cart operations.
//!
//! A cart line is `(user, item, quantity)`, at most one per user and item.
//! Quantities never go below zero and a line at zero stays in the cart until
//! removed or checked out.

use tracing::{info, instrument};

use trackytronics_core::{CartItemId, ItemId, UserId};

use super::guard::{OWNER_ONLY, authorize_owner_or_permission, require_authenticated};
use super::session::Identity;
use crate::db::{RepositoryError, Store};
use crate::error::{ApiError, Result};
use crate::models::{CartItem, User};

/// Cart operations.
pub struct CartService<'a> {
    store: &'a dyn Store,
}

impl<'a> CartService<'a> {
    #[must_use]
    pub const fn new(store: &'a dyn Store) -> Self {
        Self { store }
    }

    /// Load the signed-in user and a line they own.
    async fn owned_line(&self, identity: &Identity, id: CartItemId) -> Result<(User, CartItem)> {
        let user_id = require_authenticated(identity)?;
        let actor = self
            .store
            .user_by_id(user_id)
            .await?
            .ok_or(ApiError::Unauthenticated)?;
        let line = self
            .store
            .cart_item_by_id(id)
            .await?
            .ok_or(ApiError::NotFound("Cart item"))?;
        authorize_owner_or_permission(&actor, line.user_id, OWNER_ONLY)?;
        Ok((actor, line))
    }

    /// The cart lines of `owner`, oldest first. Only `owner` may ask.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Unauthenticated` without a session and
    /// `ApiError::Forbidden` when asking for another user's cart.
    pub async fn lines(&self, identity: &Identity, owner: UserId) -> Result<Vec<CartItem>> {
        let user_id = require_authenticated(identity)?;
        let actor = self
            .store
            .user_by_id(user_id)
            .await?
            .ok_or(ApiError::Unauthenticated)?;
        authorize_owner_or_permission(&actor, owner, OWNER_ONLY)?;
        let lines = self.store.cart_lines(owner).await?;
        Ok(lines.into_iter().map(|line| line.cart_item).collect())
    }

    /// Put one more of an item in the caller's cart.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Unauthenticated` without a session and
    /// `ApiError::NotFound` if the item doesn't exist.
    #[instrument(skip(self, identity), fields(item_id = %item_id))]
    pub async fn add(&self, identity: &Identity, item_id: ItemId) -> Result<CartItem> {
        let user_id = require_authenticated(identity)?;
        if self.store.item_by_id(item_id).await?.is_none() {
            return Err(ApiError::NotFound("Item"));
        }

        if let Some(line) = self.store.cart_item_for(user_id, item_id).await? {
            let quantity = line
                .quantity
                .checked_add(1)
                .ok_or_else(|| ApiError::Validation("Quantity too large".to_string()))?;
            return Ok(self.store.set_cart_quantity(line.id, quantity).await?);
        }

        match self.store.create_cart_item(user_id, item_id).await {
            Ok(line) => {
                info!(cart_item_id = %line.id, user_id = %user_id, "Added to cart");
                Ok(line)
            }
            // Another request created the line first; bump it instead.
            Err(RepositoryError::Conflict(_)) => {
                let line = self
                    .store
                    .cart_item_for(user_id, item_id)
                    .await?
                    .ok_or(ApiError::NotFound("Cart item"))?;
                Ok(self
                    .store
                    .set_cart_quantity(line.id, line.quantity.saturating_add(1))
                    .await?)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Remove a line from the caller's cart, returning it.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::NotFound` for a missing line and
    /// `ApiError::Forbidden` for someone else's.
    #[instrument(skip(self, identity), fields(cart_item_id = %id))]
    pub async fn remove(&self, identity: &Identity, id: CartItemId) -> Result<CartItem> {
        let (actor, line) = self.owned_line(identity, id).await?;
        let removed = self.store.delete_cart_item(line.id).await?;
        info!(user_id = %actor.id, "Removed from cart");
        Ok(removed)
    }

    /// Decrement a line's quantity by one, stopping at zero.
    ///
    /// A line already at zero is returned unchanged; it is never deleted here.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::NotFound` for a missing line and
    /// `ApiError::Forbidden` for someone else's.
    #[instrument(skip(self, identity), fields(cart_item_id = %id))]
    pub async fn update_quantity(&self, identity: &Identity, id: CartItemId) -> Result<CartItem> {
        let (_, line) = self.owned_line(identity, id).await?;
        if line.quantity == 0 {
            return Ok(line);
        }
        Ok(self.store.set_cart_quantity(line.id, line.quantity - 1).await?)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use trackytronics_core::{Email, Permission, PermissionSet, Price};

    use super::*;
    use crate::db::MemoryStore;
    use crate::models::{NewItem, NewUser};

    async fn setup() -> (MemoryStore, UserId, UserId, ItemId) {
        let store = MemoryStore::new();
        let mut ids = Vec::new();
        for (email, permissions) in [
            ("owner@x.com", vec![Permission::User]),
            ("admin@x.com", vec![Permission::Admin]),
        ] {
            let user = store
                .create_user(NewUser {
                    name: "U".into(),
                    email: Email::parse(email).unwrap(),
                    password_hash: "hash".into(),
                    permissions: permissions.into_iter().collect::<PermissionSet>(),
                })
                .await
                .unwrap();
            ids.push(user.id);
        }
        let item = store
            .create_item(NewItem {
                title: "Widget".into(),
                description: "A widget".into(),
                price: Price::from_minor_units(1000).unwrap(),
                image: None,
                large_image: None,
                user_id: ids[1],
            })
            .await
            .unwrap();
        (store, ids[0], ids[1], item.id)
    }

    #[tokio::test]
    async fn test_add_increments_existing_line() {
        let (store, owner, _, item) = setup().await;
        let cart = CartService::new(&store);
        let me = Identity::user(owner);

        let first = cart.add(&me, item).await.unwrap();
        let second = cart.add(&me, item).await.unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(second.quantity, 2);
        assert_eq!(store.cart_lines(owner).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_add_missing_item_is_not_found() {
        let (store, owner, _, _) = setup().await;
        let cart = CartService::new(&store);

        let result = cart.add(&Identity::user(owner), ItemId::new(999)).await;

        assert!(matches!(result, Err(ApiError::NotFound("Item"))));
    }

    #[tokio::test]
    async fn test_update_quantity_floors_at_zero() {
        let (store, owner, _, item) = setup().await;
        let cart = CartService::new(&store);
        let me = Identity::user(owner);
        let line = cart.add(&me, item).await.unwrap();

        let once = cart.update_quantity(&me, line.id).await.unwrap();
        let twice = cart.update_quantity(&me, line.id).await.unwrap();

        assert_eq!(once.quantity, 0);
        assert_eq!(twice, once);
        assert!(store.cart_item_by_id(line.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_lines_are_owner_only_even_for_admin() {
        let (store, owner, admin, item) = setup().await;
        let cart = CartService::new(&store);
        let line = cart.add(&Identity::user(owner), item).await.unwrap();

        let update = cart.update_quantity(&Identity::user(admin), line.id).await;
        let remove = cart.remove(&Identity::user(admin), line.id).await;

        assert!(matches!(update, Err(ApiError::Forbidden)));
        assert!(matches!(remove, Err(ApiError::Forbidden)));
        assert_eq!(store.cart_item_by_id(line.id).await.unwrap().unwrap().quantity, 1);
    }

    #[tokio::test]
    async fn test_lines_visible_to_owner_only() {
        let (store, owner, admin, item) = setup().await;
        let cart = CartService::new(&store);
        cart.add(&Identity::user(owner), item).await.unwrap();

        let mine = cart.lines(&Identity::user(owner), owner).await.unwrap();
        let theirs = cart.lines(&Identity::user(admin), owner).await;

        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].item_id, item);
        assert!(matches!(theirs, Err(ApiError::Forbidden)));
    }

    #[tokio::test]
    async fn test_remove_returns_deleted_line() {
        let (store, owner, _, item) = setup().await;
        let cart = CartService::new(&store);
        let me = Identity::user(owner);
        let line = cart.add(&me, item).await.unwrap();

        let removed = cart.remove(&me, line.id).await.unwrap();

        assert_eq!(removed.id, line.id);
        assert!(matches!(
            cart.remove(&me, line.id).await,
            Err(ApiError::NotFound(_))
        ));
    }
}
