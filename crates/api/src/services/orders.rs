//! Order reads. Orders are only ever visible to the user who placed them.

use tracing::instrument;

use trackytronics_core::{OrderId, UserId};

use super::guard::{OWNER_ONLY, authorize_owner_or_permission, require_authenticated};
use super::session::Identity;
use crate::db::Store;
use crate::error::{ApiError, Result};
use crate::models::{Order, User};

pub struct OrderService<'a> {
    store: &'a dyn Store,
}

impl<'a> OrderService<'a> {
    #[must_use]
    pub const fn new(store: &'a dyn Store) -> Self {
        Self { store }
    }

    async fn actor(&self, identity: &Identity) -> Result<User> {
        let user_id = require_authenticated(identity)?;
        self.store
            .user_by_id(user_id)
            .await?
            .ok_or(ApiError::Unauthenticated)
    }

    /// One order, if the caller placed it.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::NotFound` for a missing order and
    /// `ApiError::Forbidden` for someone else's.
    #[instrument(skip(self, identity), fields(order_id = %id))]
    pub async fn get(&self, identity: &Identity, id: OrderId) -> Result<Order> {
        let actor = self.actor(identity).await?;
        let order = self
            .store
            .order_by_id(id)
            .await?
            .ok_or(ApiError::NotFound("Order"))?;
        authorize_owner_or_permission(&actor, order.user_id, OWNER_ONLY)?;
        Ok(order)
    }

    /// All orders placed by `owner`, newest first. Only `owner` may ask.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Unauthenticated` without a session and
    /// `ApiError::Forbidden` when asking for another user's orders.
    pub async fn list_for(&self, identity: &Identity, owner: UserId) -> Result<Vec<Order>> {
        let actor = self.actor(identity).await?;
        authorize_owner_or_permission(&actor, owner, OWNER_ONLY)?;
        Ok(self.store.orders_for_user(owner).await?)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use trackytronics_core::{CurrencyCode, Email, Permission, PermissionSet, Price};

    use super::*;
    use crate::db::MemoryStore;
    use crate::models::{NewOrder, NewOrderLine, NewUser};

    async fn user(store: &MemoryStore, email: &str, permissions: &[Permission]) -> UserId {
        store
            .create_user(NewUser {
                name: "U".to_owned(),
                email: Email::parse(email).unwrap(),
                password_hash: "hash".to_owned(),
                permissions: permissions.iter().copied().collect::<PermissionSet>(),
            })
            .await
            .unwrap()
            .id
    }

    async fn order(store: &MemoryStore, owner: UserId, charge: &str) -> Order {
        store
            .create_order(NewOrder {
                user_id: owner,
                total: Price::from_minor_units(500).unwrap(),
                currency: CurrencyCode::EUR,
                charge_id: charge.to_owned(),
                lines: vec![NewOrderLine {
                    title: "Tracker".to_owned(),
                    description: "GPS".to_owned(),
                    image: None,
                    large_image: None,
                    price: Price::from_minor_units(500).unwrap(),
                    quantity: 1,
                }],
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_order_is_owner_only_even_for_admin() {
        let store = MemoryStore::new();
        let owner = user(&store, "o@x.com", &[Permission::User]).await;
        let admin = user(&store, "a@x.com", &[Permission::Admin]).await;
        let placed = order(&store, owner, "ch_1").await;
        let orders = OrderService::new(&store);

        assert_eq!(
            orders.get(&Identity::user(owner), placed.id).await.unwrap().charge_id,
            "ch_1"
        );
        assert!(matches!(
            orders.get(&Identity::user(admin), placed.id).await,
            Err(ApiError::Forbidden)
        ));
        assert!(matches!(
            orders.get(&Identity::anonymous(), placed.id).await,
            Err(ApiError::Unauthenticated)
        ));
    }

    #[tokio::test]
    async fn test_missing_order_is_not_found() {
        let store = MemoryStore::new();
        let owner = user(&store, "o@x.com", &[Permission::User]).await;

        let result = OrderService::new(&store)
            .get(&Identity::user(owner), OrderId::new(42))
            .await;

        assert!(matches!(result, Err(ApiError::NotFound("Order"))));
    }

    #[tokio::test]
    async fn test_list_for_newest_first() {
        let store = MemoryStore::new();
        let owner = user(&store, "o@x.com", &[Permission::User]).await;
        let other = user(&store, "p@x.com", &[Permission::User]).await;
        order(&store, owner, "ch_1").await;
        order(&store, owner, "ch_2").await;
        order(&store, other, "ch_3").await;
        let orders = OrderService::new(&store);

        let mine = orders.list_for(&Identity::user(owner), owner).await.unwrap();

        let charges: Vec<_> = mine.iter().map(|o| o.charge_id.as_str()).collect();
        assert_eq!(charges, ["ch_2", "ch_1"]);
        assert!(matches!(
            orders.list_for(&Identity::user(other), owner).await,
            Err(ApiError::Forbidden)
        ));
    }
}
