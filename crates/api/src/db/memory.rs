//! In-process [`Store`] for tests and local experiments.
//!
//! All tables live behind one lock so the multi-table operations (item
//! deletion cascading into carts and reviews, order plus lines) stay atomic,
//! just as they are in `PostgreSQL`.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use tracing::debug;

use trackytronics_core::{
    CartItemId, Email, ItemId, OrderId, OrderItemId, PermissionSet, ReviewId, UserId,
};

use super::{RepositoryError, Store};
use crate::models::{
    CartItem, CartLine, Item, ItemChanges, ItemOrder, NewItem, NewOrder, NewReview, NewUser,
    Order, OrderItem, PasswordReset, Review, User,
};

/// A write the store can be told to reject, to exercise failure paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailPoint {
    CreateOrder,
    DeleteCartItems,
}

#[derive(Default)]
struct Tables {
    users: BTreeMap<UserId, User>,
    items: BTreeMap<ItemId, Item>,
    cart_items: BTreeMap<CartItemId, CartItem>,
    orders: BTreeMap<OrderId, Order>,
    reviews: BTreeMap<ReviewId, Review>,
    next_id: i32,
    fail_point: Option<FailPoint>,
}

impl Tables {
    fn next_id(&mut self) -> i32 {
        self.next_id += 1;
        self.next_id
    }

    fn check(&self, point: FailPoint) -> Result<(), RepositoryError> {
        if self.fail_point == Some(point) {
            return Err(RepositoryError::Database(sqlx::Error::PoolClosed));
        }
        Ok(())
    }
}

/// [`Store`] kept entirely in memory.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent write at `point` fail until cleared with `None`.
    pub async fn set_fail_point(&self, point: Option<FailPoint>) {
        self.tables.write().await.fail_point = point;
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn ping(&self) -> Result<(), RepositoryError> {
        Ok(())
    }

    async fn user_by_id(&self, id: UserId) -> Result<Option<User>, RepositoryError> {
        Ok(self.tables.read().await.users.get(&id).cloned())
    }

    async fn user_by_email(&self, email: &Email) -> Result<Option<User>, RepositoryError> {
        let tables = self.tables.read().await;
        Ok(tables.users.values().find(|u| &u.email == email).cloned())
    }

    async fn user_by_reset_token(&self, token: &str) -> Result<Option<User>, RepositoryError> {
        let tables = self.tables.read().await;
        Ok(tables
            .users
            .values()
            .find(|u| u.reset.as_ref().is_some_and(|r| r.token == token))
            .cloned())
    }

    async fn list_users(&self) -> Result<Vec<User>, RepositoryError> {
        Ok(self.tables.read().await.users.values().cloned().collect())
    }

    async fn create_user(&self, user: NewUser) -> Result<User, RepositoryError> {
        let mut tables = self.tables.write().await;
        if tables.users.values().any(|u| u.email == user.email) {
            return Err(RepositoryError::Conflict("email already exists".to_owned()));
        }

        let now = Utc::now();
        let created = User {
            id: UserId::new(tables.next_id()),
            name: user.name,
            email: user.email,
            password_hash: user.password_hash,
            permissions: user.permissions,
            reset: None,
            created_at: now,
            updated_at: now,
        };
        tables.users.insert(created.id, created.clone());

        debug!(user_id = %created.id, "Created user");
        Ok(created)
    }

    async fn set_password_reset(
        &self,
        id: UserId,
        reset: Option<&PasswordReset>,
    ) -> Result<(), RepositoryError> {
        let mut tables = self.tables.write().await;
        let user = tables.users.get_mut(&id).ok_or(RepositoryError::NotFound)?;
        user.reset = reset.cloned();
        user.updated_at = Utc::now();
        Ok(())
    }

    async fn update_password(
        &self,
        id: UserId,
        password_hash: &str,
    ) -> Result<User, RepositoryError> {
        let mut tables = self.tables.write().await;
        let user = tables.users.get_mut(&id).ok_or(RepositoryError::NotFound)?;
        password_hash.clone_into(&mut user.password_hash);
        user.reset = None;
        user.updated_at = Utc::now();
        Ok(user.clone())
    }

    async fn set_permissions(
        &self,
        id: UserId,
        permissions: &PermissionSet,
    ) -> Result<User, RepositoryError> {
        let mut tables = self.tables.write().await;
        let user = tables.users.get_mut(&id).ok_or(RepositoryError::NotFound)?;
        user.permissions = permissions.clone();
        user.updated_at = Utc::now();
        Ok(user.clone())
    }

    async fn list_items(
        &self,
        skip: u32,
        first: u32,
        order: ItemOrder,
    ) -> Result<Vec<Item>, RepositoryError> {
        let tables = self.tables.read().await;
        let mut items: Vec<Item> = tables.items.values().cloned().collect();
        match order {
            ItemOrder::CreatedAtDesc => {
                items.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));
            }
            ItemOrder::CreatedAtAsc => {
                items.sort_by(|a, b| (a.created_at, a.id).cmp(&(b.created_at, b.id)));
            }
            ItemOrder::PriceAsc => items.sort_by(|a, b| (a.price, a.id).cmp(&(b.price, b.id))),
            ItemOrder::PriceDesc => items.sort_by(|a, b| (b.price, b.id).cmp(&(a.price, a.id))),
        }

        Ok(items
            .into_iter()
            .skip(skip as usize)
            .take(first as usize)
            .collect())
    }

    async fn count_items(&self) -> Result<i64, RepositoryError> {
        let count = self.tables.read().await.items.len();
        i64::try_from(count).map_err(|e| RepositoryError::DataCorruption(e.to_string()))
    }

    async fn item_by_id(&self, id: ItemId) -> Result<Option<Item>, RepositoryError> {
        Ok(self.tables.read().await.items.get(&id).cloned())
    }

    async fn create_item(&self, item: NewItem) -> Result<Item, RepositoryError> {
        let mut tables = self.tables.write().await;
        let now = Utc::now();
        let created = Item {
            id: ItemId::new(tables.next_id()),
            title: item.title,
            description: item.description,
            price: item.price,
            image: item.image,
            large_image: item.large_image,
            user_id: item.user_id,
            created_at: now,
            updated_at: now,
        };
        tables.items.insert(created.id, created.clone());
        Ok(created)
    }

    async fn update_item(
        &self,
        id: ItemId,
        changes: &ItemChanges,
    ) -> Result<Item, RepositoryError> {
        let mut tables = self.tables.write().await;
        let item = tables.items.get_mut(&id).ok_or(RepositoryError::NotFound)?;
        changes.apply_to(item);
        item.updated_at = Utc::now();
        Ok(item.clone())
    }

    async fn delete_item(&self, id: ItemId) -> Result<Item, RepositoryError> {
        let mut tables = self.tables.write().await;
        let item = tables.items.remove(&id).ok_or(RepositoryError::NotFound)?;
        tables.cart_items.retain(|_, line| line.item_id != id);
        tables.reviews.retain(|_, review| review.item_id != id);
        Ok(item)
    }

    async fn cart_item_by_id(&self, id: CartItemId) -> Result<Option<CartItem>, RepositoryError> {
        Ok(self.tables.read().await.cart_items.get(&id).cloned())
    }

    async fn cart_item_for(
        &self,
        user_id: UserId,
        item_id: ItemId,
    ) -> Result<Option<CartItem>, RepositoryError> {
        let tables = self.tables.read().await;
        Ok(tables
            .cart_items
            .values()
            .find(|line| line.user_id == user_id && line.item_id == item_id)
            .cloned())
    }

    async fn create_cart_item(
        &self,
        user_id: UserId,
        item_id: ItemId,
    ) -> Result<CartItem, RepositoryError> {
        let mut tables = self.tables.write().await;
        if tables
            .cart_items
            .values()
            .any(|line| line.user_id == user_id && line.item_id == item_id)
        {
            return Err(RepositoryError::Conflict("cart line already exists".to_owned()));
        }
        if !tables.items.contains_key(&item_id) {
            return Err(RepositoryError::NotFound);
        }

        let line = CartItem {
            id: CartItemId::new(tables.next_id()),
            user_id,
            item_id,
            quantity: 1,
        };
        tables.cart_items.insert(line.id, line.clone());
        Ok(line)
    }

    async fn set_cart_quantity(
        &self,
        id: CartItemId,
        quantity: i32,
    ) -> Result<CartItem, RepositoryError> {
        let mut tables = self.tables.write().await;
        let line = tables
            .cart_items
            .get_mut(&id)
            .ok_or(RepositoryError::NotFound)?;
        line.quantity = quantity;
        Ok(line.clone())
    }

    async fn delete_cart_item(&self, id: CartItemId) -> Result<CartItem, RepositoryError> {
        let mut tables = self.tables.write().await;
        tables.cart_items.remove(&id).ok_or(RepositoryError::NotFound)
    }

    async fn delete_cart_items(&self, ids: &[CartItemId]) -> Result<u64, RepositoryError> {
        let mut tables = self.tables.write().await;
        tables.check(FailPoint::DeleteCartItems)?;
        let mut removed = 0;
        for id in ids {
            if tables.cart_items.remove(id).is_some() {
                removed += 1;
            }
        }
        Ok(removed)
    }

    async fn cart_lines(&self, user_id: UserId) -> Result<Vec<CartLine>, RepositoryError> {
        let tables = self.tables.read().await;
        Ok(tables
            .cart_items
            .values()
            .filter(|line| line.user_id == user_id)
            .map(|line| CartLine {
                cart_item: line.clone(),
                item: tables.items.get(&line.item_id).cloned(),
            })
            .collect())
    }

    async fn create_order(&self, order: NewOrder) -> Result<Order, RepositoryError> {
        let mut tables = self.tables.write().await;
        tables.check(FailPoint::CreateOrder)?;
        if tables.orders.values().any(|o| o.charge_id == order.charge_id) {
            return Err(RepositoryError::Conflict("charge already exists".to_owned()));
        }

        let id = OrderId::new(tables.next_id());
        let mut items = Vec::with_capacity(order.lines.len());
        for line in order.lines {
            items.push(OrderItem {
                id: OrderItemId::new(tables.next_id()),
                user_id: order.user_id,
                title: line.title,
                description: line.description,
                image: line.image,
                large_image: line.large_image,
                price: line.price,
                quantity: line.quantity,
            });
        }

        let created = Order {
            id,
            user_id: order.user_id,
            total: order.total,
            currency: order.currency,
            charge_id: order.charge_id,
            items,
            created_at: Utc::now(),
        };
        tables.orders.insert(id, created.clone());
        Ok(created)
    }

    async fn order_by_id(&self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        Ok(self.tables.read().await.orders.get(&id).cloned())
    }

    async fn orders_for_user(&self, user_id: UserId) -> Result<Vec<Order>, RepositoryError> {
        let tables = self.tables.read().await;
        let mut orders: Vec<Order> = tables
            .orders
            .values()
            .filter(|o| o.user_id == user_id)
            .cloned()
            .collect();
        orders.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));
        Ok(orders)
    }

    async fn create_review(&self, review: NewReview) -> Result<Review, RepositoryError> {
        let mut tables = self.tables.write().await;
        if !tables.items.contains_key(&review.item_id) {
            return Err(RepositoryError::NotFound);
        }

        let created = Review {
            id: ReviewId::new(tables.next_id()),
            author_id: review.author_id,
            item_id: review.item_id,
            text: review.text,
            rating: review.rating,
            created_at: Utc::now(),
        };
        tables.reviews.insert(created.id, created.clone());
        Ok(created)
    }

    async fn reviews_for_item(&self, item_id: ItemId) -> Result<Vec<Review>, RepositoryError> {
        let tables = self.tables.read().await;
        let mut reviews: Vec<Review> = tables
            .reviews
            .values()
            .filter(|r| r.item_id == item_id)
            .cloned()
            .collect();
        reviews.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));
        Ok(reviews)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use trackytronics_core::Price;

    fn new_user(email: &str) -> NewUser {
        NewUser {
            name: "Test".to_owned(),
            email: Email::parse(email).unwrap(),
            password_hash: "hash".to_owned(),
            permissions: PermissionSet::signup_default(),
        }
    }

    fn new_item(seller: UserId, title: &str, price: i64) -> NewItem {
        NewItem {
            title: title.to_owned(),
            description: "desc".to_owned(),
            price: Price::from_minor_units(price).unwrap(),
            image: None,
            large_image: None,
            user_id: seller,
        }
    }

    #[tokio::test]
    async fn test_duplicate_email_conflicts() {
        let store = MemoryStore::new();
        store.create_user(new_user("a@example.com")).await.unwrap();

        let result = store.create_user(new_user("a@example.com")).await;
        assert!(matches!(result, Err(RepositoryError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_delete_item_cascades_to_cart_and_reviews() {
        let store = MemoryStore::new();
        let user = store.create_user(new_user("a@example.com")).await.unwrap();
        let item = store.create_item(new_item(user.id, "Widget", 500)).await.unwrap();
        store.create_cart_item(user.id, item.id).await.unwrap();
        store
            .create_review(NewReview {
                author_id: user.id,
                item_id: item.id,
                text: "great".to_owned(),
                rating: 5,
            })
            .await
            .unwrap();

        store.delete_item(item.id).await.unwrap();

        assert!(store.cart_lines(user.id).await.unwrap().is_empty());
        assert!(store.reviews_for_item(item.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_list_items_pages_and_orders_by_price() {
        let store = MemoryStore::new();
        let user = store.create_user(new_user("a@example.com")).await.unwrap();
        for (title, price) in [("b", 300), ("a", 100), ("c", 200)] {
            store.create_item(new_item(user.id, title, price)).await.unwrap();
        }

        let page = store.list_items(1, 2, ItemOrder::PriceAsc).await.unwrap();
        let titles: Vec<&str> = page.iter().map(|i| i.title.as_str()).collect();
        assert_eq!(titles, ["c", "b"]);
        assert_eq!(store.count_items().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_update_password_clears_reset_token() {
        let store = MemoryStore::new();
        let user = store.create_user(new_user("a@example.com")).await.unwrap();
        let reset = PasswordReset {
            token: "abc".to_owned(),
            expires_at: Utc::now(),
        };
        store.set_password_reset(user.id, Some(&reset)).await.unwrap();
        assert!(store.user_by_reset_token("abc").await.unwrap().is_some());

        let updated = store.update_password(user.id, "new-hash").await.unwrap();

        assert!(updated.reset.is_none());
        assert!(store.user_by_reset_token("abc").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_fail_point_rejects_order_writes() {
        let store = MemoryStore::new();
        let user = store.create_user(new_user("a@example.com")).await.unwrap();
        store.set_fail_point(Some(FailPoint::CreateOrder)).await;

        let result = store
            .create_order(NewOrder {
                user_id: user.id,
                total: Price::ZERO,
                currency: trackytronics_core::CurrencyCode::EUR,
                charge_id: "ch_1".to_owned(),
                lines: Vec::new(),
            })
            .await;

        assert!(matches!(result, Err(RepositoryError::Database(_))));
        assert!(store.orders_for_user(user.id).await.unwrap().is_empty());
    }
}
