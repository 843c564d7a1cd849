//! Checkout: turn the caller's cart into a paid order.
//!
//! The workflow runs as ordered [`CheckoutStage`]s:
//!
//! 1. `AuthCheck` - a session is required
//! 2. `Snapshot` - read the user and their cart lines with item details
//! 3. `Recompute` - total = sum of quantity x price, from the snapshot only
//! 4. `Charge` - charge the card for the recomputed total
//! 5. `Persist` - record the order with line copies of the items
//! 6. `ClearCart` - delete exactly the lines that were snapshotted
//!
//! The client may send the total it displayed; it is never charged, only
//! compared and logged when it differs. If the order can't be recorded after
//! the card was charged, the charge is refunded, unless the processor replayed
//! a charge that is already on record; then the recorded order is returned.

use sha2::{Digest, Sha256};
use tracing::{error, info, instrument, warn};

use trackytronics_core::{CartItemId, CheckoutStage, CurrencyCode, Price, UserId};

use super::guard::require_authenticated;
use super::payments::{ChargeRequest, PaymentGateway};
use super::session::Identity;
use crate::db::{RepositoryError, Store};
use crate::error::{ApiError, Result, add_breadcrumb};
use crate::models::{CartItem, CartLine, NewOrder, NewOrderLine, Order, User};

/// What checkout read from the store before charging.
#[derive(Debug)]
struct Snapshot {
    user: User,
    /// Lines that will be bought, with their item copied.
    lines: Vec<(CartItem, NewOrderLine)>,
    /// Every line read, including zero-quantity ones; all are cleared.
    cart_item_ids: Vec<CartItemId>,
}

/// Turn cart lines into purchasable order lines.
///
/// Lines whose item has been deleted are skipped, as are lines at quantity
/// zero. Returns the purchasable lines and the IDs of every line read.
fn order_lines(cart: Vec<CartLine>) -> (Vec<(CartItem, NewOrderLine)>, Vec<CartItemId>) {
    let cart_item_ids = cart.iter().map(|line| line.cart_item.id).collect();
    let lines = cart
        .into_iter()
        .filter(|line| line.cart_item.quantity > 0)
        .filter_map(|line| {
            let item = line.item?;
            let order_line = NewOrderLine {
                title: item.title,
                description: item.description,
                image: item.image,
                large_image: item.large_image,
                price: item.price,
                quantity: line.cart_item.quantity,
            };
            Some((line.cart_item, order_line))
        })
        .collect();
    (lines, cart_item_ids)
}

/// Sum of `quantity x price` over the lines.
///
/// # Errors
///
/// Returns `ApiError::Validation` if the total overflows.
pub fn recompute_total<'a>(lines: impl IntoIterator<Item = &'a NewOrderLine>) -> Result<Price> {
    lines.into_iter().try_fold(Price::ZERO, |total, line| {
        line.price
            .line_total(line.quantity)
            .and_then(|line_total| total.checked_add(line_total))
            .map_err(|e| ApiError::Validation(format!("Order total is invalid: {e}")))
    })
}

/// Key that makes a resubmitted checkout a no-op at the processor.
///
/// Covers everything sent with the charge: the cart lines, amount, currency
/// and card token. A retry with another card or after a price change gets a
/// fresh key; the same submission sent twice gets the same one.
#[must_use]
pub fn idempotency_key(
    user_id: UserId,
    lines: &[CartItem],
    amount: Price,
    currency: CurrencyCode,
    source: &str,
) -> String {
    let mut hasher = Sha256::new();
    hasher.update(user_id.as_i32().to_be_bytes());
    for line in lines {
        hasher.update(line.id.as_i32().to_be_bytes());
        hasher.update(line.quantity.to_be_bytes());
    }
    hasher.update(amount.minor_units().to_be_bytes());
    hasher.update(currency.as_str().as_bytes());
    hasher.update([0]);
    hasher.update(source.as_bytes());
    format!("checkout-{}", hex::encode(hasher.finalize()))
}

/// Checkout workflow.
pub struct CheckoutService<'a> {
    store: &'a dyn Store,
    payments: &'a dyn PaymentGateway,
    currency: CurrencyCode,
}

impl<'a> CheckoutService<'a> {
    #[must_use]
    pub const fn new(
        store: &'a dyn Store,
        payments: &'a dyn PaymentGateway,
        currency: CurrencyCode,
    ) -> Self {
        Self {
            store,
            payments,
            currency,
        }
    }

    /// Charge the caller's cart and record the order.
    ///
    /// `client_total` is what the client believes it is paying. It is only
    /// used for logging; the amount charged is always recomputed.
    ///
    /// # Errors
    ///
    /// - `ApiError::Unauthenticated` without a session
    /// - `ApiError::Validation` for an empty cart or blank card token
    /// - `ApiError::PaymentDeclined` when the card is refused (nothing is recorded)
    /// - `ApiError::Repository` if the order can't be recorded (the charge is refunded)
    ///
    /// A resubmitted checkout whose charge the processor replays returns the
    /// order recorded the first time.
    #[instrument(skip(self, identity, token), fields(user_id))]
    pub async fn create_order(
        &self,
        identity: &Identity,
        token: &str,
        client_total: Option<i64>,
    ) -> Result<Order> {
        let user_id = require_authenticated(identity)?;
        tracing::Span::current().record("user_id", tracing::field::display(user_id));
        if token.trim().is_empty() {
            return Err(ApiError::Validation("A payment token is required".to_string()));
        }

        let snapshot = self.snapshot(user_id).await?;
        if snapshot.lines.is_empty() {
            return Err(ApiError::Validation("Your cart is empty".to_string()));
        }

        let total = recompute_total(snapshot.lines.iter().map(|(_, line)| line))?;
        stage(CheckoutStage::Recompute, &[("total", total.to_string())]);
        if let Some(claimed) = client_total
            && claimed != total.minor_units()
        {
            warn!(
                claimed,
                total = total.minor_units(),
                "Client total differs from recomputed total; charging recomputed total"
            );
        }

        let cart_items: Vec<CartItem> = snapshot.lines.iter().map(|(c, _)| c.clone()).collect();
        let charge = self
            .payments
            .charge(&ChargeRequest {
                amount: total,
                currency: self.currency,
                source: token.to_string(),
                description: format!("Charge for {}", snapshot.user.email),
                idempotency_key: idempotency_key(
                    user_id,
                    &cart_items,
                    total,
                    self.currency,
                    token,
                ),
            })
            .await?;
        stage(CheckoutStage::Charge, &[("charge_id", charge.id.clone())]);

        let new_order = NewOrder {
            user_id,
            total,
            currency: self.currency,
            charge_id: charge.id.clone(),
            lines: snapshot.lines.into_iter().map(|(_, line)| line).collect(),
        };
        let order = match self.store.create_order(new_order).await {
            Ok(order) => order,
            // The processor replayed a charge that an earlier submission recorded.
            Err(RepositoryError::Conflict(_)) => self.recorded_order(user_id, &charge.id).await?,
            Err(e) => {
                error!(charge_id = %charge.id, error = %e, "Failed to record order after charge; refunding");
                if let Err(refund_err) = self.payments.refund(&charge.id).await {
                    error!(
                        charge_id = %charge.id,
                        error = %refund_err,
                        "Refund failed; charge must be reconciled manually"
                    );
                }
                return Err(e.into());
            }
        };
        stage(CheckoutStage::Persist, &[("order_id", order.id.to_string())]);

        match self.store.delete_cart_items(&snapshot.cart_item_ids).await {
            Ok(_) => stage(CheckoutStage::ClearCart, &[]),
            Err(e) => error!(
                order_id = %order.id,
                error = %e,
                "Order recorded but cart could not be cleared"
            ),
        }

        info!(order_id = %order.id, charge_id = %order.charge_id, total = %order.total, "Order completed");
        Ok(order)
    }

    /// The order already holding `charge_id`. Nothing is refunded.
    async fn recorded_order(&self, user_id: UserId, charge_id: &str) -> Result<Order> {
        warn!(charge_id, "Charge already recorded; returning the existing order");
        self.store
            .orders_for_user(user_id)
            .await?
            .into_iter()
            .find(|order| order.charge_id == charge_id)
            .ok_or_else(|| {
                error!(charge_id, "Charge recorded against another user's order");
                ApiError::Conflict("This payment was already used".to_string())
            })
    }

    async fn snapshot(&self, user_id: UserId) -> Result<Snapshot> {
        let user = self
            .store
            .user_by_id(user_id)
            .await?
            .ok_or(ApiError::Unauthenticated)?;
        let cart = self.store.cart_lines(user_id).await?;
        let (lines, cart_item_ids) = order_lines(cart);

        stage(
            CheckoutStage::Snapshot,
            &[("lines", lines.len().to_string())],
        );
        Ok(Snapshot {
            user,
            lines,
            cart_item_ids,
        })
    }
}

fn stage(stage: CheckoutStage, data: &[(&str, String)]) {
    tracing::debug!(stage = %stage, "Checkout stage complete");
    add_breadcrumb("checkout", stage.as_str(), data);
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use trackytronics_core::{Email, ItemId, PermissionSet};

    use super::*;
    use crate::db::memory::FailPoint;
    use crate::db::{MemoryStore, RepositoryError};
    use crate::models::{NewItem, NewUser};
    use crate::services::payments::{Charge, PaymentError};

    #[derive(Default)]
    struct RecordingGateway {
        charges: Mutex<Vec<ChargeRequest>>,
        refunds: Mutex<Vec<String>>,
        decline: bool,
        /// Answer a repeated idempotency key with the original charge, as Stripe does.
        replay: bool,
    }

    #[async_trait]
    impl PaymentGateway for RecordingGateway {
        async fn charge(&self, request: &ChargeRequest) -> std::result::Result<Charge, PaymentError> {
            let mut charges = self.charges.lock().unwrap();
            charges.push(request.clone());
            if self.decline {
                return Err(PaymentError::Declined("Your card was declined.".into()));
            }
            let first_with_key = charges
                .iter()
                .position(|c| c.idempotency_key == request.idempotency_key);
            let n = match first_with_key {
                Some(i) if self.replay => i + 1,
                _ => charges.len(),
            };
            Ok(Charge {
                id: format!("ch_{n}"),
                amount: request.amount,
            })
        }

        async fn refund(&self, charge_id: &str) -> std::result::Result<(), PaymentError> {
            self.refunds.lock().unwrap().push(charge_id.to_string());
            Ok(())
        }
    }

    async fn buyer(store: &MemoryStore) -> UserId {
        store
            .create_user(NewUser {
                name: "Buyer".into(),
                email: Email::parse("buyer@x.com").unwrap(),
                password_hash: "hash".into(),
                permissions: PermissionSet::signup_default(),
            })
            .await
            .unwrap()
            .id
    }

    async fn item(store: &MemoryStore, seller: UserId, price: i64) -> ItemId {
        store
            .create_item(NewItem {
                title: format!("Item {price}"),
                description: "thing".into(),
                price: Price::from_minor_units(price).unwrap(),
                image: Some("a.jpg".into()),
                large_image: None,
                user_id: seller,
            })
            .await
            .unwrap()
            .id
    }

    async fn cart(store: &MemoryStore, user: UserId, item: ItemId, quantity: i32) -> CartItemId {
        let line = store.create_cart_item(user, item).await.unwrap();
        store.set_cart_quantity(line.id, quantity).await.unwrap();
        line.id
    }

    /// Cart {A: price 500, qty 2} and {B: price 1500, qty 1}.
    async fn two_line_cart(store: &MemoryStore) -> UserId {
        let user = buyer(store).await;
        let a = item(store, user, 500).await;
        let b = item(store, user, 1500).await;
        cart(store, user, a, 2).await;
        cart(store, user, b, 1).await;
        user
    }

    #[tokio::test]
    async fn test_charges_recomputed_total_not_client_total() {
        let store = MemoryStore::new();
        let user = two_line_cart(&store).await;
        let gateway = RecordingGateway::default();
        let checkout = CheckoutService::new(&store, &gateway, CurrencyCode::EUR);

        let order = checkout
            .create_order(&Identity::user(user), "tok_visa", Some(1))
            .await
            .unwrap();

        let charges = gateway.charges.lock().unwrap();
        assert_eq!(charges.len(), 1);
        assert_eq!(charges[0].amount.minor_units(), 2500);
        assert_eq!(charges[0].currency, CurrencyCode::EUR);
        assert_eq!(charges[0].description, "Charge for buyer@x.com");
        assert_eq!(order.total.minor_units(), 2500);
        assert_eq!(order.items.len(), 2);
        assert!(store.cart_lines(user).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_order_lines_copy_items() {
        let store = MemoryStore::new();
        let user = two_line_cart(&store).await;
        let gateway = RecordingGateway::default();
        let checkout = CheckoutService::new(&store, &gateway, CurrencyCode::EUR);

        let order = checkout
            .create_order(&Identity::user(user), "tok_visa", None)
            .await
            .unwrap();

        let line = order.items.iter().find(|l| l.price.minor_units() == 500).unwrap();
        assert_eq!(line.title, "Item 500");
        assert_eq!(line.quantity, 2);
        assert_eq!(line.image.as_deref(), Some("a.jpg"));
        assert_eq!(line.user_id, user);
    }

    #[tokio::test]
    async fn test_anonymous_checkout_charges_nothing() {
        let store = MemoryStore::new();
        two_line_cart(&store).await;
        let gateway = RecordingGateway::default();
        let checkout = CheckoutService::new(&store, &gateway, CurrencyCode::EUR);

        let result = checkout
            .create_order(&Identity::anonymous(), "tok_visa", None)
            .await;

        assert!(matches!(result, Err(ApiError::Unauthenticated)));
        assert!(gateway.charges.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_empty_cart_is_rejected_before_charge() {
        let store = MemoryStore::new();
        let user = buyer(&store).await;
        let gateway = RecordingGateway::default();
        let checkout = CheckoutService::new(&store, &gateway, CurrencyCode::EUR);

        let result = checkout.create_order(&Identity::user(user), "tok_visa", None).await;

        assert!(matches!(result, Err(ApiError::Validation(_))));
        assert!(gateway.charges.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_decline_persists_nothing() {
        let store = MemoryStore::new();
        let user = two_line_cart(&store).await;
        let gateway = RecordingGateway {
            decline: true,
            ..Default::default()
        };
        let checkout = CheckoutService::new(&store, &gateway, CurrencyCode::EUR);

        let result = checkout.create_order(&Identity::user(user), "tok_bad", None).await;

        assert!(matches!(result, Err(ApiError::PaymentDeclined(_))));
        assert!(store.orders_for_user(user).await.unwrap().is_empty());
        assert_eq!(store.cart_lines(user).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_persist_failure_refunds_charge() {
        let store = MemoryStore::new();
        let user = two_line_cart(&store).await;
        store.set_fail_point(Some(FailPoint::CreateOrder)).await;
        let gateway = RecordingGateway::default();
        let checkout = CheckoutService::new(&store, &gateway, CurrencyCode::EUR);

        let result = checkout.create_order(&Identity::user(user), "tok_visa", None).await;

        assert!(matches!(result, Err(ApiError::Repository(RepositoryError::Database(_)))));
        assert_eq!(*gateway.refunds.lock().unwrap(), vec!["ch_1".to_string()]);
        assert_eq!(store.cart_lines(user).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_clear_cart_failure_still_returns_order() {
        let store = MemoryStore::new();
        let user = two_line_cart(&store).await;
        store.set_fail_point(Some(FailPoint::DeleteCartItems)).await;
        let gateway = RecordingGateway::default();
        let checkout = CheckoutService::new(&store, &gateway, CurrencyCode::EUR);

        let order = checkout
            .create_order(&Identity::user(user), "tok_visa", None)
            .await
            .unwrap();

        assert_eq!(order.total.minor_units(), 2500);
        assert!(gateway.refunds.lock().unwrap().is_empty());
        assert_eq!(store.orders_for_user(user).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_resubmitted_checkout_returns_recorded_order_without_refund() {
        let store = MemoryStore::new();
        let user = two_line_cart(&store).await;
        store.set_fail_point(Some(FailPoint::DeleteCartItems)).await;
        let gateway = RecordingGateway {
            replay: true,
            ..Default::default()
        };
        let checkout = CheckoutService::new(&store, &gateway, CurrencyCode::EUR);

        let first = checkout
            .create_order(&Identity::user(user), "tok_visa", None)
            .await
            .unwrap();
        store.set_fail_point(None).await;
        let second = checkout
            .create_order(&Identity::user(user), "tok_visa", None)
            .await
            .unwrap();

        assert_eq!(second.id, first.id);
        assert_eq!(second.charge_id, "ch_1");
        assert!(gateway.refunds.lock().unwrap().is_empty());
        assert_eq!(store.orders_for_user(user).await.unwrap().len(), 1);
        assert!(store.cart_lines(user).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_retry_with_another_card_uses_a_fresh_key() {
        let store = MemoryStore::new();
        let user = two_line_cart(&store).await;
        let gateway = RecordingGateway {
            decline: true,
            ..Default::default()
        };
        let checkout = CheckoutService::new(&store, &gateway, CurrencyCode::EUR);

        let declined = checkout.create_order(&Identity::user(user), "tok_bad", None).await;
        let retried = checkout.create_order(&Identity::user(user), "tok_other", None).await;

        assert!(matches!(declined, Err(ApiError::PaymentDeclined(_))));
        assert!(matches!(retried, Err(ApiError::PaymentDeclined(_))));
        let charges = gateway.charges.lock().unwrap();
        assert_eq!(charges.len(), 2);
        assert_ne!(charges[0].idempotency_key, charges[1].idempotency_key);
    }

    #[tokio::test]
    async fn test_zero_quantity_lines_are_not_bought_but_are_cleared() {
        let store = MemoryStore::new();
        let user = buyer(&store).await;
        let a = item(&store, user, 700).await;
        let b = item(&store, user, 300).await;
        cart(&store, user, a, 1).await;
        cart(&store, user, b, 0).await;
        let gateway = RecordingGateway::default();
        let checkout = CheckoutService::new(&store, &gateway, CurrencyCode::EUR);

        let order = checkout
            .create_order(&Identity::user(user), "tok_visa", None)
            .await
            .unwrap();

        assert_eq!(order.total.minor_units(), 700);
        assert_eq!(order.items.len(), 1);
        assert!(store.cart_lines(user).await.unwrap().is_empty());
    }

    #[test]
    fn test_recompute_total_overflow_is_validation_error() {
        let line = NewOrderLine {
            title: "x".into(),
            description: "x".into(),
            image: None,
            large_image: None,
            price: Price::from_minor_units(i64::MAX).unwrap(),
            quantity: 2,
        };
        assert!(matches!(
            recompute_total([&line]),
            Err(ApiError::Validation(_))
        ));
    }

    #[test]
    fn test_idempotency_key_tracks_everything_charged() {
        let line = |id: i32, quantity: i32| CartItem {
            id: CartItemId::new(id),
            user_id: UserId::new(1),
            item_id: ItemId::new(id),
            quantity,
        };
        let user = UserId::new(1);
        let lines = [line(1, 2), line(2, 1)];
        let price = |cents| Price::from_minor_units(cents).unwrap();
        let key = |lines: &[CartItem], amount, currency, source| {
            idempotency_key(user, lines, price(amount), currency, source)
        };

        let a = key(&lines, 2500, CurrencyCode::EUR, "tok_visa");

        assert_eq!(a, key(&lines, 2500, CurrencyCode::EUR, "tok_visa"));
        assert_ne!(a, key(&[line(1, 3), line(2, 1)], 2500, CurrencyCode::EUR, "tok_visa"));
        assert_ne!(a, key(&lines, 2500, CurrencyCode::EUR, "tok_other"));
        assert_ne!(a, key(&lines, 3000, CurrencyCode::EUR, "tok_visa"));
        assert_ne!(a, key(&lines, 2500, CurrencyCode::USD, "tok_visa"));
        assert!(a.starts_with("checkout-"));
    }
}
