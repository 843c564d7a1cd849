//! Cart domain types.

use trackytronics_core::{CartItemId, ItemId, UserId};

use super::Item;

/// A cart line: one user's intent to buy `quantity` of an item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartItem {
    pub id: CartItemId,
    pub user_id: UserId,
    pub item_id: ItemId,
    /// Never negative. A line may sit at zero; it is not removed automatically.
    pub quantity: i32,
}

/// A cart line joined with its item, as read for checkout.
///
/// `item` is `None` when the listing was deleted after being carted.
#[derive(Debug, Clone)]
pub struct CartLine {
    pub cart_item: CartItem,
    pub item: Option<Item>,
}
