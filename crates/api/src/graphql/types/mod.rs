//! GraphQL output types.
//!
//! Each type wraps a domain model and resolves its relations lazily through
//! the store, so a query only pays for the nesting it asks for.

mod cart;
mod item;
mod order;
mod review;
mod user;

use async_graphql::SimpleObject;

pub use cart::CartItem;
pub use item::{Item, ItemOrderBy};
pub use order::{Order, OrderItem};
pub use review::Review;
pub use user::User;

/// A plain acknowledgement.
#[derive(Debug, Clone, SimpleObject)]
pub struct SuccessMessage {
    pub message: String,
}

impl SuccessMessage {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Aggregates over the item table.
#[derive(Debug, Clone, SimpleObject)]
pub struct ItemConnection {
    pub aggregate: ItemAggregate,
}

#[derive(Debug, Clone, SimpleObject)]
pub struct ItemAggregate {
    pub count: i64,
}
