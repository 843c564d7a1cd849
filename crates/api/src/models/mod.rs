//! Domain models for the API.
//!
//! These are validated domain objects, separate from database row types and
//! from the GraphQL output types that wrap them.

pub mod cart;
pub mod item;
pub mod order;
pub mod review;
pub mod user;

pub use cart::{CartItem, CartLine};
pub use item::{Item, ItemChanges, ItemOrder, NewItem};
pub use order::{NewOrder, NewOrderLine, Order, OrderItem};
pub use review::{NewReview, Review};
pub use user::{NewUser, PasswordReset, User};
