//! Business logic behind the GraphQL resolvers.
//!
//! # Services
//!
//! - `session` - Session tokens and cookies
//! - `guard` - Ownership and permission checks
//! - `auth` - Signup and signin (argon2 password hashing)
//! - `items` - Item CRUD and reviews
//! - `cart` - Cart line add/remove/decrement
//! - `checkout` - Cart to paid order
//! - `orders` - Order history, owner only
//! - `reset` - Password reset tokens
//! - `contact` - Contact-form email
//! - `payments` - Payment processor client
//! - `email` - Email rendering and SMTP delivery

pub mod auth;
pub mod cart;
pub mod checkout;
pub mod contact;
pub mod email;
pub mod guard;
pub mod items;
pub mod orders;
pub mod payments;
pub mod reset;
pub mod session;
