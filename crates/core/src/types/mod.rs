//! Core types for Trackytronics.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod email;
pub mod id;
pub mod permission;
pub mod price;
pub mod status;

pub use email::{Email, EmailError};
pub use id::*;
pub use permission::{Permission, PermissionError, PermissionSet};
pub use price::{CurrencyCode, Price, PriceError};
pub use status::CheckoutStage;
