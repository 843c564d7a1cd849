//! Trackytronics Core - Shared domain types.
//!
//! This crate provides the types shared by the API server and the CLI:
//! - `api` - GraphQL resolver layer (library + binary)
//! - `cli` - Command-line tools for migrations and user management
//!
//! # Architecture
//!
//! The core crate contains only types and pure functions - no I/O, no database
//! access, no HTTP clients. Database and GraphQL integrations are opt-in via the
//! `postgres` and `graphql` features.
//!
//! # Modules
//!
//! - [`types`] - Typed IDs, emails, prices, permissions, and checkout stages

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
