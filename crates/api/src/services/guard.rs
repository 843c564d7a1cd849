//! Authorization checks shared by every resolver.
//!
//! A user may act on a resource when they own it, or when their permission
//! set intersects the permissions the operation accepts. An empty accepted
//! set makes the operation owner-only.

use trackytronics_core::{Permission, UserId};

use super::session::Identity;
use crate::error::ApiError;
use crate::models::User;

/// Permissions that allow deleting someone else's item.
pub const ITEM_DELETE_PERMISSIONS: &[Permission] = &[Permission::Admin, Permission::ItemDelete];

/// Permissions that allow editing someone else's item.
pub const ITEM_UPDATE_PERMISSIONS: &[Permission] = &[Permission::Admin, Permission::ItemUpdate];

/// Nobody but the owner.
pub const OWNER_ONLY: &[Permission] = &[];

/// The signed-in user's ID.
///
/// # Errors
///
/// Returns `ApiError::Unauthenticated` for an anonymous request.
pub fn require_authenticated(identity: &Identity) -> Result<UserId, ApiError> {
    match identity.user_id() {
        Some(id) => Ok(id),
        None => Err(ApiError::Unauthenticated),
    }
}

/// Allow `actor` to act on a resource owned by `owner`.
///
/// # Errors
///
/// Returns `ApiError::Forbidden` unless the actor owns the resource or holds
/// one of the `accepted` permissions.
pub fn authorize_owner_or_permission(
    actor: &User,
    owner: UserId,
    accepted: &[Permission],
) -> Result<(), ApiError> {
    if actor.id == owner || actor.permissions.intersects(accepted) {
        return Ok(());
    }
    Err(ApiError::Forbidden)
}
