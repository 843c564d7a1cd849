//! User domain types.

use chrono::{DateTime, Utc};

use trackytronics_core::{Email, PermissionSet, UserId};

/// A registered user.
///
/// The password hash and reset token are kept on the domain type because the
/// auth and reset workflows need them; GraphQL output types never expose them.
#[derive(Debug, Clone)]
pub struct User {
    /// Unique user ID.
    pub id: UserId,
    /// Display name.
    pub name: String,
    /// Normalized (lowercase) email address.
    pub email: Email,
    /// Argon2 PHC hash of the password.
    pub password_hash: String,
    /// Granted permissions.
    pub permissions: PermissionSet,
    /// Outstanding password reset, if one was requested.
    pub reset: Option<PasswordReset>,
    /// When the user was created.
    pub created_at: DateTime<Utc>,
    /// When the user was last updated.
    pub updated_at: DateTime<Utc>,
}

/// A pending password reset token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PasswordReset {
    /// Hex-encoded random token.
    pub token: String,
    /// Instant after which the token is no longer accepted.
    pub expires_at: DateTime<Utc>,
}

impl PasswordReset {
    /// Whether the token may still be redeemed at `now`.
    #[must_use]
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }
}

/// Data required to create a user.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: Email,
    pub password_hash: String,
    pub permissions: PermissionSet,
}
