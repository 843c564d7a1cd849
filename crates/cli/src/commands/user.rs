//! User permission management.
//!
//! No GraphQL mutation changes permissions, so elevating an account (for
//! example to `ADMIN`) is an operator task done here.

use trackytronics_api::db::{PgStore, RepositoryError, Store, create_pool};
use trackytronics_core::{Email, Permission, PermissionSet};

use super::{CommandError, database_url};

#[derive(Debug, thiserror::Error)]
pub enum UserError {
    #[error(transparent)]
    Command(#[from] CommandError),

    #[error("Invalid email: {0}")]
    InvalidEmail(String),

    #[error("No user with email: {0}")]
    NotFound(String),

    #[error("Database error: {0}")]
    Repository(#[from] RepositoryError),

    #[error("Database connection error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Grant `permission` to the user with `email`.
pub async fn grant(email: &str, permission: Permission) -> Result<(), UserError> {
    update(email, |permissions| permissions.insert(permission)).await?;
    tracing::info!("Granted {permission} to {email}");
    Ok(())
}

/// Revoke `permission` from the user with `email`.
pub async fn revoke(email: &str, permission: Permission) -> Result<(), UserError> {
    update(email, |permissions| permissions.remove(permission)).await?;
    tracing::info!("Revoked {permission} from {email}");
    Ok(())
}

async fn update(
    email: &str,
    change: impl FnOnce(&mut PermissionSet) -> bool,
) -> Result<(), UserError> {
    let parsed = Email::parse(email).map_err(|e| UserError::InvalidEmail(e.to_string()))?;

    let pool = create_pool(&database_url()?).await?;
    let store = PgStore::new(pool);

    let user = store
        .user_by_email(&parsed)
        .await?
        .ok_or_else(|| UserError::NotFound(email.to_owned()))?;

    let mut permissions = user.permissions.clone();
    if !change(&mut permissions) {
        tracing::info!("No change for {email}: permissions already {:?}", permissions.to_tags());
        return Ok(());
    }

    store.set_permissions(user.id, &permissions).await?;
    Ok(())
}
