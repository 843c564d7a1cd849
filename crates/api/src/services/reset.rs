//! Password reset: issue a one-hour token by email, then redeem it once.

use chrono::{DateTime, Duration, Utc};
use tracing::{info, instrument};
use url::Url;

use trackytronics_core::Email;

use super::auth::{hash_password, validate_password};
use super::email::{Mailer, OutgoingEmail};
use crate::db::Store;
use crate::error::{ApiError, Result};
use crate::models::{PasswordReset, User};

/// How long a reset token stays redeemable.
const RESET_TOKEN_TTL_HOURS: i64 = 1;

/// Random bytes in a reset token (hex-encoded to twice as many characters).
const RESET_TOKEN_BYTES: usize = 20;

/// A fresh token expiring one hour after `now`.
fn new_reset(now: DateTime<Utc>) -> PasswordReset {
    let bytes: [u8; RESET_TOKEN_BYTES] = rand::random();
    PasswordReset {
        token: hex::encode(bytes),
        expires_at: now + Duration::hours(RESET_TOKEN_TTL_HOURS),
    }
}

/// Link the user follows to choose a new password.
#[must_use]
pub fn reset_url(frontend_url: &Url, token: &str) -> String {
    format!(
        "{}/reset?resetToken={token}",
        frontend_url.as_str().trim_end_matches('/')
    )
}

/// Password reset workflow.
pub struct ResetService<'a> {
    store: &'a dyn Store,
    mailer: &'a dyn Mailer,
    from_address: &'a str,
    frontend_url: &'a Url,
}

impl<'a> ResetService<'a> {
    #[must_use]
    pub const fn new(
        store: &'a dyn Store,
        mailer: &'a dyn Mailer,
        from_address: &'a str,
        frontend_url: &'a Url,
    ) -> Self {
        Self {
            store,
            mailer,
            from_address,
            frontend_url,
        }
    }

    /// Store a new reset token for the account and email the link.
    ///
    /// Any earlier outstanding token is replaced.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::NotFound` if no account uses the email, and
    /// `ApiError::Email` if the message can't be sent.
    #[instrument(skip_all, fields(email = %email))]
    pub async fn request_reset(&self, email: &str, now: DateTime<Utc>) -> Result<()> {
        let email = Email::parse(email).map_err(|e| ApiError::Validation(format!("Invalid email: {e}")))?;
        let user = self
            .store
            .user_by_email(&email)
            .await?
            .ok_or(ApiError::NotFound("User"))?;

        let reset = new_reset(now);
        self.store.set_password_reset(user.id, Some(&reset)).await?;

        let message = OutgoingEmail::password_reset(
            self.from_address,
            user.email.as_str(),
            &reset_url(self.frontend_url, &reset.token),
        )?;
        self.mailer.send(message).await?;

        info!(user_id = %user.id, "Password reset requested");
        Ok(())
    }

    /// Redeem a reset token, setting a new password.
    ///
    /// The token is cleared in the same write as the password, so it can't be
    /// used twice.
    ///
    /// # Errors
    ///
    /// - `ApiError::Validation` if the passwords differ or are too weak
    /// - `ApiError::InvalidOrExpiredToken` unless the token exists and `now` is
    ///   before its expiry
    #[instrument(skip_all)]
    pub async fn reset_password(
        &self,
        token: &str,
        password: &str,
        confirm_password: &str,
        now: DateTime<Utc>,
    ) -> Result<User> {
        if password != confirm_password {
            return Err(ApiError::Validation("Passwords do not match!".to_string()));
        }

        let user = self
            .store
            .user_by_reset_token(token)
            .await?
            .ok_or(ApiError::InvalidOrExpiredToken)?;
        let still_valid = user
            .reset
            .as_ref()
            .is_some_and(|reset| reset.token == token && reset.is_valid_at(now));
        if !still_valid {
            return Err(ApiError::InvalidOrExpiredToken);
        }

        validate_password(password)?;
        let password_hash = hash_password(password)?;
        let user = self.store.update_password(user.id, &password_hash).await?;

        info!(user_id = %user.id, "Password reset completed");
        Ok(user)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use trackytronics_core::PermissionSet;

    use super::*;
    use crate::db::MemoryStore;
    use crate::models::NewUser;
    use crate::services::auth::AuthService;
    use crate::services::email::EmailError;

    #[derive(Default)]
    struct Outbox(Mutex<Vec<OutgoingEmail>>);

    #[async_trait]
    impl Mailer for Outbox {
        async fn send(&self, email: OutgoingEmail) -> std::result::Result<(), EmailError> {
            self.0.lock().unwrap().push(email);
            Ok(())
        }
    }

    fn frontend() -> Url {
        Url::parse("http://localhost:7777").unwrap()
    }

    async fn seeded() -> MemoryStore {
        let store = MemoryStore::new();
        store
            .create_user(NewUser {
                name: "Ann".into(),
                email: Email::parse("ann@x.com").unwrap(),
                password_hash: hash_password("old password").unwrap(),
                permissions: PermissionSet::signup_default(),
            })
            .await
            .unwrap();
        store
    }

    #[test]
    fn test_reset_tokens_are_40_hex_chars() {
        let reset = new_reset(Utc::now());
        assert_eq!(reset.token.len(), 40);
        assert!(reset.token.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(reset.token, new_reset(Utc::now()).token);
    }

    #[test]
    fn test_reset_url() {
        assert_eq!(
            reset_url(&frontend(), "abc"),
            "http://localhost:7777/reset?resetToken=abc"
        );
    }

    #[tokio::test]
    async fn test_request_reset_unknown_email_is_not_found() {
        let store = seeded().await;
        let outbox = Outbox::default();
        let url = frontend();
        let reset = ResetService::new(&store, &outbox, "from@x.com", &url);

        let result = reset.request_reset("nobody@x.com", Utc::now()).await;

        assert!(matches!(result, Err(ApiError::NotFound("User"))));
        assert!(outbox.0.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_request_reset_mails_link_with_stored_token() {
        let store = seeded().await;
        let outbox = Outbox::default();
        let url = frontend();
        let reset = ResetService::new(&store, &outbox, "from@x.com", &url);
        let now = Utc::now();

        reset.request_reset("ANN@x.com", now).await.unwrap();

        let user = store
            .user_by_email(&Email::parse("ann@x.com").unwrap())
            .await
            .unwrap()
            .unwrap();
        let stored = user.reset.unwrap();
        assert_eq!(stored.expires_at, now + Duration::hours(1));

        let sent = outbox.0.lock().unwrap();
        assert_eq!(sent[0].to, "ann@x.com");
        assert!(sent[0].html.contains(&format!("resetToken={}", stored.token)));
    }

    #[tokio::test]
    async fn test_token_is_single_use_and_time_boxed() {
        let store = seeded().await;
        let outbox = Outbox::default();
        let url = frontend();
        let reset = ResetService::new(&store, &outbox, "from@x.com", &url);
        let t0 = Utc::now();
        reset.request_reset("ann@x.com", t0).await.unwrap();
        let token = store
            .user_by_email(&Email::parse("ann@x.com").unwrap())
            .await
            .unwrap()
            .unwrap()
            .reset
            .unwrap()
            .token;

        // At exactly the expiry instant the token is no longer valid.
        let late = reset
            .reset_password(&token, "new password", "new password", t0 + Duration::hours(1))
            .await;
        assert!(matches!(late, Err(ApiError::InvalidOrExpiredToken)));

        let user = reset
            .reset_password(&token, "new password", "new password", t0 + Duration::minutes(59))
            .await
            .unwrap();
        assert!(user.reset.is_none());

        let again = reset
            .reset_password(&token, "other password", "other password", t0 + Duration::minutes(59))
            .await;
        assert!(matches!(again, Err(ApiError::InvalidOrExpiredToken)));

        let auth = AuthService::new(&store);
        assert!(auth.signin("ann@x.com", "new password").await.is_ok());
        assert!(auth.signin("ann@x.com", "old password").await.is_err());
    }

    #[tokio::test]
    async fn test_mismatch_checked_before_token() {
        let store = seeded().await;
        let outbox = Outbox::default();
        let url = frontend();
        let reset = ResetService::new(&store, &outbox, "from@x.com", &url);

        let result = reset
            .reset_password("no-such-token", "password1", "password2", Utc::now())
            .await;

        assert!(matches!(result, Err(ApiError::Validation(_))));
    }
}
