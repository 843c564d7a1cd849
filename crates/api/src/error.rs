//! Unified error handling with Sentry integration.
//!
//! Every service returns `Result<T, ApiError>`. Resolvers turn it into a
//! GraphQL error through [`ErrorExtensions`], which sets `extensions.code`
//! and captures server errors to Sentry before anything reaches the client.

use async_graphql::ErrorExtensions;
use thiserror::Error;

use crate::db::RepositoryError;
use crate::services::auth::AuthError;
use crate::services::email::EmailError;
use crate::services::payments::PaymentError;
use crate::services::session::SessionError;

/// Application-level error type for the API.
#[derive(Debug, Error)]
pub enum ApiError {
    /// No valid session.
    #[error("You must be logged in to do that!")]
    Unauthenticated,

    /// Signed in, but neither owner nor permitted.
    #[error("You don't have permission to do that!")]
    Forbidden,

    /// Resource not found.
    #[error("{0} not found")]
    NotFound(&'static str),

    /// Uniqueness violation, e.g. an email already registered.
    #[error("{0}")]
    Conflict(String),

    /// Unknown email or wrong password. Deliberately indistinguishable.
    #[error("Invalid email or password")]
    InvalidCredentials,

    /// Reset token unknown, already used, or past its expiry.
    #[error("This reset token is either invalid or expired")]
    InvalidOrExpiredToken,

    /// The payment processor refused the charge.
    #[error("Payment declined: {0}")]
    PaymentDeclined(String),

    /// Bad input from the client.
    #[error("{0}")]
    Validation(String),

    /// Database operation failed.
    #[error("Database error: {0}")]
    Repository(RepositoryError),

    /// Payment processor unreachable or misbehaving.
    #[error("Payment error: {0}")]
    Payment(PaymentError),

    /// Email delivery failed.
    #[error("Email error: {0}")]
    Email(#[from] EmailError),

    /// Session token could not be minted.
    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    /// Machine-readable code exposed as `extensions.code`.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Unauthenticated => "UNAUTHENTICATED",
            Self::Forbidden => "FORBIDDEN",
            Self::NotFound(_) => "NOT_FOUND",
            Self::Conflict(_) => "CONFLICT",
            Self::InvalidCredentials => "INVALID_CREDENTIALS",
            Self::InvalidOrExpiredToken => "INVALID_OR_EXPIRED_TOKEN",
            Self::PaymentDeclined(_) => "PAYMENT_DECLINED",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::Repository(_)
            | Self::Payment(_)
            | Self::Email(_)
            | Self::Session(_)
            | Self::Internal(_) => "INTERNAL_SERVER_ERROR",
        }
    }

    /// Whether this is our fault rather than the client's.
    #[must_use]
    pub const fn is_server_error(&self) -> bool {
        matches!(
            self,
            Self::Repository(_)
                | Self::Payment(_)
                | Self::Email(_)
                | Self::Session(_)
                | Self::Internal(_)
        )
    }

    /// Message safe to show to clients.
    #[must_use]
    pub fn public_message(&self) -> String {
        match self {
            Self::Payment(_) => "Payment service unavailable, please try again".to_string(),
            Self::Email(_) => "Could not send email, please try again".to_string(),
            _ if self.is_server_error() => "Internal server error".to_string(),
            _ => self.to_string(),
        }
    }
}

impl From<RepositoryError> for ApiError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound => Self::NotFound("Record"),
            RepositoryError::Conflict(msg) => Self::Conflict(msg),
            other => Self::Repository(other),
        }
    }
}

impl From<PaymentError> for ApiError {
    fn from(err: PaymentError) -> Self {
        match err {
            PaymentError::Declined(msg) => Self::PaymentDeclined(msg),
            other => Self::Payment(other),
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InvalidEmail(e) => Self::Validation(format!("Invalid email: {e}")),
            AuthError::InvalidCredentials => Self::InvalidCredentials,
            AuthError::UserAlreadyExists => {
                Self::Conflict("An account with this email already exists".to_string())
            }
            AuthError::MissingName => Self::Validation("Name is required".to_string()),
            AuthError::WeakPassword(msg) => Self::Validation(msg),
            AuthError::Repository(e) => Self::from(e),
            AuthError::PasswordHash => Self::Internal("password hashing failed".to_string()),
        }
    }
}

impl ErrorExtensions for ApiError {
    fn extend(&self) -> async_graphql::Error {
        // Capture server errors to Sentry
        if self.is_server_error() {
            let event_id = sentry::capture_error(self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        }

        let code = self.code();
        async_graphql::Error::new(self.public_message()).extend_with(|_, e| e.set("code", code))
    }
}

/// Result type alias for `ApiError`.
pub type Result<T> = std::result::Result<T, ApiError>;

/// Set the Sentry user context from a user ID.
///
/// Call this once a request's session is verified to associate errors with users.
pub fn set_sentry_user(user_id: &impl ToString) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            ..Default::default()
        }));
    });
}

/// Clear the Sentry user context.
///
/// Call this on sign-out to stop associating errors with the user.
pub fn clear_sentry_user() {
    sentry::configure_scope(|scope| {
        scope.set_user(None);
    });
}

/// Add a breadcrumb for a workflow step.
///
/// Breadcrumbs appear in Sentry error reports to show the trail of steps
/// leading up to an error.
pub fn add_breadcrumb(category: &str, message: &str, data: &[(&str, String)]) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    for (key, value) in data {
        breadcrumb
            .data
            .insert((*key).to_string(), serde_json::Value::String(value.clone()));
    }

    sentry::add_breadcrumb(breadcrumb);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn code_of(err: &ApiError) -> Option<async_graphql::Value> {
        err.extend()
            .extensions
            .and_then(|ext| ext.get("code").cloned())
    }

    #[test]
    fn test_api_error_display() {
        let err = ApiError::NotFound("Item");
        assert_eq!(err.to_string(), "Item not found");

        let err = ApiError::Validation("cart is empty".to_string());
        assert_eq!(err.to_string(), "cart is empty");
    }

    #[test]
    fn test_graphql_error_carries_code() {
        assert_eq!(
            code_of(&ApiError::Unauthenticated),
            Some(async_graphql::Value::from("UNAUTHENTICATED"))
        );
        assert_eq!(
            code_of(&ApiError::Forbidden),
            Some(async_graphql::Value::from("FORBIDDEN"))
        );
    }

    #[test]
    fn test_server_errors_hide_detail() {
        let err = ApiError::Internal("connection string leaked".to_string());
        let gql = err.extend();
        assert_eq!(gql.message, "Internal server error");
        assert_eq!(err.code(), "INTERNAL_SERVER_ERROR");
    }

    #[test]
    fn test_repository_not_found_maps_to_not_found() {
        let err = ApiError::from(RepositoryError::NotFound);
        assert!(matches!(err, ApiError::NotFound(_)));

        let err = ApiError::from(RepositoryError::Conflict("email already exists".into()));
        assert!(matches!(err, ApiError::Conflict(_)));
    }

    #[test]
    fn test_declined_payment_is_client_error() {
        let err = ApiError::from(PaymentError::Declined("Your card was declined.".into()));
        assert!(matches!(err, ApiError::PaymentDeclined(_)));
        assert!(!err.is_server_error());
    }
}
