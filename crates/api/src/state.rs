//! Application state shared across handlers and resolvers.

use std::sync::Arc;

use crate::config::ApiConfig;
use crate::db::Store;
use crate::services::email::Mailer;
use crate::services::payments::PaymentGateway;
use crate::services::session::SessionIssuer;

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc`. The store, payment gateway and
/// mailer are trait objects so tests can swap in the in-memory store and
/// recording fakes.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: ApiConfig,
    store: Arc<dyn Store>,
    payments: Arc<dyn PaymentGateway>,
    mailer: Arc<dyn Mailer>,
    sessions: SessionIssuer,
}

impl AppState {
    /// Create a new application state.
    ///
    /// The session issuer is derived from `config.app_secret`; cookies are
    /// marked `Secure` when the frontend is served over https.
    #[must_use]
    pub fn new(
        config: ApiConfig,
        store: Arc<dyn Store>,
        payments: Arc<dyn PaymentGateway>,
        mailer: Arc<dyn Mailer>,
    ) -> Self {
        let sessions = SessionIssuer::new(&config.app_secret, config.secure_cookies());

        Self {
            inner: Arc::new(AppStateInner {
                config,
                store,
                payments,
                mailer,
                sessions,
            }),
        }
    }

    /// Get a reference to the API configuration.
    #[must_use]
    pub fn config(&self) -> &ApiConfig {
        &self.inner.config
    }

    /// Get a reference to the data store.
    #[must_use]
    pub fn store(&self) -> &dyn Store {
        self.inner.store.as_ref()
    }

    /// Get a reference to the payment gateway.
    #[must_use]
    pub fn payments(&self) -> &dyn PaymentGateway {
        self.inner.payments.as_ref()
    }

    /// Get a reference to the outgoing mailer.
    #[must_use]
    pub fn mailer(&self) -> &dyn Mailer {
        self.inner.mailer.as_ref()
    }

    /// Get a reference to the session issuer.
    #[must_use]
    pub fn sessions(&self) -> &SessionIssuer {
        &self.inner.sessions
    }
}
