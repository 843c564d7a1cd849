//! Integration test harness for the Trackytronics API.
//!
//! [`TestApp`] wires the real schema and router to a [`MemoryStore`], a
//! recording payment gateway and an outbox mailer, so GraphQL documents can
//! be executed end to end without `PostgreSQL`, Stripe or SMTP.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p trackytronics-integration-tests
//! ```

#![allow(clippy::unwrap_used, clippy::missing_panics_doc)]

use std::sync::{Arc, Mutex};

use async_graphql::{Request, Response, Variables};
use async_trait::async_trait;
use axum::Router;
use secrecy::SecretString;
use url::Url;

use trackytronics_api::config::{ApiConfig, EmailConfig, StripeConfig};
use trackytronics_api::db::{MemoryStore, Store};
use trackytronics_api::graphql::{ApiSchema, build_schema};
use trackytronics_api::models::NewItem;
use trackytronics_api::routes;
use trackytronics_api::services::auth::AuthService;
use trackytronics_api::services::email::{EmailError, Mailer, OutgoingEmail};
use trackytronics_api::services::payments::{Charge, ChargeRequest, PaymentError, PaymentGateway};
use trackytronics_api::services::session::Identity;
use trackytronics_api::state::AppState;
use trackytronics_core::{CurrencyCode, ItemId, Permission, PermissionSet, Price, UserId};

/// Configuration pointing at nothing real.
#[must_use]
pub fn test_config() -> ApiConfig {
    ApiConfig {
        database_url: SecretString::from("postgres://localhost/trackytronics_test"),
        host: "127.0.0.1".parse().unwrap(),
        port: 4444,
        frontend_url: Url::parse("http://localhost:7777").unwrap(),
        app_secret: SecretString::from("kX9#mQ2$vB7!pL4@wN8^zR3&tY6*hJ1%"),
        stripe: StripeConfig {
            secret_key: SecretString::from("sk_test_4eC39HqLyjWDarjtT1zdp7dc"),
            api_base: Url::parse("http://127.0.0.1:9").unwrap(),
        },
        email: EmailConfig {
            smtp_host: "127.0.0.1".to_string(),
            smtp_port: 2525,
            smtp_username: "mailer".to_string(),
            smtp_password: SecretString::from("smtp_pass_value"),
            from_address: "tracky-tronics@gmail.com".to_string(),
            support_address: "support@trackytronics.test".to_string(),
        },
        checkout_currency: CurrencyCode::EUR,
        page_size: 4,
        graphiql: false,
        sentry_dsn: None,
        sentry_environment: None,
    }
}

/// Payment gateway that records charges and refunds.
#[derive(Default)]
pub struct FakeGateway {
    charges: Mutex<Vec<ChargeRequest>>,
    refunds: Mutex<Vec<String>>,
    decline_with: Mutex<Option<String>>,
}

impl FakeGateway {
    /// Refuse every subsequent charge with `message`.
    pub fn decline(&self, message: &str) {
        *self.decline_with.lock().unwrap() = Some(message.to_owned());
    }

    #[must_use]
    pub fn charges(&self) -> Vec<ChargeRequest> {
        self.charges.lock().unwrap().clone()
    }

    #[must_use]
    pub fn refunds(&self) -> Vec<String> {
        self.refunds.lock().unwrap().clone()
    }
}

#[async_trait]
impl PaymentGateway for FakeGateway {
    async fn charge(&self, request: &ChargeRequest) -> Result<Charge, PaymentError> {
        if let Some(message) = self.decline_with.lock().unwrap().clone() {
            return Err(PaymentError::Declined(message));
        }
        let mut charges = self.charges.lock().unwrap();
        charges.push(request.clone());
        Ok(Charge {
            id: format!("ch_test_{}", charges.len()),
            amount: request.amount,
        })
    }

    async fn refund(&self, charge_id: &str) -> Result<(), PaymentError> {
        self.refunds.lock().unwrap().push(charge_id.to_owned());
        Ok(())
    }
}

/// Mailer that keeps every message instead of sending it.
#[derive(Default)]
pub struct Outbox {
    sent: Mutex<Vec<OutgoingEmail>>,
}

impl Outbox {
    #[must_use]
    pub fn sent(&self) -> Vec<OutgoingEmail> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Mailer for Outbox {
    async fn send(&self, email: OutgoingEmail) -> Result<(), EmailError> {
        self.sent.lock().unwrap().push(email);
        Ok(())
    }
}

/// The API wired to in-process collaborators.
pub struct TestApp {
    pub state: AppState,
    pub schema: ApiSchema,
    pub store: Arc<MemoryStore>,
    pub payments: Arc<FakeGateway>,
    pub outbox: Arc<Outbox>,
}

impl Default for TestApp {
    fn default() -> Self {
        Self::new()
    }
}

impl TestApp {
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(test_config())
    }

    #[must_use]
    pub fn with_config(config: ApiConfig) -> Self {
        let store = Arc::new(MemoryStore::new());
        let payments = Arc::new(FakeGateway::default());
        let outbox = Arc::new(Outbox::default());
        let state = AppState::new(config, store.clone(), payments.clone(), outbox.clone());
        let schema = build_schema(state.clone());

        Self {
            state,
            schema,
            store,
            payments,
            outbox,
        }
    }

    /// The full HTTP router, as served by the binary minus the Sentry layers.
    #[must_use]
    pub fn router(&self) -> Router {
        routes::router(self.state.clone()).unwrap()
    }

    /// Execute a document as `identity`.
    pub async fn execute(&self, identity: Identity, query: &str) -> Response {
        self.schema
            .execute(Request::new(query).data(identity))
            .await
    }

    /// Execute a document with variables as `identity`.
    pub async fn execute_with(
        &self,
        identity: Identity,
        query: &str,
        variables: serde_json::Value,
    ) -> Response {
        let request = Request::new(query)
            .variables(Variables::from_json(variables))
            .data(identity);
        self.schema.execute(request).await
    }

    /// Sign up a user and grant extra permissions.
    pub async fn user(&self, email: &str, extra: &[Permission]) -> UserId {
        let user = AuthService::new(self.store.as_ref())
            .signup(email, "Test User", "password123")
            .await
            .unwrap();
        if extra.is_empty() {
            return user.id;
        }
        let mut permissions: PermissionSet = user.permissions.clone();
        for permission in extra {
            permissions.insert(*permission);
        }
        self.store.set_permissions(user.id, &permissions).await.unwrap();
        user.id
    }

    /// List an item for sale.
    pub async fn item(&self, seller: UserId, title: &str, price: i64) -> ItemId {
        self.store
            .create_item(NewItem {
                title: title.to_owned(),
                description: format!("{title} description"),
                price: Price::from_minor_units(price).unwrap(),
                image: None,
                large_image: None,
                user_id: seller,
            })
            .await
            .unwrap()
            .id
    }
}

/// The response data as JSON, asserting there were no errors.
pub fn data(response: Response) -> serde_json::Value {
    assert!(response.errors.is_empty(), "unexpected errors: {:?}", response.errors);
    response.data.into_json().unwrap()
}

/// `extensions.code` of the first error.
#[must_use]
pub fn error_code(response: &Response) -> Option<String> {
    let error = response.errors.first()?;
    match error.extensions.as_ref()?.get("code")? {
        async_graphql::Value::String(code) => Some(code.clone()),
        _ => None,
    }
}
