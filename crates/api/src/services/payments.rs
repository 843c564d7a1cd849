//! Payment processor client.
//!
//! Checkout only needs two calls: charge a tokenized card, and refund a
//! charge when the order can't be recorded. [`StripeClient`] makes them
//! against the Stripe REST API; tests substitute their own
//! [`PaymentGateway`].

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use secrecy::ExposeSecret;
use serde::Deserialize;
use thiserror::Error;
use tracing::{info, instrument, warn};
use url::Url;

use trackytronics_core::{CurrencyCode, Price};

use crate::config::StripeConfig;

/// Errors that can occur when talking to the payment processor.
#[derive(Debug, Error)]
pub enum PaymentError {
    /// The card or token was refused. The message is safe to show the customer.
    #[error("declined: {0}")]
    Declined(String),

    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// API returned an error response.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Client misconfiguration.
    #[error("configuration error: {0}")]
    Config(String),
}

/// A charge to make against a tokenized card.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChargeRequest {
    pub amount: Price,
    pub currency: CurrencyCode,
    /// Opaque card token from the client-side checkout widget.
    pub source: String,
    pub description: String,
    /// Retries with the same key never charge twice.
    pub idempotency_key: String,
}

/// A successful charge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Charge {
    pub id: String,
    pub amount: Price,
}

/// The payment processor as seen by checkout.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Charge a card.
    ///
    /// Returns `PaymentError::Declined` when the processor refuses it.
    async fn charge(&self, request: &ChargeRequest) -> Result<Charge, PaymentError>;

    /// Refund a charge in full.
    async fn refund(&self, charge_id: &str) -> Result<(), PaymentError>;
}

#[derive(Debug, Deserialize)]
struct ChargeResponse {
    id: String,
    amount: i64,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    failure_message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: StripeErrorBody,
}

#[derive(Debug, Deserialize)]
struct StripeErrorBody {
    #[serde(rename = "type")]
    kind: Option<String>,
    message: Option<String>,
}

/// Stripe REST client.
#[derive(Clone)]
pub struct StripeClient {
    client: reqwest::Client,
    api_base: Url,
}

impl StripeClient {
    /// Create a new Stripe client.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client fails to build.
    pub fn new(config: &StripeConfig) -> Result<Self, PaymentError> {
        let mut headers = HeaderMap::new();

        let auth_value = format!("Bearer {}", config.secret_key.expose_secret());
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&auth_value)
                .map_err(|e| PaymentError::Config(format!("Invalid API key format: {e}")))?,
        );

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .build()?;

        Ok(Self {
            client,
            api_base: config.api_base.clone(),
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url, PaymentError> {
        self.api_base
            .join(path)
            .map_err(|e| PaymentError::Config(format!("Invalid API base: {e}")))
    }
}

/// Turn a non-2xx response into the matching error.
async fn error_from_response(response: reqwest::Response) -> PaymentError {
    let status = response.status().as_u16();
    let text = response.text().await.unwrap_or_default();
    let body = serde_json::from_str::<ErrorEnvelope>(&text).ok().map(|e| e.error);

    let is_card_error = body
        .as_ref()
        .and_then(|b| b.kind.as_deref())
        .is_some_and(|kind| kind == "card_error");

    if status == 402 || is_card_error {
        let message = body
            .and_then(|b| b.message)
            .unwrap_or_else(|| "Your card was declined.".to_string());
        return PaymentError::Declined(message);
    }

    PaymentError::Api {
        status,
        message: body.and_then(|b| b.message).unwrap_or(text),
    }
}

#[async_trait]
impl PaymentGateway for StripeClient {
    #[instrument(skip(self, request), fields(amount = %request.amount, currency = %request.currency))]
    async fn charge(&self, request: &ChargeRequest) -> Result<Charge, PaymentError> {
        let url = self.endpoint("/v1/charges")?;
        let amount = request.amount.minor_units().to_string();
        let params = [
            ("amount", amount.as_str()),
            ("currency", request.currency.as_str()),
            ("source", request.source.as_str()),
            ("description", request.description.as_str()),
        ];

        let response = self
            .client
            .post(url)
            .header("Idempotency-Key", &request.idempotency_key)
            .form(&params)
            .send()
            .await?;

        if !response.status().is_success() {
            let err = error_from_response(response).await;
            warn!(error = %err, "Charge failed");
            return Err(err);
        }

        let charge: ChargeResponse = response.json().await?;
        if charge.status.as_deref() == Some("failed") {
            return Err(PaymentError::Declined(
                charge
                    .failure_message
                    .unwrap_or_else(|| "Your card was declined.".to_string()),
            ));
        }

        let amount = Price::from_minor_units(charge.amount).map_err(|e| PaymentError::Api {
            status: 200,
            message: format!("unexpected charge amount: {e}"),
        })?;

        info!(charge_id = %charge.id, "Charge succeeded");
        Ok(Charge {
            id: charge.id,
            amount,
        })
    }

    #[instrument(skip(self))]
    async fn refund(&self, charge_id: &str) -> Result<(), PaymentError> {
        let url = self.endpoint("/v1/refunds")?;

        let response = self
            .client
            .post(url)
            .form(&[("charge", charge_id)])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }

        info!(charge_id, "Charge refunded");
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    use axum::{
        Form, Json, Router,
        extract::State,
        http::{HeaderMap as AxumHeaders, StatusCode},
        routing::post,
    };
    use secrecy::SecretString;

    use super::*;

    #[derive(Clone, Default)]
    struct Seen {
        charges: Arc<Mutex<Vec<(Option<String>, HashMap<String, String>)>>>,
    }

    async fn fake_charges(
        State(seen): State<Seen>,
        headers: AxumHeaders,
        Form(form): Form<HashMap<String, String>>,
    ) -> (StatusCode, Json<serde_json::Value>) {
        let key = headers
            .get("idempotency-key")
            .and_then(|v| v.to_str().ok())
            .map(String::from);
        let source = form.get("source").cloned().unwrap_or_default();
        seen.charges.lock().unwrap().push((key, form.clone()));

        if source == "tok_chargeDeclined" {
            return (
                StatusCode::PAYMENT_REQUIRED,
                Json(serde_json::json!({
                    "error": { "type": "card_error", "message": "Your card was declined." }
                })),
            );
        }

        let amount: i64 = form["amount"].parse().unwrap();
        (
            StatusCode::OK,
            Json(serde_json::json!({ "id": "ch_test_1", "amount": amount, "status": "succeeded" })),
        )
    }

    async fn fake_refunds() -> (StatusCode, Json<serde_json::Value>) {
        (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({
                "error": { "type": "invalid_request_error", "message": "Charge has already been refunded." }
            })),
        )
    }

    async fn spawn_fake_stripe() -> (StripeClient, Seen) {
        let seen = Seen::default();
        let app = Router::new()
            .route("/v1/charges", post(fake_charges))
            .route("/v1/refunds", post(fake_refunds))
            .with_state(seen.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let client = StripeClient::new(&StripeConfig {
            secret_key: SecretString::from("sk_test_4eC39HqLyjWDarjtT1zdp7dc"),
            api_base: Url::parse(&format!("http://{addr}")).unwrap(),
        })
        .unwrap();

        (client, seen)
    }

    fn request(source: &str) -> ChargeRequest {
        ChargeRequest {
            amount: Price::from_minor_units(2500).unwrap(),
            currency: CurrencyCode::EUR,
            source: source.to_string(),
            description: "Charge for a@x.com".to_string(),
            idempotency_key: "order-abc".to_string(),
        }
    }

    #[tokio::test]
    async fn test_charge_sends_form_and_idempotency_key() {
        let (client, seen) = spawn_fake_stripe().await;

        let charge = client.charge(&request("tok_visa")).await.unwrap();

        assert_eq!(charge.id, "ch_test_1");
        assert_eq!(charge.amount.minor_units(), 2500);

        let calls = seen.charges.lock().unwrap();
        let (key, form) = &calls[0];
        assert_eq!(key.as_deref(), Some("order-abc"));
        assert_eq!(form["amount"], "2500");
        assert_eq!(form["currency"], "eur");
        assert_eq!(form["description"], "Charge for a@x.com");
    }

    #[tokio::test]
    async fn test_card_error_is_declined() {
        let (client, _) = spawn_fake_stripe().await;

        let err = client.charge(&request("tok_chargeDeclined")).await.unwrap_err();

        assert!(matches!(err, PaymentError::Declined(msg) if msg == "Your card was declined."));
    }

    #[tokio::test]
    async fn test_refund_failure_is_api_error() {
        let (client, _) = spawn_fake_stripe().await;

        let err = client.refund("ch_test_1").await.unwrap_err();

        assert!(matches!(err, PaymentError::Api { status: 400, .. }));
    }
}
