//! HTTP routes.
//!
//! # Route Structure
//!
//! ```text
//! POST /graphql        - GraphQL endpoint
//! GET  /graphql        - GraphiQL IDE (only with API_GRAPHIQL=true)
//! GET  /health         - Liveness check
//! GET  /health/ready   - Readiness check (store reachable)
//! ```

use axum::extract::{Request, State};
use axum::http::header::{self, InvalidHeaderValue};
use axum::http::{HeaderValue, Method, StatusCode};
use axum::routing::{MethodRouter, get, post};
use axum::{Extension, Router, middleware};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::config::ApiConfig;
use crate::graphql::{build_schema, graphiql, graphql_handler};
use crate::middleware::{REQUEST_ID_HEADER, request_id_middleware};
use crate::state::AppState;

/// Build the full application router.
///
/// # Errors
///
/// Returns an error if the frontend origin can't be used as a CORS header.
pub fn router(state: AppState) -> Result<Router, InvalidHeaderValue> {
    let cors = cors_layer(state.config())?;
    let schema = build_schema(state.clone());

    let mut graphql: MethodRouter<AppState> = post(graphql_handler);
    if state.config().graphiql {
        graphql = graphql.get(graphiql);
    }

    Ok(Router::new()
        .route("/graphql", graphql)
        .route("/health", get(health))
        .route("/health/ready", get(readiness))
        .layer(Extension(schema))
        .with_state(state)
        .layer(middleware::from_fn(request_id_middleware))
        .layer(TraceLayer::new_for_http().make_span_with(|request: &Request| {
            tracing::info_span!(
                "http_request",
                method = %request.method(),
                uri = %request.uri(),
                request_id = tracing::field::Empty,
            )
        }))
        .layer(cors))
}

/// CORS for the frontend, with credentials so the session cookie is sent.
fn cors_layer(config: &ApiConfig) -> Result<CorsLayer, InvalidHeaderValue> {
    let origin = HeaderValue::from_str(&config.frontend_url.origin().ascii_serialization())?;

    Ok(CorsLayer::new()
        .allow_origin(origin)
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT, header::AUTHORIZATION])
        .expose_headers([header::HeaderName::from_static(REQUEST_ID_HEADER)]))
}

/// Liveness health check endpoint.
///
/// Returns "ok" if the server is running. Does not check dependencies.
async fn health() -> &'static str {
    "ok"
}

/// Readiness health check endpoint.
///
/// Returns 503 Service Unavailable if the store is not reachable.
async fn readiness(State(state): State<AppState>) -> StatusCode {
    match state.store().ping().await {
        Ok(()) => StatusCode::OK,
        Err(e) => {
            tracing::warn!(error = %e, "Readiness check failed");
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}
