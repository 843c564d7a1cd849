//! Schema construction and the axum handlers that serve it.

use async_graphql::http::GraphiQLSource;
use async_graphql::{EmptySubscription, Schema};
use async_graphql_axum::{GraphQLRequest, GraphQLResponse};
use axum::Extension;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::{Html, IntoResponse};

use super::resolvers::{Mutation, Query};
use crate::error::set_sentry_user;
use crate::state::AppState;

/// The complete GraphQL schema.
pub type ApiSchema = Schema<Query, Mutation, EmptySubscription>;

/// Build the schema with the application state attached.
#[must_use]
pub fn build_schema(state: AppState) -> ApiSchema {
    Schema::build(Query, Mutation, EmptySubscription)
        .data(state)
        .finish()
}

/// Execute a GraphQL request.
///
/// The session cookie is read here, once per request, and the resulting
/// identity is attached as request data for the resolvers.
pub async fn graphql_handler(
    State(state): State<AppState>,
    Extension(schema): Extension<ApiSchema>,
    headers: HeaderMap,
    req: GraphQLRequest,
) -> GraphQLResponse {
    let identity = state.sessions().identity_from_headers(&headers);
    if let Some(user_id) = identity.user_id() {
        set_sentry_user(&user_id);
    }

    schema.execute(req.into_inner().data(identity)).await.into()
}

/// The `GraphiQL` IDE, pointed at `/graphql`.
pub async fn graphiql() -> impl IntoResponse {
    Html(GraphiQLSource::build().endpoint("/graphql").finish())
}
