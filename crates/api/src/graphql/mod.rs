//! GraphQL schema, resolvers and output types.
//!
//! Resolvers are thin: each one reads the request's [`Identity`] and the
//! shared [`AppState`] from the context and hands off to a service. Service
//! errors become GraphQL errors through [`ApiError`]'s `ErrorExtensions` impl,
//! which sets `extensions.code`.

pub mod resolvers;
pub mod schema;
pub mod types;

use std::str::FromStr;

use async_graphql::{Context, ErrorExtensions, ID};

use trackytronics_core::IdError;

use crate::error::ApiError;
use crate::services::session::Identity;
use crate::state::AppState;

pub use schema::{ApiSchema, build_schema, graphiql, graphql_handler};

static ANONYMOUS: Identity = Identity::anonymous();

/// Shared state attached to the schema.
pub(crate) fn state<'a>(ctx: &Context<'a>) -> async_graphql::Result<&'a AppState> {
    ctx.data::<AppState>()
}

/// The identity attached to this request, anonymous if none was.
pub(crate) fn identity<'a>(ctx: &Context<'a>) -> &'a Identity {
    ctx.data_opt::<Identity>().unwrap_or(&ANONYMOUS)
}

/// Parse a GraphQL `ID` into a typed ID.
pub(crate) fn parse_id<T>(id: &ID) -> Result<T, ApiError>
where
    T: FromStr<Err = IdError>,
{
    id.as_str()
        .parse()
        .map_err(|e: IdError| ApiError::Validation(e.to_string()))
}

/// Convert service results into GraphQL results, keeping the error code.
pub(crate) trait GraphqlResultExt<T> {
    fn graphql(self) -> async_graphql::Result<T>;
}

impl<T> GraphqlResultExt<T> for Result<T, ApiError> {
    fn graphql(self) -> async_graphql::Result<T> {
        self.map_err(|e| e.extend())
    }
}
