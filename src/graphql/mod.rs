//! The `async-graphql` schema: `QueryRoot`, `MutationRoot` and the mapping from internal errors to
//! the messages API clients see.
//!
//! The database handle and `SessionPolicy` are schema data shared by every request. The `Viewer`
//! is attached to each request by the caller (the HTTP server or the `execute` command).

mod mutation;
mod query;

pub use mutation::{CreateTransactionsPayload, LoginPayload, MutationRoot, TransactionInput};
pub use query::QueryRoot;

use crate::auth::{SessionPolicy, Viewer};
use crate::db::{Conflict, Db, NotFound};
use crate::model::User;
use crate::Config;
use async_graphql::{Context, EmptySubscription, Request, Response, Schema, ID};
use tracing::error;

pub type AppSchema = Schema<QueryRoot, MutationRoot, EmptySubscription>;

const MAX_DEPTH: usize = 16;

pub(crate) const AUTHENTICATION_REQUIRED: &str = "Authentication required";
pub(crate) const INTERNAL_ERROR: &str = "Internal server error";

/// Builds the schema around the database and session settings of `config`.
pub fn build_schema(config: &Config) -> AppSchema {
    schema(
        config.db().clone(),
        SessionPolicy::new(config.session_ttl_hours()),
    )
}

pub(crate) fn schema(db: Db, policy: SessionPolicy) -> AppSchema {
    Schema::build(QueryRoot, MutationRoot, EmptySubscription)
        .data(db)
        .data(policy)
        .limit_depth(MAX_DEPTH)
        .finish()
}

/// Executes `request` on behalf of `viewer`.
pub async fn execute(schema: &AppSchema, viewer: Viewer, request: Request) -> Response {
    schema.execute(request.data(viewer)).await
}

/// Parses a GraphQL `ID` into a row id. Ids that are not integers match no row.
pub(crate) fn parse_id(id: &ID) -> Option<i64> {
    id.parse::<i64>().ok()
}

/// Parses an id that must name an existing row, reporting `"<entity> not found"` otherwise.
pub(crate) fn required_id(id: &ID, entity: &'static str) -> async_graphql::Result<i64> {
    parse_id(id).ok_or_else(|| async_graphql::Error::new(NotFound(entity).to_string()))
}

/// The authenticated user of the request.
pub(crate) fn viewer<'a>(ctx: &Context<'a>) -> async_graphql::Result<&'a User> {
    ctx.data_opt::<Viewer>()
        .and_then(Viewer::user)
        .ok_or_else(|| async_graphql::Error::new(AUTHENTICATION_REQUIRED))
}

/// Converts internal results into resolver results.
///
/// `NotFound` and `Conflict` keep their messages. Anything else is logged and reported as
/// `"Internal server error"`.
pub(crate) trait ResolverExt<T> {
    fn or_internal(self) -> async_graphql::Result<T>;
}

impl<T> ResolverExt<T> for crate::Result<T> {
    fn or_internal(self) -> async_graphql::Result<T> {
        self.map_err(|e| {
            if let Some(not_found) = e.downcast_ref::<NotFound>() {
                return async_graphql::Error::new(not_found.to_string());
            }
            if let Some(conflict) = e.downcast_ref::<Conflict>() {
                return async_graphql::Error::new(conflict.to_string());
            }
            error!("Request failed: {e:#}");
            async_graphql::Error::new(INTERNAL_ERROR)
        })
    }
}
