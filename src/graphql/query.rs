use crate::auth::Viewer;
use crate::db::Db;
use crate::graphql::{parse_id, viewer, ResolverExt};
use crate::model::{Category, Month, Plan, Transaction, User};
use async_graphql::{Context, Object, ID};

pub struct QueryRoot;

/// Resolves an optional `month` filter. `Err(())` means the id can never match.
fn month_filter(month: Option<ID>) -> Result<Option<i64>, ()> {
    match month {
        Some(id) => parse_id(&id).map(Some).ok_or(()),
        None => Ok(None),
    }
}

#[Object]
impl QueryRoot {
    /// The authenticated user, or null for anonymous requests.
    async fn me(&self, ctx: &Context<'_>) -> Option<User> {
        ctx.data_opt::<Viewer>()
            .and_then(Viewer::user)
            .cloned()
    }

    /// The caller's months, oldest first.
    async fn months(&self, ctx: &Context<'_>) -> async_graphql::Result<Vec<Month>> {
        let user = viewer(ctx)?;
        ctx.data::<Db>()?.months(user.user_id()).await.or_internal()
    }

    async fn month(&self, ctx: &Context<'_>, id: ID) -> async_graphql::Result<Option<Month>> {
        let user = viewer(ctx)?;
        let Some(month_id) = parse_id(&id) else {
            return Ok(None);
        };
        ctx.data::<Db>()?
            .month(user.user_id(), month_id)
            .await
            .or_internal()
    }

    /// The caller's categories, by name.
    async fn categories(&self, ctx: &Context<'_>) -> async_graphql::Result<Vec<Category>> {
        let user = viewer(ctx)?;
        ctx.data::<Db>()?
            .categories(user.user_id())
            .await
            .or_internal()
    }

    async fn category(
        &self,
        ctx: &Context<'_>,
        id: ID,
    ) -> async_graphql::Result<Option<Category>> {
        let user = viewer(ctx)?;
        let Some(category_id) = parse_id(&id) else {
            return Ok(None);
        };
        ctx.data::<Db>()?
            .category(user.user_id(), category_id)
            .await
            .or_internal()
    }

    /// The caller's transactions, optionally only those of one month.
    async fn transactions(
        &self,
        ctx: &Context<'_>,
        month: Option<ID>,
    ) -> async_graphql::Result<Vec<Transaction>> {
        let user = viewer(ctx)?;
        let Ok(month_id) = month_filter(month) else {
            return Ok(Vec::new());
        };
        ctx.data::<Db>()?
            .transactions(user.user_id(), month_id)
            .await
            .or_internal()
    }

    async fn transaction(
        &self,
        ctx: &Context<'_>,
        id: ID,
    ) -> async_graphql::Result<Option<Transaction>> {
        let user = viewer(ctx)?;
        let Some(transaction_id) = parse_id(&id) else {
            return Ok(None);
        };
        ctx.data::<Db>()?
            .transaction(user.user_id(), transaction_id)
            .await
            .or_internal()
    }

    /// The caller's plans, optionally only those of one month.
    async fn plans(
        &self,
        ctx: &Context<'_>,
        month: Option<ID>,
    ) -> async_graphql::Result<Vec<Plan>> {
        let user = viewer(ctx)?;
        let Ok(month_id) = month_filter(month) else {
            return Ok(Vec::new());
        };
        ctx.data::<Db>()?
            .plans(user.user_id(), month_id)
            .await
            .or_internal()
    }

    async fn plan(&self, ctx: &Context<'_>, id: ID) -> async_graphql::Result<Option<Plan>> {
        let user = viewer(ctx)?;
        let Some(plan_id) = parse_id(&id) else {
            return Ok(None);
        };
        ctx.data::<Db>()?
            .plan(user.user_id(), plan_id)
            .await
            .or_internal()
    }
}
