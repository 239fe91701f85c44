use crate::db::Db;
use crate::graphql::ResolverExt;
use crate::model::{Category, Month};
use async_graphql::{ComplexObject, Context, SimpleObject, ID};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A budgeted spending target for one category in one month.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize, FromRow, SimpleObject)]
#[graphql(complex)]
pub struct Plan {
    #[graphql(skip)]
    pub(crate) id: i64,
    #[graphql(skip)]
    pub(crate) user_id: i64,
    #[graphql(skip)]
    pub(crate) month_id: i64,
    #[graphql(skip)]
    pub(crate) category_id: i64,
    pub planned_amount: i64,
}

#[ComplexObject]
impl Plan {
    async fn id(&self) -> ID {
        ID(self.id.to_string())
    }

    async fn month(&self, ctx: &Context<'_>) -> async_graphql::Result<Option<Month>> {
        ctx.data::<Db>()?
            .month(self.user_id, self.month_id)
            .await
            .or_internal()
    }

    async fn category(&self, ctx: &Context<'_>) -> async_graphql::Result<Option<Category>> {
        ctx.data::<Db>()?
            .category(self.user_id, self.category_id)
            .await
            .or_internal()
    }
}

#[derive(Debug, Clone, Copy, Default, Eq, PartialEq)]
pub struct NewPlan {
    pub month_id: i64,
    pub category_id: i64,
    pub planned_amount: i64,
}

/// Partial update of a `Plan`. `None` leaves the field unchanged.
#[derive(Debug, Clone, Copy, Default, Eq, PartialEq)]
pub struct PlanUpdates {
    pub planned_amount: Option<i64>,
    pub month_id: Option<i64>,
    pub category_id: Option<i64>,
}
