use crate::db::Db;
use crate::graphql::ResolverExt;
use crate::model::{Plan, Transaction};
use async_graphql::{ComplexObject, Context, SimpleObject, ID};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt::{Display, Formatter};

/// January.
pub const FIRST_MONTH: i32 = 0;
/// December.
pub const LAST_MONTH: i32 = 11;

/// One month of a user's budget.
///
/// `month` is zero-based, January is `0` and December is `11`. A user has at most one `Month` for
/// each `(month, year)` pair.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize, FromRow, SimpleObject)]
#[graphql(complex)]
pub struct Month {
    #[graphql(skip)]
    pub(crate) id: i64,
    #[graphql(skip)]
    pub(crate) user_id: i64,
    pub month: i32,
    pub year: i32,
    /// Savings carried into the month.
    pub start_month_savings: i64,
    /// Account balance carried into the month.
    pub start_month_balance: i64,
}

#[ComplexObject]
impl Month {
    async fn id(&self) -> ID {
        ID(self.id.to_string())
    }

    /// Transactions booked against this month.
    async fn transactions(&self, ctx: &Context<'_>) -> async_graphql::Result<Vec<Transaction>> {
        ctx.data::<Db>()?
            .transactions(self.user_id, Some(self.id))
            .await
            .or_internal()
    }

    /// Spending plans for this month.
    async fn plans(&self, ctx: &Context<'_>) -> async_graphql::Result<Vec<Plan>> {
        ctx.data::<Db>()?
            .plans(self.user_id, Some(self.id))
            .await
            .or_internal()
    }
}

/// The fields needed to create a `Month`.
#[derive(Debug, Clone, Copy, Default, Eq, PartialEq)]
pub struct NewMonth {
    pub month: i32,
    pub year: i32,
    pub start_month_savings: i64,
    pub start_month_balance: i64,
}

/// Partial update of a `Month`. `None` leaves the field unchanged.
#[derive(Debug, Clone, Copy, Default, Eq, PartialEq)]
pub struct MonthUpdates {
    pub month: Option<i32>,
    pub year: Option<i32>,
    pub start_month_savings: Option<i64>,
    pub start_month_balance: Option<i64>,
}

impl MonthUpdates {
    pub(crate) fn apply(self, month: &mut Month) {
        if let Some(value) = self.month {
            month.month = value;
        }
        if let Some(value) = self.year {
            month.year = value;
        }
        if let Some(value) = self.start_month_savings {
            month.start_month_savings = value;
        }
        if let Some(value) = self.start_month_balance {
            month.start_month_balance = value;
        }
    }
}

/// A month number outside of `FIRST_MONTH..=LAST_MONTH`.
///
/// The message is rendered as a list of validation messages, e.g. `['12 not in range (0,11)']`,
/// which is the form API clients match on.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct MonthRangeError(i32);

impl MonthRangeError {
    pub fn value(&self) -> i32 {
        self.0
    }
}

impl Display for MonthRangeError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "['{} not in range ({FIRST_MONTH},{LAST_MONTH})']",
            self.0
        )
    }
}

impl std::error::Error for MonthRangeError {}

/// Returns `month` unchanged if it is a valid zero-based month number.
pub fn validate_month_number(month: i32) -> Result<i32, MonthRangeError> {
    if (FIRST_MONTH..=LAST_MONTH).contains(&month) {
        Ok(month)
    } else {
        Err(MonthRangeError(month))
    }
}
