//! Types that represent the core data model: `User`, `Month`, `Category`, `Transaction` and
//! `Plan`.
//!
//! Each row type is both a `sqlx::FromRow` and an `async_graphql` object. Foreign keys are kept as
//! raw ids and are resolved through the database on demand, always scoped to the row's owner.
mod category;
mod month;
mod plan;
mod transaction;
mod user;

pub use category::{Category, CategoryUpdates, NewCategory};
pub use month::{validate_month_number, Month, MonthRangeError, MonthUpdates, NewMonth};
pub use plan::{NewPlan, Plan, PlanUpdates};
pub use transaction::{
    CategoryChange, Group, GroupInput, NewTransaction, Transaction, TransactionUpdates,
};
pub use user::User;
