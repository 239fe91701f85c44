use crate::db::Db;
use crate::graphql::ResolverExt;
use crate::model::{Category, Month};
use async_graphql::{ComplexObject, Context, Enum, SimpleObject, ID};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// How a transaction affects the budget.
///
/// Stored as `Expense`, `Savings` or `Income`; exposed as a GraphQL output enum with the values
/// `EXPENSE`, `SAVINGS` and `INCOME`.
#[derive(
    Debug,
    Default,
    Clone,
    Copy,
    Eq,
    PartialEq,
    Ord,
    PartialOrd,
    Hash,
    Serialize,
    Deserialize,
    Enum,
    sqlx::Type,
)]
pub enum Group {
    #[default]
    Expense,
    Savings,
    Income,
}

serde_plain::derive_display_from_serialize!(Group);
serde_plain::derive_fromstr_from_deserialize!(Group);

/// The spelling of `Group` accepted in mutation arguments: `Expense`, `Savings` or `Income`.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Enum)]
#[graphql(rename_items = "PascalCase")]
pub enum GroupInput {
    Expense,
    Savings,
    Income,
}

impl From<GroupInput> for Group {
    fn from(value: GroupInput) -> Self {
        match value {
            GroupInput::Expense => Group::Expense,
            GroupInput::Savings => Group::Savings,
            GroupInput::Income => Group::Income,
        }
    }
}

/// A single booked amount within a month.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize, FromRow, SimpleObject)]
#[graphql(complex)]
pub struct Transaction {
    #[graphql(skip)]
    pub(crate) id: i64,
    #[graphql(skip)]
    pub(crate) user_id: i64,
    #[graphql(skip)]
    pub(crate) month_id: i64,
    #[graphql(skip)]
    pub(crate) category_id: Option<i64>,
    pub amount: i64,
    pub description: String,
    #[sqlx(rename = "transaction_group")]
    pub group: Group,
}

#[ComplexObject]
impl Transaction {
    async fn id(&self) -> ID {
        ID(self.id.to_string())
    }

    async fn month(&self, ctx: &Context<'_>) -> async_graphql::Result<Option<Month>> {
        ctx.data::<Db>()?
            .month(self.user_id, self.month_id)
            .await
            .or_internal()
    }

    /// The category, or null when the transaction is uncategorized.
    async fn category(&self, ctx: &Context<'_>) -> async_graphql::Result<Option<Category>> {
        match self.category_id {
            Some(category_id) => ctx
                .data::<Db>()?
                .category(self.user_id, category_id)
                .await
                .or_internal(),
            None => Ok(None),
        }
    }
}

/// The fields needed to create a `Transaction`. The month and category ids are as given by the
/// caller; ownership is checked when the row is written.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct NewTransaction {
    pub amount: i64,
    pub group: Group,
    pub month_id: i64,
    pub category_id: Option<i64>,
    pub description: String,
}

/// What to do with a transaction's category during an update.
#[derive(Debug, Clone, Copy, Default, Eq, PartialEq)]
pub enum CategoryChange {
    #[default]
    Keep,
    Clear,
    /// Point at this category. Ids the user does not own clear the category instead.
    Set(i64),
}

/// Partial update of a `Transaction`. `None` leaves the field unchanged.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct TransactionUpdates {
    pub amount: Option<i64>,
    pub description: Option<String>,
    pub group: Option<Group>,
    pub month_id: Option<i64>,
    pub category: CategoryChange,
}

impl TransactionUpdates {
    /// Applies the scalar fields. References are resolved by the database layer.
    pub(crate) fn apply_fields(&mut self, transaction: &mut Transaction) {
        if let Some(amount) = self.amount {
            transaction.amount = amount;
        }
        if let Some(description) = self.description.take() {
            transaction.description = description;
        }
        if let Some(group) = self.group {
            transaction.group = group;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_group_strings() {
        assert_eq!(Group::Savings.to_string(), "Savings");
        assert_eq!(Group::from_str("Income").unwrap(), Group::Income);
        assert!(Group::from_str("INCOME").is_err());
    }

    #[test]
    fn test_group_input_conversion() {
        assert_eq!(Group::from(GroupInput::Expense), Group::Expense);
        assert_eq!(Group::from(GroupInput::Savings), Group::Savings);
        assert_eq!(Group::from(GroupInput::Income), Group::Income);
    }

    #[test]
    fn test_apply_fields_leaves_references_alone() {
        let mut transaction = Transaction {
            id: 400,
            user_id: 100,
            month_id: 200,
            category_id: Some(300),
            amount: 1000,
            description: "test".to_string(),
            group: Group::Expense,
        };
        let mut updates = TransactionUpdates {
            amount: Some(888),
            month_id: Some(201),
            category: CategoryChange::Clear,
            ..Default::default()
        };
        updates.apply_fields(&mut transaction);
        assert_eq!(transaction.amount, 888);
        assert_eq!(transaction.description, "test");
        assert_eq!(transaction.month_id, 200);
        assert_eq!(transaction.category_id, Some(300));
    }
}
