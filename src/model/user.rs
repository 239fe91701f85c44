use async_graphql::{ComplexObject, SimpleObject, ID};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// An account that owns months, categories, transactions and plans.
///
/// The password hash is deliberately not part of this type; it is only ever read through
/// `Db::credentials`.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize, FromRow, SimpleObject)]
#[graphql(complex)]
pub struct User {
    #[graphql(skip)]
    pub(crate) id: i64,
    pub email: String,
    pub username: Option<String>,
    /// When the account was registered, as an RFC 3339 UTC timestamp.
    pub date_joined: String,
}

#[ComplexObject]
impl User {
    async fn id(&self) -> ID {
        ID(self.id.to_string())
    }
}

impl User {
    pub fn user_id(&self) -> i64 {
        self.id
    }
}
