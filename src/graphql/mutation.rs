use crate::auth::{self, SessionPolicy, Viewer};
use crate::db::Db;
use crate::graphql::{parse_id, required_id, viewer, ResolverExt};
use crate::model::{
    validate_month_number, Category, CategoryChange, CategoryUpdates, GroupInput, Month,
    MonthUpdates, NewCategory, NewMonth, NewPlan, NewTransaction, Plan, PlanUpdates, Transaction,
    TransactionUpdates, User,
};
use async_graphql::{Context, InputObject, MaybeUndefined, Object, SimpleObject, ID};
use chrono::Utc;
use tracing::{debug, info};

const INVALID_CREDENTIALS: &str = "Invalid credentials";

pub struct MutationRoot;

/// One entry of `createTransactions`.
#[derive(Debug, Clone, InputObject)]
pub struct TransactionInput {
    pub amount: i64,
    pub group: GroupInput,
    pub month: ID,
    pub category: Option<ID>,
    pub description: Option<String>,
}

impl TransactionInput {
    /// `None` when the month id cannot name any row.
    fn into_new_transaction(self) -> Option<NewTransaction> {
        Some(NewTransaction {
            amount: self.amount,
            group: self.group.into(),
            month_id: parse_id(&self.month)?,
            category_id: self.category.as_ref().and_then(parse_id),
            description: self.description.unwrap_or_default(),
        })
    }
}

#[derive(Debug, Clone, SimpleObject)]
pub struct CreateTransactionsPayload {
    /// The transactions that were created, in request order.
    pub transactions: Vec<Transaction>,
}

#[derive(Debug, Clone, SimpleObject)]
pub struct LoginPayload {
    /// Send as `Authorization: Bearer <token>`.
    pub token: String,
    pub user: User,
}

fn db<'a>(ctx: &Context<'a>) -> async_graphql::Result<&'a Db> {
    ctx.data::<Db>()
}

fn month_number(month: i32) -> async_graphql::Result<i32> {
    validate_month_number(month).map_err(|e| async_graphql::Error::new(e.to_string()))
}

#[Object]
impl MutationRoot {
    /// Creates an account. Does not require authentication.
    async fn register(
        &self,
        ctx: &Context<'_>,
        email: String,
        password: String,
        username: Option<String>,
    ) -> async_graphql::Result<User> {
        let email = email.trim();
        if email.is_empty() || !email.contains('@') {
            return Err("Enter a valid email address".into());
        }
        if password.is_empty() {
            return Err("Password must not be empty".into());
        }
        let username = username.as_deref().map(str::trim).filter(|u| !u.is_empty());
        let hash = auth::hash_password(&password).or_internal()?;
        let user = db(ctx)?
            .insert_user(email, username, &hash)
            .await
            .or_internal()?;
        info!("Registered user {}", user.user_id());
        Ok(user)
    }

    /// Exchanges an email and password for a session token.
    async fn login(
        &self,
        ctx: &Context<'_>,
        email: String,
        password: String,
    ) -> async_graphql::Result<LoginPayload> {
        let db = db(ctx)?;
        let credentials = db
            .credentials(email.trim())
            .await
            .or_internal()?
            .ok_or(INVALID_CREDENTIALS)?;
        if !auth::verify_password(&password, &credentials.password_hash).or_internal()? {
            debug!("Wrong password for user {}", credentials.user_id);
            return Err(INVALID_CREDENTIALS.into());
        }
        let user = db
            .user(credentials.user_id)
            .await
            .or_internal()?
            .ok_or(INVALID_CREDENTIALS)?;

        let now = Utc::now();
        let pruned = db.prune_sessions(now).await.or_internal()?;
        if pruned > 0 {
            debug!("Pruned {pruned} expired sessions");
        }
        let policy = ctx.data::<SessionPolicy>()?;
        let expires_at = policy.expires_at(now).or_internal()?;
        let token = auth::new_token();
        db.insert_session(&token, user.user_id(), now, expires_at)
            .await
            .or_internal()?;
        Ok(LoginPayload { token, user })
    }

    /// Revokes the token that authenticated this request. Returns `true` if a session was removed.
    async fn logout(&self, ctx: &Context<'_>) -> async_graphql::Result<bool> {
        viewer(ctx)?;
        match ctx.data_opt::<Viewer>().and_then(Viewer::token) {
            Some(token) => db(ctx)?.delete_session(token).await.or_internal(),
            None => Ok(false),
        }
    }

    /// Books a transaction in one of the caller's months. A category owned by someone else is
    /// dropped.
    async fn create_transaction(
        &self,
        ctx: &Context<'_>,
        amount: i64,
        group: GroupInput,
        month: ID,
        category: Option<ID>,
        description: Option<String>,
    ) -> async_graphql::Result<Transaction> {
        let user = viewer(ctx)?;
        let new = NewTransaction {
            amount,
            group: group.into(),
            month_id: required_id(&month, "Month")?,
            category_id: category.as_ref().and_then(parse_id),
            description: description.unwrap_or_default(),
        };
        db(ctx)?
            .insert_transaction(user.user_id(), new)
            .await
            .or_internal()
    }

    /// Books several transactions at once. Entries for months the caller does not own are left
    /// out of both the database and the result.
    async fn create_transactions(
        &self,
        ctx: &Context<'_>,
        transactions: Vec<TransactionInput>,
    ) -> async_graphql::Result<CreateTransactionsPayload> {
        let user = viewer(ctx)?;
        let new: Vec<NewTransaction> = transactions
            .into_iter()
            .filter_map(TransactionInput::into_new_transaction)
            .collect();
        let transactions = db(ctx)?
            .insert_transactions(user.user_id(), new)
            .await
            .or_internal()?;
        Ok(CreateTransactionsPayload { transactions })
    }

    /// Changes the given fields of a transaction. `category: null` uncategorizes it; a category
    /// the caller does not own does the same.
    async fn update_transaction(
        &self,
        ctx: &Context<'_>,
        id: ID,
        amount: Option<i64>,
        description: Option<String>,
        group: Option<GroupInput>,
        month: Option<ID>,
        category: MaybeUndefined<ID>,
    ) -> async_graphql::Result<Transaction> {
        let user = viewer(ctx)?;
        let transaction_id = required_id(&id, "Transaction")?;
        let month_id = match month {
            Some(month) => Some(required_id(&month, "Month")?),
            None => None,
        };
        let category = match category {
            MaybeUndefined::Undefined => CategoryChange::Keep,
            MaybeUndefined::Null => CategoryChange::Clear,
            MaybeUndefined::Value(id) => parse_id(&id)
                .map(CategoryChange::Set)
                .unwrap_or(CategoryChange::Clear),
        };
        let updates = TransactionUpdates {
            amount,
            description,
            group: group.map(Into::into),
            month_id,
            category,
        };
        db(ctx)?
            .update_transaction(user.user_id(), transaction_id, updates)
            .await
            .or_internal()
    }

    /// Deletes a transaction. Returns null.
    async fn delete_transaction(
        &self,
        ctx: &Context<'_>,
        id: ID,
    ) -> async_graphql::Result<Option<Transaction>> {
        let user = viewer(ctx)?;
        db(ctx)?
            .delete_transaction(user.user_id(), required_id(&id, "Transaction")?)
            .await
            .or_internal()?;
        Ok(None)
    }

    async fn create_category(
        &self,
        ctx: &Context<'_>,
        name: String,
        color: Option<String>,
    ) -> async_graphql::Result<Category> {
        let user = viewer(ctx)?;
        db(ctx)?
            .insert_category(user.user_id(), NewCategory { name, color })
            .await
            .or_internal()
    }

    async fn update_category(
        &self,
        ctx: &Context<'_>,
        id: ID,
        name: Option<String>,
        color: MaybeUndefined<String>,
    ) -> async_graphql::Result<Category> {
        let user = viewer(ctx)?;
        let updates = CategoryUpdates {
            name,
            color: match color {
                MaybeUndefined::Undefined => None,
                MaybeUndefined::Null => Some(None),
                MaybeUndefined::Value(color) => Some(Some(color)),
            },
        };
        db(ctx)?
            .update_category(user.user_id(), required_id(&id, "Category")?, updates)
            .await
            .or_internal()
    }

    /// Deletes a category along with its plans. Its transactions become uncategorized. Returns
    /// null.
    async fn delete_category(
        &self,
        ctx: &Context<'_>,
        id: ID,
    ) -> async_graphql::Result<Option<Category>> {
        let user = viewer(ctx)?;
        db(ctx)?
            .delete_category(user.user_id(), required_id(&id, "Category")?)
            .await
            .or_internal()?;
        Ok(None)
    }

    /// Opens a budget month. `month` is zero-based.
    async fn create_month(
        &self,
        ctx: &Context<'_>,
        month: i32,
        year: i32,
        #[graphql(default)] start_month_savings: i64,
        #[graphql(default)] start_month_balance: i64,
    ) -> async_graphql::Result<Month> {
        let user = viewer(ctx)?;
        let new = NewMonth {
            month: month_number(month)?,
            year,
            start_month_savings,
            start_month_balance,
        };
        db(ctx)?
            .insert_month(user.user_id(), new)
            .await
            .or_internal()
    }

    async fn update_month(
        &self,
        ctx: &Context<'_>,
        id: ID,
        month: Option<i32>,
        year: Option<i32>,
        start_month_savings: Option<i64>,
        start_month_balance: Option<i64>,
    ) -> async_graphql::Result<Month> {
        let user = viewer(ctx)?;
        let updates = MonthUpdates {
            month: month.map(month_number).transpose()?,
            year,
            start_month_savings,
            start_month_balance,
        };
        db(ctx)?
            .update_month(user.user_id(), required_id(&id, "Month")?, updates)
            .await
            .or_internal()
    }

    /// Deletes a month along with its transactions and plans. Returns null.
    async fn delete_month(&self, ctx: &Context<'_>, id: ID) -> async_graphql::Result<Option<Month>> {
        let user = viewer(ctx)?;
        db(ctx)?
            .delete_month(user.user_id(), required_id(&id, "Month")?)
            .await
            .or_internal()?;
        Ok(None)
    }

    async fn create_plan(
        &self,
        ctx: &Context<'_>,
        month: ID,
        category: ID,
        #[graphql(default)] planned_amount: i64,
    ) -> async_graphql::Result<Plan> {
        let user = viewer(ctx)?;
        let new = NewPlan {
            month_id: required_id(&month, "Month")?,
            category_id: required_id(&category, "Category")?,
            planned_amount,
        };
        db(ctx)?
            .insert_plan(user.user_id(), new)
            .await
            .or_internal()
    }

    async fn update_plan(
        &self,
        ctx: &Context<'_>,
        id: ID,
        planned_amount: Option<i64>,
        month: Option<ID>,
        category: Option<ID>,
    ) -> async_graphql::Result<Plan> {
        let user = viewer(ctx)?;
        let updates = PlanUpdates {
            planned_amount,
            month_id: month.map(|m| required_id(&m, "Month")).transpose()?,
            category_id: category
                .map(|c| required_id(&c, "Category"))
                .transpose()?,
        };
        db(ctx)?
            .update_plan(user.user_id(), required_id(&id, "Plan")?, updates)
            .await
            .or_internal()
    }

    /// Deletes a plan. Returns null.
    async fn delete_plan(&self, ctx: &Context<'_>, id: ID) -> async_graphql::Result<Option<Plan>> {
        let user = viewer(ctx)?;
        db(ctx)?
            .delete_plan(user.user_id(), required_id(&id, "Plan")?)
            .await
            .or_internal()?;
        Ok(None)
    }
}
