use crate::db::categories::owned_category_id;
use crate::db::months::fetch_month;
use crate::db::{Db, NotFound};
use crate::model::{CategoryChange, NewTransaction, Transaction, TransactionUpdates};
use crate::Result;
use anyhow::Context;
use sqlx::SqliteConnection;
use tracing::debug;

const TRANSACTION_COLUMNS: &str =
    "id, user_id, month_id, category_id, amount, description, transaction_group";

impl Db {
    /// Inserts a single transaction for `user_id`. A category the user does not own is dropped.
    ///
    /// # Errors
    /// - Returns `NotFound` if the month does not exist or belongs to another user.
    pub(crate) async fn insert_transaction(
        &self,
        user_id: i64,
        new: NewTransaction,
    ) -> Result<Transaction> {
        let mut tx = self.pool().begin().await?;
        let inserted = insert_one(&mut tx, user_id, new)
            .await?
            .ok_or(NotFound("Month"))?;
        tx.commit()
            .await
            .context("Failed to commit transaction insert")?;
        Ok(inserted)
    }

    /// Inserts several transactions at once.
    ///
    /// Entries whose month the user does not own are skipped. Entries whose category the user does
    /// not own are inserted without a category. The accepted entries are written atomically and
    /// returned in input order.
    pub(crate) async fn insert_transactions(
        &self,
        user_id: i64,
        new: Vec<NewTransaction>,
    ) -> Result<Vec<Transaction>> {
        let requested = new.len();
        let mut tx = self.pool().begin().await?;
        let mut inserted = Vec::with_capacity(requested);
        for item in new {
            if let Some(transaction) = insert_one(&mut tx, user_id, item).await? {
                inserted.push(transaction);
            }
        }
        tx.commit()
            .await
            .context("Failed to commit transaction batch")?;
        debug!(
            "Inserted {} of {requested} transactions for user {user_id}",
            inserted.len()
        );
        Ok(inserted)
    }

    pub(crate) async fn transaction(
        &self,
        user_id: i64,
        transaction_id: i64,
    ) -> Result<Option<Transaction>> {
        let mut conn = self.pool().acquire().await?;
        fetch_transaction(&mut conn, user_id, transaction_id).await
    }

    /// The user's transactions, optionally restricted to one month, in insertion order.
    pub(crate) async fn transactions(
        &self,
        user_id: i64,
        month_id: Option<i64>,
    ) -> Result<Vec<Transaction>> {
        sqlx::query_as(&format!(
            "SELECT {TRANSACTION_COLUMNS} FROM transactions \
             WHERE user_id = ? AND (? IS NULL OR month_id = ?) ORDER BY id"
        ))
        .bind(user_id)
        .bind(month_id)
        .bind(month_id)
        .fetch_all(self.pool())
        .await
        .context("Failed to query transactions")
    }

    /// Applies `updates` to one of the user's transactions.
    ///
    /// # Errors
    /// - Returns `NotFound("Transaction")` if the transaction does not exist or belongs to another
    ///   user.
    /// - Returns `NotFound("Month")` if `updates` moves it to a month the user does not own.
    pub(crate) async fn update_transaction(
        &self,
        user_id: i64,
        transaction_id: i64,
        mut updates: TransactionUpdates,
    ) -> Result<Transaction> {
        let mut tx = self.pool().begin().await?;
        let mut transaction = fetch_transaction(&mut tx, user_id, transaction_id)
            .await?
            .ok_or(NotFound("Transaction"))?;

        if let Some(month_id) = updates.month_id {
            fetch_month(&mut tx, user_id, month_id)
                .await?
                .ok_or(NotFound("Month"))?;
            transaction.month_id = month_id;
        }
        match updates.category {
            CategoryChange::Keep => {}
            CategoryChange::Clear => transaction.category_id = None,
            CategoryChange::Set(category_id) => {
                transaction.category_id = owned_category_id(&mut tx, user_id, category_id).await?;
            }
        }
        updates.apply_fields(&mut transaction);

        let updated: Transaction = sqlx::query_as(&format!(
            "UPDATE transactions SET month_id = ?, category_id = ?, amount = ?, description = ?, \
             transaction_group = ? WHERE id = ? AND user_id = ? RETURNING {TRANSACTION_COLUMNS}"
        ))
        .bind(transaction.month_id)
        .bind(transaction.category_id)
        .bind(transaction.amount)
        .bind(&transaction.description)
        .bind(transaction.group)
        .bind(transaction_id)
        .bind(user_id)
        .fetch_one(&mut *tx)
        .await
        .context("Failed to update transaction")?;

        tx.commit()
            .await
            .context("Failed to commit transaction update")?;
        Ok(updated)
    }

    /// # Errors
    /// - Returns `NotFound` if the transaction does not exist or belongs to another user.
    pub(crate) async fn delete_transaction(&self, user_id: i64, transaction_id: i64) -> Result<()> {
        let result = sqlx::query("DELETE FROM transactions WHERE id = ? AND user_id = ?")
            .bind(transaction_id)
            .bind(user_id)
            .execute(self.pool())
            .await
            .context("Failed to delete transaction")?;
        if result.rows_affected() == 0 {
            return Err(NotFound("Transaction").into());
        }
        debug!("Deleted transaction {transaction_id} for user {user_id}");
        Ok(())
    }
}

/// Inserts `new` unless its month is not owned by `user_id`, in which case `None` is returned.
async fn insert_one(
    conn: &mut SqliteConnection,
    user_id: i64,
    new: NewTransaction,
) -> Result<Option<Transaction>> {
    if fetch_month(&mut *conn, user_id, new.month_id)
        .await?
        .is_none()
    {
        debug!(
            "Month {} is not owned by user {user_id}, skipping transaction",
            new.month_id
        );
        return Ok(None);
    }
    let category_id = match new.category_id {
        Some(category_id) => owned_category_id(&mut *conn, user_id, category_id).await?,
        None => None,
    };

    let transaction: Transaction = sqlx::query_as(&format!(
        "INSERT INTO transactions \
         (user_id, month_id, category_id, amount, description, transaction_group) \
         VALUES (?, ?, ?, ?, ?, ?) RETURNING {TRANSACTION_COLUMNS}"
    ))
    .bind(user_id)
    .bind(new.month_id)
    .bind(category_id)
    .bind(new.amount)
    .bind(&new.description)
    .bind(new.group)
    .fetch_one(&mut *conn)
    .await
    .context("Failed to insert transaction")?;
    Ok(Some(transaction))
}

async fn fetch_transaction(
    conn: &mut SqliteConnection,
    user_id: i64,
    transaction_id: i64,
) -> Result<Option<Transaction>> {
    sqlx::query_as(&format!(
        "SELECT {TRANSACTION_COLUMNS} FROM transactions WHERE id = ? AND user_id = ?"
    ))
    .bind(transaction_id)
    .bind(user_id)
    .fetch_optional(conn)
    .await
    .context("Failed to query transaction")
}
