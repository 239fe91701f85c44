use crate::db::{conflict_or, Db, NotFound};
use crate::model::{Month, MonthUpdates, NewMonth};
use crate::Result;
use anyhow::Context;
use sqlx::SqliteConnection;
use tracing::debug;

const MONTH_COLUMNS: &str =
    "id, user_id, month, year, start_month_savings, start_month_balance";

const DUPLICATE_MONTH: &str = "A budget for this month and year already exists";

impl Db {
    /// Inserts a month for `user_id`.
    ///
    /// # Errors
    /// - Returns a `Conflict` if the user already has this month and year.
    pub(crate) async fn insert_month(&self, user_id: i64, new: NewMonth) -> Result<Month> {
        let month: Month = sqlx::query_as(&format!(
            "INSERT INTO months (user_id, month, year, start_month_savings, start_month_balance) \
             VALUES (?, ?, ?, ?, ?) RETURNING {MONTH_COLUMNS}"
        ))
        .bind(user_id)
        .bind(new.month)
        .bind(new.year)
        .bind(new.start_month_savings)
        .bind(new.start_month_balance)
        .fetch_one(self.pool())
        .await
        .map_err(|e| conflict_or(e, DUPLICATE_MONTH, "Failed to insert month"))?;
        debug!("Inserted month {} for user {user_id}", month.id);
        Ok(month)
    }

    pub(crate) async fn month(&self, user_id: i64, month_id: i64) -> Result<Option<Month>> {
        let mut conn = self.pool().acquire().await?;
        fetch_month(&mut conn, user_id, month_id).await
    }

    /// All of the user's months, oldest first.
    pub(crate) async fn months(&self, user_id: i64) -> Result<Vec<Month>> {
        sqlx::query_as(&format!(
            "SELECT {MONTH_COLUMNS} FROM months WHERE user_id = ? ORDER BY year, month"
        ))
        .bind(user_id)
        .fetch_all(self.pool())
        .await
        .context("Failed to query months")
    }

    /// Applies `updates` to one of the user's months.
    ///
    /// # Errors
    /// - Returns `NotFound` if the month does not exist or belongs to another user.
    /// - Returns a `Conflict` if the new month and year collide with another of the user's months.
    pub(crate) async fn update_month(
        &self,
        user_id: i64,
        month_id: i64,
        updates: MonthUpdates,
    ) -> Result<Month> {
        let mut tx = self.pool().begin().await?;
        let mut month = fetch_month(&mut tx, user_id, month_id)
            .await?
            .ok_or(NotFound("Month"))?;
        updates.apply(&mut month);

        let updated: Month = sqlx::query_as(&format!(
            "UPDATE months SET month = ?, year = ?, start_month_savings = ?, \
             start_month_balance = ? WHERE id = ? AND user_id = ? RETURNING {MONTH_COLUMNS}"
        ))
        .bind(month.month)
        .bind(month.year)
        .bind(month.start_month_savings)
        .bind(month.start_month_balance)
        .bind(month_id)
        .bind(user_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| conflict_or(e, DUPLICATE_MONTH, "Failed to update month"))?;

        tx.commit().await.context("Failed to commit month update")?;
        Ok(updated)
    }

    /// Deletes one of the user's months along with its transactions and plans.
    ///
    /// # Errors
    /// - Returns `NotFound` if the month does not exist or belongs to another user.
    pub(crate) async fn delete_month(&self, user_id: i64, month_id: i64) -> Result<()> {
        let result = sqlx::query("DELETE FROM months WHERE id = ? AND user_id = ?")
            .bind(month_id)
            .bind(user_id)
            .execute(self.pool())
            .await
            .context("Failed to delete month")?;
        if result.rows_affected() == 0 {
            return Err(NotFound("Month").into());
        }
        debug!("Deleted month {month_id} for user {user_id}");
        Ok(())
    }
}

pub(super) async fn fetch_month(
    conn: &mut SqliteConnection,
    user_id: i64,
    month_id: i64,
) -> Result<Option<Month>> {
    sqlx::query_as(&format!(
        "SELECT {MONTH_COLUMNS} FROM months WHERE id = ? AND user_id = ?"
    ))
    .bind(month_id)
    .bind(user_id)
    .fetch_optional(conn)
    .await
    .context("Failed to query month")
}

#[cfg(test)]
mod tests {
    use crate::db::{Conflict, NotFound};
    use crate::model::{MonthUpdates, NewMonth};
    use crate::test::{TestEnv, MONTH, MONTH1, USER, USER1};

    #[tokio::test]
    async fn test_insert_month_defaults() {
        let env = TestEnv::seeded().await;
        let month = env
            .db()
            .insert_month(
                USER,
                NewMonth {
                    month: 0,
                    year: 2021,
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(month.month, 0);
        assert_eq!(month.start_month_savings, 0);
        assert_eq!(month.start_month_balance, 0);
    }

    #[tokio::test]
    async fn test_duplicate_month_is_a_conflict() {
        let env = TestEnv::seeded().await;
        let err = env
            .db()
            .insert_month(
                USER,
                NewMonth {
                    month: 1,
                    year: 2021,
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(err.downcast_ref::<Conflict>().is_some());
    }

    #[tokio::test]
    async fn test_months_are_scoped_to_owner() {
        let env = TestEnv::seeded().await;
        let db = env.db();
        assert!(db.month(USER, MONTH).await.unwrap().is_some());
        assert!(db.month(USER, MONTH1).await.unwrap().is_none());

        let months = db.months(USER).await.unwrap();
        assert_eq!(months.len(), 1);
        assert_eq!(months[0].id, MONTH);
    }

    #[tokio::test]
    async fn test_update_month_of_other_user_is_not_found() {
        let env = TestEnv::seeded().await;
        let err = env
            .db()
            .update_month(
                USER,
                MONTH1,
                MonthUpdates {
                    year: Some(1999),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err.downcast_ref::<NotFound>(), Some(&NotFound("Month")));

        let untouched = env.db().month(USER1, MONTH1).await.unwrap().unwrap();
        assert_eq!(untouched.year, 2021);
    }

    #[tokio::test]
    async fn test_delete_month_cascades() {
        let env = TestEnv::seeded().await;
        let db = env.db();
        db.delete_month(USER, MONTH).await.unwrap();
        assert!(db.month(USER, MONTH).await.unwrap().is_none());
        assert!(db.transactions(USER, None).await.unwrap().is_empty());
        assert!(db.plans(USER, None).await.unwrap().is_empty());
    }
}
