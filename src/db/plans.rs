use crate::db::categories::fetch_category;
use crate::db::months::fetch_month;
use crate::db::{Db, NotFound};
use crate::model::{NewPlan, Plan, PlanUpdates};
use crate::Result;
use anyhow::Context;
use sqlx::SqliteConnection;
use tracing::debug;

const PLAN_COLUMNS: &str = "id, user_id, month_id, category_id, planned_amount";

impl Db {
    /// Inserts a plan for `user_id`.
    ///
    /// # Errors
    /// - Returns `NotFound` if the month or the category is not owned by the user.
    pub(crate) async fn insert_plan(&self, user_id: i64, new: NewPlan) -> Result<Plan> {
        let mut tx = self.pool().begin().await?;
        require_references(&mut tx, user_id, new.month_id, new.category_id).await?;

        let plan: Plan = sqlx::query_as(&format!(
            "INSERT INTO plans (user_id, month_id, category_id, planned_amount) \
             VALUES (?, ?, ?, ?) RETURNING {PLAN_COLUMNS}"
        ))
        .bind(user_id)
        .bind(new.month_id)
        .bind(new.category_id)
        .bind(new.planned_amount)
        .fetch_one(&mut *tx)
        .await
        .context("Failed to insert plan")?;

        tx.commit().await.context("Failed to commit plan insert")?;
        debug!("Inserted plan {} for user {user_id}", plan.id);
        Ok(plan)
    }

    pub(crate) async fn plan(&self, user_id: i64, plan_id: i64) -> Result<Option<Plan>> {
        let mut conn = self.pool().acquire().await?;
        fetch_plan(&mut conn, user_id, plan_id).await
    }

    /// The user's plans, optionally restricted to one month.
    pub(crate) async fn plans(&self, user_id: i64, month_id: Option<i64>) -> Result<Vec<Plan>> {
        sqlx::query_as(&format!(
            "SELECT {PLAN_COLUMNS} FROM plans \
             WHERE user_id = ? AND (? IS NULL OR month_id = ?) ORDER BY id"
        ))
        .bind(user_id)
        .bind(month_id)
        .bind(month_id)
        .fetch_all(self.pool())
        .await
        .context("Failed to query plans")
    }

    /// Applies `updates` to one of the user's plans.
    ///
    /// # Errors
    /// - Returns `NotFound("Plan")` if the plan does not exist or belongs to another user.
    /// - Returns `NotFound` for a month or category in `updates` that the user does not own.
    pub(crate) async fn update_plan(
        &self,
        user_id: i64,
        plan_id: i64,
        updates: PlanUpdates,
    ) -> Result<Plan> {
        let mut tx = self.pool().begin().await?;
        let mut plan = fetch_plan(&mut tx, user_id, plan_id)
            .await?
            .ok_or(NotFound("Plan"))?;

        if let Some(month_id) = updates.month_id {
            plan.month_id = month_id;
        }
        if let Some(category_id) = updates.category_id {
            plan.category_id = category_id;
        }
        if let Some(planned_amount) = updates.planned_amount {
            plan.planned_amount = planned_amount;
        }
        if updates.month_id.is_some() || updates.category_id.is_some() {
            require_references(&mut tx, user_id, plan.month_id, plan.category_id).await?;
        }

        let updated: Plan = sqlx::query_as(&format!(
            "UPDATE plans SET month_id = ?, category_id = ?, planned_amount = ? \
             WHERE id = ? AND user_id = ? RETURNING {PLAN_COLUMNS}"
        ))
        .bind(plan.month_id)
        .bind(plan.category_id)
        .bind(plan.planned_amount)
        .bind(plan_id)
        .bind(user_id)
        .fetch_one(&mut *tx)
        .await
        .context("Failed to update plan")?;

        tx.commit().await.context("Failed to commit plan update")?;
        Ok(updated)
    }

    /// # Errors
    /// - Returns `NotFound` if the plan does not exist or belongs to another user.
    pub(crate) async fn delete_plan(&self, user_id: i64, plan_id: i64) -> Result<()> {
        let result = sqlx::query("DELETE FROM plans WHERE id = ? AND user_id = ?")
            .bind(plan_id)
            .bind(user_id)
            .execute(self.pool())
            .await
            .context("Failed to delete plan")?;
        if result.rows_affected() == 0 {
            return Err(NotFound("Plan").into());
        }
        debug!("Deleted plan {plan_id} for user {user_id}");
        Ok(())
    }
}

/// Plans may only point at rows the user owns.
async fn require_references(
    conn: &mut SqliteConnection,
    user_id: i64,
    month_id: i64,
    category_id: i64,
) -> Result<()> {
    fetch_month(&mut *conn, user_id, month_id)
        .await?
        .ok_or(NotFound("Month"))?;
    fetch_category(&mut *conn, user_id, category_id)
        .await?
        .ok_or(NotFound("Category"))?;
    Ok(())
}

async fn fetch_plan(
    conn: &mut SqliteConnection,
    user_id: i64,
    plan_id: i64,
) -> Result<Option<Plan>> {
    sqlx::query_as(&format!(
        "SELECT {PLAN_COLUMNS} FROM plans WHERE id = ? AND user_id = ?"
    ))
    .bind(plan_id)
    .bind(user_id)
    .fetch_optional(conn)
    .await
    .context("Failed to query plan")
}

#[cfg(test)]
mod tests {
    use crate::db::NotFound;
    use crate::model::{NewPlan, PlanUpdates};
    use crate::test::{TestEnv, CATEGORY, CATEGORY1, MONTH, MONTH1, PLAN, USER, USER1};

    #[tokio::test]
    async fn test_insert_plan() {
        let env = TestEnv::seeded().await;
        let plan = env
            .db()
            .insert_plan(
                USER,
                NewPlan {
                    month_id: MONTH,
                    category_id: CATEGORY1,
                    planned_amount: 1000,
                },
            )
            .await
            .unwrap();
        assert_eq!(plan.planned_amount, 1000);
        assert_eq!(env.db().plans(USER, Some(MONTH)).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_month_may_plan_a_category_twice() {
        let env = TestEnv::seeded().await;
        let plan = env
            .db()
            .insert_plan(
                USER,
                NewPlan {
                    month_id: MONTH,
                    category_id: CATEGORY,
                    planned_amount: 1000,
                },
            )
            .await
            .unwrap();
        assert_ne!(plan.id, PLAN);
        assert_eq!(env.db().plans(USER, None).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_plan_requires_owned_references() {
        let env = TestEnv::seeded().await;
        let err = env
            .db()
            .insert_plan(
                USER1,
                NewPlan {
                    month_id: MONTH1,
                    category_id: CATEGORY,
                    planned_amount: 5,
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err.downcast_ref::<NotFound>(), Some(&NotFound("Category")));

        let err = env
            .db()
            .update_plan(
                USER,
                PLAN,
                PlanUpdates {
                    month_id: Some(MONTH1),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err.downcast_ref::<NotFound>(), Some(&NotFound("Month")));
    }

    #[tokio::test]
    async fn test_update_and_delete_plan() {
        let env = TestEnv::seeded().await;
        let db = env.db();
        let updated = db
            .update_plan(
                USER,
                PLAN,
                PlanUpdates {
                    planned_amount: Some(777),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.planned_amount, 777);
        assert_eq!(updated.category_id, CATEGORY);

        let err = db.delete_plan(USER1, PLAN).await.unwrap_err();
        assert_eq!(err.downcast_ref::<NotFound>(), Some(&NotFound("Plan")));
        db.delete_plan(USER, PLAN).await.unwrap();
        assert!(db.plan(USER, PLAN).await.unwrap().is_none());
    }
}
