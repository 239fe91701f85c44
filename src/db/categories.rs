use crate::db::{Db, NotFound};
use crate::model::{Category, CategoryUpdates, NewCategory};
use crate::Result;
use anyhow::Context;
use sqlx::SqliteConnection;
use tracing::debug;

const CATEGORY_COLUMNS: &str = "id, user_id, name, color";

impl Db {
    pub(crate) async fn insert_category(&self, user_id: i64, new: NewCategory) -> Result<Category> {
        let category: Category = sqlx::query_as(&format!(
            "INSERT INTO categories (user_id, name, color) VALUES (?, ?, ?) \
             RETURNING {CATEGORY_COLUMNS}"
        ))
        .bind(user_id)
        .bind(&new.name)
        .bind(&new.color)
        .fetch_one(self.pool())
        .await
        .context("Failed to insert category")?;
        debug!("Inserted category {} for user {user_id}", category.id);
        Ok(category)
    }

    pub(crate) async fn category(&self, user_id: i64, category_id: i64) -> Result<Option<Category>> {
        let mut conn = self.pool().acquire().await?;
        fetch_category(&mut conn, user_id, category_id).await
    }

    /// All of the user's categories, by name.
    pub(crate) async fn categories(&self, user_id: i64) -> Result<Vec<Category>> {
        sqlx::query_as(&format!(
            "SELECT {CATEGORY_COLUMNS} FROM categories WHERE user_id = ? ORDER BY name, id"
        ))
        .bind(user_id)
        .fetch_all(self.pool())
        .await
        .context("Failed to query categories")
    }

    /// Applies `updates` to one of the user's categories.
    ///
    /// # Errors
    /// - Returns `NotFound` if the category does not exist or belongs to another user.
    pub(crate) async fn update_category(
        &self,
        user_id: i64,
        category_id: i64,
        updates: CategoryUpdates,
    ) -> Result<Category> {
        let mut tx = self.pool().begin().await?;
        let mut category = fetch_category(&mut tx, user_id, category_id)
            .await?
            .ok_or(NotFound("Category"))?;
        updates.apply(&mut category);

        let updated: Category = sqlx::query_as(&format!(
            "UPDATE categories SET name = ?, color = ? WHERE id = ? AND user_id = ? \
             RETURNING {CATEGORY_COLUMNS}"
        ))
        .bind(&category.name)
        .bind(&category.color)
        .bind(category_id)
        .bind(user_id)
        .fetch_one(&mut *tx)
        .await
        .context("Failed to update category")?;

        tx.commit()
            .await
            .context("Failed to commit category update")?;
        Ok(updated)
    }

    /// Deletes one of the user's categories. Transactions in the category become uncategorized
    /// and plans for the category are removed.
    ///
    /// # Errors
    /// - Returns `NotFound` if the category does not exist or belongs to another user.
    pub(crate) async fn delete_category(&self, user_id: i64, category_id: i64) -> Result<()> {
        let result = sqlx::query("DELETE FROM categories WHERE id = ? AND user_id = ?")
            .bind(category_id)
            .bind(user_id)
            .execute(self.pool())
            .await
            .context("Failed to delete category")?;
        if result.rows_affected() == 0 {
            return Err(NotFound("Category").into());
        }
        debug!("Deleted category {category_id} for user {user_id}");
        Ok(())
    }
}

pub(super) async fn fetch_category(
    conn: &mut SqliteConnection,
    user_id: i64,
    category_id: i64,
) -> Result<Option<Category>> {
    sqlx::query_as(&format!(
        "SELECT {CATEGORY_COLUMNS} FROM categories WHERE id = ? AND user_id = ?"
    ))
    .bind(category_id)
    .bind(user_id)
    .fetch_optional(conn)
    .await
    .context("Failed to query category")
}

/// Returns `category_id` if the user owns that category, otherwise `None`.
pub(super) async fn owned_category_id(
    conn: &mut SqliteConnection,
    user_id: i64,
    category_id: i64,
) -> Result<Option<i64>> {
    let owned = fetch_category(conn, user_id, category_id).await?.map(|c| c.id);
    if owned.is_none() {
        debug!("Category {category_id} is not owned by user {user_id}, treating it as absent");
    }
    Ok(owned)
}

#[cfg(test)]
mod tests {
    use crate::db::NotFound;
    use crate::model::{CategoryUpdates, NewCategory};
    use crate::test::{TestEnv, CATEGORY, CATEGORY1, TRANSACTION, USER, USER1};

    #[tokio::test]
    async fn test_insert_category() {
        let env = TestEnv::seeded().await;
        let category = env
            .db()
            .insert_category(
                USER,
                NewCategory {
                    name: "Stocks".to_string(),
                    color: Some("red".to_string()),
                },
            )
            .await
            .unwrap();
        assert_eq!(category.name, "Stocks");
        assert_eq!(category.color.as_deref(), Some("red"));
        assert_eq!(env.db().categories(USER).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_update_category_keeps_missing_fields() {
        let env = TestEnv::seeded().await;
        let updated = env
            .db()
            .update_category(
                USER,
                CATEGORY,
                CategoryUpdates {
                    color: Some(Some("yellow".to_string())),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.name, "Dogs");
        assert_eq!(updated.color.as_deref(), Some("yellow"));
    }

    #[tokio::test]
    async fn test_other_users_category_is_invisible() {
        let env = TestEnv::seeded().await;
        let db = env.db();
        assert!(db.category(USER1, CATEGORY1).await.unwrap().is_none());
        let err = db
            .delete_category(USER1, CATEGORY1)
            .await
            .unwrap_err();
        assert_eq!(err.downcast_ref::<NotFound>(), Some(&NotFound("Category")));
        assert!(db.category(USER, CATEGORY1).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_update_other_users_category_fails() {
        let env = TestEnv::seeded().await;
        let db = env.db();
        let err = db
            .update_category(
                USER1,
                CATEGORY1,
                CategoryUpdates {
                    name: Some("Stolen".to_string()),
                    color: Some(Some("black".to_string())),
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err.downcast_ref::<NotFound>(), Some(&NotFound("Category")));

        let category = db.category(USER, CATEGORY1).await.unwrap().unwrap();
        assert_eq!(category.name, "Food");
        assert_eq!(category.color, None);
    }

    #[tokio::test]
    async fn test_delete_category_uncategorizes_transactions() {
        let env = TestEnv::seeded().await;
        let db = env.db();
        db.delete_category(USER, CATEGORY).await.unwrap();
        let transaction = db.transaction(USER, TRANSACTION).await.unwrap().unwrap();
        assert_eq!(transaction.category_id, None);
        assert!(db.plans(USER, None).await.unwrap().is_empty());
    }
}
