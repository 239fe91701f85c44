use crate::db::{timestamp, Db};
use crate::model::User;
use crate::Result;
use anyhow::Context;
use chrono::{DateTime, Utc};

impl Db {
    pub(crate) async fn insert_session(
        &self,
        token: &str,
        user_id: i64,
        now: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Result<()> {
        sqlx::query(
            "INSERT INTO sessions (token, user_id, created_at, expires_at) VALUES (?, ?, ?, ?)",
        )
        .bind(token)
        .bind(user_id)
        .bind(timestamp(now))
        .bind(timestamp(expires_at))
        .execute(self.pool())
        .await
        .context("Failed to insert session")?;
        Ok(())
    }

    /// Returns the user that `token` was issued to, unless the token is unknown or has expired.
    pub(crate) async fn session_user(&self, token: &str, now: DateTime<Utc>) -> Result<Option<User>> {
        sqlx::query_as(
            "SELECT u.id, u.email, u.username, u.date_joined \
             FROM sessions s JOIN users u ON u.id = s.user_id \
             WHERE s.token = ? AND s.expires_at > ?",
        )
        .bind(token)
        .bind(timestamp(now))
        .fetch_optional(self.pool())
        .await
        .context("Failed to query session")
    }

    /// Returns `true` if a session was removed.
    pub(crate) async fn delete_session(&self, token: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM sessions WHERE token = ?")
            .bind(token)
            .execute(self.pool())
            .await
            .context("Failed to delete session")?;
        Ok(result.rows_affected() > 0)
    }

    /// Removes every session that expired at or before `now`. Returns the number removed.
    pub(crate) async fn prune_sessions(&self, now: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query("DELETE FROM sessions WHERE expires_at <= ?")
            .bind(timestamp(now))
            .execute(self.pool())
            .await
            .context("Failed to prune sessions")?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use crate::test::TestEnv;
    use chrono::{Duration, Utc};

    #[tokio::test]
    async fn test_session_lifecycle() {
        let env = TestEnv::new().await;
        let db = env.db();
        let user = db.insert_user("s@test.com", None, "hash").await.unwrap();
        let now = Utc::now();

        db.insert_session("token-1", user.id, now, now + Duration::hours(1))
            .await
            .unwrap();
        let found = db.session_user("token-1", now).await.unwrap().unwrap();
        assert_eq!(found.id, user.id);

        assert!(db.delete_session("token-1").await.unwrap());
        assert!(!db.delete_session("token-1").await.unwrap());
        assert!(db.session_user("token-1", now).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_expired_sessions_are_ignored_and_pruned() {
        let env = TestEnv::new().await;
        let db = env.db();
        let user = db.insert_user("s@test.com", None, "hash").await.unwrap();
        let issued = Utc::now() - Duration::hours(2);

        db.insert_session("old", user.id, issued, issued + Duration::hours(1))
            .await
            .unwrap();
        db.insert_session("fresh", user.id, issued, issued + Duration::hours(5))
            .await
            .unwrap();

        let now = Utc::now();
        assert!(db.session_user("old", now).await.unwrap().is_none());
        assert_eq!(db.prune_sessions(now).await.unwrap(), 1);
        assert!(db.session_user("fresh", now).await.unwrap().is_some());
    }
}
