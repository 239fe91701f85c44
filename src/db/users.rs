use crate::db::{conflict_or, timestamp, Db};
use crate::model::User;
use crate::Result;
use anyhow::Context;
use chrono::Utc;
use sqlx::FromRow;
use tracing::debug;

const USER_COLUMNS: &str = "id, email, username, date_joined";

/// The stored password hash for a user, used only to verify a login.
#[derive(Debug, Clone, Eq, PartialEq, FromRow)]
pub(crate) struct Credentials {
    pub(crate) user_id: i64,
    pub(crate) password_hash: String,
}

impl Db {
    /// Inserts a new user.
    ///
    /// # Errors
    /// - Returns a `Conflict` if the email or username is already taken.
    pub(crate) async fn insert_user(
        &self,
        email: &str,
        username: Option<&str>,
        password_hash: &str,
    ) -> Result<User> {
        let user: User = sqlx::query_as(&format!(
            "INSERT INTO users (email, username, password_hash, date_joined) VALUES (?, ?, ?, ?) \
             RETURNING {USER_COLUMNS}"
        ))
        .bind(email)
        .bind(username)
        .bind(password_hash)
        .bind(timestamp(Utc::now()))
        .fetch_one(self.pool())
        .await
        .map_err(|e| {
            let message = if e.to_string().contains("users.username") {
                "A user with this username already exists"
            } else {
                "A user with this email already exists"
            };
            conflict_or(e, message, "Failed to insert user")
        })?;
        debug!("Inserted user {}", user.id);
        Ok(user)
    }

    pub(crate) async fn user(&self, user_id: i64) -> Result<Option<User>> {
        sqlx::query_as(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?"))
            .bind(user_id)
            .fetch_optional(self.pool())
            .await
            .context("Failed to query user")
    }

    pub(crate) async fn user_by_email(&self, email: &str) -> Result<Option<User>> {
        sqlx::query_as(&format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?"))
            .bind(email)
            .fetch_optional(self.pool())
            .await
            .context("Failed to query user by email")
    }

    pub(crate) async fn credentials(&self, email: &str) -> Result<Option<Credentials>> {
        sqlx::query_as("SELECT id AS user_id, password_hash FROM users WHERE email = ?")
            .bind(email)
            .fetch_optional(self.pool())
            .await
            .context("Failed to query credentials")
    }
}
