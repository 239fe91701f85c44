//! This module is responsible for reading, writing and managing the SQLite database.
//!
//! Every method that touches user data takes the owning `user_id` and filters on it. A row that
//! belongs to someone else is indistinguishable from a row that does not exist.

mod categories;
mod migrations;
mod months;
mod plans;
mod sessions;
mod transactions;
mod users;

use crate::Result;
use anyhow::{bail, Context};
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::fmt::{Display, Formatter};
use std::path::Path;
use tracing::debug;

pub(crate) use users::Credentials;

/// The schema version this build of the program expects.
const CURRENT_VERSION: i32 = 1;

const MAX_CONNECTIONS: u32 = 5;

/// Timestamps are stored as text in this format so they sort lexically.
const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

#[derive(Debug, Clone)]
pub(crate) struct Db {
    pool: SqlitePool,
}

impl Db {
    /// - Validates that no file currently exists at `path`
    /// - Creates a new SQLite file at `path`
    /// - Initializes the database schema
    /// - Returns a constructed `Db` object for further operations
    pub(crate) async fn init(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            bail!("A database already exists at '{}'", path.display());
        }
        let pool = connect(path, true).await?;

        sqlx::query("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL)")
            .execute(&pool)
            .await
            .context("Failed to create schema_version table")?;
        sqlx::query("INSERT INTO schema_version (version) VALUES (0)")
            .execute(&pool)
            .await
            .context("Failed to insert initial schema version")?;

        migrations::run(&pool, 0, CURRENT_VERSION).await?;
        debug!("Initialized database at {}", path.display());
        Ok(Self { pool })
    }

    /// - Validates that there is a SQLite file at `path`
    /// - Creates a SQLite connection pool
    /// - Updates the database schema with migrations if it is out-of-date
    /// - Returns a constructed `Db` object for further operations
    pub(crate) async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.is_file() {
            bail!("The database file is missing '{}'", path.display());
        }
        let pool = connect(path, false).await?;
        let version = schema_version(&pool).await?;
        if version > CURRENT_VERSION {
            bail!(
                "The database schema version {version} is newer than the supported version \
                {CURRENT_VERSION}"
            );
        }
        migrations::run(&pool, version, CURRENT_VERSION).await?;
        Ok(Self { pool })
    }

    pub(crate) fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Writes a consistent copy of the database to `path`, which must not exist yet.
    pub(crate) async fn backup_into(&self, path: &Path) -> Result<()> {
        let destination = path.to_string_lossy().to_string();
        sqlx::query("VACUUM INTO ?")
            .bind(&destination)
            .execute(&self.pool)
            .await
            .with_context(|| format!("Failed to back up the database to {destination}"))?;
        Ok(())
    }
}

async fn connect(path: &Path, create: bool) -> Result<SqlitePool> {
    let options = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(create)
        .foreign_keys(true)
        .journal_mode(SqliteJournalMode::Wal);

    SqlitePoolOptions::new()
        .max_connections(MAX_CONNECTIONS)
        .connect_with(options)
        .await
        .with_context(|| format!("Failed to open SQLite database at {}", path.display()))
}

async fn schema_version(pool: &SqlitePool) -> Result<i32> {
    let row: (Option<i32>,) = sqlx::query_as("SELECT MAX(version) FROM schema_version")
        .fetch_one(pool)
        .await
        .context("Failed to query schema version")?;
    Ok(row.0.unwrap_or_default())
}

pub(crate) fn timestamp(time: DateTime<Utc>) -> String {
    time.format(TIMESTAMP_FORMAT).to_string()
}

/// A row the caller asked for does not exist or belongs to another user.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub(crate) struct NotFound(pub(crate) &'static str);

impl Display for NotFound {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} not found", self.0)
    }
}

impl std::error::Error for NotFound {}

/// A write was rejected by a uniqueness constraint.
#[derive(Debug, Clone, Eq, PartialEq)]
pub(crate) struct Conflict(String);

impl Display for Conflict {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for Conflict {}

/// Turns a unique constraint violation into a `Conflict` carrying `message`; other errors pass
/// through with `context` attached.
fn conflict_or(e: sqlx::Error, message: impl Into<String>, context: &'static str) -> crate::Error {
    match &e {
        sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
            Conflict(message.into()).into()
        }
        _ => crate::Error::new(e).context(context),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_init_then_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("test.sqlite");
        let db = Db::init(&path).await.unwrap();
        assert_eq!(schema_version(db.pool()).await.unwrap(), CURRENT_VERSION);
        drop(db);

        let db = Db::load(&path).await.unwrap();
        assert_eq!(schema_version(db.pool()).await.unwrap(), CURRENT_VERSION);
    }

    #[tokio::test]
    async fn test_init_refuses_existing_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("test.sqlite");
        std::fs::write(&path, b"").unwrap();
        let err = Db::init(&path).await.unwrap_err();
        assert!(err.to_string().contains("already exists"));
    }

    #[tokio::test]
    async fn test_load_refuses_missing_file() {
        let dir = TempDir::new().unwrap();
        let err = Db::load(dir.path().join("missing.sqlite"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("missing"));
    }

    #[tokio::test]
    async fn test_backup_into_writes_a_loadable_copy() {
        let dir = TempDir::new().unwrap();
        let db = Db::init(dir.path().join("test.sqlite")).await.unwrap();
        db.insert_user("user@test.com", None, "hash").await.unwrap();

        let copy = dir.path().join("copy.sqlite");
        db.backup_into(&copy).await.unwrap();

        let restored = Db::load(&copy).await.unwrap();
        let user = restored.user_by_email("user@test.com").await.unwrap();
        assert!(user.is_some());
    }

    #[test]
    fn test_timestamp_format() {
        let time = DateTime::parse_from_rfc3339("2021-02-03T04:05:06Z")
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(timestamp(time), "2021-02-03T04:05:06Z");
    }
}
