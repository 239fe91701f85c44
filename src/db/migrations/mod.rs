//! Database schema migrations.
//!
//! Each schema version `NN` has a pair of SQL files in this directory:
//! - `migration_NN_up.sql` moves the schema from version `NN-1` to `NN`
//! - `migration_NN_down.sql` moves the schema from version `NN` back to `NN-1`
//!
//! The `schema_version` table holds a single row with the current version.

use anyhow::{bail, Context};
use sqlx::{Executor, SqlitePool};
use tracing::{debug, info};

use crate::Result;

struct Migration {
    /// The version the schema is at after running `up_sql`.
    version: i32,
    up_sql: &'static str,
    down_sql: &'static str,
}

/// Ordered by version, with no gaps.
const MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    up_sql: include_str!("migration_01_up.sql"),
    down_sql: include_str!("migration_01_down.sql"),
}];

/// Moves the schema from version `from` to version `to`, upgrading or downgrading one version at a
/// time. Each step runs in its own SQLite transaction together with the `schema_version` update,
/// so a failed step leaves the schema at the last completed version.
///
/// Nothing is run unless every intermediate migration is available.
pub(crate) async fn run(pool: &SqlitePool, from: i32, to: i32) -> Result<()> {
    if from == to {
        debug!("Database schema is at version {to}, nothing to migrate");
        return Ok(());
    }
    validate_migrations(from, to)?;

    if from < to {
        for version in (from + 1)..=to {
            let migration = find(version)?;
            debug!("Running migration {version:02} (up)");
            run_single_migration(pool, migration.up_sql, version).await?;
        }
    } else {
        for version in ((to + 1)..=from).rev() {
            let migration = find(version)?;
            debug!("Running migration {version:02} (down)");
            run_single_migration(pool, migration.down_sql, version - 1).await?;
        }
    }

    info!("Database schema migrated from version {from} to {to}");
    Ok(())
}

fn find(version: i32) -> Result<&'static Migration> {
    MIGRATIONS
        .iter()
        .find(|m| m.version == version)
        .with_context(|| format!("Migration {version} not found"))
}

/// Runs `sql` and records `new_version`, atomically.
async fn run_single_migration(pool: &SqlitePool, sql: &str, new_version: i32) -> Result<()> {
    let mut tx = pool
        .begin()
        .await
        .context("Failed to begin migration transaction")?;

    // A migration file may hold several statements.
    tx.execute(sql)
        .await
        .context("Failed to execute migration SQL")?;

    sqlx::query("UPDATE schema_version SET version = ?")
        .bind(new_version)
        .execute(&mut *tx)
        .await
        .context("Failed to update schema_version")?;

    tx.commit()
        .await
        .context("Failed to commit migration transaction")?;

    Ok(())
}

/// Checks that a migration exists for every version step between `from` and `to`.
fn validate_migrations(from: i32, to: i32) -> Result<()> {
    let (start, end) = if from < to {
        (from + 1, to)
    } else {
        (to + 1, from)
    };

    for version in start..=end {
        if !MIGRATIONS.iter().any(|m| m.version == version) {
            bail!("Migration {version} is missing but required to migrate from version {from} to {to}");
        }
    }

    Ok(())
}
