//! Rotating snapshots of the SQLite database.

use crate::config::SQLITE_FILE;
use crate::db::Db;
use crate::{utils, Config, Result};
use anyhow::Context;
use chrono::Local;
use std::path::PathBuf;
use tracing::debug;

const DATE_LEN: usize = "YYYY-MM-DD".len();

/// A snapshot file. Orders by date, then sequence number.
#[derive(Debug, Clone, Eq, PartialEq, Ord, PartialOrd)]
struct Snapshot {
    date: String,
    seq: u32,
    path: PathBuf,
}

/// Manages backup file creation and rotation.
///
/// Create a new instance via `Config::backup()` or `Backup::new()`.
#[derive(Debug, Clone)]
pub struct Backup {
    backups_dir: PathBuf,
    backup_copies: u32,
    db: Db,
}

impl Backup {
    pub fn new(config: &Config) -> Self {
        Self {
            backups_dir: config.backups().to_path_buf(),
            backup_copies: config.backup_copies(),
            db: config.db().clone(),
        }
    }

    /// Writes a snapshot of the database to the backups directory.
    ///
    /// The filename format is `check-balance.sqlite.YYYY-MM-DD-NNN`. Old snapshots are rotated
    /// so that at most `backup_copies` remain.
    ///
    /// Returns the path to the created backup file.
    pub async fn copy_sqlite(&self) -> Result<PathBuf> {
        let date = today();
        let seq = self.next_sequence_number(&date).await?;
        let path = self
            .backups_dir
            .join(format!("{SQLITE_FILE}.{date}-{seq:03}"));

        self.db.backup_into(&path).await?;
        debug!("Wrote database snapshot {}", path.display());

        self.rotate().await?;
        Ok(path)
    }

    /// The snapshots currently in the backups directory, oldest first.
    async fn existing(&self) -> Result<Vec<Snapshot>> {
        let mut snapshots = Vec::new();
        let mut dir = utils::read_dir(&self.backups_dir).await?;
        while let Some(entry) = dir
            .next_entry()
            .await
            .context("Failed to read directory entry")?
        {
            let name = entry.file_name().to_string_lossy().to_string();
            if let Some((date, seq)) = parse_backup_name(&name) {
                snapshots.push(Snapshot {
                    date: date.to_string(),
                    seq,
                    path: entry.path(),
                });
            }
        }
        snapshots.sort();
        Ok(snapshots)
    }

    async fn next_sequence_number(&self, date: &str) -> Result<u32> {
        let max_seq = self
            .existing()
            .await?
            .iter()
            .filter(|snapshot| snapshot.date == date)
            .map(|snapshot| snapshot.seq)
            .max()
            .unwrap_or(0);
        Ok(max_seq + 1)
    }

    async fn rotate(&self) -> Result<()> {
        let files = self.existing().await?;
        let to_delete = files.len().saturating_sub(self.backup_copies as usize);
        for snapshot in files.into_iter().take(to_delete) {
            debug!("Removing old snapshot {}", snapshot.path.display());
            utils::remove(&snapshot.path).await?;
        }
        Ok(())
    }
}

/// Returns today's date in YYYY-MM-DD format.
fn today() -> String {
    Local::now().format("%Y-%m-%d").to_string()
}

/// Splits a snapshot named `check-balance.sqlite.{YYYY-MM-DD}-{N}` into its date and sequence
/// number. `N` is zero-padded to three digits but may grow past them.
fn parse_backup_name(filename: &str) -> Option<(&str, u32)> {
    let rest = filename.strip_prefix(SQLITE_FILE)?.strip_prefix('.')?;
    let date = rest.get(..DATE_LEN)?;
    let seq = rest.get(DATE_LEN..)?.strip_prefix('-')?;
    let is_date = date.chars().all(|c| c.is_ascii_digit() || c == '-');
    if !is_date || seq.is_empty() || !seq.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    Some((date, seq.parse().ok()?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test::TestEnv;

    #[test]
    fn test_parse_backup_name() {
        assert_eq!(
            parse_backup_name("check-balance.sqlite.2025-12-14-001"),
            Some(("2025-12-14", 1))
        );
        assert_eq!(
            parse_backup_name("check-balance.sqlite.2025-12-14-042"),
            Some(("2025-12-14", 42))
        );
        assert_eq!(
            parse_backup_name("check-balance.sqlite.2025-12-14-1000"),
            Some(("2025-12-14", 1000))
        );
        assert_eq!(parse_backup_name("check-balance.sqlite.2025-12-14-001.json"), None);
        assert_eq!(parse_backup_name("check-balance.sqlite.2025-12-14-"), None);
        assert_eq!(parse_backup_name("check-balance.sqlite.2025-12-14-+01"), None);
        assert_eq!(parse_backup_name("other.sqlite.2025-12-14-001"), None);
        assert_eq!(parse_backup_name("check-balance.sqlite-wal"), None);
        assert_eq!(parse_backup_name("check-balance.sqlite"), None);
    }

    #[tokio::test]
    async fn test_sequence_numbers_past_999_are_rotated_in_order() {
        let env = TestEnv::seeded().await;
        let backup = env.config().backup();
        let date = today();
        for seq in [998, 999, 1000] {
            let name = format!("{SQLITE_FILE}.{date}-{seq:03}");
            utils::write(env.config().backups().join(name), "").await.unwrap();
        }

        let snapshots = backup.existing().await.unwrap();
        let seqs: Vec<u32> = snapshots.iter().map(|s| s.seq).collect();
        assert_eq!(seqs, vec![998, 999, 1000]);

        let next = backup.copy_sqlite().await.unwrap();
        assert!(next.to_string_lossy().ends_with("-1001"));
    }

    #[tokio::test]
    async fn test_copy_sqlite_numbers_and_rotates() {
        let env = TestEnv::seeded().await;
        let backup = env.config().backup();

        let first = backup.copy_sqlite().await.unwrap();
        let second = backup.copy_sqlite().await.unwrap();
        assert!(first.to_string_lossy().ends_with("-001"));
        assert!(second.to_string_lossy().ends_with("-002"));

        for _ in 0..env.config().backup_copies() {
            backup.copy_sqlite().await.unwrap();
        }
        let remaining = backup.existing().await.unwrap();
        assert_eq!(remaining.len(), env.config().backup_copies() as usize);
        assert!(!first.exists());

        let restored = Db::load(&remaining[0].path).await.unwrap();
        assert!(restored
            .user_by_email("user@test.com")
            .await
            .unwrap()
            .is_some());
    }
}
