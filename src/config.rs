//! Configuration file handling for check-balance.
//!
//! The configuration file is stored at `$CHECK_BALANCE_HOME/config.json` and contains the listen
//! address of the GraphQL server, the session lifetime and backup settings.

use crate::auth::MAX_SESSION_TTL_HOURS;
use crate::backup::Backup;
use crate::db::Db;
use crate::{utils, Result};
use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const APP_NAME: &str = "check-balance";
const CONFIG_VERSION: u8 = 1;
const BACKUP_COPIES: u32 = 5;
const DEFAULT_LISTEN: &str = "127.0.0.1:8000";
const SESSION_TTL_HOURS: u32 = 24 * 7;
const BACKUPS: &str = ".backups";
const CONFIG_JSON: &str = "config.json";
pub(crate) const SQLITE_FILE: &str = "check-balance.sqlite";

/// The `Config` object represents the configuration of the app. You instantiate it by providing
/// the path to the home directory and from there it loads `config.json`. It provides paths to
/// other items that are expected in a certain location within the home directory.
#[derive(Debug, Clone)]
pub struct Config {
    root: PathBuf,
    backups: PathBuf,
    config_path: PathBuf,
    config_file: ConfigFile,
    db: Db,
    sqlite_path: PathBuf,
}

impl Config {
    /// Creates the home directory, its subdirectories, an initial `config.json` with default
    /// settings and an empty, migrated database.
    ///
    /// # Errors
    /// - Returns an error if any file operations fail or if a database already exists.
    pub async fn create(dir: impl Into<PathBuf>) -> Result<Self> {
        let maybe_relative = dir.into();
        utils::make_dir(&maybe_relative)
            .await
            .context("Unable to create the home directory")?;
        let root = utils::canonicalize(&maybe_relative).await?;

        let backups = root.join(BACKUPS);
        utils::make_dir(&backups).await?;

        let config_path = root.join(CONFIG_JSON);
        let config_file = ConfigFile::default();
        config_file.save(&config_path).await?;

        let sqlite_path = root.join(SQLITE_FILE);
        let db = Db::init(&sqlite_path)
            .await
            .context("Unable to create SQLite DB")?;

        Ok(Self {
            root,
            backups,
            config_path,
            config_file,
            db,
            sqlite_path,
        })
    }

    /// This will
    /// - validate that the home directory exists and that the config file exists
    /// - load the config file
    /// - validate that the backups directory exists
    /// - open and migrate the database
    pub async fn load(home: impl Into<PathBuf>) -> Result<Self> {
        let maybe_relative = home.into();
        let root = utils::canonicalize(&maybe_relative)
            .await
            .context("The home directory is missing")?;

        let config_path = root.join(CONFIG_JSON);
        if !config_path.is_file() {
            bail!("The config file is missing '{}'", config_path.display())
        }
        let config_file = ConfigFile::load(&config_path).await?;

        let backups = root.join(BACKUPS);
        if !backups.is_dir() {
            bail!("The backups directory is missing '{}'", backups.display())
        }

        let sqlite_path = root.join(SQLITE_FILE);
        let db = Db::load(&sqlite_path)
            .await
            .context("Unable to load SQLite DB")?;

        Ok(Self {
            root,
            backups,
            config_path,
            config_file,
            db,
            sqlite_path,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    pub(crate) fn db(&self) -> &Db {
        &self.db
    }

    pub fn backups(&self) -> &Path {
        &self.backups
    }

    pub fn sqlite_path(&self) -> &Path {
        &self.sqlite_path
    }

    pub fn backup_copies(&self) -> u32 {
        self.config_file.backup_copies
    }

    /// The address `serve` binds to unless `--listen` is given.
    pub fn listen(&self) -> &str {
        &self.config_file.listen
    }

    pub fn session_ttl_hours(&self) -> u32 {
        self.config_file.session_ttl_hours
    }

    /// Creates a new `Backup` instance for managing backup files.
    pub fn backup(&self) -> Backup {
        Backup::new(self)
    }
}

/// Represents the serialization and deserialization format of the configuration file.
///
/// Example configuration:
/// ```json
/// {
///   "app_name": "check-balance",
///   "config_version": 1,
///   "listen": "127.0.0.1:8000",
///   "backup_copies": 5,
///   "session_ttl_hours": 168
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
struct ConfigFile {
    /// Application name, should always be "check-balance"
    app_name: String,

    /// Configuration file version
    config_version: u8,

    /// Socket address for the GraphQL server
    #[serde(default = "default_listen")]
    listen: String,

    /// Number of backup copies to keep
    backup_copies: u32,

    /// How long a login token stays valid
    #[serde(default = "default_session_ttl_hours")]
    session_ttl_hours: u32,
}

fn default_listen() -> String {
    DEFAULT_LISTEN.to_string()
}

fn default_session_ttl_hours() -> u32 {
    SESSION_TTL_HOURS
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self {
            app_name: APP_NAME.to_string(),
            config_version: CONFIG_VERSION,
            listen: default_listen(),
            backup_copies: BACKUP_COPIES,
            session_ttl_hours: SESSION_TTL_HOURS,
        }
    }
}

impl ConfigFile {
    /// Loads a ConfigFile from `path`.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed, or names another application.
    async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = utils::read(path).await?;
        let config: ConfigFile = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file at {}", path.display()))?;

        anyhow::ensure!(
            config.app_name == APP_NAME,
            "Invalid app_name in config file: expected '{}', got '{}'",
            APP_NAME,
            config.app_name
        );
        anyhow::ensure!(
            config.config_version <= CONFIG_VERSION,
            "Unsupported config_version {}, this program supports up to {}",
            config.config_version,
            CONFIG_VERSION
        );
        anyhow::ensure!(
            config.session_ttl_hours <= MAX_SESSION_TTL_HOURS,
            "session_ttl_hours must be at most {MAX_SESSION_TTL_HOURS}, got {}",
            config.session_ttl_hours
        );

        Ok(config)
    }

    async fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let data = serde_json::to_string_pretty(self).context("Unable to serialize config")?;
        utils::write(path, data)
            .await
            .context("Unable to write config file")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_config_create_then_load() {
        let dir = TempDir::new().unwrap();
        let home = dir.path().join("home");
        let created = Config::create(&home).await.unwrap();
        assert!(created.backups().is_dir());
        assert!(created.sqlite_path().is_file());
        assert_eq!(created.listen(), DEFAULT_LISTEN);
        drop(created);

        let loaded = Config::load(&home).await.unwrap();
        assert_eq!(loaded.backup_copies(), BACKUP_COPIES);
        assert_eq!(loaded.session_ttl_hours(), SESSION_TTL_HOURS);
        assert!(loaded.config_path().ends_with(CONFIG_JSON));
    }

    #[tokio::test]
    async fn test_config_create_refuses_existing_database() {
        let dir = TempDir::new().unwrap();
        let _ = Config::create(dir.path()).await.unwrap();
        let err = Config::create(dir.path()).await.unwrap_err();
        assert!(format!("{err:#}").contains("already exists"));
    }

    #[tokio::test]
    async fn test_config_load_missing_home() {
        let dir = TempDir::new().unwrap();
        assert!(Config::load(dir.path().join("nope")).await.is_err());
    }

    #[tokio::test]
    async fn test_config_file_load_with_minimal_config() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_JSON);
        let json = r#"{
            "app_name": "check-balance",
            "config_version": 1,
            "backup_copies": 3
        }"#;
        utils::write(&path, json).await.unwrap();

        let config = ConfigFile::load(&path).await.unwrap();
        assert_eq!(config.backup_copies, 3);
        assert_eq!(config.listen, DEFAULT_LISTEN);
        assert_eq!(config.session_ttl_hours, SESSION_TTL_HOURS);
    }

    #[tokio::test]
    async fn test_config_file_load_invalid_app_name() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_JSON);
        let json = r#"{
            "app_name": "tiller",
            "config_version": 1,
            "backup_copies": 5
        }"#;
        utils::write(&path, json).await.unwrap();

        let err = ConfigFile::load(&path).await.unwrap_err();
        assert!(err.to_string().contains("Invalid app_name"));
    }

    #[tokio::test]
    async fn test_config_file_load_rejects_huge_session_ttl() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_JSON);
        let json = r#"{
            "app_name": "check-balance",
            "config_version": 1,
            "backup_copies": 5,
            "session_ttl_hours": 4294967295
        }"#;
        utils::write(&path, json).await.unwrap();

        let err = ConfigFile::load(&path).await.unwrap_err();
        assert!(err.to_string().contains("session_ttl_hours must be at most"));
    }

    #[tokio::test]
    async fn test_config_file_save_and_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_JSON);
        let original = ConfigFile {
            listen: "0.0.0.0:9000".to_string(),
            backup_copies: 2,
            session_ttl_hours: 1,
            ..Default::default()
        };
        original.save(&path).await.unwrap();
        assert_eq!(ConfigFile::load(&path).await.unwrap(), original);
    }
}
