use crate::commands::Out;
use crate::error::{ErrorType, IntoResult};
use crate::{Config, Result};
use std::path::PathBuf;

/// Writes a snapshot of the database into the backups directory, rotating old snapshots.
pub async fn backup(config: &Config) -> Result<Out<PathBuf>> {
    let path = config
        .backup()
        .copy_sqlite()
        .await
        .pub_result(ErrorType::Database)?;
    Ok(Out::new(
        format!("Backed up the database to {}", path.display()),
        path,
    ))
}
