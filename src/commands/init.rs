use crate::commands::Out;
use crate::error::{ErrorType, IntoResult};
use crate::{Config, Result};
use anyhow::Context;
use std::path::{Path, PathBuf};

/// Creates the home directory, its subdirectories, an initial `config.json` with default settings
/// and an empty database.
///
/// # Arguments
/// - `home` - The directory that will be the root of the data directory, e.g.
///   `$HOME/check-balance`
///
/// # Errors
/// - Returns an error if any file operations fail or if a database already exists in `home`.
pub async fn init(home: &Path) -> Result<Out<PathBuf>> {
    let config = Config::create(home)
        .await
        .context("Unable to create the data directory and configs")
        .pub_result(ErrorType::Config)?;
    Ok(Out::new(
        format!(
            "Successfully created the check-balance home at {}",
            config.root().display()
        ),
        config.root().to_path_buf(),
    ))
}
