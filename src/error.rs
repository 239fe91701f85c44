use serde::{Deserialize, Serialize};
use tracing::debug;

pub type Error = anyhow::Error;
pub type Result<T> = std::result::Result<T, Error>;

/// The broad category of an error that crosses a public boundary (the CLI or the HTTP server).
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorType {
    /// The home directory or `config.json` is missing or invalid.
    Config,
    /// A SQLite operation failed.
    Database,
    /// A request could not be read or parsed.
    Request,
    /// A long-running service (the HTTP server) failed.
    Service,
}

serde_plain::derive_display_from_serialize!(ErrorType);
serde_plain::derive_fromstr_from_deserialize!(ErrorType);

/// Classifies an error at a public boundary. The full error chain is logged at `debug!` and the
/// returned error carries the `ErrorType` as its outermost context.
pub trait IntoResult<T> {
    fn pub_result(self, error_type: ErrorType) -> Result<T>;
}

impl<T, E> IntoResult<T> for std::result::Result<T, E>
where
    E: Into<Error>,
{
    fn pub_result(self, error_type: ErrorType) -> Result<T> {
        self.map_err(|e| {
            let e: Error = e.into();
            debug!("{error_type} error: {e:?}");
            e.context(format!("A {error_type} error occurred"))
        })
    }
}
