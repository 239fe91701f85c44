//! These structs provide the CLI interface for the check-balance CLI.

use clap::{Parser, Subcommand};
use std::convert::Infallible;
use std::fmt::{Display, Formatter};
use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::error;
use tracing_subscriber::filter::LevelFilter;

/// check-balance: A personal finance backend.
///
/// Keeps monthly budgets, spending categories, transactions and per-category spending plans for
/// any number of users in a local SQLite database and serves them over GraphQL.
///
/// Run `check-balance init` once, then `check-balance serve` and point a GraphQL client at
/// http://127.0.0.1:8000/graphql (or open it in a browser for GraphiQL).
#[derive(Debug, Parser, Clone)]
pub struct Args {
    #[clap(flatten)]
    common: Common,

    #[command(subcommand)]
    command: Command,
}

impl Args {
    pub fn new(common: Common, command: Command) -> Self {
        Self { common, command }
    }

    pub fn common(&self) -> &Common {
        &self.common
    }

    pub fn command(&self) -> &Command {
        &self.command
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Create the home directory, the configuration file and an empty database.
    ///
    /// By default the home directory is $HOME/check-balance. Pass --home or set
    /// CHECK_BALANCE_HOME to put it somewhere else.
    Init,
    /// Run the GraphQL server until interrupted with Ctrl-C.
    Serve(ServeArgs),
    /// Run one GraphQL document against the local database and print the JSON response.
    Execute(ExecuteArgs),
    /// Write a snapshot of the database into the backups directory.
    Backup,
}

/// Arguments common to all subcommands.
#[derive(Debug, Parser, Clone)]
pub struct Common {
    /// The logging verbosity. One of, from least to most verbose:
    /// off, error, warn, info, debug, trace
    ///
    /// This can be overridden by RUST_LOG. See the tracing-subscriber EnvFilter documentation.
    #[arg(long, default_value_t = LevelFilter::INFO)]
    log_level: LevelFilter,

    /// The directory where data and configuration are held. Defaults to ~/check-balance
    #[arg(long, env = "CHECK_BALANCE_HOME", default_value_t = default_home())]
    home: DisplayPath,
}

impl Common {
    pub fn new(log_level: LevelFilter, home: PathBuf) -> Self {
        Self {
            log_level,
            home: home.into(),
        }
    }

    pub fn log_level(&self) -> LevelFilter {
        self.log_level
    }

    pub fn home(&self) -> &DisplayPath {
        &self.home
    }
}

/// (Not shown): Args for the `check-balance serve` command.
#[derive(Debug, Parser, Clone)]
pub struct ServeArgs {
    /// The socket address to listen on. Defaults to `listen` from config.json.
    #[arg(long)]
    listen: Option<String>,
}

impl ServeArgs {
    pub fn new(listen: Option<String>) -> Self {
        Self { listen }
    }

    pub fn listen(&self) -> Option<&str> {
        self.listen.as_deref()
    }
}

/// (Not shown): Args for the `check-balance execute` command.
#[derive(Debug, Parser, Clone)]
pub struct ExecuteArgs {
    /// A file holding the GraphQL document, or `-` to read it from stdin.
    document: String,

    /// Run the document as the user with this email. Without it the request is anonymous.
    #[arg(long = "as", value_name = "EMAIL")]
    as_email: Option<String>,

    /// GraphQL variables as a JSON object.
    #[arg(long, value_name = "JSON")]
    variables: Option<String>,
}

impl ExecuteArgs {
    pub fn new(
        document: impl Into<String>,
        as_email: Option<String>,
        variables: Option<String>,
    ) -> Self {
        Self {
            document: document.into(),
            as_email,
            variables,
        }
    }

    pub fn document(&self) -> &str {
        &self.document
    }

    pub fn as_email(&self) -> Option<&str> {
        self.as_email.as_deref()
    }

    pub fn variables(&self) -> Option<&str> {
        self.variables.as_deref()
    }
}

fn default_home() -> DisplayPath {
    DisplayPath(match dirs::home_dir() {
        Some(home) => home.join("check-balance"),
        None => {
            error!(
                "There was an error when trying to get your home directory. You can get around \
                this by providing --home or CHECK_BALANCE_HOME instead of relying on the default \
                home directory. If you continue using the program right now, you may have \
                problems!",
            );
            PathBuf::from("check-balance")
        }
    })
}

#[derive(Debug, Default, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct DisplayPath(PathBuf);

impl From<PathBuf> for DisplayPath {
    fn from(value: PathBuf) -> Self {
        DisplayPath(value)
    }
}

impl Deref for DisplayPath {
    type Target = Path;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl AsRef<Path> for DisplayPath {
    fn as_ref(&self) -> &Path {
        &self.0
    }
}

impl Display for DisplayPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.to_string_lossy())
    }
}

impl FromStr for DisplayPath {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(PathBuf::from(s)))
    }
}

impl DisplayPath {
    pub fn path(&self) -> &Path {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_execute() {
        let args = Args::try_parse_from([
            "check-balance",
            "--home",
            "/tmp/cb",
            "--log-level",
            "debug",
            "execute",
            "-",
            "--as",
            "user@test.com",
            "--variables",
            r#"{"id": "1"}"#,
        ])
        .unwrap();
        assert_eq!(args.common().home().path(), Path::new("/tmp/cb"));
        assert_eq!(args.common().log_level(), LevelFilter::DEBUG);
        let Command::Execute(execute) = args.command() else {
            panic!("expected execute, got {:?}", args.command());
        };
        assert_eq!(execute.document(), "-");
        assert_eq!(execute.as_email(), Some("user@test.com"));
        assert_eq!(execute.variables(), Some(r#"{"id": "1"}"#));
    }

    #[test]
    fn test_parse_serve() {
        let args =
            Args::try_parse_from(["check-balance", "serve", "--listen", "0.0.0.0:9000"]).unwrap();
        let Command::Serve(serve) = args.command() else {
            panic!("expected serve, got {:?}", args.command());
        };
        assert_eq!(serve.listen(), Some("0.0.0.0:9000"));
    }
}
