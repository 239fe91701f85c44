use check_balance::args::{Args, Command};
use check_balance::{commands, Config, ErrorType, IntoResult, Result};
use clap::Parser;
use std::process::ExitCode;
use tracing::{debug, error, trace};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    let log_level = args.common().log_level();
    init_logger(log_level);
    debug!("Log level set to {}", log_level.to_string().to_lowercase());

    match main_inner(args).await {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Exiting with error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

pub async fn main_inner(args: Args) -> Result<()> {
    trace!("{args:?}");
    let home = args.common().home().path();

    match args.command() {
        Command::Init => commands::init(home).await?.print(),

        Command::Serve(serve_args) => {
            let config = load(home).await?;
            commands::serve(&config, serve_args.listen()).await?.print()
        }

        Command::Execute(execute_args) => {
            let config = load(home).await?;
            let out = commands::execute(
                &config,
                execute_args.document(),
                execute_args.as_email(),
                execute_args.variables(),
            )
            .await?;
            out.print();
            out.print_json()?
        }

        Command::Backup => {
            let config = load(home).await?;
            commands::backup(&config).await?.print()
        }
    }
    Ok(())
}

async fn load(home: &std::path::Path) -> Result<Config> {
    Config::load(home).await.pub_result(ErrorType::Config)
}

/// Initializes the tracing subscriber.
pub fn init_logger(level: LevelFilter) {
    let filter = match std::env::var("RUST_LOG").ok() {
        // RUST_LOG exists; use it.
        Some(_) => EnvFilter::from_default_env(),
        // Otherwise only this crate logs, at the requested level.
        None => EnvFilter::new(format!("{}={}", env!("CARGO_CRATE_NAME"), level)),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
