use crate::commands::Out;
use crate::error::{ErrorType, IntoResult};
use crate::server::Server;
use crate::{Config, Result};
use tracing::error;

/// Runs the GraphQL server on `listen`, or on the configured address, until Ctrl-C.
pub async fn serve(config: &Config, listen: Option<&str>) -> Result<Out<()>> {
    let addr = listen.unwrap_or(config.listen());
    let server = Server::bind(config, addr)
        .await
        .pub_result(ErrorType::Service)?;
    server
        .serve(shutdown_signal())
        .await
        .pub_result(ErrorType::Service)?;
    Ok("The server has stopped".into())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Unable to listen for Ctrl-C, the server must be killed to stop: {e}");
        std::future::pending::<()>().await;
    }
}
