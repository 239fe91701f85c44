use crate::auth::Viewer;
use crate::commands::Out;
use crate::error::{ErrorType, IntoResult};
use crate::{graphql, utils, Config, Result};
use anyhow::{anyhow, Context};
use async_graphql::{Request, Variables};
use std::path::Path;
use tokio::io::AsyncReadExt;

/// Runs one GraphQL document against the local database without going through HTTP.
///
/// # Arguments
/// - `document` - A path to a file holding the document, or `-` for stdin
/// - `as_email` - Runs the document as this user. `None` runs it anonymously.
/// - `variables` - A JSON object of GraphQL variables
///
/// The structure of the returned `Out` is the GraphQL response. GraphQL errors are part of the
/// response and do not make this function fail.
pub async fn execute(
    config: &Config,
    document: &str,
    as_email: Option<&str>,
    variables: Option<&str>,
) -> Result<Out<serde_json::Value>> {
    let query = read_document(document)
        .await
        .pub_result(ErrorType::Request)?;
    let mut request = Request::new(query);
    if let Some(variables) = variables {
        let value: serde_json::Value = serde_json::from_str(variables)
            .context("--variables is not valid JSON")
            .pub_result(ErrorType::Request)?;
        request = request.variables(Variables::from_json(value));
    }

    let viewer = match as_email {
        Some(email) => {
            let user = config
                .db()
                .user_by_email(email)
                .await
                .pub_result(ErrorType::Database)?
                .ok_or_else(|| anyhow!("There is no user with the email '{email}'"))
                .pub_result(ErrorType::Request)?;
            Viewer::trusted(user)
        }
        None => Viewer::anonymous(),
    };

    let schema = graphql::build_schema(config);
    let response = graphql::execute(&schema, viewer, request).await;
    let message = if response.is_ok() {
        "Executed the GraphQL document".to_string()
    } else {
        format!(
            "Executed the GraphQL document with {} error(s)",
            response.errors.len()
        )
    };
    let json = serde_json::to_value(&response).context("Unable to serialize the response")?;
    Ok(Out::new(message, json))
}

async fn read_document(document: &str) -> Result<String> {
    if document == "-" {
        let mut query = String::new();
        tokio::io::stdin()
            .read_to_string(&mut query)
            .await
            .context("Unable to read the GraphQL document from stdin")?;
        Ok(query)
    } else {
        utils::read(Path::new(document)).await
    }
}
