//! The HTTP endpoint. `POST /graphql` executes a GraphQL request and `GET /graphql` serves
//! GraphiQL. Requests are authenticated with `Authorization: Bearer <token>`.

use crate::auth::Viewer;
use crate::db::Db;
use crate::graphql::{self, AppSchema};
use crate::{Config, Result};
use anyhow::Context;
use async_graphql::http::GraphiQLSource;
use bytes::Bytes;
use chrono::Utc;
use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::body::Incoming;
use hyper::header::{HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{debug, error, info};

pub const GRAPHQL_PATH: &str = "/graphql";

/// Request bodies larger than this are rejected with 413.
const MAX_BODY_BYTES: usize = 1024 * 1024;

const JSON: &str = "application/json";

struct State {
    schema: AppSchema,
    db: Db,
}

/// A bound, not yet running, GraphQL server.
pub struct Server {
    listener: TcpListener,
    state: Arc<State>,
}

impl Server {
    /// Binds `addr`. Port `0` picks a free port, see `local_addr`.
    pub async fn bind(config: &Config, addr: &str) -> Result<Self> {
        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("Unable to listen on {addr}"))?;
        let state = State {
            schema: graphql::build_schema(config),
            db: config.db().clone(),
        };
        Ok(Self {
            listener,
            state: Arc::new(state),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.listener
            .local_addr()
            .context("Unable to read the listen address")
    }

    /// Accepts connections until `shutdown` completes. Each connection is served on its own task.
    pub async fn serve(self, shutdown: impl Future<Output = ()>) -> Result<()> {
        info!("Serving GraphQL at http://{}{GRAPHQL_PATH}", self.local_addr()?);
        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Shutting down");
                    return Ok(());
                }
                accept = self.listener.accept() => {
                    let (stream, peer) = match accept {
                        Ok(accepted) => accepted,
                        Err(e) => {
                            error!("Failed to accept a connection: {e}");
                            continue;
                        }
                    };
                    let state = Arc::clone(&self.state);
                    tokio::spawn(async move {
                        let io = TokioIo::new(stream);
                        let service = service_fn(move |req: Request<Incoming>| {
                            let state = Arc::clone(&state);
                            async move { Ok::<_, Infallible>(handle(&state, req).await) }
                        });
                        if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                            debug!("Connection from {peer} ended with an error: {e}");
                        }
                    });
                }
            }
        }
    }
}

async fn handle(state: &State, req: Request<Incoming>) -> Response<Full<Bytes>> {
    if req.uri().path() != GRAPHQL_PATH {
        return text(StatusCode::NOT_FOUND, "Not found");
    }
    match *req.method() {
        Method::GET => graphiql(),
        Method::POST => execute(state, req).await,
        _ => text(StatusCode::METHOD_NOT_ALLOWED, "Method not allowed"),
    }
}

async fn execute(state: &State, req: Request<Incoming>) -> Response<Full<Bytes>> {
    let viewer = match authenticate(&state.db, req.headers().get(AUTHORIZATION)).await {
        Ok(viewer) => viewer,
        Err(response) => return response,
    };

    let body = match Limited::new(req.into_body(), MAX_BODY_BYTES).collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) if e.downcast_ref::<LengthLimitError>().is_some() => {
            return text(StatusCode::PAYLOAD_TOO_LARGE, "Request body is too large");
        }
        Err(e) => {
            debug!("Unable to read request body: {e}");
            return text(StatusCode::BAD_REQUEST, "Unable to read request body");
        }
    };

    let request: async_graphql::Request = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(e) => {
            debug!("Malformed GraphQL request: {e}");
            return text(StatusCode::BAD_REQUEST, "Malformed GraphQL request");
        }
    };

    let response = graphql::execute(&state.schema, viewer, request).await;
    match serde_json::to_vec(&response) {
        Ok(json) => with_type(StatusCode::OK, json, JSON),
        Err(e) => {
            error!("Unable to serialize GraphQL response: {e}");
            text(StatusCode::INTERNAL_SERVER_ERROR, graphql::INTERNAL_ERROR)
        }
    }
}

/// Resolves the `Authorization` header into a `Viewer`. A missing header is an anonymous viewer;
/// a malformed, unknown or expired token is a 401.
async fn authenticate(
    db: &Db,
    header: Option<&HeaderValue>,
) -> std::result::Result<Viewer, Response<Full<Bytes>>> {
    let Some(header) = header else {
        return Ok(Viewer::anonymous());
    };
    let token = header
        .to_str()
        .ok()
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or_else(|| text(StatusCode::UNAUTHORIZED, "Malformed Authorization header"))?;

    match db.session_user(token, Utc::now()).await {
        Ok(Some(user)) => Ok(Viewer::session(user, token)),
        Ok(None) => Err(text(StatusCode::UNAUTHORIZED, "Invalid or expired token")),
        Err(e) => {
            error!("Unable to look up session: {e:#}");
            Err(text(
                StatusCode::INTERNAL_SERVER_ERROR,
                graphql::INTERNAL_ERROR,
            ))
        }
    }
}

fn graphiql() -> Response<Full<Bytes>> {
    let html = GraphiQLSource::build().endpoint(GRAPHQL_PATH).finish();
    with_type(StatusCode::OK, html, "text/html; charset=utf-8")
}

fn text(status: StatusCode, message: &str) -> Response<Full<Bytes>> {
    with_type(status, message.to_string(), "text/plain; charset=utf-8")
}

fn with_type(
    status: StatusCode,
    body: impl Into<Bytes>,
    content_type: &'static str,
) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(body.into()));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test::{TestEnv, PASSWORD};
    use serde_json::{json, Value};
    use tokio::sync::oneshot;

    struct Running {
        url: String,
        shutdown: oneshot::Sender<()>,
        handle: tokio::task::JoinHandle<Result<()>>,
    }

    impl Running {
        async fn start(env: &TestEnv) -> Self {
            let server = Server::bind(&env.config(), "127.0.0.1:0").await.unwrap();
            let url = format!("http://{}{GRAPHQL_PATH}", server.local_addr().unwrap());
            let (shutdown, stopped) = oneshot::channel::<()>();
            let handle = tokio::spawn(server.serve(async move {
                let _ = stopped.await;
            }));
            Self {
                url,
                shutdown,
                handle,
            }
        }

        async fn stop(self) {
            let _ = self.shutdown.send(());
            self.handle.await.unwrap().unwrap();
        }
    }

    async fn post(
        url: &str,
        token: Option<&str>,
        body: impl Into<reqwest::Body>,
    ) -> (reqwest::StatusCode, String) {
        let mut request = reqwest::Client::new()
            .post(url)
            .header("content-type", JSON)
            .body(body);
        if let Some(token) = token {
            request = request.header("authorization", format!("Bearer {token}"));
        }
        let response = request.send().await.unwrap();
        let status = response.status();
        (status, response.text().await.unwrap())
    }

    fn query(document: &str) -> String {
        json!({ "query": document }).to_string()
    }

    #[tokio::test]
    async fn test_login_then_query_with_token() {
        let env = TestEnv::seeded().await;
        let server = Running::start(&env).await;

        let login = format!(
            r#"mutation {{ login(email: "user@test.com", password: "{PASSWORD}") {{ token }} }}"#
        );
        let (status, body) = post(&server.url, None, query(&login)).await;
        assert_eq!(status, reqwest::StatusCode::OK);
        let body: Value = serde_json::from_str(&body).unwrap();
        let token = body["data"]["login"]["token"].as_str().unwrap().to_string();

        let (status, body) = post(&server.url, Some(&token), query("{ me { email } }")).await;
        assert_eq!(status, reqwest::StatusCode::OK);
        let body: Value = serde_json::from_str(&body).unwrap();
        assert_eq!(body, json!({"data": {"me": {"email": "user@test.com"}}}));

        server.stop().await;
    }

    #[tokio::test]
    async fn test_anonymous_and_rejected_requests() {
        let env = TestEnv::seeded().await;
        let server = Running::start(&env).await;

        let (status, body) = post(&server.url, None, query("{ me { email } }")).await;
        assert_eq!(status, reqwest::StatusCode::OK);
        let body: Value = serde_json::from_str(&body).unwrap();
        assert_eq!(body, json!({"data": {"me": null}}));

        let (status, _) = post(&server.url, Some("unknown"), query("{ me { email } }")).await;
        assert_eq!(status, reqwest::StatusCode::UNAUTHORIZED);

        let (status, _) = post(&server.url, None, "{ not json").await;
        assert_eq!(status, reqwest::StatusCode::BAD_REQUEST);

        let (status, _) = post(&server.url, None, vec![b' '; MAX_BODY_BYTES + 1]).await;
        assert_eq!(status, reqwest::StatusCode::PAYLOAD_TOO_LARGE);

        server.stop().await;
    }

    #[tokio::test]
    async fn test_graphiql_and_unknown_paths() {
        let env = TestEnv::new().await;
        let server = Running::start(&env).await;
        let client = reqwest::Client::new();

        let response = client.get(&server.url).send().await.unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::OK);
        assert!(response.text().await.unwrap().contains("graphiql"));

        let other = server.url.replace(GRAPHQL_PATH, "/other");
        let response = client.get(&other).send().await.unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::NOT_FOUND);

        server.stop().await;
    }
}
