//! HTTP surface: OAuth endpoints, health check and the protected stream
//!
//! | Route | Auth | Purpose |
//! |---|---|---|
//! | `GET /authorize` | none | issue an authorization code (302 to the client) |
//! | `POST /token` | none | exchange a code for a bearer token |
//! | `GET /health` | none | liveness probe |
//! | `GET\|POST /sse` | bearer | newline-delimited JSON-RPC stream |

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::rejection::{FormRejection, QueryRejection};
use axum::extract::{Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{middleware, Extension, Form, Json, Router};
use serde_json::json;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::info;

use crate::auth::{
    require_bearer, AccessGrant, AuthError, AuthorizeRequest, TokenIssuer, TokenRequest,
};
use crate::mcp::handler::McpHandler;
use crate::mcp::stream;
use crate::ServerError;

/// Content type of the streaming endpoint in both directions
pub const NDJSON: &str = "application/x-ndjson";

/// Shared state of the HTTP routes
#[derive(Clone)]
pub struct AppState {
    pub handler: McpHandler,
    pub issuer: TokenIssuer,
    /// Flipped to `true` when the server begins shutting down; every open
    /// stream subscribes to it
    shutdown: Arc<watch::Sender<bool>>,
}

impl AppState {
    pub fn new(handler: McpHandler, issuer: TokenIssuer) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            handler,
            issuer,
            shutdown: Arc::new(shutdown),
        }
    }

    /// Tell every open stream to stop reading and finish
    pub fn begin_shutdown(&self) {
        self.shutdown.send_replace(true);
    }
}

/// Build the full application router
pub fn build_router(state: AppState) -> Router {
    let protected = Router::new()
        .route("/sse", get(stream_endpoint).post(stream_endpoint))
        .route_layer(middleware::from_fn_with_state(
            state.issuer.clone(),
            require_bearer,
        ));

    Router::new()
        .route("/authorize", get(authorize))
        .route("/token", post(token))
        .route("/health", get(health))
        .merge(protected)
        .with_state(state)
}

/// Bind `addr` and serve until `shutdown` resolves
pub async fn serve<F>(addr: SocketAddr, state: AppState, shutdown: F) -> Result<(), ServerError>
where
    F: Future<Output = ()> + Send + 'static,
{
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|source| ServerError::Bind { addr, source })?;
    serve_listener(listener, state, shutdown).await
}

/// Serve on an already bound listener until `shutdown` resolves
///
/// When `shutdown` fires, open streams stop reading their request bodies and
/// end once their in-flight requests are answered, letting the graceful
/// shutdown complete.
pub async fn serve_listener<F>(listener: TcpListener, state: AppState, shutdown: F) -> Result<(), ServerError>
where
    F: Future<Output = ()> + Send + 'static,
{
    let trigger = state.clone();
    let app = build_router(state);

    info!("Starting MCP HTTP server on {}", listener.local_addr()?);
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown.await;
            info!("Shutdown requested, closing open streams");
            trigger.begin_shutdown();
        })
        .await?;
    Ok(())
}

async fn authorize(
    State(state): State<AppState>,
    query: Result<Query<AuthorizeRequest>, QueryRejection>,
) -> Result<Response, AuthError> {
    let Query(request) = query.map_err(|e| AuthError::MalformedRequest(e.body_text()))?;
    let redirect = state.issuer.authorize(request).await?;

    Ok((StatusCode::FOUND, [(header::LOCATION, redirect.to_string())]).into_response())
}

async fn token(
    State(state): State<AppState>,
    form: Result<Form<TokenRequest>, FormRejection>,
) -> Result<Response, AuthError> {
    let Form(request) = form.map_err(|e| AuthError::MalformedRequest(e.body_text()))?;
    let issued = state.issuer.exchange(request).await?;

    Ok(([(header::CACHE_CONTROL, "no-store")], Json(issued)).into_response())
}

async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({
        "app": state.handler.server_info().name,
        "status": "ok",
    }))
}

async fn stream_endpoint(
    State(state): State<AppState>,
    Extension(grant): Extension<AccessGrant>,
    body: Body,
) -> Response {
    info!("Opening MCP stream for client {}", grant.client_id);
    let frames = stream::open(
        state.handler.clone(),
        body.into_data_stream(),
        state.shutdown.subscribe(),
    );

    (
        [
            (header::CONTENT_TYPE, NDJSON),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        Body::from_stream(frames),
    )
        .into_response()
}
