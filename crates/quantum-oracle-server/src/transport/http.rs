//! HTTP transport: relay route, game endpoints and /health.

#[cfg(feature = "http")]
use std::sync::Arc;

#[cfg(feature = "http")]
use axum::{
    extract::{Query, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Json as AxumJson, Response},
    routing::get,
    Router,
};
#[cfg(feature = "http")]
use serde::Deserialize;
#[cfg(feature = "http")]
use tower::ServiceBuilder;
#[cfg(feature = "http")]
use tower_http::cors::{Any, CorsLayer};

#[cfg(feature = "http")]
use quantum_oracle::RELAY_PATH;

#[cfg(feature = "http")]
use crate::oracle::Oracle;
#[cfg(feature = "http")]
use crate::relay::Relay;
#[cfg(feature = "http")]
use crate::types::{OracleError, OracleResult};

/// Header marking a relay byte that did not come from LfD.
#[cfg(feature = "http")]
pub const FALLBACK_HEADER: &str = "x-random-fallback";

/// Shared server state passed to all handlers via axum State.
#[cfg(feature = "http")]
pub struct ServerState {
    pub oracle: Arc<Oracle>,
    pub relay: Arc<Relay>,
}

#[cfg(feature = "http")]
#[derive(Debug, Deserialize)]
struct RelayQuery {
    source: Option<String>,
}

#[cfg(feature = "http")]
#[derive(Debug, Deserialize)]
struct AskQuery {
    question: Option<String>,
}

#[cfg(feature = "http")]
impl IntoResponse for OracleError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let retry_after = self.retry_after_secs();
        let mut response = (status, AxumJson(self.to_error_body())).into_response();
        if let Some(secs) = retry_after {
            if let Ok(value) = HeaderValue::from_str(&secs.to_string()) {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
        }
        response
    }
}

/// Build the router with every endpoint.
#[cfg(feature = "http")]
pub fn router(state: Arc<ServerState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route(RELAY_PATH, get(handle_relay))
        .route("/api/flip", get(handle_flip))
        .route("/api/ask", get(handle_ask))
        .route("/api/history", get(handle_history))
        .route("/health", get(handle_health))
        .layer(ServiceBuilder::new().layer(cors))
        .with_state(state)
}

/// HTTP transport serving the relay and the game endpoints.
#[cfg(feature = "http")]
pub struct HttpTransport {
    state: Arc<ServerState>,
}

#[cfg(feature = "http")]
impl HttpTransport {
    pub fn new(oracle: Arc<Oracle>, relay: Arc<Relay>) -> Self {
        Self {
            state: Arc::new(ServerState { oracle, relay }),
        }
    }

    /// Run the HTTP server on the given address.
    pub async fn run(&self, addr: &str) -> OracleResult<()> {
        let app = router(self.state.clone());

        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(OracleError::Io)?;

        tracing::info!("HTTP transport listening on {addr}");

        axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = tokio::signal::ctrl_c().await;
                tracing::info!("Shutdown signal received");
            })
            .await
            .map_err(|e| OracleError::Transport(e.to_string()))?;

        Ok(())
    }
}

/// `GET /api/quantum-random?source=lfd`. Never cached.
#[cfg(feature = "http")]
async fn handle_relay(
    State(state): State<Arc<ServerState>>,
    Query(query): Query<RelayQuery>,
) -> Response {
    let reply = state.relay.handle(query.source.as_deref()).await;
    let status = StatusCode::from_u16(reply.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

    let mut response = (status, AxumJson(reply.body)).into_response();
    let headers = response.headers_mut();
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
    if reply.fallback {
        headers.insert(FALLBACK_HEADER, HeaderValue::from_static("true"));
    }
    response
}

#[cfg(feature = "http")]
async fn handle_flip(State(state): State<Arc<ServerState>>) -> Result<Response, OracleError> {
    let outcome = state.oracle.flip().await?;
    Ok(AxumJson(outcome).into_response())
}

#[cfg(feature = "http")]
async fn handle_ask(
    State(state): State<Arc<ServerState>>,
    Query(query): Query<AskQuery>,
) -> Result<Response, OracleError> {
    let outcome = state.oracle.ask(query.question.as_deref()).await?;
    Ok(AxumJson(outcome).into_response())
}

#[cfg(feature = "http")]
async fn handle_history(State(state): State<Arc<ServerState>>) -> AxumJson<serde_json::Value> {
    AxumJson(serde_json::json!({
        "recent": state.oracle.history(),
        "stats": state.oracle.stats(),
        "cooldown": state.oracle.cooldown_remaining(),
    }))
}

/// Health check endpoint.
#[cfg(feature = "http")]
async fn handle_health(State(state): State<Arc<ServerState>>) -> AxumJson<serde_json::Value> {
    AxumJson(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "busy": state.oracle.is_busy(),
    }))
}
