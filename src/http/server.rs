//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum router with the catch-all proxy handler
//! - Wire up middleware (tracing, panic recovery)
//! - Bind to a listener and serve until shutdown
//! - Swap in rebuilt contract snapshots as they arrive
//! - Drive each exchange through its `ProxySession`

use std::any::Any;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderValue, Request, Response as HttpResponse, StatusCode},
    response::{IntoResponse, Response},
    routing::any,
    Json, Router,
};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use serde_json::json;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tower_http::{catch_panic::CatchPanicLayer, trace::TraceLayer};
use tracing::Instrument;

use crate::config::ProxyConfig;
use crate::document::ContractSnapshot;
use crate::lifecycle::Shutdown;
use crate::proxy::{Forwarding, ProxySession};
use crate::validation::{ConformanceValidator, JsonSchemaValidator};

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub snapshot: Arc<ArcSwap<ContractSnapshot>>,
    pub client: Client<HttpConnector, Body>,
    pub config: Arc<ProxyConfig>,
    pub validator: ConformanceValidator,
}

/// Per-request faults that never reach validation.
#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("request body exceeds {limit} bytes")]
    BodyTooLarge { limit: usize },
    #[error("failed to read request body: {0}")]
    BodyRead(String),
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let status = match self {
            ProxyError::BodyTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            ProxyError::BodyRead(_) => StatusCode::BAD_REQUEST,
        };
        tracing::warn!(error = %self, "Rejecting request");
        (status, Json(json!({ "error": { "message": self.to_string() } }))).into_response()
    }
}

/// Generic 500 for any panic inside a handler; the server keeps serving.
pub fn handle_panic(err: Box<dyn Any + Send + 'static>) -> HttpResponse<String> {
    let detail = err
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| err.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic");
    tracing::error!(detail, "openapi-cop found an error (but is still alive)");

    let body = json!({ "error": { "message": "openapi-cop proxy server error" } }).to_string();
    let mut response = HttpResponse::new(body);
    *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
    response
        .headers_mut()
        .insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
    response
}

/// A running server task.
pub struct ServerHandle {
    local_addr: SocketAddr,
    shutdown: Shutdown,
    task: JoinHandle<io::Result<()>>,
}

impl ServerHandle {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stop accepting, drain, and wait until the listener is released.
    pub async fn shutdown(self) -> io::Result<()> {
        self.shutdown.trigger();
        self.task.await.map_err(io::Error::other)?
    }
}

/// Serve `router` on `listener`, swapping snapshots until shutdown.
pub(crate) async fn serve(
    router: Router,
    listener: TcpListener,
    snapshot: Arc<ArcSwap<ContractSnapshot>>,
    mut updates: mpsc::UnboundedReceiver<ContractSnapshot>,
    mut shutdown: broadcast::Receiver<()>,
) -> io::Result<()> {
    let addr = listener.local_addr()?;
    tracing::info!(address = %addr, "HTTP server starting");

    let reload = tokio::spawn(async move {
        while let Some(next) = updates.recv().await {
            tracing::info!(
                title = next.document.title(),
                operations = next.operations.len(),
                "Swapping in rebuilt API contract"
            );
            snapshot.store(Arc::new(next));
        }
    });

    let result = axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            let _ = shutdown.recv().await;
            tracing::info!("Draining connections");
        })
        .await;
    reload.abort();

    tracing::info!(address = %addr, "HTTP server stopped");
    result
}

/// Spawn `serve` and return a handle owning its shutdown trigger.
pub(crate) fn spawn(
    router: Router,
    listener: TcpListener,
    snapshot: Arc<ArcSwap<ContractSnapshot>>,
    updates: mpsc::UnboundedReceiver<ContractSnapshot>,
    shutdown: Shutdown,
) -> io::Result<ServerHandle> {
    let local_addr = listener.local_addr()?;
    let task = tokio::spawn(serve(router, listener, snapshot, updates, shutdown.subscribe()));
    Ok(ServerHandle {
        local_addr,
        shutdown,
        task,
    })
}

/// HTTP server for the validating proxy.
pub struct HttpServer {
    router: Router,
    snapshot: Arc<ArcSwap<ContractSnapshot>>,
    config: Arc<ProxyConfig>,
}

impl HttpServer {
    /// Create a new proxy server around an initial contract.
    pub fn new(config: ProxyConfig, snapshot: ContractSnapshot) -> Self {
        let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());
        let snapshot = Arc::new(ArcSwap::from_pointee(snapshot));
        let config = Arc::new(config);

        let state = AppState {
            snapshot: snapshot.clone(),
            client,
            config: config.clone(),
            validator: ConformanceValidator::new(Arc::new(JsonSchemaValidator::new())),
        };

        Self {
            router: Self::build_router(state),
            snapshot,
            config,
        }
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(state: AppState) -> Router {
        Router::new()
            .route("/", any(proxy_handler))
            .route("/{*path}", any(proxy_handler))
            .with_state(state)
            .layer(CatchPanicLayer::custom(handle_panic))
            .layer(TraceLayer::new_for_http())
    }

    /// The shared snapshot reference; reloads replace what it points to.
    pub fn snapshot(&self) -> Arc<ArcSwap<ContractSnapshot>> {
        self.snapshot.clone()
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &ProxyConfig {
        &self.config
    }

    /// Run the server, accepting connections on the given listener.
    pub async fn run(
        self,
        listener: TcpListener,
        updates: mpsc::UnboundedReceiver<ContractSnapshot>,
        shutdown: broadcast::Receiver<()>,
    ) -> io::Result<()> {
        tracing::info!(
            target_url = %self.config.target.url,
            strict = self.config.validation.strict,
            silent = self.config.validation.silent,
            "Proxy configured"
        );
        serve(self.router, listener, self.snapshot, updates, shutdown).await
    }

    /// Run in the background with its own shutdown coordinator.
    pub fn spawn(
        self,
        listener: TcpListener,
        updates: mpsc::UnboundedReceiver<ContractSnapshot>,
    ) -> io::Result<ServerHandle> {
        spawn(self.router, listener, self.snapshot, updates, Shutdown::new())
    }
}

/// Main proxy handler: one `ProxySession` per request.
async fn proxy_handler(State(state): State<AppState>, request: Request<Body>) -> Result<Response, ProxyError> {
    // Pinned for the whole exchange; a concurrent reload does not affect it.
    let snapshot = state.snapshot.load_full();
    let limit = state.config.limits.max_body_size;

    let declared = request
        .headers()
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<usize>().ok());
    if declared.is_some_and(|len| len > limit) {
        return Err(ProxyError::BodyTooLarge { limit });
    }

    let (parts, body) = request.into_parts();
    let body = axum::body::to_bytes(body, limit)
        .await
        .map_err(|e| ProxyError::BodyRead(e.to_string()))?;

    let mut session = ProxySession::receive(parts, body);
    let span = tracing::info_span!(
        "exchange",
        session = %session.id(),
        method = %session.request().method,
        path = %session.request().path,
    );

    async move {
        session.match_operation(&snapshot.operations);
        session.validate_request(&state.validator);
        session
            .forward(Forwarding {
                client: &state.client,
                target: &state.config.target.url,
                timeout: Duration::from_secs(state.config.target.timeout_secs),
            })
            .await;
        session.validate_response(&state.validator);
        Ok(session.respond(state.config.validation.silent))
    }
    .instrument(span)
    .await
}
