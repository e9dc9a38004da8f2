//! Mock server answering from the API document alone.

use std::io;
use std::sync::Arc;

use arc_swap::ArcSwap;
use axum::{
    body::Body,
    extract::State,
    http::{HeaderMap, HeaderName, HeaderValue, Request, StatusCode},
    response::{IntoResponse, Response},
    routing::any,
    Json, Router,
};
use serde_json::json;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tower_http::{catch_panic::CatchPanicLayer, trace::TraceLayer};

use crate::config::MockConfig;
use crate::document::ContractSnapshot;
use crate::http::request::OasRequest;
use crate::http::response::{json_header_value, OPENAPI_FILE_HEADER};
use crate::http::server::{handle_panic, serve, spawn, ProxyError, ServerHandle};
use crate::lifecycle::Shutdown;
use crate::mock::synth::mock_response;
use crate::observability::metrics;
use crate::validation::{ConformanceValidator, JsonSchemaValidator, ValidationError};

#[derive(Clone)]
pub struct MockState {
    pub snapshot: Arc<ArcSwap<ContractSnapshot>>,
    pub validator: ConformanceValidator,
    pub max_body_size: usize,
}

/// HTTP server for the mock responder.
pub struct MockServer {
    router: Router,
    snapshot: Arc<ArcSwap<ContractSnapshot>>,
}

impl MockServer {
    pub fn new(config: &MockConfig, snapshot: ContractSnapshot) -> Self {
        let snapshot = Arc::new(ArcSwap::from_pointee(snapshot));
        let state = MockState {
            snapshot: snapshot.clone(),
            validator: ConformanceValidator::new(Arc::new(JsonSchemaValidator::new())),
            max_body_size: config.limits.max_body_size,
        };

        let router = Router::new()
            .route("/", any(mock_handler))
            .route("/{*path}", any(mock_handler))
            .with_state(state)
            .layer(CatchPanicLayer::custom(handle_panic))
            .layer(TraceLayer::new_for_http());

        Self { router, snapshot }
    }

    pub fn snapshot(&self) -> Arc<ArcSwap<ContractSnapshot>> {
        self.snapshot.clone()
    }

    pub async fn run(
        self,
        listener: TcpListener,
        updates: mpsc::UnboundedReceiver<ContractSnapshot>,
        shutdown: broadcast::Receiver<()>,
    ) -> io::Result<()> {
        serve(self.router, listener, self.snapshot, updates, shutdown).await
    }

    pub fn spawn(
        self,
        listener: TcpListener,
        updates: mpsc::UnboundedReceiver<ContractSnapshot>,
    ) -> io::Result<ServerHandle> {
        spawn(self.router, listener, self.snapshot, updates, Shutdown::new())
    }
}

async fn mock_handler(State(state): State<MockState>, request: Request<Body>) -> Result<Response, ProxyError> {
    let snapshot = state.snapshot.load_full();

    let mut headers = HeaderMap::new();
    let file = snapshot.document.source.display().to_string();
    // The path is plain text in this header, escaped only where needed.
    match HeaderValue::from_str(&file).or_else(|_| json_header_value(&file).map_err(|_| ())) {
        Ok(v) => {
            headers.insert(HeaderName::from_static(OPENAPI_FILE_HEADER), v);
        }
        Err(()) => tracing::warn!(file = %file, "Document path is not a valid header value"),
    }

    let (parts, body) = request.into_parts();
    let body = axum::body::to_bytes(body, state.max_body_size)
        .await
        .map_err(|e| ProxyError::BodyRead(e.to_string()))?;
    let (oas, parse_error) = OasRequest::from_parts(&parts, &body);

    let operation = snapshot
        .operations
        .match_operation(&parts.method, &oas.path)
        .filter(|op| op.operation_id.is_some());
    let Some(operation) = operation else {
        tracing::debug!(method = %parts.method, path = %oas.path, "Cannot mock unknown operation");
        metrics::record_mock_response(404);
        return Ok((StatusCode::NOT_FOUND, headers, Json(json!({ "error": "not found" }))).into_response());
    };

    let mut validation = state.validator.validate_request(&oas, Some(operation.as_ref()));
    if let Some(e) = parse_error {
        validation.push(ValidationError::new("requestBody", e.to_string()).at("/requestBody"));
    }
    if !validation.valid {
        tracing::debug!(operation = ?operation.operation_id, "Mock request failed validation");
        metrics::record_mock_response(400);
        return Ok((StatusCode::BAD_REQUEST, headers, Json(json!({ "validation": validation }))).into_response());
    }

    let mock = mock_response(&operation);
    metrics::record_mock_response(mock.status.as_u16());
    tracing::debug!(operation = ?operation.operation_id, status = mock.status.as_u16(), "Mocked response");

    Ok(match mock.body {
        Some(body) => (mock.status, headers, Json(body)).into_response(),
        None => (mock.status, headers).into_response(),
    })
}
