//! Per-request proxy state machine.
//!
//! ```text
//! Received → Matched → RequestValidated → Forwarding
//!     → ResponseReceived → ResponseValidated ─┐
//!     → UpstreamUnreachable ──────────────────┴→ Responded
//! ```
//!
//! A session is owned by the task handling its request. `respond` consumes
//! it, so the disclosure policy runs exactly once.

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::body::{Body, Bytes};
use axum::http::{header, request::Parts, HeaderMap, HeaderValue, Method, Request, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use hyper_util::client::legacy::{connect::HttpConnector, Client};
use serde_json::Value;
use uuid::Uuid;

use crate::http::request::{header_map, OasRequest, RequestParsingError};
use crate::http::response::{
    attach_diagnostics, envelope, parse_response_body, strip_hop_by_hop, UpstreamSummary,
};
use crate::observability::metrics;
use crate::routing::{Operation, OperationTable};
use crate::validation::{has_errors, ConformanceValidator, ValidationError, ValidationResults};

/// Where a session stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Received,
    Matched,
    RequestValidated,
    Forwarding,
    ResponseReceived,
    UpstreamUnreachable,
    ResponseValidated,
    Responded,
}

/// Buffered upstream response.
#[derive(Debug)]
pub struct UpstreamResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    /// Bytes passed through untouched.
    pub raw: Bytes,
    /// Parsed copy used for validation only.
    pub parsed: Value,
}

#[derive(Debug)]
pub enum UpstreamOutcome {
    Received(UpstreamResponse),
    /// No usable response. `status`/`headers` are set when the upstream
    /// answered but its body could not be read.
    Unreachable {
        status: Option<StatusCode>,
        headers: HeaderMap,
        reason: String,
    },
}

/// Upstream call parameters.
#[derive(Debug, Clone)]
pub struct Forwarding<'a> {
    pub client: &'a Client<HttpConnector, Body>,
    pub target: &'a str,
    /// Covers the response head and body together.
    pub timeout: Duration,
}

/// State of one proxied exchange.
#[derive(Debug)]
pub struct ProxySession {
    id: Uuid,
    stage: Stage,
    started: Instant,
    request: OasRequest,
    parse_error: Option<RequestParsingError>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    raw_body: Bytes,
    operation: Option<Arc<Operation>>,
    results: ValidationResults,
    body_error: Option<ValidationError>,
    outcome: Option<UpstreamOutcome>,
}

impl ProxySession {
    /// Start a session from a buffered client request.
    pub fn receive(parts: Parts, body: Bytes) -> Self {
        let (request, parse_error) = OasRequest::from_parts(&parts, &body);
        Self {
            id: Uuid::new_v4(),
            stage: Stage::Received,
            started: Instant::now(),
            request,
            parse_error,
            method: parts.method,
            uri: parts.uri,
            headers: parts.headers,
            raw_body: body,
            operation: None,
            results: ValidationResults::default(),
            body_error: None,
            outcome: None,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn request(&self) -> &OasRequest {
        &self.request
    }

    pub fn results(&self) -> &ValidationResults {
        &self.results
    }

    pub fn operation(&self) -> Option<&Operation> {
        self.operation.as_deref()
    }

    /// `Received → Matched`. The operation may be absent.
    pub fn match_operation(&mut self, operations: &OperationTable) {
        debug_assert_eq!(self.stage, Stage::Received);
        self.operation = operations.match_operation(&self.method, &self.request.path);
        match &self.operation {
            Some(op) => tracing::debug!(operation = ?op.operation_id, template = %op.path, "Operation matched"),
            None => tracing::debug!("No operation matched"),
        }
        self.stage = Stage::Matched;
    }

    /// `Matched → RequestValidated`. Failures are recorded, never fatal.
    pub fn validate_request(&mut self, validator: &ConformanceValidator) {
        debug_assert_eq!(self.stage, Stage::Matched);
        let mut result = validator.validate_request(&self.request, self.operation.as_deref());
        if let Some(e) = &self.parse_error {
            result.push(ValidationError::new("requestBody", e.to_string()).at("/requestBody"));
        }
        if !result.valid {
            metrics::record_validation_failure("request");
        }
        self.results.request = Some(result);
        self.stage = Stage::RequestValidated;
    }

    /// `RequestValidated → Forwarding → {ResponseReceived | UpstreamUnreachable}`.
    ///
    /// The only suspension point of the exchange. No retries.
    pub async fn forward(&mut self, upstream: Forwarding<'_>) {
        debug_assert_eq!(self.stage, Stage::RequestValidated);
        self.stage = Stage::Forwarding;

        let outcome = match self.upstream_request(upstream.target) {
            Ok(request) => {
                tracing::debug!(uri = %request.uri(), "Proxying client request");
                let started = Instant::now();
                // One deadline for the response head and the whole body.
                let result = tokio::time::timeout(upstream.timeout, fetch(upstream.client, request)).await;
                metrics::record_upstream_duration(started);

                match result {
                    Ok(Ok((status, headers, raw))) => {
                        let (parsed, body_error) = parse_response_body(&headers, &raw);
                        self.body_error = body_error;
                        UpstreamOutcome::Received(UpstreamResponse {
                            status,
                            headers,
                            raw,
                            parsed,
                        })
                    }
                    Ok(Err(unreachable)) => unreachable,
                    Err(_) => UpstreamOutcome::Unreachable {
                        status: None,
                        headers: HeaderMap::new(),
                        reason: format!("upstream timed out after {:?}", upstream.timeout),
                    },
                }
            }
            Err(reason) => UpstreamOutcome::Unreachable {
                status: None,
                headers: HeaderMap::new(),
                reason,
            },
        };

        self.stage = match &outcome {
            UpstreamOutcome::Received(r) => {
                tracing::debug!(status = r.status.as_u16(), "Received server response");
                Stage::ResponseReceived
            }
            UpstreamOutcome::Unreachable { status, reason, .. } => {
                tracing::warn!(status = ?status.map(|s| s.as_u16()), reason = %reason, "Target server is unreachable");
                Stage::UpstreamUnreachable
            }
        };
        self.outcome = Some(outcome);
    }

    /// Same method, path, query, headers and raw body against the target base.
    fn upstream_request(&self, target: &str) -> Result<Request<Body>, String> {
        let path_and_query = self.uri.path_and_query().map(|pq| pq.as_str()).unwrap_or("/");
        let uri = format!("{}{}", target.trim_end_matches('/'), path_and_query);

        let mut builder = Request::builder().method(self.method.clone()).uri(uri);
        if let Some(headers) = builder.headers_mut() {
            headers.extend(self.headers.clone());
        }
        builder
            .body(Body::from(self.raw_body.clone()))
            .map_err(|e| format!("invalid upstream request: {}", e))
    }

    /// `ResponseReceived → ResponseValidated`. No-op when unreachable.
    pub fn validate_response(&mut self, validator: &ConformanceValidator) {
        let Some(UpstreamOutcome::Received(response)) = &self.outcome else {
            return;
        };
        let status = response.status.as_u16();
        let operation = self.operation.as_deref();

        let mut body = validator.validate_response(&response.parsed, operation, status);
        if let Some(e) = self.body_error.take() {
            body.push(e);
        }
        let headers = validator.validate_response_headers(&header_map(&response.headers), operation, status);

        if !body.valid {
            metrics::record_validation_failure("response");
        }
        if !headers.valid {
            metrics::record_validation_failure("response_headers");
        }
        self.results.response = Some(body);
        self.results.response_headers = Some(headers);
        self.stage = Stage::ResponseValidated;
    }

    /// `→ Responded`: apply the disclosure policy.
    pub fn respond(mut self, silent: bool) -> Response {
        let disclose = !silent && has_errors(&self.results);
        let outcome = self.outcome.take();
        let outcome_label = match (&outcome, has_errors(&self.results)) {
            (Some(UpstreamOutcome::Received(_)), false) => "conformant",
            (Some(UpstreamOutcome::Received(_)), true) => "violation",
            _ => "unreachable",
        };

        let (status, mut headers, raw, summary) = match outcome {
            Some(UpstreamOutcome::Received(r)) => {
                let summary = UpstreamSummary::new(r.status.as_u16(), &r.headers, r.parsed);
                (r.status, r.headers, r.raw, Some(summary))
            }
            Some(UpstreamOutcome::Unreachable { status, headers, .. }) => {
                let summary = status.map(|s| UpstreamSummary::new(s.as_u16(), &headers, Value::Null));
                (status.unwrap_or(StatusCode::INTERNAL_SERVER_ERROR), headers, Bytes::new(), summary)
            }
            None => (StatusCode::INTERNAL_SERVER_ERROR, HeaderMap::new(), Bytes::new(), None),
        };
        strip_hop_by_hop(&mut headers);

        let (status, body) = if disclose {
            tracing::info!(results = ?self.results, "Validation failed; disclosing");
            headers.remove(header::CONTENT_LENGTH);
            headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
            let env = envelope(&self.request, summary.as_ref(), &self.results);
            (StatusCode::INTERNAL_SERVER_ERROR, Body::from(env.to_string()))
        } else {
            (status, Body::from(raw))
        };
        attach_diagnostics(&mut headers, &self.results, &self.request);

        metrics::record_exchange(self.method.as_str(), status.as_u16(), outcome_label, self.started);
        tracing::info!(
            method = %self.method,
            path = %self.request.path,
            status = status.as_u16(),
            outcome = outcome_label,
            elapsed_ms = self.started.elapsed().as_millis() as u64,
            "Exchange complete"
        );
        self.stage = Stage::Responded;

        (status, headers, body).into_response()
    }
}

/// Send `request` and buffer the full response body.
///
/// Response bodies are relayed whole; the request body limit does not apply.
async fn fetch(
    client: &Client<HttpConnector, Body>,
    request: Request<Body>,
) -> Result<(StatusCode, HeaderMap, Bytes), UpstreamOutcome> {
    let response = client.request(request).await.map_err(|e| UpstreamOutcome::Unreachable {
        status: None,
        headers: HeaderMap::new(),
        reason: e.to_string(),
    })?;
    let (parts, body) = response.into_parts();
    match axum::body::to_bytes(Body::new(body), usize::MAX).await {
        Ok(raw) => Ok((parts.status, parts.headers, raw)),
        Err(e) => Err(UpstreamOutcome::Unreachable {
            status: Some(parts.status),
            headers: parts.headers,
            reason: format!("failed to read upstream body: {}", e),
        }),
    }
}
