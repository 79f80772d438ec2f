use std::time::Instant;

use axum::{
    body::Body,
    http::{HeaderName, HeaderValue, Request, StatusCode},
    middleware::Next,
    response::Response,
};
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::application::error::ErrorReport;

const TARGET: &str = "yatube::http::response";
const REQUEST_ID_HEADER: HeaderName = HeaderName::from_static("x-request-id");
const MAX_INCOMING_ID_LEN: usize = 64;

/// Per-request data shared with handlers through request extensions.
#[derive(Clone, Debug)]
pub struct RequestContext {
    pub request_id: String,
}

impl RequestContext {
    fn from_request(request: &Request<Body>) -> Self {
        let incoming = request
            .headers()
            .get(&REQUEST_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|id| !id.is_empty() && id.len() <= MAX_INCOMING_ID_LEN);

        Self {
            request_id: incoming
                .map(str::to_owned)
                .unwrap_or_else(|| Uuid::new_v4().simple().to_string()),
        }
    }
}

/// Assigns a request id, reusing the caller's `x-request-id` when it is sane,
/// and echoes it back on the response.
pub async fn set_request_context(mut request: Request<Body>, next: Next) -> Response {
    let ctx = RequestContext::from_request(&request);
    request.extensions_mut().insert(ctx.clone());

    let mut response = next.run(request).await;
    if let Ok(value) = HeaderValue::from_str(&ctx.request_id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    response.extensions_mut().insert(ctx);
    response
}

/// Logs failed responses together with the error report a handler attached.
/// Plain 404s stay at debug so crawlers do not flood the log.
pub async fn log_responses(request: Request<Body>, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_owned();
    let request_id = request
        .extensions()
        .get::<RequestContext>()
        .map(|ctx| ctx.request_id.clone())
        .unwrap_or_default();
    let start = Instant::now();

    let mut response = next.run(request).await;
    let status = response.status();
    if !(status.is_client_error() || status.is_server_error()) {
        return response;
    }

    let elapsed_ms = start.elapsed().as_millis();
    let (source, chain) = response
        .extensions_mut()
        .remove::<ErrorReport>()
        .map(|report| (report.source, report.messages))
        .unwrap_or(("unknown", Vec::new()));
    let detail = chain.first().map(String::as_str).unwrap_or("-");

    if status.is_server_error() {
        error!(
            target: TARGET,
            status = status.as_u16(),
            %method,
            %path,
            elapsed_ms,
            source,
            detail,
            ?chain,
            %request_id,
            "request failed"
        );
    } else if status == StatusCode::NOT_FOUND && chain.is_empty() {
        debug!(target: TARGET, %method, %path, %request_id, "not found");
    } else {
        warn!(
            target: TARGET,
            status = status.as_u16(),
            %method,
            %path,
            elapsed_ms,
            source,
            detail,
            %request_id,
            "request rejected"
        );
    }

    response
}
