//! The forwarding contract: preflight, method check, credential check, relay.

use std::time::Instant;

use axum::body::{self, Body};
use axum::http::{Method, StatusCode};
use axum::response::Response;
use bytes::Bytes;
use http::header::{self, HeaderValue};
use http_body_util::LengthLimitError;

use crate::config::Credential;
use crate::cors::{strip_forbidden, CorsPolicy};
use crate::error::ProxyError;
use crate::observability::{log_forward_complete, log_proxy_error};
use crate::state::AppState;
use crate::transport::UpstreamReply;

/// Run one inbound request through the proxy. Never fails; errors become responses.
pub async fn handle(state: &AppState, method: &Method, body: Body) -> Response {
    if method == Method::OPTIONS {
        return preflight(&state.cors);
    }

    match proxy_request(state, method, body).await {
        Ok(response) => response,
        Err(err) => {
            log_proxy_error(method, &err);
            err.into_response(&state.cors)
        }
    }
}

/// 204 with CORS headers and an empty body.
#[must_use]
pub fn preflight(cors: &CorsPolicy) -> Response {
    let mut response = Response::new(Body::empty());
    *response.status_mut() = StatusCode::NO_CONTENT;
    cors.apply(response.headers_mut());
    response
}

async fn proxy_request(
    state: &AppState,
    method: &Method,
    body: Body,
) -> Result<Response, ProxyError> {
    if method != Method::POST {
        return Err(ProxyError::MethodNotAllowed);
    }
    let credential = state
        .credential()
        .ok_or_else(|| ProxyError::MissingCredential {
            env_var: state.api_key_env().to_string(),
        })?;
    let body = read_request_body(body, state.max_body_bytes()).await?;
    forward(state, credential, body).await
}

async fn read_request_body(body: Body, limit: usize) -> Result<Bytes, ProxyError> {
    body::to_bytes(body, limit).await.map_err(|err| {
        if exceeds_length_limit(&err) {
            ProxyError::PayloadTooLarge { limit }
        } else {
            ProxyError::Forwarding(format!("Failed to read request body: {err}"))
        }
    })
}

fn exceeds_length_limit(err: &axum::Error) -> bool {
    let mut current: Option<&(dyn std::error::Error + 'static)> = Some(err);
    while let Some(source) = current {
        if source.is::<LengthLimitError>() {
            return true;
        }
        current = source.source();
    }
    false
}

/// Send `body` upstream with the bearer credential and relay the reply.
///
/// # Errors
///
/// Returns [`ProxyError::Forwarding`] when the upstream cannot be reached or
/// its response cannot be read.
pub async fn forward(
    state: &AppState,
    credential: &Credential,
    body: Bytes,
) -> Result<Response, ProxyError> {
    let request_id = state.next_request_id();
    let started = Instant::now();
    let request_bytes = body.len();

    let reply = state
        .transport
        .post_json(state.upstream_url(), credential, body)
        .await
        .inspect_err(|err| {
            tracing::error!(
                request_id = %request_id,
                elapsed_ms = started.elapsed().as_millis(),
                error = %err,
                "upstream call failed"
            );
        })?;

    log_forward_complete(
        request_id,
        reply.status,
        request_bytes,
        reply.body.len(),
        started.elapsed(),
    );
    Ok(relay_response(reply, &state.cors))
}

/// Rebuild the upstream reply for the browser: same status and body,
/// forbidden headers removed, CORS headers merged in.
#[must_use]
pub fn relay_response(reply: UpstreamReply, cors: &CorsPolicy) -> Response {
    let UpstreamReply {
        status,
        mut headers,
        body,
    } = reply;

    strip_forbidden(&mut headers);
    if !headers.contains_key(header::CONTENT_TYPE) {
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
    }
    cors.apply(&mut headers);

    let mut response = Response::new(Body::from(body));
    *response.status_mut() = status;
    *response.headers_mut() = headers;
    response
}
