use std::time::Duration;

use http::{Method, StatusCode};
use tracing_subscriber::EnvFilter;

use crate::error::ProxyError;

/// Initialize the tracing subscriber with the configured log level.
///
/// Maps config log levels to tracing levels:
/// - "DISABLED" -> no subscriber installed
/// - "WARNING" -> WARN
/// - "CRITICAL" -> ERROR
/// - Others map directly (DEBUG, INFO, ERROR)
pub fn init_tracing(log_level: &str) {
    let Some(directive) = tracing_directive(log_level) else {
        return;
    };

    let filter = EnvFilter::try_new(directive).unwrap_or_else(|_| EnvFilter::new("INFO"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();
}

fn tracing_directive(log_level: &str) -> Option<String> {
    let level = log_level.to_uppercase();
    match level.as_str() {
        "DISABLED" => None,
        "WARNING" => Some("WARN".to_string()),
        "CRITICAL" => Some("ERROR".to_string()),
        _ => Some(level),
    }
}

/// One summary line per relayed request. Carries sizes only, never payloads.
pub fn log_forward_complete(
    request_id: uuid::Uuid,
    status: StatusCode,
    request_bytes: usize,
    response_bytes: usize,
    elapsed: Duration,
) {
    tracing::info!(
        request_id = %request_id,
        status = status.as_u16(),
        request_bytes,
        response_bytes,
        elapsed_ms = elapsed.as_millis(),
        "relayed chat completion"
    );
}

pub fn log_proxy_error(method: &Method, err: &ProxyError) {
    match err {
        ProxyError::MissingCredential { env_var } => {
            tracing::error!(%method, env_var = env_var.as_str(), "upstream credential is not configured");
        }
        ProxyError::Forwarding(_) => {
            tracing::warn!(%method, error = %err, "request failed while forwarding");
        }
        ProxyError::MethodNotAllowed
        | ProxyError::PayloadTooLarge { .. }
        | ProxyError::NotFound => {
            tracing::debug!(%method, error = %err, "rejected request");
        }
    }
}
