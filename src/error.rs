use axum::body::Body;
use axum::response::Response;
use http::header::{self, HeaderValue};
use http::StatusCode;

use crate::cors::CorsPolicy;

const GENERIC_ERROR_MESSAGE: &str = "Internal Server Error";

/// Every way a proxied request can fail. Each variant is terminal for its request.
#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    #[error("Method Not Allowed")]
    MethodNotAllowed,
    #[error("Missing {env_var} environment variable.")]
    MissingCredential { env_var: String },
    #[error("Forwarding failed: {0}")]
    Forwarding(String),
    #[error("Request body too large (max {limit} bytes)")]
    PayloadTooLarge { limit: usize },
    #[error("Not Found")]
    NotFound,
}

impl ProxyError {
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            ProxyError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            ProxyError::MissingCredential { .. } | ProxyError::Forwarding(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            ProxyError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            ProxyError::NotFound => StatusCode::NOT_FOUND,
        }
    }

    /// Text safe to show the caller. Forwarding details stay in the logs.
    #[must_use]
    pub fn client_message(&self) -> String {
        match self {
            ProxyError::Forwarding(_) => GENERIC_ERROR_MESSAGE.to_string(),
            other => other.to_string(),
        }
    }

    fn is_json(&self) -> bool {
        matches!(
            self,
            ProxyError::MissingCredential { .. }
                | ProxyError::Forwarding(_)
                | ProxyError::PayloadTooLarge { .. }
        )
    }

    /// Render the error as an HTTP response carrying the CORS headers.
    #[must_use]
    pub fn into_response(self, cors: &CorsPolicy) -> Response {
        let message = self.client_message();
        let (body, content_type) = if self.is_json() {
            (
                serde_json::json!({ "error": message }).to_string(),
                "application/json",
            )
        } else {
            (message, "text/plain; charset=utf-8")
        };

        let mut response = Response::new(Body::from(body));
        *response.status_mut() = self.status();
        let headers = response.headers_mut();
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(content_type));
        if matches!(self, ProxyError::MethodNotAllowed) {
            headers.insert(header::ALLOW, HeaderValue::from_static("POST, OPTIONS"));
        }
        cors.apply(headers);
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn body_string(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("read body");
        String::from_utf8(bytes.to_vec()).expect("utf8 body")
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            ProxyError::MethodNotAllowed.status(),
            StatusCode::METHOD_NOT_ALLOWED
        );
        assert_eq!(
            ProxyError::MissingCredential {
                env_var: "OPENAI_API_KEY".to_string()
            }
            .status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            ProxyError::Forwarding("boom".to_string()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            ProxyError::PayloadTooLarge { limit: 10 }.status(),
            StatusCode::PAYLOAD_TOO_LARGE
        );
        assert_eq!(ProxyError::NotFound.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_forwarding_error_hides_detail() {
        let err = ProxyError::Forwarding("connection refused at 10.0.0.7:443".to_string());
        let response = err.into_response(&CorsPolicy::permissive());
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
        let body = body_string(response).await;
        assert_eq!(body, r#"{"error":"Internal Server Error"}"#);
    }

    #[tokio::test]
    async fn test_missing_credential_names_variable() {
        let err = ProxyError::MissingCredential {
            env_var: "OPENAI_API_KEY".to_string(),
        };
        let response = err.into_response(&CorsPolicy::permissive());
        assert_eq!(response.headers()[header::CONTENT_TYPE], "application/json");
        let body: serde_json::Value =
            serde_json::from_str(&body_string(response).await).expect("json");
        assert_eq!(body["error"], "Missing OPENAI_API_KEY environment variable.");
    }

    #[tokio::test]
    async fn test_method_not_allowed_sets_allow() {
        let response = ProxyError::MethodNotAllowed.into_response(&CorsPolicy::permissive());
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(response.headers()[header::ALLOW], "POST, OPTIONS");
        assert_eq!(response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
        assert_eq!(body_string(response).await, "Method Not Allowed");
    }
}
