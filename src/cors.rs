use http::header::{self, HeaderMap, HeaderName, HeaderValue};

use crate::config::{ConfigError, CorsConfig};

/// Upstream headers that never reach the browser.
const FORBIDDEN_RESPONSE_HEADERS: &[HeaderName] = &[
    header::SET_COOKIE,
    header::WWW_AUTHENTICATE,
    header::CONNECTION,
    header::TRANSFER_ENCODING,
    header::TE,
    header::TRAILER,
    header::UPGRADE,
    header::PROXY_AUTHENTICATE,
    header::CONTENT_LENGTH,
];

const ACCESS_CONTROL_PREFIX: &str = "access-control-";

/// Pre-built cross-origin header values, shared by every response.
#[derive(Debug, Clone)]
pub struct CorsPolicy {
    allow_origin: HeaderValue,
    allow_methods: HeaderValue,
    allow_headers: HeaderValue,
    max_age: Option<HeaderValue>,
}

impl CorsPolicy {
    /// Build the policy from config.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] when a configured value is not a valid header value.
    pub fn from_config(config: &CorsConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            allow_origin: header_value("cors.allow_origin", &config.allow_origin)?,
            allow_methods: header_value("cors.allow_methods", &config.allow_methods)?,
            allow_headers: header_value("cors.allow_headers", &config.allow_headers)?,
            max_age: config.max_age_secs.map(HeaderValue::from),
        })
    }

    /// `*` origin, `POST, OPTIONS`, any request header.
    #[must_use]
    pub fn permissive() -> Self {
        Self {
            allow_origin: HeaderValue::from_static("*"),
            allow_methods: HeaderValue::from_static("POST, OPTIONS"),
            allow_headers: HeaderValue::from_static("*"),
            max_age: None,
        }
    }

    /// Insert the CORS headers, replacing any existing values.
    pub fn apply(&self, headers: &mut HeaderMap) {
        headers.insert(
            header::ACCESS_CONTROL_ALLOW_ORIGIN,
            self.allow_origin.clone(),
        );
        headers.insert(
            header::ACCESS_CONTROL_ALLOW_METHODS,
            self.allow_methods.clone(),
        );
        headers.insert(
            header::ACCESS_CONTROL_ALLOW_HEADERS,
            self.allow_headers.clone(),
        );
        if let Some(max_age) = &self.max_age {
            headers.insert(header::ACCESS_CONTROL_MAX_AGE, max_age.clone());
        }
    }
}

impl Default for CorsPolicy {
    fn default() -> Self {
        Self::permissive()
    }
}

fn header_value(field: &str, value: &str) -> Result<HeaderValue, ConfigError> {
    HeaderValue::from_str(value)
        .map_err(|_| ConfigError::Validation(format!("{field} is not a valid header value")))
}

/// Remove upstream headers that must not be relayed.
///
/// Upstream `access-control-*` headers are dropped too; the proxy's own
/// policy is the only one the browser sees.
pub fn strip_forbidden(headers: &mut HeaderMap) {
    for name in FORBIDDEN_RESPONSE_HEADERS {
        headers.remove(name);
    }
    headers.remove("keep-alive");
    headers.remove("proxy-connection");

    let upstream_cors: Vec<HeaderName> = headers
        .keys()
        .filter(|name| name.as_str().starts_with(ACCESS_CONTROL_PREFIX))
        .cloned()
        .collect();
    for name in upstream_cors {
        headers.remove(&name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_permissive() {
        let mut headers = HeaderMap::new();
        CorsPolicy::permissive().apply(&mut headers);
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_METHODS], "POST, OPTIONS");
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_HEADERS], "*");
        assert!(headers.get(header::ACCESS_CONTROL_MAX_AGE).is_none());
    }

    #[test]
    fn test_apply_overwrites_existing() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::ACCESS_CONTROL_ALLOW_ORIGIN,
            HeaderValue::from_static("https://evil.example"),
        );
        CorsPolicy::permissive().apply(&mut headers);
        assert_eq!(headers.get_all(header::ACCESS_CONTROL_ALLOW_ORIGIN).iter().count(), 1);
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
    }

    #[test]
    fn test_from_config_restricted_headers_and_max_age() {
        let config = CorsConfig {
            allow_headers: "Content-Type, Authorization".to_string(),
            max_age_secs: Some(600),
            ..CorsConfig::default()
        };
        let policy = CorsPolicy::from_config(&config).unwrap();
        let mut headers = HeaderMap::new();
        policy.apply(&mut headers);
        assert_eq!(
            headers[header::ACCESS_CONTROL_ALLOW_HEADERS],
            "Content-Type, Authorization"
        );
        assert_eq!(headers[header::ACCESS_CONTROL_MAX_AGE], "600");
    }

    #[test]
    fn test_strip_forbidden() {
        let mut headers = HeaderMap::new();
        headers.insert(header::SET_COOKIE, HeaderValue::from_static("session=abc"));
        headers.insert(
            header::WWW_AUTHENTICATE,
            HeaderValue::from_static("Bearer realm=\"api\""),
        );
        headers.insert(header::CONTENT_LENGTH, HeaderValue::from_static("12"));
        headers.insert(header::CONNECTION, HeaderValue::from_static("keep-alive"));
        headers.insert(
            header::ACCESS_CONTROL_ALLOW_ORIGIN,
            HeaderValue::from_static("https://platform.example"),
        );
        headers.insert(
            header::ACCESS_CONTROL_EXPOSE_HEADERS,
            HeaderValue::from_static("x-request-id"),
        );
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        headers.insert("x-request-id", HeaderValue::from_static("req_123"));

        strip_forbidden(&mut headers);

        assert_eq!(headers.len(), 2);
        assert_eq!(headers[header::CONTENT_TYPE], "application/json");
        assert_eq!(headers["x-request-id"], "req_123");
    }
}
