use std::sync::Once;
use std::time::Duration;

use bytes::Bytes;
use http::header::{self, HeaderMap, HeaderValue};
use http::StatusCode;

use crate::config::{Credential, ServerConfig};
use crate::error::ProxyError;

static RUSTLS_PROVIDER_INIT: Once = Once::new();
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

fn build_reqwest_client(
    pool_max_idle_per_host: usize,
    pool_idle_timeout: Option<Duration>,
    timeout: Duration,
    use_env_proxy: bool,
) -> Result<reqwest::Client, ProxyError> {
    let mut builder = reqwest::Client::builder()
        .pool_max_idle_per_host(pool_max_idle_per_host)
        .pool_idle_timeout(pool_idle_timeout)
        .tcp_nodelay(true)
        .connect_timeout(CONNECT_TIMEOUT)
        .redirect(reqwest::redirect::Policy::none())
        .timeout(timeout);

    if !use_env_proxy {
        builder = builder.no_proxy();
    }

    builder
        .build()
        .map_err(|err| ProxyError::Forwarding(format!("Failed to build HTTP client: {err}")))
}

/// Fully buffered upstream response.
#[derive(Debug)]
pub struct UpstreamReply {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// Pooled HTTP client used to reach the chat-completion upstream.
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    /// Create a transport with connection pooling and timeouts from the given server config.
    #[must_use]
    pub fn new(config: &ServerConfig) -> Self {
        RUSTLS_PROVIDER_INIT.call_once(|| {
            let _ = rustls::crypto::ring::default_provider().install_default();
        });

        let pool_idle_timeout = if config.http_pool_idle_timeout_secs == 0 {
            None
        } else {
            Some(Duration::from_secs(config.http_pool_idle_timeout_secs))
        };

        let client = match build_reqwest_client(
            config.http_pool_max_idle_per_host.max(1),
            pool_idle_timeout,
            Duration::from_secs(config.timeout),
            config.http_use_env_proxy,
        ) {
            Ok(client) => client,
            Err(err) => {
                tracing::error!(error = %err, "failed to build configured reqwest client, falling back to default client");
                reqwest::Client::new()
            }
        };

        Self { client }
    }

    /// POST `body` unchanged to `url` with bearer authentication and buffer the reply.
    ///
    /// Non-2xx upstream statuses are returned as `Ok`; only transport-level
    /// failures are errors.
    ///
    /// # Errors
    ///
    /// Returns [`ProxyError::Forwarding`] when the request cannot be sent, times
    /// out, or the response body cannot be read.
    pub async fn post_json(
        &self,
        url: &url::Url,
        credential: &Credential,
        body: Bytes,
    ) -> Result<UpstreamReply, ProxyError> {
        let mut authorization =
            HeaderValue::from_str(&format!("Bearer {}", credential.expose())).map_err(|_| {
                ProxyError::Forwarding("credential is not a valid header value".to_string())
            })?;
        authorization.set_sensitive(true);

        let response = self
            .client
            .post(url.clone())
            .header(header::AUTHORIZATION, authorization)
            .header(
                header::CONTENT_TYPE,
                HeaderValue::from_static("application/json"),
            )
            .body(body)
            .send()
            .await
            .map_err(|err| ProxyError::Forwarding(format!("Upstream request failed: {err}")))?;

        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await.map_err(|err| {
            ProxyError::Forwarding(format!("Failed to read upstream response body: {err}"))
        })?;

        Ok(UpstreamReply {
            status,
            headers,
            body,
        })
    }
}
