mod request_id;

use crate::config::{AppConfig, ConfigError, Credential};
use crate::cors::CorsPolicy;
use crate::transport::HttpTransport;

use request_id::RequestIds;

/// Shared application state accessible to all handlers. Read-only after startup.
pub struct AppState {
    pub config: AppConfig,
    pub transport: HttpTransport,
    pub cors: CorsPolicy,
    upstream_url: url::Url,
    credential: Option<Credential>,
    request_ids: RequestIds,
}

impl AppState {
    /// Build state from validated config and the (possibly absent) upstream credential.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] when the upstream URL or a CORS value
    /// cannot be parsed.
    pub fn new(
        config: AppConfig,
        transport: HttpTransport,
        credential: Option<Credential>,
    ) -> Result<Self, ConfigError> {
        let upstream_url = url::Url::parse(&config.upstream.url).map_err(|e| {
            ConfigError::Validation(format!("upstream.url is not a valid URL: {e}"))
        })?;
        let cors = CorsPolicy::from_config(&config.cors)?;

        Ok(Self {
            config,
            transport,
            cors,
            upstream_url,
            credential,
            request_ids: RequestIds::new(),
        })
    }

    /// Build state reading the credential from the configured environment variable.
    ///
    /// # Errors
    ///
    /// See [`AppState::new`].
    pub fn from_env(config: AppConfig, transport: HttpTransport) -> Result<Self, ConfigError> {
        let credential = Credential::from_env(&config.upstream.api_key_env);
        Self::new(config, transport, credential)
    }

    #[must_use]
    pub fn upstream_url(&self) -> &url::Url {
        &self.upstream_url
    }

    #[must_use]
    pub fn credential(&self) -> Option<&Credential> {
        self.credential.as_ref()
    }

    #[must_use]
    pub fn api_key_env(&self) -> &str {
        &self.config.upstream.api_key_env
    }

    #[must_use]
    pub fn max_body_bytes(&self) -> usize {
        self.config.server.max_body_bytes
    }

    /// Fresh correlation id for one proxied request.
    pub fn next_request_id(&self) -> uuid::Uuid {
        self.request_ids.next()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServerConfig;

    #[test]
    fn test_state_exposes_upstream_and_credential() {
        let state = AppState::new(
            AppConfig::default(),
            HttpTransport::new(&ServerConfig::default()),
            Credential::new("sk-test"),
        )
        .unwrap();
        assert_eq!(state.upstream_url().host_str(), Some("api.openai.com"));
        assert_eq!(state.credential().map(Credential::expose), Some("sk-test"));
        assert_eq!(state.api_key_env(), "OPENAI_API_KEY");
    }

    #[test]
    fn test_request_ids_are_distinct() {
        let state = AppState::new(
            AppConfig::default(),
            HttpTransport::new(&ServerConfig::default()),
            None,
        )
        .unwrap();
        assert_ne!(state.next_request_id(), state.next_request_id());
    }
}
