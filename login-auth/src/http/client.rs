//! HTTP client builder for provider calls.

use std::time::Duration;

use crate::error::{ConfigErrorKind, Error, ErrorKind};

/// HTTP client configuration.
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    /// Upper bound for a single provider request. Unbounded unless the caller sets one.
    pub timeout: Option<Duration>,
    /// User agent string. GitHub rejects API calls without one.
    pub user_agent: String,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            timeout: None,
            user_agent: format!("login-auth/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// Builder for the HTTP client used by the login flow.
///
/// The resulting client never retries: authorization codes are single-use, so a
/// replayed exchange can only fail or, worse, succeed twice.
pub struct HttpClientBuilder {
    config: HttpClientConfig,
}

impl HttpClientBuilder {
    /// Create a new client builder with default configuration.
    pub fn new() -> Self {
        Self {
            config: HttpClientConfig::default(),
        }
    }

    /// Set the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = Some(timeout);
        self
    }

    /// Set the user agent string.
    pub fn with_user_agent(mut self, user_agent: String) -> Self {
        self.config.user_agent = user_agent;
        self
    }

    /// Build the configured HTTP client.
    pub fn build(self) -> Result<reqwest::Client, Error> {
        let mut builder = reqwest::Client::builder()
            .use_rustls_tls()
            .user_agent(self.config.user_agent);
        if let Some(timeout) = self.config.timeout {
            builder = builder.timeout(timeout);
        }
        builder.build().map_err(|e| Error {
            source: Some(Box::new(e)),
            error_kind: ErrorKind::Config(ConfigErrorKind::HttpClient),
        })
    }
}

impl Default for HttpClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_default() {
        let builder = HttpClientBuilder::new();
        assert_eq!(builder.config.timeout, None);
        assert!(builder.config.user_agent.starts_with("login-auth/"));
    }

    #[test]
    fn test_builder_with_timeout() {
        let builder = HttpClientBuilder::new().with_timeout(Duration::from_secs(5));
        assert_eq!(builder.config.timeout, Some(Duration::from_secs(5)));
    }

    #[test]
    fn test_builder_with_user_agent() {
        let builder = HttpClientBuilder::new().with_user_agent("gateway-test".to_string());
        assert_eq!(builder.config.user_agent, "gateway-test");
    }

    #[tokio::test]
    async fn test_build_client() {
        let result = HttpClientBuilder::new().build();
        assert!(result.is_ok());
    }
}
