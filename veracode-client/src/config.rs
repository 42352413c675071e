//! Client configuration.

use secrecy::SecretString;
use std::time::Duration;

use crate::credentials::VeracodeCredentials;
use crate::rate_limit::RateLimitConfig;

/// Default TCP connect timeout.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default whole-request timeout.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(300);

/// Configuration for [`VeracodeClient`](crate::VeracodeClient).
///
/// The region is not configured here: it is always derived from the API key id.
/// Timeouts, proxy and certificate settings only apply to the default reqwest
/// transport, not to a transport injected with
/// [`VeracodeClient::with_transport`](crate::VeracodeClient::with_transport).
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub credentials: VeracodeCredentials,
    pub rate_limit: RateLimitConfig,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    pub proxy_url: Option<String>,
    pub proxy_username: Option<String>,
    pub proxy_password: Option<SecretString>,
    /// Whether to validate TLS certificates (default: true)
    pub validate_certificates: bool,
    /// Replace the regional REST and XML roots, e.g. with an API gateway
    pub endpoint_override: Option<(String, String)>,
}

impl ClientConfig {
    #[must_use]
    pub fn new(credentials: VeracodeCredentials) -> Self {
        Self {
            credentials,
            rate_limit: RateLimitConfig::default(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            proxy_url: None,
            proxy_username: None,
            proxy_password: None,
            validate_certificates: true,
            endpoint_override: None,
        }
    }

    /// Allow `burst` requests at once, then one every `period`.
    #[must_use]
    pub fn with_rate_limit(mut self, period: Duration, burst: u32) -> Self {
        self.rate_limit = RateLimitConfig { period, burst };
        self
    }

    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_proxy(mut self, proxy_url: &str) -> Self {
        self.proxy_url = Some(proxy_url.to_string());
        self
    }

    #[must_use]
    pub fn with_proxy_auth(mut self, username: &str, password: &str) -> Self {
        self.proxy_username = Some(username.to_string());
        self.proxy_password = Some(SecretString::from(password));
        self
    }

    /// Disable certificate validation for development environments.
    ///
    /// WARNING: This should only be used in development environments with
    /// self-signed certificates. Never use this in production.
    #[must_use]
    pub fn with_certificate_validation_disabled(mut self) -> Self {
        self.validate_certificates = false;
        self
    }

    #[must_use]
    pub fn with_endpoints(mut self, rest_base_url: &str, xml_base_url: &str) -> Self {
        self.endpoint_override = Some((rest_base_url.to_string(), xml_base_url.to_string()));
        self
    }
}
