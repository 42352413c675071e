//! Transport chain: HMAC signing and rate limiting in front of an HTTP stack.
//!
//! [`HttpSend`] is the seam to the network. [`ReqwestTransport`] is the default
//! implementation; tests and embedders can supply their own. [`VeracodeTransport`]
//! decorates any of them with the Veracode `Authorization` header and the shared
//! token bucket.

use async_trait::async_trait;
use bytes::Bytes;
use http::header::{AUTHORIZATION, CONTENT_TYPE, HeaderValue};
use log::debug;
use secrecy::ExposeSecret;
use std::fmt::Debug;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::auth;
use crate::config::ClientConfig;
use crate::credentials::VeracodeCredentials;
use crate::rate_limit::RateLimiter;
use crate::{Result, VeracodeError};

/// Sends one fully prepared HTTP request.
///
/// Implementations that do not sit on reqwest report their failures as
/// [`VeracodeError::Transport`].
#[async_trait]
pub trait HttpSend: Debug + Send + Sync + 'static {
    /// Send the request and return the response with its body fully read.
    async fn http_send(&self, req: http::Request<Bytes>) -> Result<http::Response<Bytes>>;
}

/// [`HttpSend`] backed by a `reqwest::Client`.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// Wrap an existing reqwest client.
    #[must_use]
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    /// Build a reqwest client from the timeout, proxy and TLS settings of `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if the proxy URL is invalid or the client cannot be built.
    pub fn from_config(config: &ClientConfig) -> Result<Self> {
        let mut client_builder = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.request_timeout);

        if !config.validate_certificates {
            client_builder = client_builder
                .danger_accept_invalid_certs(true)
                .danger_accept_invalid_hostnames(true);
        }

        if let Some(proxy_url) = &config.proxy_url {
            let mut proxy = reqwest::Proxy::all(proxy_url)
                .map_err(|e| VeracodeError::InvalidConfig(format!("Invalid proxy URL: {e}")))?;

            if let (Some(username), Some(password)) =
                (&config.proxy_username, &config.proxy_password)
            {
                proxy = proxy.basic_auth(username, password.expose_secret());
            }

            client_builder = client_builder.proxy(proxy);
        }

        let client = client_builder.build().map_err(VeracodeError::Http)?;
        Ok(Self { client })
    }

    /// Get access to the underlying reqwest client
    #[must_use]
    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }
}

#[async_trait]
impl HttpSend for ReqwestTransport {
    async fn http_send(&self, req: http::Request<Bytes>) -> Result<http::Response<Bytes>> {
        let req = reqwest::Request::try_from(req)?;
        let resp = self.client.execute(req).await?;

        let status = resp.status();
        let version = resp.version();
        let headers = resp.headers().clone();
        let body = resp.bytes().await?;

        let mut response = http::Response::new(body);
        *response.status_mut() = status;
        *response.version_mut() = version;
        *response.headers_mut() = headers;
        Ok(response)
    }
}

/// Add the Veracode `Authorization` header, and a JSON `Content-Type` unless one is set.
///
/// # Errors
///
/// Returns [`VeracodeError::Signing`] if the request URI or the credentials cannot be
/// turned into a valid header.
pub fn sign_request(
    request: &mut http::Request<Bytes>,
    credentials: &VeracodeCredentials,
) -> Result<()> {
    let url = Url::parse(&request.uri().to_string())
        .map_err(|e| VeracodeError::Signing(format!("Invalid URL: {e}")))?;
    let header = auth::authorization_header(credentials, request.method().as_str(), &url)?;
    let value = HeaderValue::from_str(&header)
        .map_err(|e| VeracodeError::Signing(format!("Invalid authorization header: {e}")))?;

    let headers = request.headers_mut();
    headers.insert(AUTHORIZATION, value);
    if !headers.contains_key(CONTENT_TYPE) {
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    }
    Ok(())
}

/// Rate-limited, HMAC-signing decorator around an [`HttpSend`].
#[derive(Debug, Clone)]
pub struct VeracodeTransport {
    inner: Arc<dyn HttpSend>,
    limiter: Arc<RateLimiter>,
}

impl VeracodeTransport {
    #[must_use]
    pub fn new(inner: Arc<dyn HttpSend>, limiter: Arc<RateLimiter>) -> Self {
        Self { inner, limiter }
    }

    #[must_use]
    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    /// Wait for a rate limit token, sign the request with `credentials` and send it.
    ///
    /// The token is taken before signing so the timestamp is fresh when the request
    /// leaves. Nothing is sent if either step fails. No retries are attempted.
    ///
    /// # Errors
    ///
    /// - [`VeracodeError::RateLimitCancelled`] if `cancel` fires while queued
    /// - [`VeracodeError::Signing`] if the request cannot be signed
    /// - [`VeracodeError::Cancelled`] if `cancel` fires while the request is in flight
    /// - whatever the wrapped transport returns
    pub async fn round_trip(
        &self,
        mut request: http::Request<Bytes>,
        credentials: &VeracodeCredentials,
        cancel: &CancellationToken,
    ) -> Result<http::Response<Bytes>> {
        self.limiter.acquire(cancel).await?;
        sign_request(&mut request, credentials)?;

        debug!("{} {}", request.method(), request.uri().path());

        tokio::select! {
            biased;
            () = cancel.cancelled() => Err(VeracodeError::Cancelled),
            result = self.inner.http_send(request) => result,
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use http::StatusCode;
    use std::sync::Mutex;
    use std::time::Duration;

    /// Records every request and answers with a canned response.
    #[derive(Debug)]
    pub(crate) struct RecordingTransport {
        pub(crate) requests: Mutex<Vec<http::Request<Bytes>>>,
        status: StatusCode,
        content_type: Option<&'static str>,
        body: &'static str,
        delay: Duration,
    }

    impl RecordingTransport {
        pub(crate) fn new(
            status: u16,
            content_type: Option<&'static str>,
            body: &'static str,
        ) -> Self {
            Self {
                requests: Mutex::new(Vec::new()),
                status: StatusCode::from_u16(status).unwrap(),
                content_type,
                body,
                delay: Duration::ZERO,
            }
        }

        pub(crate) fn json(status: u16, body: &'static str) -> Self {
            Self::new(status, Some("application/json;charset=UTF-8"), body)
        }

        pub(crate) fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = delay;
            self
        }

        pub(crate) fn last_request(&self) -> (http::Method, String, http::HeaderMap) {
            let requests = self.requests.lock().unwrap();
            let req = requests.last().expect("no request recorded");
            (req.method().clone(), req.uri().to_string(), req.headers().clone())
        }

        pub(crate) fn request_count(&self) -> usize {
            self.requests.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl HttpSend for RecordingTransport {
        async fn http_send(&self, req: http::Request<Bytes>) -> Result<http::Response<Bytes>> {
            self.requests.lock().unwrap().push(req);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }

            let mut builder = http::Response::builder().status(self.status);
            if let Some(content_type) = self.content_type {
                builder = builder.header(CONTENT_TYPE, content_type);
            }
            Ok(builder.body(Bytes::from_static(self.body.as_bytes())).unwrap())
        }
    }

    fn get(uri: &str) -> http::Request<Bytes> {
        http::Request::builder()
            .method("GET")
            .uri(uri)
            .body(Bytes::new())
            .unwrap()
    }

    fn credentials() -> VeracodeCredentials {
        VeracodeCredentials::new("abcdefgh-11112222333344445555", "aa".repeat(32))
    }

    #[test]
    fn test_sign_request_sets_headers() {
        let mut req = get("https://api.veracode.com/appsec/v1/applications?size=10");
        sign_request(&mut req, &credentials()).unwrap();

        let auth = req.headers()[AUTHORIZATION].to_str().unwrap();
        assert!(auth.starts_with("VERACODE-HMAC-SHA-256 id=11112222333344445555,ts="));
        assert_eq!(req.headers()[CONTENT_TYPE], "application/json");
    }

    #[test]
    fn test_sign_request_keeps_caller_content_type() {
        let mut req = get("https://analysiscenter.veracode.com/api/5.0/getapplist.do");
        req.headers_mut()
            .insert(CONTENT_TYPE, HeaderValue::from_static("text/xml"));
        sign_request(&mut req, &credentials()).unwrap();

        assert_eq!(req.headers()[CONTENT_TYPE], "text/xml");
        assert_eq!(req.headers().get_all(CONTENT_TYPE).iter().count(), 1);
    }

    #[tokio::test]
    async fn test_round_trip_signs_and_sends() {
        let inner = Arc::new(RecordingTransport::json(200, "{}"));
        let transport = VeracodeTransport::new(inner.clone(), Arc::new(RateLimiter::default()));

        let resp = transport
            .round_trip(
                get("https://api.veracode.com/healthcheck/status"),
                &credentials(),
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::OK);
        let (method, uri, headers) = inner.last_request();
        assert_eq!(method, http::Method::GET);
        assert_eq!(uri, "https://api.veracode.com/healthcheck/status");
        assert!(headers.contains_key(AUTHORIZATION));
    }

    #[derive(Debug)]
    struct BrokenTransport;

    #[async_trait]
    impl HttpSend for BrokenTransport {
        async fn http_send(&self, _: http::Request<Bytes>) -> Result<http::Response<Bytes>> {
            Err(VeracodeError::Transport("connection reset by peer".to_string()))
        }
    }

    #[tokio::test]
    async fn test_transport_failure_is_surfaced() {
        let limiter = Arc::new(RateLimiter::new(Duration::from_millis(100), 2));
        let transport = VeracodeTransport::new(Arc::new(BrokenTransport), Arc::clone(&limiter));

        let err = transport
            .round_trip(
                get("https://api.veracode.com/healthcheck/status"),
                &credentials(),
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, VeracodeError::Transport(ref m) if m == "connection reset by peer"));
        assert_eq!(err.to_string(), "Transport error: connection reset by peer");
        // the token was spent on the attempt
        assert!(limiter.available() < f64::from(limiter.burst()));
    }

    #[tokio::test]
    async fn test_signing_failure_sends_nothing() {
        let inner = Arc::new(RecordingTransport::json(200, "{}"));
        let transport = VeracodeTransport::new(inner.clone(), Arc::new(RateLimiter::default()));
        let bad = VeracodeCredentials::new("abcdefgh-1111", "not hex at all");

        let err = transport
            .round_trip(
                get("https://api.veracode.com/healthcheck/status"),
                &bad,
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, VeracodeError::Signing(_)));
        assert_eq!(inner.request_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_in_rate_limiter_sends_nothing() {
        let inner = Arc::new(RecordingTransport::json(200, "{}"));
        let limiter = Arc::new(RateLimiter::new(Duration::from_secs(60), 1));
        let transport = VeracodeTransport::new(inner.clone(), limiter);
        let cancel = CancellationToken::new();

        transport
            .round_trip(get("https://api.veracode.com/a"), &credentials(), &cancel)
            .await
            .unwrap();

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(5)).await;
            trigger.cancel();
        });

        let err = transport
            .round_trip(get("https://api.veracode.com/b"), &credentials(), &cancel)
            .await
            .unwrap_err();

        assert!(matches!(err, VeracodeError::RateLimitCancelled));
        assert_eq!(inner.request_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_in_flight() {
        let inner = Arc::new(
            RecordingTransport::json(200, "{}").with_delay(Duration::from_secs(30)),
        );
        let transport = VeracodeTransport::new(inner.clone(), Arc::new(RateLimiter::default()));
        let cancel = CancellationToken::new();

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(5)).await;
            trigger.cancel();
        });

        let err = transport
            .round_trip(get("https://api.veracode.com/slow"), &credentials(), &cancel)
            .await
            .unwrap_err();

        assert!(matches!(err, VeracodeError::Cancelled));
        assert_eq!(inner.request_count(), 1);
    }
}
