//! Core Veracode API client implementation.
//!
//! The client owns the base URLs, the credentials and the transport chain. Region,
//! base URLs and credentials live in one immutable snapshot behind a read-write
//! lock: building a request clones the snapshot `Arc` under the read lock, and a
//! rotation swaps in a new snapshot under the write lock. Requests that were built
//! before a rotation keep signing with the credentials they captured.

use bytes::Bytes;
use http::header::{CONTENT_TYPE, HeaderName, HeaderValue};
use http::{HeaderMap, Method};
use log::{debug, info};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::config::ClientConfig;
use crate::credentials::VeracodeCredentials;
use crate::healthcheck::HealthcheckApi;
use crate::page::{CollectionResult, encode_query};
use crate::rate_limit::RateLimiter;
use crate::region::{Region, RegionEndpoints};
use crate::response::{self, Response};
use crate::transport::{HttpSend, ReqwestTransport, VeracodeTransport};
use crate::{Result, VeracodeError};

/// Which API family a request targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ApiFamily {
    /// REST API (api.veracode.*), JSON bodies
    #[default]
    Rest,
    /// Legacy XML API (analysiscenter.veracode.*)
    Xml,
}

/// Everything a request needs from the client, captured at construction time.
#[derive(Debug)]
struct ClientState {
    credentials: VeracodeCredentials,
    endpoints: RegionEndpoints,
}

#[derive(Debug)]
struct ClientInner {
    state: RwLock<Arc<ClientState>>,
    transport: VeracodeTransport,
    endpoint_override: Option<(String, String)>,
}

/// Core Veracode API client.
///
/// Cheap to clone; clones share the snapshot, the rate limiter and the HTTP stack.
#[derive(Debug, Clone)]
pub struct VeracodeClient {
    inner: Arc<ClientInner>,
}

fn endpoints_for(
    credentials: &VeracodeCredentials,
    endpoint_override: Option<&(String, String)>,
) -> Result<RegionEndpoints> {
    let region = Region::from_api_key_id(credentials.expose_api_key_id())?;
    match endpoint_override {
        Some((rest, xml)) => RegionEndpoints::custom(region, rest, xml),
        None => Ok(RegionEndpoints::for_region(region)),
    }
}

impl VeracodeClient {
    /// Create a client that talks to Veracode through reqwest.
    ///
    /// # Errors
    ///
    /// Returns an error if the key id does not map to a region, the endpoint override
    /// is not a valid base URL, or the HTTP client cannot be built.
    pub fn new(config: ClientConfig) -> Result<Self> {
        let transport = ReqwestTransport::from_config(&config)?;
        Self::with_transport(config, Arc::new(transport))
    }

    /// Create a client on top of a caller-supplied transport.
    ///
    /// # Errors
    ///
    /// Returns an error if the key id does not map to a region or the endpoint
    /// override is not a valid base URL.
    pub fn with_transport(config: ClientConfig, http: Arc<dyn HttpSend>) -> Result<Self> {
        let endpoints = endpoints_for(&config.credentials, config.endpoint_override.as_ref())?;
        debug!(
            "Veracode client for {} region: REST {}, XML {}",
            endpoints.region, endpoints.rest, endpoints.xml
        );

        let limiter = Arc::new(RateLimiter::from_config(config.rate_limit));
        let state = ClientState {
            credentials: config.credentials,
            endpoints,
        };

        Ok(Self {
            inner: Arc::new(ClientInner {
                state: RwLock::new(Arc::new(state)),
                transport: VeracodeTransport::new(http, limiter),
                endpoint_override: config.endpoint_override,
            }),
        })
    }

    fn snapshot(&self) -> Arc<ClientState> {
        let guard = self
            .inner
            .state
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&guard)
    }

    #[must_use]
    pub fn region(&self) -> Region {
        self.snapshot().endpoints.region
    }

    /// The current REST and XML roots, read together.
    #[must_use]
    pub fn endpoints(&self) -> RegionEndpoints {
        self.snapshot().endpoints.clone()
    }

    #[must_use]
    pub fn rest_base_url(&self) -> Url {
        self.snapshot().endpoints.rest.clone()
    }

    #[must_use]
    pub fn xml_base_url(&self) -> Url {
        self.snapshot().endpoints.xml.clone()
    }

    #[must_use]
    pub fn credentials(&self) -> VeracodeCredentials {
        self.snapshot().credentials.clone()
    }

    #[must_use]
    pub fn rate_limiter(&self) -> &Arc<RateLimiter> {
        self.inner.transport.limiter()
    }

    /// Replace the credentials, and with them the region and base URLs.
    ///
    /// In-flight requests are unaffected. On error the client keeps its old state.
    ///
    /// # Errors
    ///
    /// Returns [`VeracodeError::Region`] if the new key id does not map to a region.
    pub fn update_credentials(&self, credentials: VeracodeCredentials) -> Result<()> {
        let endpoints = endpoints_for(&credentials, self.inner.endpoint_override.as_ref())?;
        let region = endpoints.region;
        let next = Arc::new(ClientState {
            credentials,
            endpoints,
        });

        {
            let mut guard = self
                .inner
                .state
                .write()
                .unwrap_or_else(PoisonError::into_inner);
            *guard = next;
        }

        info!("Veracode credentials rotated, now using the {region} region");
        Ok(())
    }

    /// Build a request for `endpoint`, resolved beneath the REST or XML root.
    ///
    /// A leading `/` on `endpoint` is ignored so that a root with a path prefix
    /// (an API gateway, say) is kept.
    ///
    /// # Errors
    ///
    /// Returns [`VeracodeError::InvalidConfig`] if `endpoint` is not a valid relative URL
    /// or would leave the root's origin.
    pub fn new_request(
        &self,
        method: Method,
        endpoint: &str,
        api: ApiFamily,
    ) -> Result<ApiRequest> {
        let state = self.snapshot();
        let base = match api {
            ApiFamily::Rest => &state.endpoints.rest,
            ApiFamily::Xml => &state.endpoints.xml,
        };

        let invalid = |reason: String| {
            VeracodeError::InvalidConfig(format!("Invalid endpoint {endpoint}: {reason}"))
        };

        if Url::parse(endpoint).is_ok() {
            return Err(invalid("absolute URLs are not accepted".to_string()));
        }

        let url = base
            .join(endpoint.trim_start_matches('/'))
            .map_err(|e| invalid(e.to_string()))?;

        if url.origin() != base.origin() {
            return Err(invalid(format!("resolves outside {base}")));
        }

        Ok(ApiRequest {
            method,
            url,
            headers: HeaderMap::new(),
            body: Bytes::new(),
            credentials: state.credentials.clone(),
            cancel: CancellationToken::new(),
            timeout: None,
        })
    }

    async fn dispatch(&self, request: ApiRequest) -> Result<http::Response<Bytes>> {
        let ApiRequest {
            method,
            url,
            headers,
            body,
            credentials,
            cancel,
            timeout,
        } = request;

        let mut http_request = http::Request::builder()
            .method(method)
            .uri(url.as_str())
            .body(body)
            .map_err(|e| VeracodeError::InvalidConfig(format!("Invalid request: {e}")))?;
        *http_request.headers_mut() = headers;

        let cancel = cancel.child_token();
        let round_trip = self
            .inner
            .transport
            .round_trip(http_request, &credentials, &cancel);

        let Some(timeout) = timeout else {
            return round_trip.await;
        };

        // on expiry the round trip still runs to completion so it reports the phase it
        // was in
        tokio::pin!(round_trip);
        tokio::select! {
            result = &mut round_trip => return result,
            () = tokio::time::sleep(timeout) => {}
        }

        cancel.cancel();
        round_trip.await
    }

    /// Send the request and decode the response body into `T`.
    ///
    /// # Errors
    ///
    /// Returns any transport, cancellation, signing, API or decode error.
    pub async fn send<T: DeserializeOwned>(&self, request: ApiRequest) -> Result<Response<T>> {
        let endpoint = request.url.path().to_string();
        let response = self.dispatch(request).await?;
        response::decode(response, &endpoint)
    }

    /// Like [`send`](Self::send), and also copy the page metadata onto the envelope.
    ///
    /// # Errors
    ///
    /// See [`send`](Self::send).
    pub async fn send_collection<T>(&self, request: ApiRequest) -> Result<Response<T>>
    where
        T: DeserializeOwned + CollectionResult,
    {
        self.send(request)
            .await
            .map(Response::with_collection_meta)
    }

    /// Send the request and only check that it succeeded.
    ///
    /// # Errors
    ///
    /// Returns any transport, cancellation or signing error, or the normalized
    /// [`ApiError`](crate::ApiError) for a failed call.
    pub async fn execute(&self, request: ApiRequest) -> Result<Response<()>> {
        let endpoint = request.url.path().to_string();
        let response = self.dispatch(request).await?;
        response::check(response, &endpoint)
    }

    /// Get a healthcheck API instance.
    /// Uses REST API (api.veracode.*).
    #[must_use]
    pub fn healthcheck_api(&self) -> HealthcheckApi<'_> {
        HealthcheckApi::new(self)
    }
}

/// A request bound to the credentials it was created with.
#[derive(Debug)]
pub struct ApiRequest {
    method: Method,
    url: Url,
    headers: HeaderMap,
    body: Bytes,
    credentials: VeracodeCredentials,
    cancel: CancellationToken,
    timeout: Option<Duration>,
}

impl ApiRequest {
    #[must_use]
    pub fn method(&self) -> &Method {
        &self.method
    }

    #[must_use]
    pub fn url(&self) -> &Url {
        &self.url
    }

    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Append query parameters, encoding spaces as `%20`.
    #[must_use]
    pub fn query<K, V>(mut self, pairs: &[(K, V)]) -> Self
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        if pairs.is_empty() {
            return self;
        }

        let encoded = encode_query(pairs);
        let query = match self.url.query() {
            Some(existing) if !existing.is_empty() => format!("{existing}&{encoded}"),
            _ => encoded,
        };
        self.url.set_query(Some(&query));
        self
    }

    /// Serialize `body` as the JSON request body.
    ///
    /// # Errors
    ///
    /// Returns [`VeracodeError::Serialization`] if `body` cannot be serialized.
    pub fn json<T: Serialize + ?Sized>(mut self, body: &T) -> Result<Self> {
        let bytes = serde_json::to_vec(body)
            .map_err(|e| VeracodeError::Serialization(e.to_string()))?;
        self.body = Bytes::from(bytes);
        self.headers
            .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Ok(self)
    }

    /// Use a raw body with an explicit content type.
    #[must_use]
    pub fn body(mut self, body: impl Into<Bytes>, content_type: HeaderValue) -> Self {
        self.body = body.into();
        self.headers.insert(CONTENT_TYPE, content_type);
        self
    }

    #[must_use]
    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Abort the request, queued or in flight, when `cancel` fires.
    #[must_use]
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Abort the request if it has not completed within `timeout`, queueing included.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}
