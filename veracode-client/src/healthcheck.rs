//! Healthcheck API: the smallest authenticated call on the REST API.

use http::Method;
use tokio_util::sync::CancellationToken;

use crate::client::ApiFamily;
use crate::response::Response;
use crate::{Result, VeracodeClient};

const STATUS_ENDPOINT: &str = "healthcheck/status";

/// Healthcheck API operations
pub struct HealthcheckApi<'a> {
    client: &'a VeracodeClient,
}

impl<'a> HealthcheckApi<'a> {
    /// Create a new HealthcheckApi instance
    #[must_use]
    pub fn new(client: &'a VeracodeClient) -> Self {
        Self { client }
    }

    /// Check that the platform is reachable and accepts the current credentials.
    ///
    /// The endpoint answers with an empty body; any non-2xx status is an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the request cannot be signed, is cancelled, fails in
    /// transport, or the platform answers with a non-success status.
    pub async fn status(&self, cancel: &CancellationToken) -> Result<Response<()>> {
        let request = self
            .client
            .new_request(Method::GET, STATUS_ENDPOINT, ApiFamily::Rest)?
            .with_cancellation(cancel.clone());

        self.client.execute(request).await
    }
}
