//! # Veracode Client Core
//!
//! The transport and authentication core shared by every Veracode API binding:
//! HMAC request signing, region routing, client-side rate limiting and response
//! decoding for both the REST (JSON) and the legacy XML APIs.
//!
//! ## Features
//!
//! - 🔐 **HMAC Authentication** - `VERACODE-HMAC-SHA-256` signatures on every request
//! - 🌍 **Region Routing** - Commercial, European and Federal endpoints from the API key id
//! - ⏱️ **Rate Limiting** - One shared token bucket per client, cancellable while queued
//! - 🔄 **Credential Rotation** - Swap keys at runtime without disturbing in-flight requests
//! - 📄 **Error Normalization** - Every Veracode error body becomes one [`ApiError`]
//!
//! ## Quick Start
//!
//! ```no_run
//! use veracode_client::{ApiFamily, ClientConfig, VeracodeClient, VeracodeCredentials};
//! use veracode_client::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let credentials = VeracodeCredentials::from_env()?;
//!     let client = VeracodeClient::new(ClientConfig::new(credentials))?;
//!
//!     // Region comes from the key id: api.veracode.com, .eu or .us
//!     client.healthcheck_api().status(&CancellationToken::new()).await?;
//!
//!     let request = client
//!         .new_request(http::Method::GET, "appsec/v1/applications", ApiFamily::Rest)?
//!         .query(&[("name", "my app")]);
//!     let response = client.send::<serde_json::Value>(request).await?;
//!     println!("{}", response.body);
//!
//!     Ok(())
//! }
//! ```
//!
//! ## API Types
//!
//! - **REST API (api.veracode.*)**: JSON bodies, [`ApiFamily::Rest`]
//! - **XML API (analysiscenter.veracode.*)**: XML bodies, [`ApiFamily::Xml`]
//!
//! Both are signed with the same credentials and share the same rate limiter.

pub mod auth;
pub mod client;
pub mod config;
pub mod credentials;
pub mod error;
pub mod healthcheck;
pub mod page;
pub mod rate_limit;
pub mod region;
pub mod response;
pub mod signature;
pub mod transport;

// Re-export common types for convenience
pub use client::{ApiFamily, ApiRequest, VeracodeClient};
pub use config::ClientConfig;
pub use credentials::{VeracodeCredentials, strip_region};
pub use error::{ApiError, Result, VeracodeError};
pub use healthcheck::HealthcheckApi;
pub use page::{CollectionResult, Link, NavLinks, PageMeta, PageOptions, SortField};
pub use rate_limit::{RateLimitConfig, RateLimiter};
pub use region::{Region, RegionEndpoints};
pub use response::{ContentKind, Response};
pub use transport::{HttpSend, ReqwestTransport, VeracodeTransport};
pub use tokio_util::sync::CancellationToken;
