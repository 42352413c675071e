//! `Authorization` header construction.
//!
//! Wire format (case sensitive):
//!
//! ```text
//! VERACODE-HMAC-SHA-256 id=<keyId>,ts=<unixMillis>,nonce=<32 hex, upper>,sig=<64 hex, upper>
//! ```

use std::time::{SystemTime, UNIX_EPOCH};
use url::{Host, Url};

use crate::credentials::VeracodeCredentials;
use crate::signature::{self, AUTH_SCHEME, NONCE_LEN};
use crate::{Result, VeracodeError};

/// Generate a fresh 16-byte nonce from the thread-local CSPRNG.
#[must_use]
pub fn generate_nonce() -> [u8; NONCE_LEN] {
    rand::random()
}

/// Milliseconds since the Unix epoch.
///
/// # Errors
///
/// Returns [`VeracodeError::Signing`] if the system clock is before the epoch.
pub fn current_timestamp() -> Result<u64> {
    let elapsed = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| VeracodeError::Signing(format!("System time error: {e}")))?;
    u64::try_from(elapsed.as_millis())
        .map_err(|e| VeracodeError::Signing(format!("System time out of range: {e}")))
}

/// Host name without port, and without brackets around an IPv6 literal.
fn host_name(url: &Url) -> String {
    match url.host() {
        Some(Host::Ipv6(addr)) => addr.to_string(),
        Some(host) => host.to_string(),
        None => String::new(),
    }
}

/// Path plus query, as it appears on the request line.
fn path_and_query(url: &Url) -> String {
    match url.query() {
        Some(query) => format!("{}?{}", url.path(), query),
        None => url.path().to_string(),
    }
}

/// Build the `Authorization` header value with a fresh nonce and timestamp.
///
/// # Errors
///
/// Returns [`VeracodeError::Signing`] when the secret is not hex or the clock is unusable.
pub fn authorization_header(
    credentials: &VeracodeCredentials,
    method: &str,
    url: &Url,
) -> Result<String> {
    let timestamp = current_timestamp()?;
    authorization_header_with(credentials, method, url, &generate_nonce(), timestamp)
}

/// Build the `Authorization` header value from a caller-supplied nonce and timestamp.
///
/// # Errors
///
/// Returns [`VeracodeError::Signing`] when the secret is not hex.
pub fn authorization_header_with(
    credentials: &VeracodeCredentials,
    method: &str,
    url: &Url,
    nonce: &[u8; NONCE_LEN],
    timestamp: u64,
) -> Result<String> {
    let id = credentials.signing_id();
    let timestamp = timestamp.to_string();
    let data = signature::canonical_data(
        id,
        &host_name(url),
        &path_and_query(url),
        method,
    );

    let sig = signature::sign_hex(
        credentials.signing_secret(),
        nonce,
        timestamp.as_bytes(),
        data.as_bytes(),
    )?;

    Ok(format!(
        "{AUTH_SCHEME} id={id},ts={timestamp},nonce={},sig={}",
        hex::encode_upper(nonce),
        hex::encode_upper(sig)
    ))
}
