//! Veracode HMAC request signature.
//!
//! The signature is the output of four chained HMAC-SHA-256 applications, each
//! keyed with the previous stage's digest:
//!
//! ```text
//! k1  = HMAC(secret, nonce)
//! k2  = HMAC(k1, timestamp)
//! k3  = HMAC(k2, "vcode_request_version_1")
//! sig = HMAC(k3, "id={id}&host={host}&url={path?query}&method={method}")
//! ```
//!
//! Everything here is pure: no clock, no randomness, no I/O.

use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::{Result, VeracodeError};

type HmacSha256 = Hmac<Sha256>;

/// Protocol version literal mixed into the third stage of the chain.
pub const VERSION_STRING: &str = "vcode_request_version_1";

/// Scheme prefix of the `Authorization` header.
pub const AUTH_SCHEME: &str = "VERACODE-HMAC-SHA-256";

/// Length in bytes of a request nonce.
pub const NONCE_LEN: usize = 16;

/// Length in bytes of a signature.
pub const SIGNATURE_LEN: usize = 32;

fn hmac_sha256(key: &[u8], message: &[u8]) -> [u8; SIGNATURE_LEN] {
    // HMAC accepts keys of any length, new_from_slice cannot fail here
    let mut mac = <HmacSha256 as Mac>::new_from_slice(key)
        .unwrap_or_else(|_| unreachable!("HMAC-SHA-256 accepts keys of any length"));
    mac.update(message);
    mac.finalize().into_bytes().into()
}

/// Compute the request signature from a raw secret.
#[must_use]
pub fn sign(secret: &[u8], nonce: &[u8], timestamp: &[u8], data: &[u8]) -> [u8; SIGNATURE_LEN] {
    let hashed_nonce = hmac_sha256(secret, nonce);
    let hashed_timestamp = hmac_sha256(&hashed_nonce, timestamp);
    let signing_key = hmac_sha256(&hashed_timestamp, VERSION_STRING.as_bytes());
    hmac_sha256(&signing_key, data)
}

/// Compute the request signature from a hex-encoded secret.
///
/// # Errors
///
/// Returns [`VeracodeError::Signing`] when `secret_hex` is not valid hex.
pub fn sign_hex(
    secret_hex: &str,
    nonce: &[u8],
    timestamp: &[u8],
    data: &[u8],
) -> Result<[u8; SIGNATURE_LEN]> {
    let secret = hex::decode(secret_hex).map_err(|e| {
        VeracodeError::Signing(format!("API key secret must be a hex string: {e}"))
    })?;
    Ok(sign(&secret, nonce, timestamp, data))
}

/// Build the canonical string that the final stage signs.
///
/// Field order and separators are fixed by the server; nothing is re-encoded.
#[must_use]
pub fn canonical_data(id: &str, host: &str, path_and_query: &str, method: &str) -> String {
    format!("id={id}&host={host}&url={path_and_query}&method={method}")
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET_HEX: &str = "aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa";
    const NONCE: [u8; 16] = [
        0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08, 0x09, 0x0a, 0x0b, 0x0c, 0x0d, 0x0e, 0x0f,
        0x10,
    ];
    const TIMESTAMP: &[u8] = b"1700000000000";

    #[test]
    fn test_canonical_data_layout() {
        assert_eq!(
            canonical_data(
                "11112222333344445555",
                "api.veracode.com",
                "/appsec/v1/applications?page=1",
                "GET"
            ),
            "id=11112222333344445555&host=api.veracode.com&url=/appsec/v1/applications?page=1&method=GET"
        );
    }

    #[test]
    fn test_known_signature() {
        let sig = sign_hex(SECRET_HEX, &NONCE, TIMESTAMP, b"hello").unwrap();
        assert_eq!(
            hex::encode(sig),
            "c866255de0777f5d85b80a862578a83a1b03c7fe8770e7a6b20932819a06ec19"
        );
    }

    #[test]
    fn test_signature_is_deterministic() {
        let data = canonical_data("id", "api.veracode.com", "/", "GET");
        let first = sign_hex(SECRET_HEX, &NONCE, TIMESTAMP, data.as_bytes()).unwrap();
        let second = sign_hex(SECRET_HEX, &NONCE, TIMESTAMP, data.as_bytes()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_every_input_changes_signature() {
        let secret = hex::decode(SECRET_HEX).unwrap();
        let data = b"id=a&host=b&url=/c&method=GET".to_vec();
        let baseline = sign(&secret, &NONCE, TIMESTAMP, &data);

        for i in 0..secret.len() {
            let mut s = secret.clone();
            s[i] ^= 0x01;
            assert_ne!(sign(&s, &NONCE, TIMESTAMP, &data), baseline, "secret byte {i}");
        }
        for i in 0..NONCE.len() {
            let mut n = NONCE;
            n[i] ^= 0x01;
            assert_ne!(sign(&secret, &n, TIMESTAMP, &data), baseline, "nonce byte {i}");
        }
        for i in 0..TIMESTAMP.len() {
            let mut t = TIMESTAMP.to_vec();
            t[i] ^= 0x01;
            assert_ne!(sign(&secret, &NONCE, &t, &data), baseline, "timestamp byte {i}");
        }
        for i in 0..data.len() {
            let mut d = data.clone();
            d[i] ^= 0x01;
            assert_ne!(sign(&secret, &NONCE, TIMESTAMP, &d), baseline, "data byte {i}");
        }
    }

    #[test]
    fn test_invalid_hex_secret() {
        let err = sign_hex("not-hex", &NONCE, TIMESTAMP, b"data").unwrap_err();
        assert!(matches!(err, VeracodeError::Signing(_)));

        // odd length
        assert!(sign_hex("abc", &NONCE, TIMESTAMP, b"data").is_err());
    }
}
