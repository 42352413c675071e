//! Veracode API credentials.

use log::debug;
use secrecy::{ExposeSecret, SecretString};
use std::fmt;
use std::sync::Arc;

use crate::{Result, VeracodeError};

/// Environment variable holding the API key id.
pub const API_KEY_ID_ENV: &str = "VERACODE_API_KEY_ID";

/// Environment variable holding the API key secret.
pub const API_KEY_SECRET_ENV: &str = "VERACODE_API_KEY_SECRET";

/// An API key id / secret pair.
///
/// Both values are wrapped in `Arc<SecretString>`, so clones share the same
/// allocation and never copy the secret material around. Either value may carry a
/// `{region}-{value}` form; only the raw value takes part in signing.
#[derive(Clone)]
pub struct VeracodeCredentials {
    api_key_id: Arc<SecretString>,
    api_key_secret: Arc<SecretString>,
}

impl VeracodeCredentials {
    pub fn new(api_key_id: impl Into<String>, api_key_secret: impl Into<String>) -> Self {
        let api_key_id: String = api_key_id.into();
        let api_key_secret: String = api_key_secret.into();
        Self {
            api_key_id: Arc::new(SecretString::from(api_key_id)),
            api_key_secret: Arc::new(SecretString::from(api_key_secret)),
        }
    }

    /// Build credentials from already shared secrets.
    #[must_use]
    pub fn from_arc(api_key_id: Arc<SecretString>, api_key_secret: Arc<SecretString>) -> Self {
        Self {
            api_key_id,
            api_key_secret,
        }
    }

    /// Load credentials from `VERACODE_API_KEY_ID` and `VERACODE_API_KEY_SECRET`.
    ///
    /// # Errors
    ///
    /// Returns [`VeracodeError::InvalidConfig`] if either variable is missing or empty.
    pub fn from_env() -> Result<Self> {
        let credentials = Self::from_lookup(|name| std::env::var(name).ok())?;
        debug!("Loaded Veracode API credentials from environment");
        Ok(credentials)
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let read = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .ok_or_else(|| {
                    VeracodeError::InvalidConfig(format!(
                        "missing Veracode API credentials: {name} is not set"
                    ))
                })
        };

        let api_key_id = read(API_KEY_ID_ENV)?;
        let api_key_secret = read(API_KEY_SECRET_ENV)?;
        Ok(Self::new(api_key_id, api_key_secret))
    }

    /// The key id exactly as configured, region prefix included.
    #[must_use]
    pub fn expose_api_key_id(&self) -> &str {
        self.api_key_id.expose_secret()
    }

    /// The key secret exactly as configured, region prefix included.
    #[must_use]
    pub fn expose_api_key_secret(&self) -> &str {
        self.api_key_secret.expose_secret()
    }

    /// The key id as it appears in the signature and the `Authorization` header.
    #[must_use]
    pub fn signing_id(&self) -> &str {
        strip_region(self.expose_api_key_id())
    }

    /// The hex secret that keys the signature.
    #[must_use]
    pub fn signing_secret(&self) -> &str {
        strip_region(self.expose_api_key_secret())
    }
}

impl fmt::Debug for VeracodeCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VeracodeCredentials")
            .field("api_key_id", &"[REDACTED]")
            .field("api_key_secret", &"[REDACTED]")
            .finish()
    }
}

/// Drop the `{region}-` marker from a key id or secret.
///
/// Only the segment between the first and second `-` is kept, which is what the
/// platform expects for the `vera01ei-...` style credentials it issues.
#[must_use]
pub fn strip_region(value: &str) -> &str {
    match value.split('-').nth(1) {
        Some(raw) => raw,
        None => value,
    }
}
