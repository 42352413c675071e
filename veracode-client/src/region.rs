//! Region resolution from Veracode API key ids.
//!
//! A regional key id looks like `vera01ei-0123456789abcdef`: the 8-character prefix
//! before the first `-` carries the region marker at index 6. Key ids without a
//! prefix belong to the commercial region.

use std::fmt;
use url::Url;

use crate::{Result, VeracodeError};

const PREFIX_LEN: usize = 8;
const MARKER_INDEX: usize = 6;

/// Veracode regions for API access.
///
/// Each region owns two roots: the REST API (`api.veracode.*`) and the legacy XML
/// API (`analysiscenter.veracode.*`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Region {
    /// European region - api.veracode.eu
    European,
    /// US Federal region - api.veracode.us
    Federal,
    /// Commercial region (default) - api.veracode.com
    #[default]
    Commercial,
}

impl Region {
    /// The single-character marker embedded in regional key ids.
    #[must_use]
    pub const fn marker(self) -> char {
        match self {
            Region::European => 'e',
            Region::Federal => 'f',
            Region::Commercial => 'g',
        }
    }

    /// Look up a region by marker character, ignoring case.
    #[must_use]
    pub fn from_marker(marker: char) -> Option<Self> {
        match marker.to_ascii_lowercase() {
            'e' => Some(Region::European),
            'f' => Some(Region::Federal),
            'g' => Some(Region::Commercial),
            _ => None,
        }
    }

    #[must_use]
    pub const fn rest_base_url(self) -> &'static str {
        match self {
            Region::European => "https://api.veracode.eu",
            Region::Federal => "https://api.veracode.us",
            Region::Commercial => "https://api.veracode.com",
        }
    }

    #[must_use]
    pub const fn xml_base_url(self) -> &'static str {
        match self {
            Region::European => "https://analysiscenter.veracode.eu",
            Region::Federal => "https://analysiscenter.veracode.us",
            Region::Commercial => "https://analysiscenter.veracode.com",
        }
    }

    /// Infer the region from an API key id.
    ///
    /// Unknown markers fail closed; there is no fallback to the commercial region.
    ///
    /// # Errors
    ///
    /// Returns [`VeracodeError::Region`] when the prefix before the first `-` is not
    /// exactly 8 characters, or when its marker is not a known region.
    pub fn from_api_key_id(key_id: &str) -> Result<Self> {
        let Some((prefix, _)) = key_id.split_once('-') else {
            return Ok(Region::Commercial);
        };

        if prefix.chars().count() != PREFIX_LEN {
            return Err(VeracodeError::Region {
                key_id: key_id.to_string(),
                reason: format!("credential prefix must be {PREFIX_LEN} characters"),
            });
        }

        prefix
            .chars()
            .nth(MARKER_INDEX)
            .and_then(Region::from_marker)
            .ok_or_else(|| VeracodeError::Region {
                key_id: key_id.to_string(),
                reason: "credential does not map to a known region".to_string(),
            })
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Region::European => "european",
            Region::Federal => "federal",
            Region::Commercial => "commercial",
        };
        f.write_str(name)
    }
}

/// The base URLs requests are resolved against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegionEndpoints {
    pub region: Region,
    /// REST API root, always ending in `/`
    pub rest: Url,
    /// Legacy XML API root, always ending in `/`
    pub xml: Url,
}

impl RegionEndpoints {
    /// Endpoints of one of the fixed Veracode regions.
    #[must_use]
    pub fn for_region(region: Region) -> Self {
        // The region table only holds well-formed absolute URLs
        let parse = |s: &str| {
            Url::parse(s).unwrap_or_else(|e| unreachable!("invalid region base URL {s}: {e}"))
        };
        Self {
            region,
            rest: with_trailing_slash(parse(region.rest_base_url())),
            xml: with_trailing_slash(parse(region.xml_base_url())),
        }
    }

    /// Endpoints pointing at arbitrary roots, for gateways, proxies and test servers.
    ///
    /// # Errors
    ///
    /// Returns [`VeracodeError::InvalidConfig`] when either URL cannot be used as a base.
    pub fn custom(region: Region, rest: &str, xml: &str) -> Result<Self> {
        Ok(Self {
            region,
            rest: parse_base(rest)?,
            xml: parse_base(xml)?,
        })
    }
}

/// Resolve the endpoints for an API key id.
///
/// # Errors
///
/// See [`Region::from_api_key_id`].
pub fn resolve(key_id: &str) -> Result<RegionEndpoints> {
    Region::from_api_key_id(key_id).map(RegionEndpoints::for_region)
}

fn parse_base(raw: &str) -> Result<Url> {
    let url = Url::parse(raw)
        .map_err(|e| VeracodeError::InvalidConfig(format!("Invalid base URL {raw}: {e}")))?;
    if url.cannot_be_a_base() {
        return Err(VeracodeError::InvalidConfig(format!(
            "URL {raw} cannot be used as a base URL"
        )));
    }
    Ok(with_trailing_slash(url))
}

fn with_trailing_slash(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_without_prefix_is_commercial() {
        assert_eq!(
            Region::from_api_key_id("0123456789abcdef0123456789abcdef").unwrap(),
            Region::Commercial
        );
    }

    #[test]
    fn test_regional_markers() {
        assert_eq!(
            Region::from_api_key_id("vera01ei-0123456789").unwrap(),
            Region::European
        );
        assert_eq!(
            Region::from_api_key_id("vera01fi-0123456789").unwrap(),
            Region::Federal
        );
        assert_eq!(
            Region::from_api_key_id("abcdefgh-11112222333344445555").unwrap(),
            Region::Commercial
        );
    }

    #[test]
    fn test_marker_is_case_insensitive() {
        assert_eq!(
            Region::from_api_key_id("VERA01EI-0123456789").unwrap(),
            Region::European
        );
    }

    #[test]
    fn test_unknown_marker_fails_closed() {
        for marker in ['a', 'd', 'h', 'z', '0', '-'] {
            let key = format!("vera01{marker}i-0123456789");
            let err = Region::from_api_key_id(&key).unwrap_err();
            assert!(
                matches!(err, VeracodeError::Region { .. }),
                "marker {marker:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_prefix_must_be_eight_characters() {
        for key in ["short-0123", "vera01eix-0123", "-0123456789"] {
            assert!(
                matches!(
                    Region::from_api_key_id(key),
                    Err(VeracodeError::Region { .. })
                ),
                "{key} should be rejected"
            );
        }
    }

    #[test]
    fn test_region_table() {
        let eu = resolve("vera01ei-0123").unwrap();
        assert_eq!(eu.rest.as_str(), "https://api.veracode.eu/");
        assert_eq!(eu.xml.as_str(), "https://analysiscenter.veracode.eu/");

        let us = resolve("vera01fi-0123").unwrap();
        assert_eq!(us.rest.as_str(), "https://api.veracode.us/");
        assert_eq!(us.xml.as_str(), "https://analysiscenter.veracode.us/");

        let com = resolve("plainkeyid").unwrap();
        assert_eq!(com.region, Region::Commercial);
        assert_eq!(com.rest.as_str(), "https://api.veracode.com/");
        assert_eq!(com.xml.as_str(), "https://analysiscenter.veracode.com/");
    }

    #[test]
    fn test_marker_round_trip() {
        for region in [Region::European, Region::Federal, Region::Commercial] {
            assert_eq!(Region::from_marker(region.marker()), Some(region));
        }
    }

    #[test]
    fn test_custom_endpoints_gain_trailing_slash() {
        let endpoints = RegionEndpoints::custom(
            Region::Commercial,
            "http://127.0.0.1:8080/gw",
            "http://127.0.0.1:8081",
        )
        .unwrap();
        assert_eq!(endpoints.rest.as_str(), "http://127.0.0.1:8080/gw/");
        assert_eq!(endpoints.xml.as_str(), "http://127.0.0.1:8081/");

        assert!(RegionEndpoints::custom(Region::Commercial, "not a url", "http://x").is_err());
        assert!(RegionEndpoints::custom(Region::Commercial, "mailto:a@b.c", "http://x").is_err());
    }
}
