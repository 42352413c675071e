//! Response classification and decoding.
//!
//! JSON endpoints report failures through the status code. The legacy XML endpoints
//! answer `200 OK` even when they fail, so for XML the name of the root element
//! decides: `<error>` is a failure, anything else is the payload.

use bytes::Bytes;
use http::header::CONTENT_TYPE;
use http::{HeaderMap, StatusCode};
use log::{debug, warn};
use quick_xml::Reader;
use quick_xml::events::Event;
use serde::Deserialize;
use serde::de::DeserializeOwned;

use crate::error::ApiError;
use crate::page::{CollectionResult, NavLinks, PageMeta};
use crate::{Result, VeracodeError};

/// Body format announced by the `Content-Type` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    Json,
    Xml,
}

impl ContentKind {
    /// Classify a `Content-Type` value; parameters such as `charset` are ignored.
    #[must_use]
    pub fn from_header(value: &str) -> Option<Self> {
        let media_type = value.split(';').next().unwrap_or_default().trim();
        if media_type.eq_ignore_ascii_case("application/json") {
            Some(ContentKind::Json)
        } else if media_type.eq_ignore_ascii_case("text/xml") {
            Some(ContentKind::Xml)
        } else {
            None
        }
    }
}

/// A decoded response.
#[derive(Debug, Clone)]
pub struct Response<T> {
    pub status: StatusCode,
    pub headers: HeaderMap,
    /// The decoded destination
    pub body: T,
    /// The body exactly as received
    pub raw: Bytes,
    /// Set only for collection results
    pub page: Option<PageMeta>,
    /// Set only for collection results
    pub links: Option<NavLinks>,
}

impl<T> Response<T> {
    fn new(status: StatusCode, headers: HeaderMap, raw: Bytes, body: T) -> Self {
        Self {
            status,
            headers,
            body,
            raw,
            page: None,
            links: None,
        }
    }

    #[must_use]
    pub fn into_body(self) -> T {
        self.body
    }
}

impl<T: CollectionResult> Response<T> {
    /// Copy the page metadata and navigation links from the body onto the envelope.
    #[must_use]
    pub fn with_collection_meta(mut self) -> Self {
        self.page = self.body.page_meta();
        self.links = self.body.links();
        self
    }
}

#[derive(Debug, Deserialize)]
struct XmlErrorBody {
    #[serde(rename = "$text", default)]
    message: String,
}

/// What the first element of an XML document turned out to be.
#[derive(Debug, PartialEq, Eq)]
enum XmlRoot {
    Error,
    Payload,
    Empty,
}

fn content_type(headers: &HeaderMap) -> &str {
    headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
}

fn xml_str(body: &[u8]) -> Result<&str> {
    std::str::from_utf8(body)
        .map_err(|e| VeracodeError::Decode(format!("XML body is not UTF-8: {e}")))
}

fn xml_root(xml: &str) -> Result<XmlRoot> {
    let mut reader = Reader::from_str(xml);

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e)) => {
                return Ok(if e.local_name().as_ref() == b"error" {
                    XmlRoot::Error
                } else {
                    XmlRoot::Payload
                });
            }
            Ok(Event::Eof) => return Ok(XmlRoot::Empty),
            Err(e) => {
                return Err(VeracodeError::Decode(format!("XML parsing error: {e}")));
            }
            // declaration, comments, doctype, whitespace
            Ok(_) => {}
        }
    }
}

fn xml_api_error(status: StatusCode, endpoint: &str, xml: &str) -> ApiError {
    match quick_xml::de::from_str::<XmlErrorBody>(xml) {
        Ok(body) => ApiError::from_xml_error(status.as_u16(), endpoint, &body.message),
        Err(e) => {
            warn!("Unreadable <error> body from {endpoint}: {e}");
            ApiError::new(status.as_u16(), endpoint, Vec::new())
        }
    }
}

fn json_api_error(status: StatusCode, endpoint: &str, body: &[u8]) -> ApiError {
    let error = ApiError::from_json_body(status.as_u16(), endpoint, body);
    debug!("API error from {endpoint}: {error}");
    error
}

/// Classify a response and decode its body into `T`.
///
/// `endpoint` is the request path and is carried on any [`ApiError`].
///
/// # Errors
///
/// - [`VeracodeError::Api`] for a JSON response outside 2xx, or an XML `<error>` document
/// - [`VeracodeError::UnsupportedContentType`] for anything but JSON or XML
/// - [`VeracodeError::Decode`] if a success body does not fit `T`
pub fn decode<T: DeserializeOwned>(
    response: http::Response<Bytes>,
    endpoint: &str,
) -> Result<Response<T>> {
    let (parts, raw) = response.into_parts();
    let status = parts.status;

    match ContentKind::from_header(content_type(&parts.headers)) {
        Some(ContentKind::Json) => {
            if !status.is_success() {
                return Err(json_api_error(status, endpoint, &raw).into());
            }
            let body = serde_json::from_slice(&raw)?;
            Ok(Response::new(status, parts.headers, raw, body))
        }
        Some(ContentKind::Xml) => {
            let xml = xml_str(&raw)?;
            match xml_root(xml)? {
                XmlRoot::Error => Err(xml_api_error(status, endpoint, xml).into()),
                XmlRoot::Payload => {
                    let body = quick_xml::de::from_str(xml)?;
                    Ok(Response::new(status, parts.headers, raw, body))
                }
                XmlRoot::Empty => Err(VeracodeError::Decode(
                    "XML body contains no elements".to_string(),
                )),
            }
        }
        None => {
            let value = content_type(&parts.headers).to_string();
            warn!("Unsupported Content-Type '{value}' from {endpoint}");
            Err(VeracodeError::UnsupportedContentType(value))
        }
    }
}

/// Classify a response without decoding a destination.
///
/// Used for calls that only care whether they succeeded. Any status outside 2xx is
/// an error; when the body cannot be normalized the error carries no messages. An
/// XML `<error>` document is an error whatever the status.
///
/// # Errors
///
/// Returns [`VeracodeError::Api`] as described above.
pub fn check(response: http::Response<Bytes>, endpoint: &str) -> Result<Response<()>> {
    let (parts, raw) = response.into_parts();
    let status = parts.status;
    let kind = ContentKind::from_header(content_type(&parts.headers));

    if kind == Some(ContentKind::Xml)
        && let Ok(xml) = std::str::from_utf8(&raw)
        && matches!(xml_root(xml), Ok(XmlRoot::Error))
    {
        return Err(xml_api_error(status, endpoint, xml).into());
    }

    if !status.is_success() {
        let error = match kind {
            Some(ContentKind::Json) => json_api_error(status, endpoint, &raw),
            _ => ApiError::new(status.as_u16(), endpoint, Vec::new()),
        };
        return Err(error.into());
    }

    Ok(Response::new(status, parts.headers, raw, ()))
}
