//! Pagination metadata and query-string helpers for collection endpoints.

use serde::{Deserialize, Serialize};

/// Metadata for the current API page.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageMeta {
    #[serde(default)]
    pub number: u32,
    #[serde(default)]
    pub size: u32,
    #[serde(default)]
    pub total_elements: u64,
    #[serde(default)]
    pub total_pages: u32,
}

impl PageMeta {
    /// True if a further page exists after this one.
    #[must_use]
    pub fn has_next(&self) -> bool {
        self.number.saturating_add(1) < self.total_pages
    }
}

/// A link to another page of the same collection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    pub href: String,
}

/// Navigation links returned alongside a page (`_links`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NavLinks {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first: Option<Link>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last: Option<Link>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next: Option<Link>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prev: Option<Link>,
    #[serde(default, rename = "self", skip_serializing_if = "Option::is_none")]
    pub self_: Option<Link>,
}

/// Implemented by response types that hold one page of a collection.
///
/// [`VeracodeClient::send_collection`](crate::VeracodeClient::send_collection) copies
/// this metadata onto the [`Response`](crate::Response) envelope.
pub trait CollectionResult {
    fn page_meta(&self) -> Option<PageMeta>;
    fn links(&self) -> Option<NavLinks>;
}

/// A sort key; encodes as `name` or `name,desc`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortField {
    pub name: String,
    pub descending: bool,
}

impl SortField {
    pub fn asc(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            descending: false,
        }
    }

    pub fn desc(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            descending: true,
        }
    }

    fn encode(&self) -> String {
        if self.descending {
            format!("{},desc", self.name)
        } else {
            self.name.clone()
        }
    }
}

/// Paging and sorting options shared by the collection endpoints.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageOptions {
    pub page: u32,
    /// Page size; the server default applies when `None`
    pub size: Option<u32>,
    /// Field names are camelCase; ascending unless marked descending
    pub sort: Vec<SortField>,
}

impl PageOptions {
    #[must_use]
    pub fn new(page: u32) -> Self {
        Self {
            page,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_size(mut self, size: u32) -> Self {
        self.size = Some(size);
        self
    }

    #[must_use]
    pub fn sort_by(mut self, field: SortField) -> Self {
        self.sort.push(field);
        self
    }

    /// Query pairs in the order the API documents them.
    #[must_use]
    pub fn to_query_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = Vec::with_capacity(self.sort.len().saturating_add(2));
        if let Some(size) = self.size {
            pairs.push(("size".to_string(), size.to_string()));
        }
        pairs.push(("page".to_string(), self.page.to_string()));
        pairs.extend(self.sort.iter().map(|s| ("sort".to_string(), s.encode())));
        pairs
    }
}

/// Encode query pairs for the Veracode APIs.
///
/// Spaces become `%20`, never `+`: the platform rejects `name=foo+bar` with a 401
/// because the signed URL no longer matches.
pub fn encode_query<K, V>(pairs: &[(K, V)]) -> String
where
    K: AsRef<str>,
    V: AsRef<str>,
{
    let mut query = String::new();
    for (i, (key, value)) in pairs.iter().enumerate() {
        if i > 0 {
            query.push('&');
        }
        query.push_str(&urlencoding::encode(key.as_ref()));
        query.push('=');
        query.push_str(&urlencoding::encode(value.as_ref()));
    }
    query
}
