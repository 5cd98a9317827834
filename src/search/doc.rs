//! Index records describing one physical copy of a logical file.

use serde::Deserialize;

/// Service tag marking the access URL that can be fetched over plain HTTP.
pub const HTTP_SERVER_MARKER: &str = "HTTPServer";

/// Projection requested from the index for search calls.
pub const SEARCH_FIELDS: &str = "instance_id,url,checksum,data_node,checksum_type";

/// A checksum value and the tag naming its algorithm, as published by the index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Checksum {
    /// Hex digest.
    pub value: String,
    /// Algorithm tag, e.g. `SHA256` or `MD5`.
    pub algorithm: String,
}

/// One index record: a logical file as served by one data node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Doc {
    /// Version-stable identity of the logical file.
    pub instance_id: String,
    /// Data node serving this copy.
    pub data_node: String,
    /// Every access URL exposed for this copy (`url|mime|service`).
    pub urls: Vec<String>,
    /// The HTTP-fetchable URL, if the record exposes one.
    pub http_url: Option<String>,
    /// Present only when exactly one value and one algorithm tag were published.
    pub checksum: Option<Checksum>,
    /// Whether the query that produced this record selected replicas.
    pub replica: bool,
}

/// Wire shape of a search result record. Every field is optional on the wire.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct RawDoc {
    #[serde(default)]
    pub(crate) instance_id: Option<String>,
    #[serde(default)]
    pub(crate) data_node: Option<String>,
    #[serde(default)]
    pub(crate) url: Vec<String>,
    #[serde(default)]
    pub(crate) checksum: Vec<String>,
    #[serde(default)]
    pub(crate) checksum_type: Vec<String>,
}

impl Doc {
    /// Converts a raw record, returning `None` when it carries no `instance_id`.
    pub(crate) fn from_raw(raw: RawDoc, replica: bool) -> Option<Self> {
        let instance_id = raw.instance_id.filter(|id| !id.is_empty())?;
        let http_url = select_http_url(&raw.url);
        let checksum = single_checksum(raw.checksum, raw.checksum_type);
        Some(Self {
            instance_id,
            data_node: raw.data_node.unwrap_or_default(),
            urls: raw.url,
            http_url,
            checksum,
            replica,
        })
    }
}

/// Picks the first access URL tagged with [`HTTP_SERVER_MARKER`] and strips its
/// `|mime|service` suffix.
#[must_use]
pub fn select_http_url(urls: &[String]) -> Option<String> {
    urls.iter().find_map(|entry| {
        let mut parts = entry.split('|');
        let target = parts.next()?;
        parts
            .any(|part| part == HTTP_SERVER_MARKER)
            .then(|| target.to_string())
    })
}

fn single_checksum(values: Vec<String>, algorithms: Vec<String>) -> Option<Checksum> {
    if values.len() != 1 || algorithms.len() != 1 {
        return None;
    }
    let value = values.into_iter().next()?;
    let algorithm = algorithms.into_iter().next()?;
    Some(Checksum { value, algorithm })
}
