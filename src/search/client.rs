//! HTTP client for a Solr-style search API serving File records.

use std::collections::HashMap;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, instrument, warn};
use url::Url;

use super::doc::{Doc, RawDoc, SEARCH_FIELDS};
use super::error::SearchError;
use super::query::Criteria;
use super::{FacetCounts, FileIndex, SearchPage};
use crate::http_client::{HttpTimeouts, build_http_client};
use crate::user_agent;

/// Default timeouts for search API requests: a search page is small, so the
/// whole request is capped too.
pub const DEFAULT_SEARCH_TIMEOUTS: HttpTimeouts = HttpTimeouts::new(10, 60).with_total_secs(60);

/// Response format requested from the search API.
const RESPONSE_FORMAT: &str = "application/solr+json";

/// Document type requested from the search API.
const DOC_TYPE: &str = "File";

#[derive(Debug, Default, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    response: ResponseBody,
}

#[derive(Debug, Default, Deserialize)]
struct ResponseBody {
    #[serde(rename = "numFound", default)]
    num_found: usize,
    #[serde(default)]
    docs: Vec<RawDoc>,
}

#[derive(Debug, Default, Deserialize)]
struct FacetResponse {
    #[serde(default)]
    facet_counts: FacetSection,
}

#[derive(Debug, Default, Deserialize)]
struct FacetSection {
    #[serde(default)]
    facet_fields: HashMap<String, Vec<Value>>,
}

#[derive(Debug, Default, Deserialize)]
struct FieldsResponse {
    #[serde(default)]
    response: FieldsBody,
}

#[derive(Debug, Default, Deserialize)]
struct FieldsBody {
    #[serde(default)]
    docs: Vec<serde_json::Map<String, Value>>,
}

/// Search API client.
///
/// Cheap to clone; clones share the connection pool.
#[derive(Debug, Clone)]
pub struct IndexClient {
    client: Client,
    api: Url,
}

impl IndexClient {
    /// Creates a client for the search endpoint at `api` with default timeouts.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::InvalidApiUrl`] if `api` is not an absolute
    /// http(s) URL, or [`SearchError::ClientBuild`] if the HTTP client
    /// cannot be built.
    pub fn new(api: &str) -> Result<Self, SearchError> {
        Self::with_timeouts(api, DEFAULT_SEARCH_TIMEOUTS)
    }

    /// Creates a client with explicit timeouts.
    ///
    /// # Errors
    ///
    /// Same as [`IndexClient::new`].
    pub fn with_timeouts(api: &str, timeouts: HttpTimeouts) -> Result<Self, SearchError> {
        let api = Url::parse(api)
            .ok()
            .filter(|url| matches!(url.scheme(), "http" | "https"))
            .ok_or_else(|| SearchError::InvalidApiUrl {
                url: api.to_string(),
            })?;
        let client = build_http_client(user_agent::default_search_user_agent(), timeouts)
            .map_err(|source| SearchError::ClientBuild { source })?;
        Ok(Self { client, api })
    }

    /// The search endpoint this client queries.
    #[must_use]
    pub fn api(&self) -> &Url {
        &self.api
    }

    /// Lists the field names available on records matching `criteria`.
    ///
    /// Only the first matching record is inspected, so fields present on
    /// some records but not that one are missed. Names starting with `_`
    /// are index internals and are hidden. Sorted.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError`] on transport failure, non-success status or
    /// a body that is not JSON.
    #[instrument(skip(self, criteria))]
    pub async fn field_keys(&self, criteria: &Criteria) -> Result<Vec<String>, SearchError> {
        let query = criteria.query();
        let params = [
            ("query", query.as_str()),
            ("type", DOC_TYPE),
            ("format", RESPONSE_FORMAT),
            ("fields", "*"),
            ("limit", "1"),
        ];
        let (url, body) = self.perform_search(&params).await?;
        let parsed: FieldsResponse =
            serde_json::from_slice(&body).map_err(|e| SearchError::malformed(url, e))?;

        let mut keys: Vec<String> = parsed
            .response
            .docs
            .into_iter()
            .next()
            .map(|doc| doc.into_iter().map(|(key, _)| key).collect())
            .unwrap_or_default();
        keys.retain(|key| !key.starts_with('_'));
        keys.sort();
        Ok(keys)
    }

    /// Issues one GET against the search endpoint, returning the request URL
    /// (for error context) and the raw body.
    async fn perform_search(&self, params: &[(&str, &str)]) -> Result<(String, Vec<u8>), SearchError> {
        let mut url = self.api.clone();
        url.query_pairs_mut().extend_pairs(params);
        let url_str = url.to_string();
        debug!(url = %url_str, "querying search API");

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| SearchError::network(url_str.clone(), e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SearchError::http_status(url_str, status.as_u16()));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| SearchError::network(url_str.clone(), e))?;
        Ok((url_str, body.to_vec()))
    }
}

#[async_trait]
impl FileIndex for IndexClient {
    #[instrument(skip(self, criteria), fields(api = %self.api))]
    async fn search_page(
        &self,
        criteria: &Criteria,
        skip: usize,
        limit: usize,
    ) -> Result<SearchPage, SearchError> {
        let query = criteria.query();
        let limit_str = limit.to_string();
        let skip_str = skip.to_string();
        let params = [
            ("query", query.as_str()),
            ("type", DOC_TYPE),
            ("format", RESPONSE_FORMAT),
            ("fields", SEARCH_FIELDS),
            ("limit", limit_str.as_str()),
            ("offset", skip_str.as_str()),
        ];
        let (url, body) = self.perform_search(&params).await?;
        let parsed: SearchResponse =
            serde_json::from_slice(&body).map_err(|e| SearchError::malformed(url, e))?;

        let total = parsed.response.num_found;
        let raw_docs = if limit == 0 {
            Vec::new()
        } else {
            parsed.response.docs
        };
        let returned = raw_docs.len();
        let remaining = total.saturating_sub(skip.saturating_add(returned));

        let replica = criteria.selects_replicas();
        let docs: Vec<Doc> = raw_docs
            .into_iter()
            .filter_map(|raw| {
                let doc = Doc::from_raw(raw, replica);
                if doc.is_none() {
                    warn!("search result without instance_id ignored");
                }
                doc
            })
            .collect();

        debug!(total, skip, returned, remaining, "search page received");
        Ok(SearchPage { docs, remaining })
    }

    #[instrument(skip(self, criteria), fields(api = %self.api))]
    async fn facet(&self, criteria: &Criteria, field: &str) -> Result<FacetCounts, SearchError> {
        let query = criteria.query();
        let params = [
            ("query", query.as_str()),
            ("type", DOC_TYPE),
            ("format", RESPONSE_FORMAT),
            ("limit", "0"),
            ("facets", field),
        ];
        let (url, body) = self.perform_search(&params).await?;
        let parsed: FacetResponse =
            serde_json::from_slice(&body).map_err(|e| SearchError::malformed(url, e))?;

        let values = parsed
            .facet_counts
            .facet_fields
            .get(field)
            .map(Vec::as_slice)
            .unwrap_or_default();
        let counts = pair_facet_values(values);
        debug!(field, values = counts.len(), "facet received");
        Ok(counts)
    }
}

/// Pairs a flat `[value, count, value, count, ...]` facet list into a map.
///
/// Pairing is positional. A pair whose first element is not a string or
/// whose second is not a non-negative integer is dropped, as is a trailing
/// unmatched value.
#[must_use]
pub fn pair_facet_values(values: &[Value]) -> FacetCounts {
    values
        .chunks_exact(2)
        .filter_map(|pair| match (&pair[0], &pair[1]) {
            (Value::String(value), Value::Number(count)) => {
                count.as_u64().map(|count| (value.clone(), count))
            }
            _ => None,
        })
        .collect()
}
