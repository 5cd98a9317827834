//! Search API access: query building, index records and the index client.
//!
//! # Architecture
//!
//! - [`Criteria`] / [`build_query`] - criteria to boolean query string
//! - [`Doc`] - one index record (a logical file on one data node)
//! - [`FileIndex`] - async trait the resolver queries through
//! - [`IndexClient`] - [`FileIndex`] over a Solr-style HTTP search API
//!
//! # Example
//!
//! ```no_run
//! use sproket_core::search::{Criteria, FileIndex, IndexClient};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let index = IndexClient::new("https://esgf-node.llnl.gov/esg-search/search")?;
//! let criteria = Criteria::from_fields([("variable_id", "tas")]).canonical();
//! let page = index.search_page(&criteria, 0, 0).await?;
//! println!("{} matching files", page.remaining);
//! # Ok(())
//! # }
//! ```

mod client;
mod doc;
mod error;
mod query;

pub use client::{DEFAULT_SEARCH_TIMEOUTS, IndexClient, pair_facet_values};
pub use doc::{Checksum, Doc, HTTP_SERVER_MARKER, SEARCH_FIELDS, select_http_url};
pub use error::SearchError;
pub use query::{
    Criteria, DATA_NODE_FIELD, LATEST_FIELD, MATCH_ALL_QUERY, REPLICA_FIELD, RETRACTED_FIELD,
    build_query,
};

use std::collections::BTreeMap;

use async_trait::async_trait;

/// Value to match count, as returned by a facet query.
pub type FacetCounts = BTreeMap<String, u64>;

/// One page of search results.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchPage {
    /// Records in index order.
    pub docs: Vec<Doc>,
    /// Matches left after this page, never negative.
    pub remaining: usize,
}

/// Paginated and faceted access to a File-type document index.
///
/// Implementations must not retry internally; a failure is reported to the
/// caller, which aborts its resolution pass.
#[async_trait]
pub trait FileIndex: Send + Sync {
    /// Fetches up to `limit` records starting at `skip`.
    ///
    /// `remaining` is `total - (skip + returned)`, floored at zero. With
    /// `limit == 0` no records are requested, `docs` is empty and
    /// `remaining` is the total match count past `skip`.
    async fn search_page(
        &self,
        criteria: &Criteria,
        skip: usize,
        limit: usize,
    ) -> Result<SearchPage, SearchError>;

    /// Counts matches per distinct value of `field`.
    async fn facet(&self, criteria: &Criteria, field: &str) -> Result<FacetCounts, SearchError>;
}
